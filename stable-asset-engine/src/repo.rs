use std::collections::HashMap;
use std::sync::Arc;

use log::trace;
use parking_lot::RwLock;

use crate::pool::StablePool;
use crate::types::PoolId;

/// Durable storage of pool states.
pub trait PoolRepo {
    fn get(&self, pool_id: PoolId) -> Option<StablePool>;
    fn put(&self, pool: StablePool);
    fn contains(&self, pool_id: PoolId) -> bool;
    fn ids(&self) -> Vec<PoolId>;
}

impl<R: PoolRepo> PoolRepo for Arc<R> {
    fn get(&self, pool_id: PoolId) -> Option<StablePool> {
        self.as_ref().get(pool_id)
    }

    fn put(&self, pool: StablePool) {
        self.as_ref().put(pool)
    }

    fn contains(&self, pool_id: PoolId) -> bool {
        self.as_ref().contains(pool_id)
    }

    fn ids(&self) -> Vec<PoolId> {
        self.as_ref().ids()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPoolRepo(RwLock<HashMap<PoolId, StablePool>>);

impl InMemoryPoolRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PoolRepo for InMemoryPoolRepo {
    fn get(&self, pool_id: PoolId) -> Option<StablePool> {
        self.0.read().get(&pool_id).cloned()
    }

    fn put(&self, pool: StablePool) {
        self.0.write().insert(pool.pool_id, pool);
    }

    fn contains(&self, pool_id: PoolId) -> bool {
        self.0.read().contains_key(&pool_id)
    }

    fn ids(&self) -> Vec<PoolId> {
        let mut ids: Vec<PoolId> = self.0.read().keys().copied().collect();
        ids.sort();
        ids
    }
}

#[derive(Debug, Default)]
pub struct PoolRepoWithTracing<R>(R);

impl<R> PoolRepoWithTracing<R> {
    pub fn wrap(repo: R) -> Self {
        Self(repo)
    }
}

impl<R: PoolRepo> PoolRepo for PoolRepoWithTracing<R> {
    fn get(&self, pool_id: PoolId) -> Option<StablePool> {
        let res = self.0.get(pool_id);
        trace!("PoolRepo::get(pool_id: {}) -> {:?}", pool_id, res.as_ref().map(|p| &p.balances));
        res
    }

    fn put(&self, pool: StablePool) {
        trace!(
            "PoolRepo::put(pool_id: {}, balances: {:?}, total_supply: {})",
            pool.pool_id,
            pool.balances,
            pool.total_supply
        );
        self.0.put(pool)
    }

    fn contains(&self, pool_id: PoolId) -> bool {
        let res = self.0.contains(pool_id);
        trace!("PoolRepo::contains(pool_id: {}) -> {}", pool_id, res);
        res
    }

    fn ids(&self) -> Vec<PoolId> {
        self.0.ids()
    }
}
