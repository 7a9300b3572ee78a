use log::{error, trace};
use primitive_types::U512;

use crate::fixed_point::{abs_diff, add, checked_sum, div, mul, mul_div, narrow, sub, widen, Balance};
use crate::math_error::MathError;

/// Upper bound on Newton-Raphson steps for both `d` and `y`.
pub const MAX_ITERATIONS: usize = 255;

/// `Ann = ampl_coefficient * n^n`.
fn ann(ampl_coefficient: u128, n_assets: usize) -> Result<U512, MathError> {
    if ampl_coefficient == 0 {
        return Err(MathError::ZeroAmplification);
    }
    let n = widen(n_assets as u128);
    (0..n_assets).try_fold(widen(ampl_coefficient), |acc, _| mul(acc, n))
}

/// StableSwap invariant value numerical calculation procedure.
/// \
/// Note: input balances must be reduced to a common denominator (precision).
/// \
/// Function solves the equation
/// \
/// \
/// `d * Ann + d^(n + 1) / (nn * Prod(balances)) = Ann * Sum(balances) + d`
/// \
/// \
/// numerically relative to `d` while all other parameters are known.
/// Iteration starts at `d = Sum(balances)` and stops once two consecutive
/// approximations differ by at most one unit.
///
/// # Arguments
/// * `balances` - Pool balances in internal units;
/// * `ampl_coefficient` - Amplification coefficient of the StableSwap invariant.
///
/// # Outputs
/// * `d` - value of the StableSwap invariant, `0` for an empty pool.
pub fn solve_d(balances: &[Balance], ampl_coefficient: u128) -> Result<Balance, MathError> {
    let n_assets = balances.len();
    let s = checked_sum(balances)?;
    if s.is_zero() {
        return Ok(0);
    }
    if balances.iter().any(|b| *b == 0) {
        return Err(MathError::InsufficientBalance);
    }
    let unit = U512::one();
    let n = widen(n_assets as u128);
    let ann = ann(ampl_coefficient, n_assets)?;
    let ann_s = mul(ann, s)?;

    let mut d = s;
    for iteration in 0..MAX_ITERATIONS {
        // d_p = d^(n + 1) / (n^n * Prod(balances))
        let mut d_p = d;
        for b in balances {
            d_p = mul_div(d_p, d, mul(widen(*b), n)?)?;
        }
        let d_previous = d;
        let num = mul(add(ann_s, mul(d_p, n)?)?, d)?;
        let den = add(mul(sub(ann, unit)?, d)?, mul(add(n, unit)?, d_p)?)?;
        d = div(num, den)?;
        trace!("solve_d: iteration {} d = {}", iteration, d);
        if abs_diff(d, d_previous) <= unit {
            return narrow(d);
        }
    }
    error!(
        "solve_d did not converge: balances = {:?}, A = {}",
        balances, ampl_coefficient
    );
    Err(MathError::ConvergenceFailure {
        iterations: MAX_ITERATIONS,
    })
}

/// Numerical calculation of the `j`-th balance that preserves the invariant `d`
/// while all other balances are fixed.
/// \
/// Solves `y^2 + (b - d) * y = c` with Newton-Raphson, where
/// * `b = Sum'(balances) + d / Ann`;
/// * `c = d^(n + 1) / (nn * Prod'(balances) * Ann)`;
/// * `Sum'`, `Prod'` range over all balances except the `j`-th one.
///
/// # Arguments
/// * `balances` - Pool balances in internal units, the `j`-th entry is ignored;
/// * `j` - Index of the balance to solve for;
/// * `d` - Target value of the invariant;
/// * `ampl_coefficient` - Amplification coefficient of the StableSwap invariant.
pub fn solve_y(balances: &[Balance], j: usize, d: Balance, ampl_coefficient: u128) -> Result<Balance, MathError> {
    let n_assets = balances.len();
    if j >= n_assets {
        return Err(MathError::IndexOutOfRange {
            index: j,
            len: n_assets,
        });
    }
    let unit = U512::one();
    let n = widen(n_assets as u128);
    let ann = ann(ampl_coefficient, n_assets)?;
    let d = widen(d);

    let mut c = d;
    let mut s = U512::zero();
    for (k, b) in balances.iter().enumerate() {
        if k == j {
            continue;
        }
        if *b == 0 {
            return Err(MathError::InsufficientBalance);
        }
        s = add(s, widen(*b))?;
        c = mul_div(c, d, mul(widen(*b), n)?)?;
    }
    c = mul_div(c, d, mul(ann, n)?)?;
    let b = add(s, div(d, ann)?)?;

    let mut y = d;
    for iteration in 0..MAX_ITERATIONS {
        let y_previous = y;
        let num = add(mul(y, y)?, c)?;
        let den = sub(add(mul(y, U512::from(2))?, b)?, d)?;
        y = div(num, den)?;
        trace!("solve_y: iteration {} y = {}", iteration, y);
        if abs_diff(y, y_previous) <= unit {
            return narrow(y);
        }
    }
    error!(
        "solve_y did not converge: balances = {:?}, j = {}, d = {}, A = {}",
        balances, j, d, ampl_coefficient
    );
    Err(MathError::ConvergenceFailure {
        iterations: MAX_ITERATIONS,
    })
}

/// Calculates StableSwap invariant error.
/// \
/// Since we are working with integers the left side of the invariant expression
/// is not equal to the right one in most cases. "Invariant error" is the absolute
/// difference between both sides of
/// \
/// `d * Ann + d^(n + 1) / (nn * Prod(balances)) = Ann * Sum(balances) + d`.
pub fn invariant_error(balances: &[Balance], ampl_coefficient: u128, d: Balance) -> Result<U512, MathError> {
    let n_assets = balances.len();
    let n = widen(n_assets as u128);
    let ann = ann(ampl_coefficient, n_assets)?;
    let d = widen(d);
    let mut d_p = d;
    for b in balances {
        d_p = mul_div(d_p, d, mul(widen(*b), n)?)?;
    }
    let inv_right = add(mul(d, ann)?, d_p)?;
    let inv_left = add(mul(ann, checked_sum(balances)?)?, d)?;
    Ok(abs_diff(inv_right, inv_left))
}
