#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("division by zero")]
    DivisionByZero,

    #[error("amplification coefficient must be positive")]
    ZeroAmplification,

    #[error("asset index {index} out of range for {len} balances")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("solver did not converge within {iterations} iterations")]
    ConvergenceFailure { iterations: usize },
}
