pub mod fees;
pub mod fixed_point;
pub mod invariant;
pub mod math_error;

pub use fixed_point::Balance;
pub use math_error::MathError;
