//! Integer arithmetic shared by the solver and the fee model.
//!
//! External amounts are lifted into a common internal unit with
//! `internal = external * precision` and brought back with floor division.
//! Every operation is checked: additions and multiplications fail with
//! [MathError::Overflow], subtractions with [MathError::InsufficientBalance].

use primitive_types::U512;

use crate::math_error::MathError;

pub type Balance = u128;

pub fn to_internal(amount: Balance, precision: Balance) -> Result<Balance, MathError> {
    amount.checked_mul(precision).ok_or(MathError::Overflow)
}

/// Floor conversion back to the asset's native unit.
pub fn to_external(internal: Balance, precision: Balance) -> Result<Balance, MathError> {
    internal.checked_div(precision).ok_or(MathError::DivisionByZero)
}

pub fn widen(x: Balance) -> U512 {
    U512::from(x)
}

pub fn narrow(x: U512) -> Result<Balance, MathError> {
    if x > U512::from(Balance::MAX) {
        Err(MathError::Overflow)
    } else {
        Ok(x.low_u128())
    }
}

pub fn add(a: U512, b: U512) -> Result<U512, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn sub(a: U512, b: U512) -> Result<U512, MathError> {
    a.checked_sub(b).ok_or(MathError::InsufficientBalance)
}

pub fn mul(a: U512, b: U512) -> Result<U512, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

pub fn div(a: U512, b: U512) -> Result<U512, MathError> {
    a.checked_div(b).ok_or(MathError::DivisionByZero)
}

/// `floor(a * b / c)`
pub fn mul_div(a: U512, b: U512, c: U512) -> Result<U512, MathError> {
    div(mul(a, b)?, c)
}

/// `ceil(a * b / c)`
pub fn mul_div_ceil(a: U512, b: U512, c: U512) -> Result<U512, MathError> {
    if c.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let num = mul(a, b)?;
    let (q, r) = num.div_mod(c);
    if r.is_zero() {
        Ok(q)
    } else {
        add(q, U512::one())
    }
}

pub fn abs_diff(a: U512, b: U512) -> U512 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

pub fn checked_sum<'a, I>(values: I) -> Result<U512, MathError>
where
    I: IntoIterator<Item = &'a Balance>,
{
    values
        .into_iter()
        .try_fold(U512::zero(), |acc, &x| add(acc, widen(x)))
}

/// `floor(amount * num / den)` over balances.
pub fn scale(amount: Balance, num: Balance, den: Balance) -> Result<Balance, MathError> {
    narrow(mul_div(widen(amount), widen(num), widen(den))?)
}

/// `ceil(amount * num / den)` over balances.
pub fn scale_ceil(amount: Balance, num: Balance, den: Balance) -> Result<Balance, MathError> {
    narrow(mul_div_ceil(widen(amount), widen(num), widen(den))?)
}
