//! Range- and overflow-checked arithmetic for externally supplied numbers.
//!
//! Every token count in a transcript arrives as a JSON double; every
//! combination of counts can overflow. These helpers are total: they either
//! return the exact value or a distinguishable error, never a truncated or
//! wrapped number.

use crate::error::{Result, StatusError};

/// Convert a JSON number to `u64`, rejecting NaN, infinities, negatives and
/// values beyond `u64::MAX`. Fractional values truncate toward zero.
pub fn f64_to_u64(value: f64) -> Result<u64> {
    // `u64::MAX as f64` rounds up to 2^64, which is itself out of range.
    if !value.is_finite() || value < 0.0 || value >= u64::MAX as f64 {
        return Err(StatusError::InvalidConversion);
    }
    Ok(value as u64)
}

/// Same contract as [`f64_to_u64`] at 32-bit width.
pub fn f64_to_u32(value: f64) -> Result<u32> {
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(StatusError::InvalidConversion);
    }
    Ok(value as u32)
}

/// Signed size to unsigned, failing on negative input.
pub fn i64_to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| StatusError::InvalidConversion)
}

pub fn checked_add_u64(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b).ok_or(StatusError::Overflow)
}

/// Checked multiplication. Zero times anything is zero, even `u64::MAX`.
pub fn checked_mul_u64(a: u64, b: u64) -> Result<u64> {
    if a == 0 || b == 0 {
        return Ok(0);
    }
    a.checked_mul(b).ok_or(StatusError::Overflow)
}

pub fn checked_add_u32(a: u32, b: u32) -> Result<u32> {
    a.checked_add(b).ok_or(StatusError::Overflow)
}
