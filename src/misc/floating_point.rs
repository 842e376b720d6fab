use nalgebra::{convert, RealField};
use num_traits::ToPrimitive;

/// Trait for floating point types (f32, f64)
/// Mainly used to identify the type of the field in nalgebra
pub trait FloatingPoint: RealField + ToPrimitive + Copy + Default {}

impl FloatingPoint for f32 {}
impl FloatingPoint for f64 {}

/// Convert a f64 constant into the scalar type.
#[inline]
pub fn scalar<T: FloatingPoint>(value: f64) -> T {
    convert(value)
}

/// Convert a count into the scalar type.
#[inline]
pub fn scalar_from_usize<T: FloatingPoint>(value: usize) -> T {
    convert(value as f64)
}

/// Divide `numerator` by `denominator` unless the quotient would blow up.
/// Returns `None` when `|denominator|` is not safely above `|numerator| * relative_tolerance`.
///
/// # Example
/// ```
/// use bsurf::prelude::safe_divide;
/// assert_eq!(safe_divide(1.0, 4.0, 1e-12), Some(0.25));
/// assert_eq!(safe_divide(1.0, 0.0, 1e-12), None);
/// ```
pub fn safe_divide<T: FloatingPoint>(numerator: T, denominator: T, relative_tolerance: T) -> Option<T> {
    let limit = numerator.abs() * relative_tolerance;
    if denominator.abs() > limit && denominator != T::zero() {
        Some(numerator / denominator)
    } else {
        None
    }
}

/// Round a fractional step count the way the mesher does: anything below one is a single step.
pub fn integerize_step_count<T: FloatingPoint>(value: T) -> usize {
    if value < T::one() {
        1
    } else {
        (value + scalar(0.5)).floor().to_usize().unwrap_or(1)
    }
}
