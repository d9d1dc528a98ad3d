// Licensed under the Apache-2.0 license

//! Baud rate divider calculation for the I2C bus units.

/// Instruction-cycle frequency (Fcy) of the device.
pub const INSTRUCTION_CLOCK_HZ: u32 = 40_000_000;

/// Smallest divider the hardware can generate.
pub const MIN_DIVIDER: u16 = 2;

/// Largest value representable in the 16-bit divider register.
pub const MAX_DIVIDER: u16 = u16::MAX;

/// Compute the baud divider for a requested bus speed.
///
/// Implements `divider = fcy / (2 * speed) - 2`, clamped to
/// [`MIN_DIVIDER`]..=[`MAX_DIVIDER`]. Out-of-range requests are not an
/// error: the result is the closest achievable divider, so callers asking
/// for an unreachable speed get "best achievable", not an exact match.
#[must_use]
pub fn baud_divider(fcy_hz: u32, speed_hz: u32) -> u16 {
    let divider = (fcy_hz / (2 * speed_hz)).saturating_sub(2);
    let clamped = divider.clamp(u32::from(MIN_DIVIDER), u32::from(MAX_DIVIDER));
    u16::try_from(clamped).unwrap_or(MAX_DIVIDER)
}
