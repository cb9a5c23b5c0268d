// Copyright 2021 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
////////////////////////////////////////////////////////////////////////////////

//! Lossless conversion between IEEE 754 half, single and double precision.
//!
//! All conversions work on bit patterns so that NaN payloads, signed zeros and subnormals are
//! carried exactly. A narrowing conversion only happens when the value survives the round trip
//! bit-for-bit.


const DOUBLE_MANTISSA_BITS: u32 = 52;
const DOUBLE_EXPONENT_MASK: u64 = 0x7ff;
const DOUBLE_EXPONENT_BIAS: i64 = 1023;
const DOUBLE_MANTISSA_MASK: u64 = (1 << DOUBLE_MANTISSA_BITS) - 1;

const SINGLE_MANTISSA_BITS: u32 = 23;
const SINGLE_EXPONENT_MASK: u32 = 0xff;
const SINGLE_EXPONENT_BIAS: i32 = 127;
const SINGLE_MANTISSA_MASK: u32 = (1 << SINGLE_MANTISSA_BITS) - 1;

const HALF_MANTISSA_BITS: u32 = 10;
const HALF_EXPONENT_MASK: u16 = 0x1f;
const HALF_EXPONENT_BIAS: i32 = 15;
const HALF_MANTISSA_MASK: u16 = (1 << HALF_MANTISSA_BITS) - 1;

/// Bit pattern of the canonical quiet NaN in half precision.
pub const HALF_QUIET_NAN: u16 = 0x7e00;

/// Smallest lossless representation of a floating point value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduced {
    Half(u16),
    Single(u32),
    Double(u64),
}

/// A floating point value that holds a whole number in CBOR integer range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WholeNumber {
    /// Non-negative value.
    Unsigned(u64),
    /// Negative value `-1 - n`, holding `n`.
    Negative(u64),
}

fn low_bits_clear(value: u64, count: u32) -> bool {
    count == 0 || (count < 64 && value & ((1u64 << count) - 1) == 0)
}

/// Find the smallest of half, single or double precision that holds `d` exactly.
pub fn reduce_double(d: f64) -> Reduced {
    let bits = d.to_bits();
    let sign = bits >> 63;
    let exponent = (bits >> DOUBLE_MANTISSA_BITS) & DOUBLE_EXPONENT_MASK;
    let mantissa = bits & DOUBLE_MANTISSA_MASK;
    let half_sign = (sign as u16) << 15;
    let single_sign = (sign as u32) << 31;

    if exponent == DOUBLE_EXPONENT_MASK {
        // Infinity when the mantissa is zero, NaN otherwise. The NaN payload is kept; it is only
        // narrowed when the dropped low bits are all zero.
        let half_drop = DOUBLE_MANTISSA_BITS - HALF_MANTISSA_BITS;
        let single_drop = DOUBLE_MANTISSA_BITS - SINGLE_MANTISSA_BITS;
        if low_bits_clear(mantissa, half_drop) {
            return Reduced::Half(half_sign | 0x7c00 | (mantissa >> half_drop) as u16);
        }
        if low_bits_clear(mantissa, single_drop) {
            return Reduced::Single(single_sign | 0x7f80_0000 | (mantissa >> single_drop) as u32);
        }
        return Reduced::Double(bits);
    }

    if exponent == 0 {
        if mantissa == 0 {
            return Reduced::Half(half_sign);
        }
        // Double subnormals are far below the smallest single subnormal.
        return Reduced::Double(bits);
    }

    let unbiased = exponent as i64 - DOUBLE_EXPONENT_BIAS;
    // Significand with the implied leading one made explicit.
    let significand = mantissa | (1 << DOUBLE_MANTISSA_BITS);

    // Half precision, normal range.
    if (-14..=15).contains(&unbiased)
        && low_bits_clear(mantissa, DOUBLE_MANTISSA_BITS - HALF_MANTISSA_BITS)
    {
        let e = (unbiased + HALF_EXPONENT_BIAS as i64) as u16;
        let m = (mantissa >> (DOUBLE_MANTISSA_BITS - HALF_MANTISSA_BITS)) as u16;
        return Reduced::Half(half_sign | (e << HALF_MANTISSA_BITS) | m);
    }
    // Half precision, subnormal range: value = m * 2^-24.
    if (-24..=-15).contains(&unbiased) {
        let shift = (28 - unbiased) as u32;
        if low_bits_clear(significand, shift) {
            return Reduced::Half(half_sign | (significand >> shift) as u16);
        }
    }
    // Single precision, normal range.
    if (-126..=127).contains(&unbiased)
        && low_bits_clear(mantissa, DOUBLE_MANTISSA_BITS - SINGLE_MANTISSA_BITS)
    {
        let e = (unbiased + SINGLE_EXPONENT_BIAS as i64) as u32;
        let m = (mantissa >> (DOUBLE_MANTISSA_BITS - SINGLE_MANTISSA_BITS)) as u32;
        return Reduced::Single(single_sign | (e << SINGLE_MANTISSA_BITS) | m);
    }
    // Single precision, subnormal range: value = m * 2^-149.
    if (-149..=-127).contains(&unbiased) {
        let shift = (-97 - unbiased) as u32;
        if low_bits_clear(significand, shift) {
            return Reduced::Single(single_sign | (significand >> shift) as u32);
        }
    }
    Reduced::Double(bits)
}

/// Find the smallest of half or single precision that holds `f` exactly.
pub fn reduce_single(f: f32) -> Reduced {
    let bits = f.to_bits();
    let sign = bits >> 31;
    let exponent = (bits >> SINGLE_MANTISSA_BITS) & SINGLE_EXPONENT_MASK;
    let mantissa = bits & SINGLE_MANTISSA_MASK;
    let half_sign = (sign as u16) << 15;
    let drop = SINGLE_MANTISSA_BITS - HALF_MANTISSA_BITS;

    if exponent == SINGLE_EXPONENT_MASK {
        if low_bits_clear(mantissa as u64, drop) {
            return Reduced::Half(half_sign | 0x7c00 | (mantissa >> drop) as u16);
        }
        return Reduced::Single(bits);
    }
    if exponent == 0 {
        if mantissa == 0 {
            return Reduced::Half(half_sign);
        }
        return Reduced::Single(bits);
    }

    let unbiased = exponent as i32 - SINGLE_EXPONENT_BIAS;
    let significand = (mantissa | (1 << SINGLE_MANTISSA_BITS)) as u64;
    if (-14..=15).contains(&unbiased) && low_bits_clear(mantissa as u64, drop) {
        let e = (unbiased + HALF_EXPONENT_BIAS) as u16;
        return Reduced::Half(half_sign | (e << HALF_MANTISSA_BITS) | (mantissa >> drop) as u16);
    }
    if (-24..=-15).contains(&unbiased) {
        let shift = (-1 - unbiased) as u32;
        if low_bits_clear(significand, shift) {
            return Reduced::Half(half_sign | (significand >> shift) as u16);
        }
    }
    Reduced::Single(bits)
}

/// Widen a half precision bit pattern to a double.
pub fn half_to_double(half: u16) -> f64 {
    let sign = ((half >> 15) as u64) << 63;
    let exponent = (half >> HALF_MANTISSA_BITS) & HALF_EXPONENT_MASK;
    let mantissa = (half & HALF_MANTISSA_MASK) as u64;
    let bits = if exponent == HALF_EXPONENT_MASK {
        sign | (DOUBLE_EXPONENT_MASK << DOUBLE_MANTISSA_BITS)
            | (mantissa << (DOUBLE_MANTISSA_BITS - HALF_MANTISSA_BITS))
    } else if exponent == 0 {
        if mantissa == 0 {
            sign
        } else {
            // Subnormal half: normalize around the highest set bit.
            let top = 63 - mantissa.leading_zeros();
            let e = (top as i64 - 24 + DOUBLE_EXPONENT_BIAS) as u64;
            let m = (mantissa ^ (1 << top)) << (DOUBLE_MANTISSA_BITS - top);
            sign | (e << DOUBLE_MANTISSA_BITS) | m
        }
    } else {
        let e = (exponent as i64 - HALF_EXPONENT_BIAS as i64 + DOUBLE_EXPONENT_BIAS) as u64;
        sign | (e << DOUBLE_MANTISSA_BITS) | (mantissa << (DOUBLE_MANTISSA_BITS - HALF_MANTISSA_BITS))
    };
    f64::from_bits(bits)
}

/// Widen a single precision bit pattern to a double, keeping any NaN payload intact.
pub fn single_to_double(single: u32) -> f64 {
    let sign = ((single >> 31) as u64) << 63;
    let exponent = (single >> SINGLE_MANTISSA_BITS) & SINGLE_EXPONENT_MASK;
    let mantissa = (single & SINGLE_MANTISSA_MASK) as u64;
    let shift = DOUBLE_MANTISSA_BITS - SINGLE_MANTISSA_BITS;
    let bits = if exponent == SINGLE_EXPONENT_MASK {
        sign | (DOUBLE_EXPONENT_MASK << DOUBLE_MANTISSA_BITS) | (mantissa << shift)
    } else if exponent == 0 {
        if mantissa == 0 {
            sign
        } else {
            let top = 63 - mantissa.leading_zeros();
            let e = (top as i64 - 149 + DOUBLE_EXPONENT_BIAS) as u64;
            let m = (mantissa ^ (1 << top)) << (DOUBLE_MANTISSA_BITS - top);
            sign | (e << DOUBLE_MANTISSA_BITS) | m
        }
    } else {
        let e = (exponent as i64 - SINGLE_EXPONENT_BIAS as i64 + DOUBLE_EXPONENT_BIAS) as u64;
        sign | (e << DOUBLE_MANTISSA_BITS) | (mantissa << shift)
    };
    f64::from_bits(bits)
}

/// Return the integer held by `d` if it is a whole number that fits a CBOR major type 0 or 1
/// argument. Both zeros map to `Unsigned(0)`.
pub fn whole_number(d: f64) -> Option<WholeNumber> {
    let bits = d.to_bits();
    let negative = bits >> 63 == 1;
    let exponent = (bits >> DOUBLE_MANTISSA_BITS) & DOUBLE_EXPONENT_MASK;
    let mantissa = bits & DOUBLE_MANTISSA_MASK;

    if exponent == 0 {
        return if mantissa == 0 {
            Some(WholeNumber::Unsigned(0))
        } else {
            None
        };
    }
    if exponent == DOUBLE_EXPONENT_MASK {
        return None;
    }
    let unbiased = exponent as i64 - DOUBLE_EXPONENT_BIAS;
    if !(0..=64).contains(&unbiased) {
        return None;
    }
    let significand = (mantissa | (1 << DOUBLE_MANTISSA_BITS)) as u128;
    let magnitude = if unbiased >= DOUBLE_MANTISSA_BITS as i64 {
        significand << (unbiased as u32 - DOUBLE_MANTISSA_BITS)
    } else {
        let fraction_bits = DOUBLE_MANTISSA_BITS - unbiased as u32;
        if !low_bits_clear(mantissa, fraction_bits) {
            return None;
        }
        significand >> fraction_bits
    };

    if negative {
        // magnitude >= 1 here, so the subtraction cannot underflow.
        let n = magnitude - 1;
        u64::try_from(n).ok().map(WholeNumber::Negative)
    } else {
        u64::try_from(magnitude).ok().map(WholeNumber::Unsigned)
    }
}
