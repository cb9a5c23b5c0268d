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

//! Arithmetic on big-endian unsigned integers held in byte slices.
//!
//! CBOR negative big numbers (tag 3) carry `-1 - n`, so encoding a negative magnitude `m`
//! means writing `m - 1` and decoding means computing `n + 1`. Both directions can change the
//! length of the byte string by one.

use alloc::vec::Vec;


/// Return `bytes` without its leading zero bytes. An all-zero input gives an empty slice.
pub fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Interpret `bytes` as a big-endian integer if it fits in a `u64`.
pub fn to_u64(bytes: &[u8]) -> Option<u64> {
    let bytes = strip_leading_zeros(bytes);
    if bytes.len() > 8 {
        return None;
    }
    Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

/// Length of `magnitude - 1` once leading zeros are dropped.
///
/// `magnitude` must already be stripped of leading zeros and be non-zero.
pub fn decremented_len(magnitude: &[u8]) -> usize {
    match magnitude.split_first() {
        None => 0,
        Some((1, rest)) if rest.iter().all(|b| *b == 0) => {
            // 0x01 00 .. 00 becomes 0xff .. ff, one byte shorter.
            magnitude.len() - 1
        }
        Some(_) => magnitude.len(),
    }
}

/// Write `magnitude - 1` into `out`, which must be exactly [`decremented_len`] bytes long.
///
/// The borrow is propagated from the least significant byte upwards in a loop, so the depth of
/// the computation does not depend on the length of the number.
pub fn decrement_into(magnitude: &[u8], out: &mut [u8]) {
    let dropped = magnitude.len() - out.len();
    let mut borrow = true;
    for (i, byte) in magnitude.iter().enumerate().rev() {
        let value = if borrow {
            let (v, b) = byte.overflowing_sub(1);
            borrow = b;
            v
        } else {
            *byte
        };
        if i >= dropped {
            out[i - dropped] = value;
        }
    }
}

/// Compute `n + 1` for a big-endian `n`, as needed when decoding a tag 3 big number.
pub fn increment(n: &[u8]) -> Vec<u8> {
    let n = strip_leading_zeros(n);
    let mut result = Vec::with_capacity(n.len() + 1);
    result.extend_from_slice(n);
    let mut carry = true;
    for byte in result.iter_mut().rev() {
        let (v, c) = byte.overflowing_add(1);
        *byte = v;
        carry = c;
        if !carry {
            break;
        }
    }
    if carry {
        result.insert(0, 1);
    }
    result
}
