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

//! CBOR encoding engine.
//!
//! An [`Encoder`] appends items to an output region in wire order, keeping a small fixed-size
//! stack of open arrays, maps and byte strings. Container heads are inserted when the container
//! is closed, once the real item count or length is known.
//!
//! Errors are sticky: the first failure is recorded in the session and every later call becomes
//! a no-op that leaves the output untouched. Callers check once, at [`Encoder::finish`] or
//! [`Encoder::finish_get_size`], which report that first error.

use crate::{
    bignum,
    decode::read_head,
    ieee754::{self, Reduced, WholeNumber},
};
use alloc::vec::Vec;
use ciborium::value::Value;
use core::{cmp::Ordering, ops::Range};
use log::debug;


/// Maximum depth of nested arrays, maps and byte strings in one session.
pub const MAX_NESTING: usize = 15;

/// Maximum number of items in a single array (and pairs in a single map).
pub const MAX_ITEMS_IN_CONTAINER: u64 = 65_534;

/// Maximum length of an encoded head: initial byte plus 8-byte argument.
pub const MAX_HEAD_LEN: usize = 9;

/// Largest output a session will produce.
pub const MAX_ENCODED_LEN: usize = u32::MAX as usize - 1;

/// Initial byte that terminates an indefinite-length item.
pub const BREAK: u8 = 0xff;

pub(crate) const AI_ONE_BYTE: u8 = 24;
pub(crate) const AI_TWO_BYTES: u8 = 25;
pub(crate) const AI_FOUR_BYTES: u8 = 26;
pub(crate) const AI_EIGHT_BYTES: u8 = 27;
pub(crate) const AI_INDEFINITE: u8 = 31;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;
const SIMPLE_UNDEFINED: u8 = 23;

/// Tag numbers for the number formats the encoder knows how to produce.
pub mod tag {
    /// Unsigned big number, RFC 8949 section 3.4.3.
    pub const POS_BIGNUM: u64 = 2;
    /// Negative big number, RFC 8949 section 3.4.3.
    pub const NEG_BIGNUM: u64 = 3;
    /// Decimal fraction, RFC 8949 section 3.4.4.
    pub const DECIMAL_FRACTION: u64 = 4;
    /// Bigfloat, RFC 8949 section 3.4.4.
    pub const BIGFLOAT: u64 = 5;
}

/// CBOR major types (RFC 8949 section 3.1).
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MajorType {
    UnsignedInt = 0,
    NegativeInt = 1,
    ByteString = 2,
    TextString = 3,
    Array = 4,
    Map = 5,
    Tag = 6,
    Simple = 7,
}

impl MajorType {
    /// Major type held in the top three bits of an initial byte.
    pub fn from_initial_byte(initial: u8) -> Self {
        match initial >> 5 {
            0 => MajorType::UnsignedInt,
            1 => MajorType::NegativeInt,
            2 => MajorType::ByteString,
            3 => MajorType::TextString,
            4 => MajorType::Array,
            5 => MajorType::Map,
            6 => MajorType::Tag,
            _ => MajorType::Simple,
        }
    }
}

/// Failures recorded by an [`Encoder`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EncodeError {
    /// Output region is too small for the encoding.
    BufferTooSmall,
    /// Encoding would exceed [`MAX_ENCODED_LEN`].
    BufferTooLarge,
    /// More than [`MAX_NESTING`] levels open at once.
    NestingTooDeep,
    /// A close with nothing open.
    TooManyCloses,
    /// A close of a different kind than the innermost open item.
    CloseMismatch,
    /// `finish` called with items still open.
    ArrayOrMapStillOpen,
    /// More than [`MAX_ITEMS_IN_CONTAINER`] items in one container.
    ArrayTooLong,
    /// A map closed with a label that has no value.
    IncompleteMapPair,
    /// Two map entries with identical encoded labels found while sorting.
    DuplicateLabel,
    /// Construct forbidden by the active [`EncodeConfig`].
    NotAllowed,
    /// Construct the encoder cannot produce.
    Unsupported,
    /// Bytes requested from a size-calculation session.
    NoOutputBuffer,
}

impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            EncodeError::BufferTooSmall => "output buffer too small",
            EncodeError::BufferTooLarge => "encoded output too large",
            EncodeError::NestingTooDeep => "nesting too deep",
            EncodeError::TooManyCloses => "close without matching open",
            EncodeError::CloseMismatch => "close does not match open item",
            EncodeError::ArrayOrMapStillOpen => "array or map still open",
            EncodeError::ArrayTooLong => "too many items in array or map",
            EncodeError::IncompleteMapPair => "map label without value",
            EncodeError::DuplicateLabel => "duplicate map label",
            EncodeError::NotAllowed => "construct not allowed by encoding mode",
            EncodeError::Unsupported => "unsupported construct",
            EncodeError::NoOutputBuffer => "no output buffer",
        };
        write!(f, "{msg}")
    }
}

/// Serialization rules applied by an [`Encoder`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EncodeConfig {
    /// Sort map entries by encoded label when a map is closed, rejecting duplicates.
    pub sort_maps: bool,
    /// Emit floats in the shortest width that holds them exactly.
    pub reduce_floats: bool,
    /// Emit whole-valued floats as integers.
    pub floats_to_ints: bool,
    /// Emit every NaN as the half precision quiet NaN.
    pub canonical_nan: bool,
    /// Emit big numbers that fit in 64 bits as plain integers.
    pub preferred_big_numbers: bool,
    /// Permit indefinite-length arrays and maps.
    pub allow_indefinite: bool,
    /// Permit only `false`, `true` and `null` among the simple values.
    pub only_dcbor_simple: bool,
}

impl EncodeConfig {
    /// Preferred serialization, RFC 8949 section 4.1.
    pub const fn preferred() -> Self {
        Self {
            sort_maps: false,
            reduce_floats: true,
            floats_to_ints: false,
            canonical_nan: false,
            preferred_big_numbers: true,
            allow_indefinite: true,
            only_dcbor_simple: false,
        }
    }

    /// No size reductions beyond the shortest integer arguments.
    pub const fn no_preferred() -> Self {
        Self {
            reduce_floats: false,
            preferred_big_numbers: false,
            ..Self::preferred()
        }
    }

    /// Core deterministic encoding, RFC 8949 section 4.2.1.
    pub const fn cde() -> Self {
        Self {
            sort_maps: true,
            allow_indefinite: false,
            ..Self::preferred()
        }
    }

    /// dCBOR: core deterministic encoding plus numeric reduction.
    pub const fn dcbor() -> Self {
        Self {
            floats_to_ints: true,
            canonical_nan: true,
            only_dcbor_simple: true,
            ..Self::cde()
        }
    }
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self::preferred()
    }
}

/// An encoded CBOR head, produced without an encoding session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Head {
    bytes: [u8; MAX_HEAD_LEN],
    len: u8,
}

impl Head {
    /// The encoded head.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Number of bytes in the encoded head.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len as usize
    }
}

impl AsRef<[u8]> for Head {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Encode the head for an item of type `major` with the given `argument`.
///
/// The argument uses the shortest form unless `min_len` asks for at least that many argument
/// bytes (1, 2, 4 or 8), which floats need to keep their width. A `min_len` of 0 allows the
/// argument to live in the initial byte.
pub fn encode_head(major: MajorType, argument: u64, min_len: usize) -> Head {
    let initial = (major as u8) << 5;
    let mut bytes = [0u8; MAX_HEAD_LEN];
    let arg_len = if min_len == 0 && argument < AI_ONE_BYTE as u64 {
        0
    } else if min_len <= 1 && argument <= 0xff {
        1
    } else if min_len <= 2 && argument <= 0xffff {
        2
    } else if min_len <= 4 && argument <= 0xffff_ffff {
        4
    } else {
        8
    };
    if arg_len == 0 {
        bytes[0] = initial | argument as u8;
        return Head { bytes, len: 1 };
    }
    bytes[0] = initial
        | match arg_len {
            1 => AI_ONE_BYTE,
            2 => AI_TWO_BYTES,
            4 => AI_FOUR_BYTES,
            _ => AI_EIGHT_BYTES,
        };
    bytes[1..=arg_len].copy_from_slice(&argument.to_be_bytes()[8 - arg_len..]);
    Head {
        bytes,
        len: 1 + arg_len as u8,
    }
}

/// Where encoded bytes go.
enum Output<'a> {
    Slice(&'a mut [u8]),
    Growable(&'a mut Vec<u8>),
    SizeOnly,
}

/// Kind of an open item on the nesting stack.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Nest {
    Array,
    Map,
    IndefiniteArray,
    IndefiniteMap,
    BstrWrap,
    OpenBytes,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    kind: Nest,
    /// Offset of the first content byte.
    start: usize,
    /// Items so far; for `OpenBytes` the reserved capacity.
    count: u64,
}

const EMPTY_FRAME: Frame = Frame {
    kind: Nest::Array,
    start: 0,
    count: 0,
};

/// Mantissa of a decimal fraction or bigfloat.
enum Mantissa<'b> {
    Int(i64),
    Big { negative: bool, magnitude: &'b [u8] },
}

/// A CBOR encoding session.
pub struct Encoder<'a> {
    out: Output<'a>,
    len: usize,
    frames: [Frame; MAX_NESTING],
    depth: usize,
    error: Option<EncodeError>,
    config: EncodeConfig,
    /// A tag head has been written and still needs its item.
    tag_pending: bool,
}

impl<'a> Encoder<'a> {
    /// Start a session that writes into `buf`, failing with
    /// [`EncodeError::BufferTooSmall`] when it runs out of room.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self::with_output(Output::Slice(buf), EncodeConfig::default())
    }

    /// Start a session that appends to `buf`, growing it as needed. Any existing contents of
    /// `buf` are discarded.
    pub fn growable(buf: &'a mut Vec<u8>) -> Self {
        buf.clear();
        Self::with_output(Output::Growable(buf), EncodeConfig::default())
    }

    /// Start a session that only computes the encoded length.
    ///
    /// This is the counterpart of handing an encoder a null or zero-capacity buffer: a session
    /// over an empty slice from [`Encoder::new`] fails with [`EncodeError::BufferTooSmall`]
    /// instead. Without output bytes, map entries are not sorted, so a duplicate label under
    /// [`EncodeConfig::cde`] or [`EncodeConfig::dcbor`] is only reported by a session that
    /// writes the bytes.
    pub fn size_only() -> Self {
        Self::with_output(Output::SizeOnly, EncodeConfig::default())
    }

    /// Replace the serialization rules. Should be called before anything is appended.
    #[must_use]
    pub fn with_config(mut self, config: EncodeConfig) -> Self {
        self.config = config;
        self
    }

    fn with_output(out: Output<'a>, config: EncodeConfig) -> Self {
        Self {
            out,
            len: 0,
            frames: [EMPTY_FRAME; MAX_NESTING],
            depth: 0,
            error: None,
            config,
            tag_pending: false,
        }
    }

    /// Active serialization rules.
    pub fn config(&self) -> &EncodeConfig {
        &self.config
    }

    /// The first error recorded in this session, if any.
    pub fn error(&self) -> Option<EncodeError> {
        self.error
    }

    /// Number of bytes produced so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been produced yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether this session only computes sizes.
    pub fn is_size_only(&self) -> bool {
        matches!(self.out, Output::SizeOnly)
    }

    /// Bytes already produced in `range`. `None` in size-calculation mode, or if the range is not
    /// inside what has been written.
    pub fn encoded(&self, range: Range<usize>) -> Option<&[u8]> {
        if range.end > self.len {
            return None;
        }
        match &self.out {
            Output::Slice(buf) => buf.get(range),
            Output::Growable(buf) => buf.get(range),
            Output::SizeOnly => None,
        }
    }

    fn fail(&mut self, e: EncodeError) {
        if self.error.is_none() {
            debug!("CBOR encoding failed at offset {}: {e}", self.len);
            self.error = Some(e);
        }
    }

    fn new_len(&self, extra: usize) -> Result<usize, EncodeError> {
        match self.len.checked_add(extra) {
            Some(end) if end <= MAX_ENCODED_LEN => Ok(end),
            _ => Err(EncodeError::BufferTooLarge),
        }
    }

    /// Make `extra` bytes available past the current end without advancing, returning them.
    fn room(&mut self, extra: usize) -> Result<Option<&mut [u8]>, EncodeError> {
        let end = self.new_len(extra)?;
        let start = self.len;
        match &mut self.out {
            Output::Slice(buf) => {
                if end > buf.len() {
                    return Err(EncodeError::BufferTooSmall);
                }
                Ok(Some(&mut buf[start..end]))
            }
            Output::Growable(buf) => {
                buf.resize(end, 0);
                Ok(Some(&mut buf[start..end]))
            }
            Output::SizeOnly => Ok(None),
        }
    }

    /// Append `n` bytes produced by `fill`.
    fn write_with<F: FnOnce(&mut [u8])>(&mut self, n: usize, fill: F) {
        if self.error.is_some() {
            return;
        }
        match self.room(n) {
            Ok(Some(region)) => fill(region),
            Ok(None) => {}
            Err(e) => return self.fail(e),
        }
        self.len += n;
    }

    fn write(&mut self, data: &[u8]) {
        self.write_with(data.len(), |region| region.copy_from_slice(data));
    }

    /// Insert `data` at offset `at`, moving everything after it along.
    fn insert(&mut self, at: usize, data: &[u8]) {
        if self.error.is_some() {
            return;
        }
        let n = data.len();
        let old_len = self.len;
        match self.room(n) {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.len += n;
                return;
            }
            Err(e) => return self.fail(e),
        }
        let buf: &mut [u8] = match &mut self.out {
            Output::Slice(buf) => buf,
            Output::Growable(buf) => buf.as_mut_slice(),
            Output::SizeOnly => return,
        };
        buf.copy_within(at..old_len, at + n);
        buf[at..at + n].copy_from_slice(data);
        self.len += n;
    }

    fn top(&self) -> Option<&Frame> {
        self.depth.checked_sub(1).map(|i| &self.frames[i])
    }

    /// Account for one more item in the innermost open container. Returns `false` if the
    /// session is in error and the item must not be written.
    fn begin_item(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.tag_pending = false;
        if self.depth == 0 {
            return true;
        }
        let frame = &mut self.frames[self.depth - 1];
        let limit = match frame.kind {
            Nest::Array | Nest::IndefiniteArray => MAX_ITEMS_IN_CONTAINER,
            Nest::Map | Nest::IndefiniteMap => 2 * MAX_ITEMS_IN_CONTAINER,
            Nest::BstrWrap => u64::MAX,
            Nest::OpenBytes => {
                self.fail(EncodeError::NotAllowed);
                return false;
            }
        };
        if frame.count >= limit {
            self.fail(EncodeError::ArrayTooLong);
            return false;
        }
        frame.count += 1;
        true
    }

    /// Append just the head of an item. Counts as one item; any content the head announces must
    /// follow through [`Encoder::append_raw`].
    pub fn append_head(&mut self, major: MajorType, argument: u64, min_len: usize) {
        if self.begin_item() {
            self.write(encode_head(major, argument, min_len).as_bytes());
        }
    }

    /// Append bytes verbatim without counting them as an item.
    pub fn append_raw(&mut self, data: &[u8]) {
        if self.error.is_none() {
            self.write(data);
        }
    }

    /// Append one complete, already encoded item.
    pub fn append_encoded(&mut self, item: &[u8]) {
        if self.begin_item() {
            self.write(item);
        }
    }

    /// Append an unsigned integer.
    pub fn append_uint(&mut self, n: u64) {
        self.append_head(MajorType::UnsignedInt, n, 0);
    }

    /// Append a major type 1 integer carrying `n`, i.e. the value `-1 - n`.
    pub fn append_negative_uint(&mut self, n: u64) {
        self.append_head(MajorType::NegativeInt, n, 0);
    }

    /// Append a signed integer.
    pub fn append_int(&mut self, i: i64) {
        if i >= 0 {
            self.append_uint(i as u64);
        } else {
            // Add one before negating so that `i64::MIN` does not overflow.
            self.append_negative_uint((-(i + 1)) as u64);
        }
    }

    /// Append a byte string.
    pub fn append_bytes(&mut self, data: &[u8]) {
        if self.begin_item() {
            self.write(encode_head(MajorType::ByteString, data.len() as u64, 0).as_bytes());
            self.write(data);
        }
    }

    /// Append a text string.
    pub fn append_text(&mut self, text: &str) {
        if self.begin_item() {
            self.write(encode_head(MajorType::TextString, text.len() as u64, 0).as_bytes());
            self.write(text.as_bytes());
        }
    }

    /// Append a simple value. Values 24..=31 are reserved and rejected.
    pub fn append_simple(&mut self, value: u8) {
        if self.error.is_some() {
            return;
        }
        if (AI_ONE_BYTE..32).contains(&value) {
            return self.fail(EncodeError::Unsupported);
        }
        if self.config.only_dcbor_simple
            && !matches!(value, SIMPLE_FALSE | SIMPLE_TRUE | SIMPLE_NULL)
        {
            return self.fail(EncodeError::NotAllowed);
        }
        self.append_head(MajorType::Simple, value as u64, 0);
    }

    pub fn append_bool(&mut self, b: bool) {
        self.append_simple(if b { SIMPLE_TRUE } else { SIMPLE_FALSE });
    }

    pub fn append_null(&mut self) {
        self.append_simple(SIMPLE_NULL);
    }

    pub fn append_undefined(&mut self) {
        self.append_simple(SIMPLE_UNDEFINED);
    }

    fn append_reduced_float(&mut self, value: Reduced) {
        match value {
            Reduced::Half(h) => self.append_head(MajorType::Simple, h as u64, 2),
            Reduced::Single(s) => self.append_head(MajorType::Simple, s as u64, 4),
            Reduced::Double(d) => self.append_head(MajorType::Simple, d, 8),
        }
    }

    fn append_whole_number(&mut self, whole: WholeNumber) {
        match whole {
            WholeNumber::Unsigned(u) => self.append_uint(u),
            WholeNumber::Negative(n) => self.append_negative_uint(n),
        }
    }

    /// Append a double, reduced according to the session's [`EncodeConfig`].
    pub fn append_double(&mut self, d: f64) {
        if self.config.floats_to_ints {
            if let Some(whole) = ieee754::whole_number(d) {
                return self.append_whole_number(whole);
            }
        }
        if d.is_nan() && self.config.canonical_nan {
            return self.append_reduced_float(Reduced::Half(ieee754::HALF_QUIET_NAN));
        }
        if self.config.reduce_floats {
            self.append_reduced_float(ieee754::reduce_double(d));
        } else {
            self.append_double_no_preferred(d);
        }
    }

    /// Append a double in full 8-byte width.
    pub fn append_double_no_preferred(&mut self, d: f64) {
        self.append_reduced_float(Reduced::Double(d.to_bits()));
    }

    /// Append a single precision float, reduced according to the session's [`EncodeConfig`].
    pub fn append_float(&mut self, f: f32) {
        if self.config.floats_to_ints {
            if let Some(whole) = ieee754::whole_number(ieee754::single_to_double(f.to_bits())) {
                return self.append_whole_number(whole);
            }
        }
        if f.is_nan() && self.config.canonical_nan {
            return self.append_reduced_float(Reduced::Half(ieee754::HALF_QUIET_NAN));
        }
        if self.config.reduce_floats {
            self.append_reduced_float(ieee754::reduce_single(f));
        } else {
            self.append_float_no_preferred(f);
        }
    }

    /// Append a single precision float in full 4-byte width.
    pub fn append_float_no_preferred(&mut self, f: f32) {
        self.append_reduced_float(Reduced::Single(f.to_bits()));
    }

    /// Append a tag number; it applies to the next item appended.
    pub fn add_tag_number(&mut self, tag: u64) {
        if self.error.is_some() {
            return;
        }
        if matches!(self.top(), Some(f) if f.kind == Nest::OpenBytes) {
            return self.fail(EncodeError::NotAllowed);
        }
        self.write(encode_head(MajorType::Tag, tag, 0).as_bytes());
        self.tag_pending = true;
    }

    /// Append an arbitrary-precision integer given as sign and big-endian magnitude.
    ///
    /// With preferred big numbers enabled, values that fit in a CBOR argument are emitted as
    /// plain integers. Otherwise tag 2 carries the magnitude and tag 3 carries `magnitude - 1`.
    pub fn append_big_number(&mut self, negative: bool, magnitude: &[u8]) {
        if self.error.is_some() {
            return;
        }
        let magnitude = bignum::strip_leading_zeros(magnitude);
        // Negative zero is zero.
        if !negative || magnitude.is_empty() {
            if self.config.preferred_big_numbers {
                if let Some(n) = bignum::to_u64(magnitude) {
                    return self.append_uint(n);
                }
            }
            self.add_tag_number(tag::POS_BIGNUM);
            return self.append_bytes(magnitude);
        }

        let n_len = bignum::decremented_len(magnitude);
        if self.config.preferred_big_numbers && n_len <= 8 {
            let mut n = [0u8; 8];
            bignum::decrement_into(magnitude, &mut n[8 - n_len..]);
            return self.append_negative_uint(u64::from_be_bytes(n));
        }
        self.add_tag_number(tag::NEG_BIGNUM);
        if self.begin_item() {
            self.write(encode_head(MajorType::ByteString, n_len as u64, 0).as_bytes());
            self.write_with(n_len, |region| bignum::decrement_into(magnitude, region));
        }
    }

    fn append_exp_mantissa(&mut self, tag: u64, mantissa: Mantissa<'_>, exponent: i64) {
        self.add_tag_number(tag);
        self.open_array();
        self.append_int(exponent);
        match mantissa {
            Mantissa::Int(m) => self.append_int(m),
            Mantissa::Big {
                negative,
                magnitude,
            } => self.append_big_number(negative, magnitude),
        }
        self.close_array();
    }

    /// Append `mantissa * 10^exponent` as a tag 4 decimal fraction.
    pub fn append_decimal_fraction(&mut self, mantissa: i64, exponent: i64) {
        self.append_exp_mantissa(tag::DECIMAL_FRACTION, Mantissa::Int(mantissa), exponent);
    }

    /// Append a decimal fraction whose mantissa is a big number.
    pub fn append_decimal_fraction_big(&mut self, negative: bool, magnitude: &[u8], exponent: i64) {
        let mantissa = Mantissa::Big {
            negative,
            magnitude,
        };
        self.append_exp_mantissa(tag::DECIMAL_FRACTION, mantissa, exponent);
    }

    /// Append `mantissa * 2^exponent` as a tag 5 bigfloat.
    pub fn append_bigfloat(&mut self, mantissa: i64, exponent: i64) {
        self.append_exp_mantissa(tag::BIGFLOAT, Mantissa::Int(mantissa), exponent);
    }

    /// Append a bigfloat whose mantissa is a big number.
    pub fn append_bigfloat_big(&mut self, negative: bool, magnitude: &[u8], exponent: i64) {
        let mantissa = Mantissa::Big {
            negative,
            magnitude,
        };
        self.append_exp_mantissa(tag::BIGFLOAT, mantissa, exponent);
    }

    /// Append a generic CBOR value.
    pub fn append_value(&mut self, value: &Value) {
        if self.error.is_some() {
            return;
        }
        match value {
            Value::Integer(i) => {
                let i = i128::from(*i);
                if i >= 0 {
                    self.append_uint(i as u64);
                } else {
                    self.append_negative_uint((-1 - i) as u64);
                }
            }
            Value::Bytes(b) => self.append_bytes(b),
            Value::Float(f) => self.append_double(*f),
            Value::Text(t) => self.append_text(t),
            Value::Bool(b) => self.append_bool(*b),
            Value::Null => self.append_null(),
            Value::Tag(t, inner) => {
                self.add_tag_number(*t);
                self.append_value(inner);
            }
            Value::Array(a) => {
                self.open_array();
                for v in a {
                    self.append_value(v);
                }
                self.close_array();
            }
            Value::Map(m) => {
                self.open_map();
                for (k, v) in m {
                    self.append_value(k);
                    self.append_value(v);
                }
                self.close_map();
            }
            _ => self.fail(EncodeError::Unsupported),
        }
    }

    fn open(&mut self, kind: Nest) {
        if !self.begin_item() {
            return;
        }
        if self.depth >= MAX_NESTING {
            return self.fail(EncodeError::NestingTooDeep);
        }
        match kind {
            Nest::IndefiniteArray | Nest::IndefiniteMap if !self.config.allow_indefinite => {
                return self.fail(EncodeError::NotAllowed);
            }
            Nest::IndefiniteArray => {
                self.write(&[((MajorType::Array as u8) << 5) | AI_INDEFINITE]);
            }
            Nest::IndefiniteMap => {
                self.write(&[((MajorType::Map as u8) << 5) | AI_INDEFINITE]);
            }
            _ => {}
        }
        self.frames[self.depth] = Frame {
            kind,
            start: self.len,
            count: 0,
        };
        self.depth += 1;
    }

    /// Pop the innermost frame if it is of `kind`.
    fn pop(&mut self, kind: Nest) -> Option<Frame> {
        if self.error.is_some() {
            return None;
        }
        if self.tag_pending {
            self.fail(EncodeError::Unsupported);
            return None;
        }
        let frame = match self.top() {
            None => {
                self.fail(EncodeError::TooManyCloses);
                return None;
            }
            Some(f) if f.kind != kind => {
                self.fail(EncodeError::CloseMismatch);
                return None;
            }
            Some(f) => *f,
        };
        self.depth -= 1;
        Some(frame)
    }

    pub fn open_array(&mut self) {
        self.open(Nest::Array);
    }

    pub fn close_array(&mut self) {
        if let Some(frame) = self.pop(Nest::Array) {
            self.insert(frame.start, encode_head(MajorType::Array, frame.count, 0).as_bytes());
        }
    }

    pub fn open_map(&mut self) {
        self.open(Nest::Map);
    }

    /// Close a map. In sorting mode the entries are first put in bytewise lexicographic order of
    /// their encoded labels (RFC 8949 section 4.2.1).
    pub fn close_map(&mut self) {
        let Some(frame) = self.pop(Nest::Map) else {
            return;
        };
        if frame.count % 2 != 0 {
            return self.fail(EncodeError::IncompleteMapPair);
        }
        if self.config.sort_maps {
            self.sort_map(frame.start);
        }
        self.insert(frame.start, encode_head(MajorType::Map, frame.count / 2, 0).as_bytes());
    }

    pub fn open_array_indefinite(&mut self) {
        self.open(Nest::IndefiniteArray);
    }

    pub fn close_array_indefinite(&mut self) {
        if self.pop(Nest::IndefiniteArray).is_some() {
            self.write(&[BREAK]);
        }
    }

    pub fn open_map_indefinite(&mut self) {
        self.open(Nest::IndefiniteMap);
    }

    pub fn close_map_indefinite(&mut self) {
        if let Some(frame) = self.pop(Nest::IndefiniteMap) {
            if frame.count % 2 != 0 {
                return self.fail(EncodeError::IncompleteMapPair);
            }
            self.write(&[BREAK]);
        }
    }

    /// Start a byte string whose content is a nested CBOR encoding.
    pub fn bstr_wrap(&mut self) {
        self.open(Nest::BstrWrap);
    }

    /// Close a byte string opened with [`Encoder::bstr_wrap`], returning the range of the
    /// wrapped bytes, with or without the byte string head.
    pub fn close_bstr_wrap_span(&mut self, include_head: bool) -> Option<Range<usize>> {
        let frame = self.pop(Nest::BstrWrap)?;
        let content_len = (self.len - frame.start) as u64;
        let head = encode_head(MajorType::ByteString, content_len, 0);
        self.insert(frame.start, head.as_bytes());
        if self.error.is_some() {
            return None;
        }
        let start = if include_head {
            frame.start
        } else {
            frame.start + head.len()
        };
        Some(start..self.len)
    }

    /// Close a byte string opened with [`Encoder::bstr_wrap`], returning the wrapped bytes. The
    /// view lives until the next call that changes the session.
    pub fn close_bstr_wrap(&mut self, include_head: bool) -> Option<&[u8]> {
        let span = self.close_bstr_wrap_span(include_head)?;
        self.encoded(span)
    }

    /// Reserve `capacity` bytes for a byte string whose content the caller writes directly.
    ///
    /// Returns the region to write into (`None` in size-calculation mode or after an error).
    /// [`Encoder::close_bytes`] must follow, with the number of bytes actually used.
    pub fn open_bytes(&mut self, capacity: usize) -> Option<&mut [u8]> {
        self.open(Nest::OpenBytes);
        if self.error.is_some() {
            return None;
        }
        self.frames[self.depth - 1].count = capacity as u64;
        // The returned region borrows the session, so any failure is recorded before taking it.
        if let Err(e) = self.room(capacity).map(|_| ()) {
            self.fail(e);
            return None;
        }
        self.room(capacity).ok().flatten()
    }

    /// Finish a byte string started with [`Encoder::open_bytes`].
    pub fn close_bytes(&mut self, used: usize) {
        let Some(frame) = self.pop(Nest::OpenBytes) else {
            return;
        };
        if used as u64 > frame.count {
            return self.fail(EncodeError::BufferTooSmall);
        }
        let end = frame.start + used;
        if let Output::Growable(buf) = &mut self.out {
            buf.truncate(end);
        }
        self.len = end;
        self.insert(frame.start, encode_head(MajorType::ByteString, used as u64, 0).as_bytes());
    }

    fn sort_map(&mut self, start: usize) {
        let end = self.len;
        let result = match &mut self.out {
            Output::Slice(buf) => sort_map_entries(&mut buf[start..end]),
            Output::Growable(buf) => sort_map_entries(&mut buf[start..end]),
            // Sorting does not change the size.
            Output::SizeOnly => Ok(()),
        };
        if let Err(e) = result {
            self.fail(e);
        }
    }

    fn check_complete(&self) -> Result<(), EncodeError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.depth > 0 {
            return Err(EncodeError::ArrayOrMapStillOpen);
        }
        if self.tag_pending {
            return Err(EncodeError::Unsupported);
        }
        Ok(())
    }

    /// Complete the session, returning the encoded bytes or the first error recorded.
    pub fn finish(&self) -> Result<&[u8], EncodeError> {
        self.check_complete()?;
        match &self.out {
            Output::Slice(buf) => Ok(&buf[..self.len]),
            Output::Growable(buf) => Ok(&buf[..]),
            Output::SizeOnly => Err(EncodeError::NoOutputBuffer),
        }
    }

    /// Complete the session, returning the encoded length or the first error recorded.
    pub fn finish_get_size(&self) -> Result<usize, EncodeError> {
        self.check_complete()?;
        Ok(self.len)
    }
}

/// Length of the single well-formed item at the start of `bytes`.
fn item_len(bytes: &[u8]) -> Result<usize, EncodeError> {
    const INDEFINITE: u64 = u64::MAX;
    // Items still expected at each open level.
    let mut remaining = [0u64; MAX_NESTING + 1];
    let mut depth = 0;
    let mut pos = 0;
    remaining[0] = 1;
    loop {
        while remaining[depth] == 0 {
            if depth == 0 {
                return Ok(pos);
            }
            depth -= 1;
        }
        let rest = bytes.get(pos..).ok_or(EncodeError::Unsupported)?;
        if rest.first() == Some(&BREAK) {
            if depth == 0 || remaining[depth] != INDEFINITE {
                return Err(EncodeError::Unsupported);
            }
            pos += 1;
            remaining[depth] = 0;
            continue;
        }
        let head = read_head(rest).map_err(|_| EncodeError::Unsupported)?;
        pos += head.len;
        if remaining[depth] != INDEFINITE {
            remaining[depth] -= 1;
        }
        match head.major {
            MajorType::ByteString | MajorType::TextString => {
                if head.indefinite {
                    return Err(EncodeError::Unsupported);
                }
                pos = usize::try_from(head.argument)
                    .ok()
                    .and_then(|n| pos.checked_add(n))
                    .filter(|end| *end <= bytes.len())
                    .ok_or(EncodeError::Unsupported)?;
            }
            MajorType::Array | MajorType::Map => {
                let count = if head.indefinite {
                    INDEFINITE
                } else if head.major == MajorType::Map {
                    head.argument.checked_mul(2).ok_or(EncodeError::Unsupported)?
                } else {
                    head.argument
                };
                if count > 0 {
                    if depth >= MAX_NESTING {
                        return Err(EncodeError::Unsupported);
                    }
                    depth += 1;
                    remaining[depth] = count;
                }
            }
            MajorType::Tag => {
                // The tagged item is the one that counts.
                if remaining[depth] != INDEFINITE {
                    remaining[depth] += 1;
                }
            }
            MajorType::UnsignedInt | MajorType::NegativeInt | MajorType::Simple => {}
        }
    }
}

/// Locate the map entry at the start of `map`: (label length, entry length).
fn entry_at(map: &[u8]) -> Result<(usize, usize), EncodeError> {
    let label_len = item_len(map)?;
    let value_len = item_len(&map[label_len..])?;
    Ok((label_len, label_len + value_len))
}

/// Bubble sort the encoded entries of a map body in place, comparing encoded labels bytewise.
/// Expected maps are small, so a pass-until-stable sort that needs no scratch space is enough.
fn sort_map_entries(map: &mut [u8]) -> Result<(), EncodeError> {
    if map.is_empty() {
        return Ok(());
    }
    loop {
        let mut swapped = false;
        let mut pos = 0;
        let (mut label_len, mut entry_len) = entry_at(map)?;
        while pos + entry_len < map.len() {
            let next = pos + entry_len;
            let (next_label_len, next_entry_len) = entry_at(&map[next..])?;
            match map[pos..pos + label_len].cmp(&map[next..next + next_label_len]) {
                Ordering::Less => {
                    pos = next;
                    label_len = next_label_len;
                    entry_len = next_entry_len;
                }
                Ordering::Equal => return Err(EncodeError::DuplicateLabel),
                Ordering::Greater => {
                    // Swap the two entries; the larger one moves on to the next comparison.
                    map[pos..next + next_entry_len].rotate_left(entry_len);
                    pos += next_entry_len;
                    swapped = true;
                }
            }
        }
        if !swapped {
            return Ok(());
        }
    }
}
