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

//! COSE Headers functionality.
//!
//! Header parameters are held as a flat list of [`Parameter`]s, each flagged as protected or
//! not. Encoding splits the list into the two header buckets:
//!
//! ```cddl
//!   Headers = (
//!       protected : empty_or_serialized_map,
//!       unprotected : header_map
//!   )
//! ```
//!
//! Only integer labels are supported. Parameter storage is always supplied by the caller.

use crate::{
    decode::{Decoder, Item, ItemValue},
    encode::{EncodeError, Encoder},
    iana,
    util::{expect_bytes, untagged},
    CoseError, Result,
};
use core::ops::Range;
use log::{trace, warn};


/// Maximum number of labels in a `crit` header parameter.
pub const MAX_CRITICAL_PARAMETERS: usize = 4;

const CRIT: i64 = iana::HeaderParameter::Crit as i64;

/// Header parameter values that are CBOR simple values or floats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SmallValue {
    Float(f64),
    Bool(bool),
    Null,
    Undefined,
}

/// Encoder for a header parameter whose value is not one of the native types.
pub trait ParameterEncoder {
    /// Write the label and value of `param` into the open header map. Exactly one map entry
    /// must be produced.
    fn encode(&self, param: &Parameter<'_>, enc: &mut Encoder<'_>) -> Result<()>;
}

/// Decoder for a header parameter whose value is not one of the native types.
pub trait ParameterDecoder<'a> {
    /// Consume the value of the parameter labelled `label` from `dec`, which is positioned just
    /// before it. The whole value, including any nested items, must be consumed.
    fn decode(&self, label: i64, dec: &mut Decoder<'a>) -> Result<ParameterValue<'a>>;
}

/// [`ParameterDecoder`] that keeps the encoded value as [`ParameterValue::Encoded`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RawParameterDecoder;

impl<'a> ParameterDecoder<'a> for RawParameterDecoder {
    fn decode(&self, _label: i64, dec: &mut Decoder<'a>) -> Result<ParameterValue<'a>> {
        let (_, raw) = dec.next_raw()?;
        Ok(ParameterValue::Encoded(raw))
    }
}

/// Value of a header parameter.
#[derive(Clone, Copy)]
pub enum ParameterValue<'a> {
    Int(i64),
    Text(&'a str),
    Bytes(&'a [u8]),
    Small(SmallValue),
    /// Already encoded CBOR item.
    Encoded(&'a [u8]),
    /// Value written by a caller-supplied encoder.
    Callback(&'a dyn ParameterEncoder),
}

impl<'a> core::fmt::Debug for ParameterValue<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParameterValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            ParameterValue::Text(t) => f.debug_tuple("Text").field(t).finish(),
            ParameterValue::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            ParameterValue::Small(s) => f.debug_tuple("Small").field(s).finish(),
            ParameterValue::Encoded(b) => f.debug_tuple("Encoded").field(b).finish(),
            ParameterValue::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Callback values never compare equal.
impl<'a> PartialEq for ParameterValue<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParameterValue::Int(a), ParameterValue::Int(b)) => a == b,
            (ParameterValue::Text(a), ParameterValue::Text(b)) => a == b,
            (ParameterValue::Bytes(a), ParameterValue::Bytes(b)) => a == b,
            (ParameterValue::Small(a), ParameterValue::Small(b)) => a == b,
            (ParameterValue::Encoded(a), ParameterValue::Encoded(b)) => a == b,
            _ => false,
        }
    }
}

/// A single header parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Parameter<'a> {
    pub label: i64,
    /// Whether the parameter is in the protected bucket.
    pub protected: bool,
    /// Whether the parameter is listed in `crit`.
    pub critical: bool,
    pub value: ParameterValue<'a>,
}

impl<'a> Default for Parameter<'a> {
    fn default() -> Self {
        Self::new(iana::HeaderParameter::Reserved as i64, ParameterValue::Int(0))
    }
}

impl<'a> Parameter<'a> {
    /// Unprotected, non-critical parameter.
    pub fn new(label: i64, value: ParameterValue<'a>) -> Self {
        Self {
            label,
            protected: false,
            critical: false,
            value,
        }
    }

    /// Move the parameter to the protected bucket.
    pub fn protect(mut self) -> Self {
        self.protected = true;
        self
    }

    /// Move the parameter to the unprotected bucket.
    pub fn unprotect(mut self) -> Self {
        self.protected = false;
        self
    }

    /// Flag the parameter as one a recipient must understand.
    pub fn mark_critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Protected algorithm identifier.
    pub fn alg(alg: iana::Algorithm) -> Self {
        Self::new(iana::HeaderParameter::Alg as i64, ParameterValue::Int(alg as i64)).protect()
    }

    /// Unprotected key identifier.
    pub fn kid(kid: &'a [u8]) -> Self {
        Self::new(iana::HeaderParameter::Kid as i64, ParameterValue::Bytes(kid))
    }

    /// Unprotected full IV.
    pub fn iv(iv: &'a [u8]) -> Self {
        Self::new(iana::HeaderParameter::Iv as i64, ParameterValue::Bytes(iv))
    }

    /// Unprotected partial IV.
    pub fn partial_iv(piv: &'a [u8]) -> Self {
        Self::new(iana::HeaderParameter::PartialIv as i64, ParameterValue::Bytes(piv))
    }

    /// Protected CoAP content format.
    pub fn content_type(format: u16) -> Self {
        let label = iana::HeaderParameter::ContentType as i64;
        Self::new(label, ParameterValue::Int(format as i64)).protect()
    }

    /// Protected media type content type.
    pub fn content_type_text(media_type: &'a str) -> Self {
        let label = iana::HeaderParameter::ContentType as i64;
        Self::new(label, ParameterValue::Text(media_type)).protect()
    }
}

/// Find a parameter by label.
pub fn find_parameter<'p, 'a>(params: &'p [Parameter<'a>], label: i64) -> Option<&'p Parameter<'a>> {
    params.iter().find(|p| p.label == label)
}

/// Algorithm identifier, which is only taken from the protected bucket.
pub fn algorithm_id(params: &[Parameter<'_>]) -> Option<i64> {
    match find_parameter(params, iana::HeaderParameter::Alg as i64) {
        Some(Parameter {
            protected: true,
            value: ParameterValue::Int(alg),
            ..
        }) => Some(*alg),
        _ => None,
    }
}

/// Key identifier, from either bucket.
pub fn key_id<'a>(params: &[Parameter<'a>]) -> Option<&'a [u8]> {
    match find_parameter(params, iana::HeaderParameter::Kid as i64)?.value {
        ParameterValue::Bytes(kid) => Some(kid),
        _ => None,
    }
}

fn encode_parameter(enc: &mut Encoder<'_>, param: &Parameter<'_>) -> Result<()> {
    if let ParameterValue::Callback(cb) = param.value {
        cb.encode(param, enc)?;
    } else {
        enc.append_int(param.label);
        match param.value {
            ParameterValue::Int(i) => enc.append_int(i),
            ParameterValue::Text(t) => enc.append_text(t),
            ParameterValue::Bytes(b) => enc.append_bytes(b),
            ParameterValue::Small(SmallValue::Float(f)) => enc.append_double(f),
            ParameterValue::Small(SmallValue::Bool(b)) => enc.append_bool(b),
            ParameterValue::Small(SmallValue::Null) => enc.append_null(),
            ParameterValue::Small(SmallValue::Undefined) => enc.append_undefined(),
            ParameterValue::Encoded(e) => enc.append_encoded(e),
            ParameterValue::Callback(_) => {}
        }
    }
    match enc.error() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Encode the protected and unprotected header buckets for `params`.
///
/// Returns the range of the encoded protected header map inside the encoder's output, which the
/// structure builders need; view it with [`Encoder::encoded`].
pub fn encode_headers(enc: &mut Encoder<'_>, params: &[Parameter<'_>]) -> Result<Range<usize>> {
    if let Some(p) = params.iter().find(|p| p.critical && !p.protected) {
        warn!("critical header parameter {} is unprotected", p.label);
        return Err(CoseError::CriticalInUnprotected);
    }
    let critical_count = params.iter().filter(|p| p.critical).count();
    if critical_count > MAX_CRITICAL_PARAMETERS {
        return Err(CoseError::TooManyCriticalParameters);
    }
    // The crit entry is generated from the critical flags, so a caller-supplied one would be a
    // second label 2 in the protected map.
    if critical_count > 0 && params.iter().any(|p| p.label == CRIT) {
        warn!("crit parameter supplied alongside critical flags");
        return Err(CoseError::DuplicateParameter);
    }

    enc.bstr_wrap();
    enc.open_map();
    for param in params.iter().filter(|p| p.protected) {
        encode_parameter(enc, param)?;
    }
    if critical_count > 0 {
        enc.append_int(CRIT);
        enc.open_array();
        for param in params.iter().filter(|p| p.critical) {
            enc.append_int(param.label);
        }
        enc.close_array();
    }
    enc.close_map();
    let protected = enc.close_bstr_wrap_span(false);

    enc.open_map();
    for param in params.iter().filter(|p| !p.protected) {
        encode_parameter(enc, param)?;
    }
    enc.close_map();

    if let Some(e) = enc.error() {
        return Err(e.into());
    }
    protected.ok_or(CoseError::Encode(EncodeError::CloseMismatch))
}

/// Header buckets decoded into caller storage.
#[derive(Debug)]
pub struct DecodedHeaders<'a, 's> {
    /// Contents of the protected header byte string.
    pub protected: &'a [u8],
    /// Parameters from both buckets, protected first.
    pub parameters: &'s [Parameter<'a>],
}

impl<'a, 's> DecodedHeaders<'a, 's> {
    pub fn find(&self, label: i64) -> Option<&'s Parameter<'a>> {
        find_parameter(self.parameters, label)
    }

    pub fn algorithm_id(&self) -> Option<i64> {
        algorithm_id(self.parameters)
    }

    pub fn key_id(&self) -> Option<&'a [u8]> {
        key_id(self.parameters)
    }
}

/// Decoder lookup table, keyed by parameter label.
pub type ParameterDecoders<'t, 'a> = &'t [(i64, &'t dyn ParameterDecoder<'a>)];

/// Labels from the `crit` parameter.
#[derive(Default)]
struct CritList {
    labels: [i64; MAX_CRITICAL_PARAMETERS],
    len: usize,
    present: bool,
    /// A label that no parameter can ever match was listed.
    has_unsupported: bool,
}

impl CritList {
    fn labels(&self) -> &[i64] {
        &self.labels[..self.len]
    }
}

/// Map a natively typed item to a parameter value, or `None` if it is not a native type.
fn native_value<'a>(item: &Item<'a>) -> Option<ParameterValue<'a>> {
    if !item.tags().is_empty() {
        return None;
    }
    Some(match item.value {
        ItemValue::UnsignedInt(_) | ItemValue::NegativeInt(_) => {
            ParameterValue::Int(item.as_i64().ok()?)
        }
        ItemValue::Text(t) => ParameterValue::Text(t),
        ItemValue::Bytes(b) => ParameterValue::Bytes(b),
        ItemValue::Float(f) => ParameterValue::Small(SmallValue::Float(f)),
        ItemValue::Bool(b) => ParameterValue::Small(SmallValue::Bool(b)),
        ItemValue::Null => ParameterValue::Small(SmallValue::Null),
        ItemValue::Undefined => ParameterValue::Small(SmallValue::Undefined),
        ItemValue::Array(_) | ItemValue::Map(_) | ItemValue::Simple(_) => return None,
    })
}

fn decode_crit(dec: &mut Decoder<'_>, crit: &mut CritList) -> Result<()> {
    if crit.present {
        return Err(CoseError::DuplicateParameter);
    }
    crit.present = true;
    let array = dec.next()?;
    if !matches!(array.value, ItemValue::Array(_)) || !array.tags().is_empty() {
        return Err(CoseError::BadCritParameter);
    }
    while dec.peek_nesting_level() > array.nesting_level {
        let label = dec.next()?;
        match label.value {
            ItemValue::UnsignedInt(_) | ItemValue::NegativeInt(_) => {
                let label = label.as_i64()?;
                if crit.labels().contains(&label) {
                    return Err(CoseError::BadCritParameter);
                }
                if crit.len == MAX_CRITICAL_PARAMETERS {
                    return Err(CoseError::TooManyCriticalParameters);
                }
                crit.labels[crit.len] = label;
                crit.len += 1;
            }
            ItemValue::Text(_) => crit.has_unsupported = true,
            _ => return Err(CoseError::BadCritParameter),
        }
    }
    if crit.len == 0 && !crit.has_unsupported {
        return Err(CoseError::BadCritParameter);
    }
    Ok(())
}

/// Decode one header map into `storage[*count..]`.
fn decode_bucket<'a>(
    dec: &mut Decoder<'a>,
    protected: bool,
    decoders: ParameterDecoders<'_, 'a>,
    storage: &mut [Parameter<'a>],
    count: &mut usize,
    crit: &mut CritList,
) -> Result<()> {
    let map = dec.next()?;
    untagged(&map, "map")?;
    if !matches!(map.value, ItemValue::Map(_)) {
        return Err(CoseError::UnexpectedItem(map.value.type_name(), "map"));
    }
    while dec.peek_nesting_level() > map.nesting_level {
        let label_item = dec.next()?;
        let label = match label_item.value {
            ItemValue::UnsignedInt(_) | ItemValue::NegativeInt(_) => label_item.as_i64()?,
            ItemValue::Text(_) => {
                // Text labels are not supported, so nothing can refer to this parameter.
                let value = dec.next()?;
                dec.skip(&value)?;
                continue;
            }
            v => return Err(CoseError::UnexpectedItem(v.type_name(), "int / tstr")),
        };

        if label == CRIT {
            if !protected {
                warn!("crit parameter in unprotected bucket");
                return Err(CoseError::BadCritParameter);
            }
            decode_crit(dec, crit)?;
            continue;
        }

        let value = match decoders.iter().find(|(l, _)| *l == label) {
            Some((_, decoder)) => decoder.decode(label, dec)?,
            None => {
                let item = dec.next()?;
                match native_value(&item) {
                    Some(v) => v,
                    None => {
                        trace!("skipping header parameter {label} of non-native type");
                        dec.skip(&item)?;
                        continue;
                    }
                }
            }
        };

        if find_parameter(&storage[..*count], label).is_some() {
            warn!("duplicate header parameter {label}");
            return Err(CoseError::DuplicateParameter);
        }
        let slot = storage.get_mut(*count).ok_or(CoseError::TooManyParameters)?;
        *slot = Parameter {
            label,
            protected,
            critical: false,
            value,
        };
        *count += 1;
    }
    Ok(())
}

/// Decode the protected header byte string and the unprotected header map at the decoder's
/// position, filling `storage`.
///
/// Parameters with a decoder in `decoders` are handed to it; others are decoded if they are of
/// a native type and skipped otherwise. Every label listed in `crit` must end up decoded.
pub fn decode_headers<'a, 's>(
    dec: &mut Decoder<'a>,
    decoders: ParameterDecoders<'_, 'a>,
    storage: &'s mut [Parameter<'a>],
) -> Result<DecodedHeaders<'a, 's>> {
    trace!("decoding header buckets");
    let mut count = 0;
    let mut crit = CritList::default();

    let item = dec.next()?;
    let protected = expect_bytes(&item)?;
    // A zero-length protected bucket stands for an empty map.
    if !protected.is_empty() {
        let mut inner = Decoder::new(protected);
        decode_bucket(&mut inner, true, decoders, storage, &mut count, &mut crit)?;
        inner.finish()?;
    }

    decode_bucket(dec, false, decoders, storage, &mut count, &mut crit)?;

    if crit.has_unsupported {
        warn!("crit lists a text label");
        return Err(CoseError::UnknownCriticalParameter);
    }
    for label in crit.labels() {
        match storage[..count].iter_mut().find(|p| p.label == *label) {
            Some(param) => param.critical = true,
            None => {
                warn!("critical header parameter {label} not understood");
                return Err(CoseError::UnknownCriticalParameter);
            }
        }
    }

    Ok(DecodedHeaders {
        protected,
        parameters: &storage[..count],
    })
}
