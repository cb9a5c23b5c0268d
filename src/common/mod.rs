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

//! Common types.

use crate::{decode::DecodeError, encode::EncodeError};


/// Error type for failures in encoding or decoding COSE types.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum CoseError {
    /// CBOR encoding failure.
    Encode(EncodeError),
    /// CBOR decoding failure.
    Decode(DecodeError),
    /// Critical header parameter placed in the unprotected bucket.
    CriticalInUnprotected,
    /// Same header parameter label appears more than once.
    DuplicateParameter,
    /// Critical header parameter that was not understood.
    UnknownCriticalParameter,
    /// Caller-supplied parameter storage is full.
    TooManyParameters,
    /// `crit` header parameter that is empty, unprotected or holds non-integer labels.
    BadCritParameter,
    /// More critical parameters than the `crit` array can list.
    TooManyCriticalParameters,
    /// Unexpected CBOR item encountered (got, want).
    UnexpectedItem(&'static str, &'static str),
    /// Unrecognized value in IANA-controlled range.
    UnregisteredIanaValue,
    /// Algorithm not supported for the requested operation.
    UnsupportedAlgorithm,
    /// Key not usable with the requested algorithm.
    WrongKeyType,
    /// Signature, MAC or AEAD check failed.
    VerificationFailed,
    /// Crypto layer signalled possible corruption or fault injection.
    TamperingDetected,
    /// Any other crypto layer failure.
    CryptoFailure,
    /// Crypto layer ran out of memory.
    InsufficientMemory,
    /// Message carries a tag other than the one required (got).
    UnexpectedTag(u64),
    /// Message lacks the required tag (want).
    MissingTag(u64),
    /// Detached payload needed but not supplied.
    NoPayload,
}

/// Crate-specific Result type
pub type Result<T, E = CoseError> = core::result::Result<T, E>;

impl core::convert::From<EncodeError> for CoseError {
    fn from(e: EncodeError) -> Self {
        CoseError::Encode(e)
    }
}

impl core::convert::From<DecodeError> for CoseError {
    fn from(e: DecodeError) -> Self {
        CoseError::Decode(e)
    }
}

impl core::fmt::Debug for CoseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.fmt_msg(f)
    }
}

impl core::fmt::Display for CoseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.fmt_msg(f)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CoseError {}

impl CoseError {
    fn fmt_msg(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CoseError::Encode(e) => write!(f, "encode CBOR failure: {e}"),
            CoseError::Decode(e) => write!(f, "decode CBOR failure: {e}"),
            CoseError::CriticalInUnprotected => {
                write!(f, "critical parameter in unprotected header")
            }
            CoseError::DuplicateParameter => write!(f, "duplicate header parameter"),
            CoseError::UnknownCriticalParameter => {
                write!(f, "critical header parameter not understood")
            }
            CoseError::TooManyParameters => write!(f, "too many header parameters"),
            CoseError::BadCritParameter => write!(f, "malformed crit header parameter"),
            CoseError::TooManyCriticalParameters => write!(f, "too many critical parameters"),
            CoseError::UnexpectedItem(got, want) => write!(f, "got {got}, expected {want}"),
            CoseError::UnregisteredIanaValue => write!(f, "expected recognized IANA value"),
            CoseError::UnsupportedAlgorithm => write!(f, "unsupported algorithm"),
            CoseError::WrongKeyType => write!(f, "wrong key type for algorithm"),
            CoseError::VerificationFailed => write!(f, "verification failed"),
            CoseError::TamperingDetected => write!(f, "tampering detected"),
            CoseError::CryptoFailure => write!(f, "crypto failure"),
            CoseError::InsufficientMemory => write!(f, "insufficient memory"),
            CoseError::UnexpectedTag(got) => write!(f, "unexpected tag {got}"),
            CoseError::MissingTag(want) => write!(f, "missing tag {want}"),
            CoseError::NoPayload => write!(f, "no payload"),
        }
    }
}
