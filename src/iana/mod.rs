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

//! Enumerations for IANA-managed values.
//!
//! Sources:
//! - <https://www.iana.org/assignments/cose/cose.xhtml>
//! - <https://www.iana.org/assignments/cbor-tags/cbor-tags.xhtml>


/// Trait indicating an enum that can be constructed from `i64` values.
pub trait EnumI64: Sized + Eq {
    fn from_i64(i: i64) -> Option<Self>;
    fn to_i64(&self) -> i64;
}

/// Trait indicating an enum with a range of private values.
pub trait WithPrivateRange {
    fn is_private(i: i64) -> bool;
}

/// Generate an enum with associated values, plus a `from_i64` method.
macro_rules! iana_registry {
    ( $(#[$attr:meta])* $enum_name:ident {$($(#[$fattr:meta])* $name:ident: $val:expr,)* } ) => {
        #[allow(non_camel_case_types)]
        $(#[$attr])*
        #[non_exhaustive]
        #[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
        pub enum $enum_name {
            $($(#[$fattr])* $name = $val,)*
        }
        impl EnumI64 for $enum_name {
            fn from_i64(i: i64) -> Option<Self> {
                match i {
                    $(x if x == Self::$name as i64 => Some(Self::$name),)*
                    _ => None,
                }
            }
            #[inline]
            fn to_i64(&self) -> i64 {
                *self as i64
            }
        }
    }
}

iana_registry! {
    /// COSE header parameters (RFC 9052 section 3.1).
    HeaderParameter {
        Reserved: 0,
        /// Algorithm; int / tstr.
        Alg: 1,
        /// Labels that must be understood; [+ label].
        Crit: 2,
        /// Payload content type; tstr / uint.
        ContentType: 3,
        /// Key identifier; bstr.
        Kid: 4,
        /// Full initialization vector; bstr.
        Iv: 5,
        /// Partial initialization vector; bstr.
        PartialIv: 6,
        /// Counter signature (RFC 8152 form).
        CounterSignature: 7,
        /// Abbreviated counter signature; bstr.
        CounterSignature0: 9,
        /// Context for the key identifier; bstr.
        KidContext: 10,
    }
}

/// Integer values for COSE header parameters below this value are reserved for private use.
pub const HEADER_PARAMETER_PRIVATE_USE_MAX: i64 = -65536;

impl WithPrivateRange for HeaderParameter {
    fn is_private(i: i64) -> bool {
        i < HEADER_PARAMETER_PRIVATE_USE_MAX
    }
}

iana_registry! {
    /// COSE header algorithm parameters (RFC 9053 and RFC 9180 for HPKE).
    HeaderAlgorithmParameter {
        PartyVOther: -26,
        PartyVNonce: -25,
        PartyVIdentity: -24,
        PartyUOther: -23,
        PartyUNonce: -22,
        PartyUIdentity: -21,
        /// Random salt for key derivation; bstr.
        Salt: -20,
        /// Info supplied by the HPKE sender; bstr.
        HpkeSenderInfo: -4,
        StaticKeyId: -3,
        StaticKey: -2,
        /// Ephemeral public key of the sender; COSE_Key.
        EphemeralKey: -1,
    }
}

iana_registry! {
    /// COSE algorithms (RFC 9053).
    Algorithm {
        RS512: -259,
        RS384: -258,
        RS256: -257,
        ES256K: -47,
        SHA_512: -44,
        SHA_384: -43,
        PS512: -39,
        PS384: -38,
        PS256: -37,
        ES512: -36,
        ES384: -35,
        ECDH_SS_A256KW: -34,
        ECDH_SS_A192KW: -33,
        ECDH_SS_A128KW: -32,
        ECDH_ES_A256KW: -31,
        ECDH_ES_A192KW: -30,
        ECDH_ES_A128KW: -29,
        ECDH_SS_HKDF_512: -28,
        ECDH_SS_HKDF_256: -27,
        ECDH_ES_HKDF_512: -26,
        ECDH_ES_HKDF_256: -25,
        SHA_512_256: -17,
        SHA_256: -16,
        Direct_HKDF_SHA_512: -11,
        Direct_HKDF_SHA_256: -10,
        /// EdDSA; signs the whole message, not a hash of it.
        EdDSA: -8,
        /// ECDSA w/ SHA-256.
        ES256: -7,
        /// Direct use of the content key.
        Direct: -6,
        A256KW: -5,
        A192KW: -4,
        A128KW: -3,
        Reserved: 0,
        /// AES-GCM, 128-bit key, 128-bit tag.
        A128GCM: 1,
        A192GCM: 2,
        A256GCM: 3,
        /// HMAC w/ SHA-256 truncated to 64 bits.
        HMAC_256_64: 4,
        HMAC_256_256: 5,
        HMAC_384_384: 6,
        HMAC_512_512: 7,
        AES_CCM_16_64_128: 10,
        AES_CCM_16_64_256: 11,
        AES_CCM_64_64_128: 12,
        AES_CCM_64_64_256: 13,
        ChaCha20Poly1305: 24,
        AES_CCM_16_128_128: 30,
        AES_CCM_16_128_256: 31,
        AES_CCM_64_128_128: 32,
        AES_CCM_64_128_256: 33,
    }
}

/// Integer values for COSE algorithms below this value are reserved for private use.
pub const ALGORITHM_PRIVATE_USE_MAX: i64 = -65536;

impl WithPrivateRange for Algorithm {
    fn is_private(i: i64) -> bool {
        i < ALGORITHM_PRIVATE_USE_MAX
    }
}

iana_registry! {
    /// CBOR tag values for COSE structures.
    CborTag {
        CoseEncrypt0: 16,
        CoseMac0: 17,
        CoseSign1: 18,
        CoseEncrypt: 96,
        CoseMac: 97,
        CoseSign: 98,
    }
}
