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

//! Properties of COSE algorithms needed to drive crypto adapters.

use crate::{
    iana::{self, EnumI64},
    CoseError, Result,
};

#[cfg(test)]
mod tests;

/// Look up a registered algorithm from its label.
pub fn algorithm(id: i64) -> Result<iana::Algorithm> {
    iana::Algorithm::from_i64(id).ok_or(CoseError::UnregisteredIanaValue)
}

/// Hash algorithm used by a hash-then-sign signature algorithm.
pub fn signature_hash(alg: iana::Algorithm) -> Option<iana::Algorithm> {
    use iana::Algorithm::*;
    match alg {
        ES256 | ES256K | PS256 | RS256 => Some(SHA_256),
        ES384 | PS384 | RS384 => Some(SHA_384),
        ES512 | PS512 | RS512 => Some(SHA_512),
        _ => None,
    }
}

/// Whether the signature algorithm consumes the whole `Sig_structure` rather than a hash of it.
pub fn signs_whole_message(alg: iana::Algorithm) -> bool {
    alg == iana::Algorithm::EdDSA
}

/// Output length in bytes of a hash algorithm.
pub fn hash_len(alg: iana::Algorithm) -> Option<usize> {
    use iana::Algorithm::*;
    match alg {
        SHA_256 | SHA_512_256 => Some(32),
        SHA_384 => Some(48),
        SHA_512 => Some(64),
        _ => None,
    }
}

/// Hash algorithm underlying an HMAC algorithm.
pub fn mac_hash(alg: iana::Algorithm) -> Option<iana::Algorithm> {
    use iana::Algorithm::*;
    match alg {
        HMAC_256_64 | HMAC_256_256 => Some(SHA_256),
        HMAC_384_384 => Some(SHA_384),
        HMAC_512_512 => Some(SHA_512),
        _ => None,
    }
}

/// Length in bytes of the tag an HMAC algorithm produces, after any truncation.
pub fn mac_tag_len(alg: iana::Algorithm) -> Option<usize> {
    use iana::Algorithm::*;
    match alg {
        HMAC_256_64 => Some(8),
        HMAC_256_256 => Some(32),
        HMAC_384_384 => Some(48),
        HMAC_512_512 => Some(64),
        _ => None,
    }
}

/// Length in bytes of the authentication tag appended by an AEAD algorithm.
pub fn aead_tag_len(alg: iana::Algorithm) -> Option<usize> {
    use iana::Algorithm::*;
    match alg {
        A128GCM | A192GCM | A256GCM | ChaCha20Poly1305 => Some(16),
        AES_CCM_16_64_128 | AES_CCM_16_64_256 | AES_CCM_64_64_128 | AES_CCM_64_64_256 => Some(8),
        AES_CCM_16_128_128 | AES_CCM_16_128_256 | AES_CCM_64_128_128 | AES_CCM_64_128_256 => {
            Some(16)
        }
        _ => None,
    }
}

/// Key size in bits for symmetric algorithms, as carried in the KDF context `keyDataLength`.
pub fn key_bits(alg: iana::Algorithm) -> Option<u64> {
    use iana::Algorithm::*;
    match alg {
        A128GCM | AES_CCM_16_64_128 | AES_CCM_64_64_128 | AES_CCM_16_128_128
        | AES_CCM_64_128_128 | A128KW | ECDH_ES_A128KW | ECDH_SS_A128KW => Some(128),
        A192GCM | A192KW | ECDH_ES_A192KW | ECDH_SS_A192KW => Some(192),
        A256GCM | AES_CCM_16_64_256 | AES_CCM_64_64_256 | AES_CCM_16_128_256
        | AES_CCM_64_128_256 | ChaCha20Poly1305 | A256KW | ECDH_ES_A256KW | ECDH_SS_A256KW
        | HMAC_256_64 | HMAC_256_256 => Some(256),
        HMAC_384_384 => Some(384),
        HMAC_512_512 => Some(512),
        _ => None,
    }
}
