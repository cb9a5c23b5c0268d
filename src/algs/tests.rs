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

use super::*;
use crate::iana::Algorithm;
use alloc::vec;

#[test]
fn test_algorithm_lookup() {
    assert_eq!(algorithm(-7), Ok(Algorithm::ES256));
    assert_eq!(algorithm(5), Ok(Algorithm::HMAC_256_256));
    assert_eq!(algorithm(-70_000), Err(CoseError::UnregisteredIanaValue));
}

#[test]
fn test_signature_hash() {
    let tests = vec![
        (Algorithm::ES256, Some(Algorithm::SHA_256), Some(32)),
        (Algorithm::PS384, Some(Algorithm::SHA_384), Some(48)),
        (Algorithm::RS512, Some(Algorithm::SHA_512), Some(64)),
        (Algorithm::EdDSA, None, None),
    ];
    for (i, (alg, hash, len)) in tests.into_iter().enumerate() {
        assert_eq!(signature_hash(alg), hash, "case {i}");
        assert_eq!(hash.and_then(hash_len), len, "case {i}");
    }
    assert!(signs_whole_message(Algorithm::EdDSA));
    assert!(!signs_whole_message(Algorithm::ES256));
}

#[test]
fn test_mac_properties() {
    assert_eq!(mac_tag_len(Algorithm::HMAC_256_64), Some(8));
    assert_eq!(mac_tag_len(Algorithm::HMAC_384_384), Some(48));
    assert_eq!(mac_hash(Algorithm::HMAC_256_64), Some(Algorithm::SHA_256));
    assert_eq!(mac_tag_len(Algorithm::A128GCM), None);
}

#[test]
fn test_key_bits() {
    let tests = vec![
        (Algorithm::A128GCM, Some(128)),
        (Algorithm::A192KW, Some(192)),
        (Algorithm::ChaCha20Poly1305, Some(256)),
        (Algorithm::ECDH_ES_A128KW, Some(128)),
        (Algorithm::HMAC_512_512, Some(512)),
        (Algorithm::ES256, None),
    ];
    for (i, (alg, want)) in tests.into_iter().enumerate() {
        assert_eq!(key_bits(alg), want, "case {i}");
    }
    assert_eq!(aead_tag_len(Algorithm::AES_CCM_16_64_128), Some(8));
    assert_eq!(aead_tag_len(Algorithm::A256GCM), Some(16));
}
