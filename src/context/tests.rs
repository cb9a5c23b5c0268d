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
use crate::{cbor::value::Value, iana::Algorithm, util::expect_err};
use alloc::vec;

#[test]
fn test_kdf_context_encode() {
    let tests = vec![
        (
            // Direct ECDH example from RFC 9052 appendix C.3.1.
            KdfContextBuilder::new()
                .algorithm(Algorithm::A128GCM)
                .supp_pub_info(
                    SuppPubInfoBuilder::new()
                        .key_data_length(128)
                        .protected(&[0xa1, 0x01, 0x38, 0x18])
                        .build(),
                )
                .build(),
            concat!(
                "84",         // array(4)
                "01",         // alg
                "83f6f6f6",   // PartyUInfo
                "83f6f6f6",   // PartyVInfo
                "82",         // SuppPubInfo
                "1880",       // keyDataLength
                "44a1013818", // protected
            ),
        ),
        (
            KdfContextBuilder::new()
                .algorithm(Algorithm::A256GCM)
                .party_u_info(
                    PartyInfoBuilder::new()
                        .identity(b"u")
                        .nonce(Nonce::Bytes(&[0x01, 0x02]))
                        .build(),
                )
                .party_v_info(
                    PartyInfoBuilder::new()
                        .nonce(Nonce::Integer(-1))
                        .other(b"o")
                        .build(),
                )
                .supp_pub_info(
                    SuppPubInfoBuilder::new()
                        .key_data_length(256)
                        .other(b"p")
                        .build(),
                )
                .supp_priv_info(b"s")
                .build(),
            concat!(
                "85",             // array(5)
                "03",             // alg
                "834175420102f6", // PartyUInfo
                "83f620416f",     // PartyVInfo
                "8319010040",     // SuppPubInfo
                "4170",           // SuppPubInfo.other
                "4173",           // SuppPrivInfo
            ),
        ),
        (
            KdfContextBuilder::new()
                .party_u_info(
                    PartyInfoBuilder::new()
                        .nonce(Nonce::Integer(1_000_000))
                        .build(),
                )
                .build(),
            "840083f61a000f4240f683f6f6f6820040",
        ),
    ];
    for (i, (context, want)) in tests.into_iter().enumerate() {
        let mut buf = [0u8; 64];
        let len = create_kdf_context_info(&mut buf, &context).unwrap();
        assert_eq!(hex::encode(&buf[..len]), want, "case {i}");
        assert_eq!(kdf_context_info_size(&context), Ok(len), "case {i}");
        assert_eq!(
            create_kdf_context_info_vec(&context).unwrap(),
            &buf[..len],
            "case {i}"
        );
    }
}

#[test]
fn test_kdf_context_matches_value_model() {
    let context = KdfContextBuilder::new()
        .algorithm(Algorithm::ECDH_ES_HKDF_256)
        .party_u_info(PartyInfoBuilder::new().identity(b"sender").build())
        .party_v_info(PartyInfoBuilder::new().identity(b"recipient").build())
        .supp_pub_info(SuppPubInfo::for_algorithm(Algorithm::A192GCM, &[0xa0]).unwrap())
        .build();
    let data = create_kdf_context_info_vec(&context).unwrap();
    let got: Value = ciborium::de::from_reader(data.as_slice()).unwrap();
    let want = Value::Array(vec![
        Value::Integer((-25).into()),
        Value::Array(vec![
            Value::Bytes(b"sender".to_vec()),
            Value::Null,
            Value::Null,
        ]),
        Value::Array(vec![
            Value::Bytes(b"recipient".to_vec()),
            Value::Null,
            Value::Null,
        ]),
        Value::Array(vec![Value::Integer(192.into()), Value::Bytes(vec![0xa0])]),
    ]);
    assert_eq!(got, want);
}

#[test]
fn test_supp_pub_info_for_algorithm() {
    let tests = vec![
        (Algorithm::A128GCM, 128),
        (Algorithm::AES_CCM_16_64_256, 256),
        (Algorithm::A192KW, 192),
        (Algorithm::HMAC_512_512, 512),
    ];
    for (alg, want) in tests {
        let info = SuppPubInfo::for_algorithm(alg, &[]).unwrap();
        assert_eq!(info.key_data_length, want, "{alg:?}");
        assert_eq!(info.other, None);
    }
    expect_err(
        SuppPubInfo::for_algorithm(Algorithm::ES256, &[]),
        "unsupported algorithm",
    );
}

#[test]
fn test_kdf_context_buffer_too_small() {
    let context = KdfContextBuilder::new()
        .algorithm(Algorithm::A128GCM)
        .supp_priv_info(&[0x55; 32])
        .build();
    let size = kdf_context_info_size(&context).unwrap();
    let mut buf = vec![0u8; size - 1];
    expect_err(create_kdf_context_info(&mut buf, &context), "buffer too small");
    let mut buf = vec![0u8; size];
    assert_eq!(create_kdf_context_info(&mut buf, &context), Ok(size));
}
