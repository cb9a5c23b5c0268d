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
use crate::{decode::DecodeError, encode::EncodeError, iana::Algorithm, util::expect_err};
use alloc::{borrow::ToOwned, vec, vec::Vec};
use sha2::{Digest, Sha256};

/// Sink that records everything fed to it.
#[derive(Default)]
struct Collect(Vec<u8>);

impl Update for Collect {
    fn update(&mut self, data: &[u8]) {
        self.0.extend_from_slice(data);
    }
}

fn fake_sign(inputs: &SignInputs<'_>) -> Result<Vec<u8>> {
    let mut hasher = Sha256::new();
    inputs.tbs_hash(&mut hasher);
    Ok(hasher.finalize().to_vec())
}

fn fake_verify(signature: &[u8], inputs: &SignInputs<'_>) -> Result<()> {
    if fake_sign(inputs)? == signature {
        Ok(())
    } else {
        Err(CoseError::VerificationFailed)
    }
}

#[test]
fn test_sig_structure() {
    let protected = hex::decode("a10126").unwrap();
    let want = "846a5369676e61747572653143a101264045".to_owned() + "68656c6c6f";

    let mut buf = [0u8; 64];
    let len = create_tbs(&mut buf, &protected, None, &[], b"hello").unwrap();
    assert_eq!(hex::encode(&buf[..len]), want);

    let mut sink = Collect::default();
    create_tbs_hash(&mut sink, &protected, None, &[], b"hello");
    assert_eq!(hex::encode(&sink.0), want);
}

#[test]
fn test_sig_structure_with_signer() {
    let body = hex::decode("a10126").unwrap();
    let want = concat!(
        "85",                   // array(5)
        "69",                   // tstr(9)
        "5369676e6174757265",   // "Signature"
        "43a10126",             // body_protected
        "41a0",                 // sign_protected
        "40",                   // external_aad
        "4568656c6c6f",         // payload
    );
    let tbs = create_tbs_vec(&body, Some(&[0xa0]), &[], b"hello").unwrap();
    assert_eq!(hex::encode(&tbs), want);

    let mut sink = Collect::default();
    create_tbs_hash(&mut sink, &body, Some(&[0xa0]), &[], b"hello");
    assert_eq!(hex::encode(&sink.0), want);
}

#[test]
fn test_streaming_matches_materialized() {
    let big_payload = vec![0x5a; 300];
    let long_aad = vec![0x01; 24];
    let tests: [(&[u8], Option<&[u8]>, &[u8], &[u8]); 5] = [
        (&[], None, &[], &[]),
        (&[0xa0], None, &[], b"payload"),
        (&[0xa1, 0x01, 0x26], Some(&[]), b"aad", b"payload"),
        (&[0xa1, 0x01, 0x27], None, &long_aad, &big_payload),
        (&[0xa1, 0x01, 0x27], Some(&[0xa1, 0x04, 0x40]), &long_aad, &big_payload),
    ];
    for (i, (body, signer, aad, payload)) in tests.into_iter().enumerate() {
        let materialized = create_tbs_vec(body, signer, aad, payload).unwrap();

        let mut sink = Collect::default();
        create_tbs_hash(&mut sink, body, signer, aad, payload);
        assert_eq!(sink.0, materialized, "case {i}");

        let mut hasher = Sha256::new();
        create_tbs_hash(&mut hasher, body, signer, aad, payload);
        assert_eq!(
            hasher.finalize()[..],
            Sha256::digest(&materialized)[..],
            "case {i}"
        );

        let mut buf = vec![0u8; materialized.len()];
        let len = create_tbs(&mut buf, body, signer, aad, payload).unwrap();
        assert_eq!(buf[..len], materialized[..], "case {i}");
    }
}

#[test]
fn test_sig_structure_buffer_too_small() {
    let mut buf = [0u8; 20];
    let result = create_tbs(&mut buf, &[0xa0], None, &[], b"this payload is too long");
    assert_eq!(result, Err(CoseError::Encode(EncodeError::BufferTooSmall)));
}

#[test]
fn test_sign1_round_trip() {
    let params = [Parameter::alg(Algorithm::ES256), Parameter::kid(b"11")];
    let message = Sign1MessageBuilder::new()
        .parameters(&params)
        .external_aad(b"aad")
        .payload(b"hello")
        .tagged(true)
        .build();
    let mut data = Vec::new();
    let mut enc = Encoder::growable(&mut data);
    encode_sign1(&mut enc, &message, fake_sign).unwrap();
    enc.finish().unwrap();

    let tbs = create_tbs_vec(&[0xa1, 0x01, 0x26], None, b"aad", b"hello").unwrap();
    let signature = Sha256::digest(&tbs);
    let want = "d28443a10126a1044231314568656c6c6f5820".to_owned() + &hex::encode(signature);
    assert_eq!(hex::encode(&data), want);

    let mut storage = [Parameter::default(); 4];
    let msg = decode_sign1(&data, TagPolicy::Required, &[], &mut storage).unwrap();
    assert_eq!(msg.headers.algorithm_id(), Some(Algorithm::ES256 as i64));
    assert_eq!(msg.headers.key_id(), Some(&b"11"[..]));
    assert_eq!(msg.headers.protected, &[0xa1, 0x01, 0x26]);
    assert_eq!(msg.payload, Some(&b"hello"[..]));
    assert_eq!(msg.signature, &signature[..]);

    assert!(msg.verify(b"aad", None, fake_verify).is_ok());
    assert_eq!(
        msg.verify(b"other aad", None, fake_verify),
        Err(CoseError::VerificationFailed)
    );
}

#[test]
fn test_sign1_whole_message() {
    // Whole-message signers see the same bytes that the hash is fed.
    let params = [Parameter::alg(Algorithm::EdDSA)];
    let message = Sign1MessageBuilder::new()
        .parameters(&params)
        .payload(b"data")
        .build();
    let mut seen = None;
    let mut data = Vec::new();
    let mut enc = Encoder::growable(&mut data);
    encode_sign1(&mut enc, &message, |inputs| {
        let tbs = inputs.tbs_vec()?;
        let mut sink = Collect::default();
        inputs.tbs_hash(&mut sink);
        assert_eq!(sink.0, tbs);
        seen = Some(tbs);
        Ok(vec![0xee; 4])
    })
    .unwrap();
    enc.finish().unwrap();
    assert_eq!(hex::encode(&data), "8443a10127a0446461746144eeeeeeee");
    assert_eq!(
        seen.unwrap(),
        create_tbs_vec(&[0xa1, 0x01, 0x27], None, &[], b"data").unwrap()
    );
}

#[test]
fn test_sign1_detached() {
    let params = [Parameter::alg(Algorithm::ES384)];
    let message = Sign1MessageBuilder::new()
        .parameters(&params)
        .payload(b"sent separately")
        .detached(true)
        .build();
    let mut data = Vec::new();
    let mut enc = Encoder::growable(&mut data);
    encode_sign1(&mut enc, &message, fake_sign).unwrap();
    enc.finish().unwrap();
    assert_eq!(hex::encode(&data[..8]), "8444a1013822a0f6");

    let mut storage = [Parameter::default(); 2];
    let msg = decode_sign1(&data, TagPolicy::Prohibited, &[], &mut storage).unwrap();
    assert_eq!(msg.payload, None);
    assert_eq!(
        msg.verify(&[], None, fake_verify),
        Err(CoseError::NoPayload)
    );
    assert!(msg
        .verify(&[], Some(b"sent separately"), fake_verify)
        .is_ok());
    assert_eq!(
        msg.verify(&[], Some(b"something else"), fake_verify),
        Err(CoseError::VerificationFailed)
    );
}

#[test]
fn test_sign1_signer_failure() {
    let message = Sign1Message::default();
    let mut buf = [0u8; 64];
    let mut enc = Encoder::new(&mut buf);
    let result = encode_sign1(&mut enc, &message, |_| Err(CoseError::CryptoFailure));
    assert_eq!(result, Err(CoseError::CryptoFailure));
    assert!(enc.is_empty());
}

#[test]
fn test_sign1_critical_unprotected() {
    let params = [Parameter::kid(b"11").mark_critical()];
    let message = Sign1MessageBuilder::new().parameters(&params).build();
    let mut data = Vec::new();
    let mut enc = Encoder::growable(&mut data);
    let result = encode_sign1(&mut enc, &message, fake_sign);
    assert_eq!(result, Err(CoseError::CriticalInUnprotected));
}

#[test]
fn test_sign1_size_only() {
    let params = [Parameter::alg(Algorithm::ES256)];
    let message = Sign1MessageBuilder::new()
        .parameters(&params)
        .payload(b"hello")
        .build();
    let mut enc = Encoder::size_only();
    encode_sign1(&mut enc, &message, fake_sign).unwrap();
    let size = enc.finish_get_size().unwrap();

    let mut data = Vec::new();
    let mut enc = Encoder::growable(&mut data);
    encode_sign1(&mut enc, &message, fake_sign).unwrap();
    assert_eq!(enc.finish().unwrap().len(), size);
}

#[test]
fn test_decode_sign1_fail() {
    let tests = vec![
        ("8443a10126a0f640", TagPolicy::Required, "missing tag 18"),
        ("d18443a10126a0f640", TagPolicy::Optional, "unexpected tag 17"),
        ("d28443a10126a0f640", TagPolicy::Prohibited, "unexpected tag 18"),
        ("a0", TagPolicy::Optional, "got map, expected array"),
        ("8343a10126a0f6", TagPolicy::Optional, "array of fixed length"),
        ("8443a10126a0f6f6", TagPolicy::Optional, "got null, expected bstr"),
        ("8443a10126a0014140", TagPolicy::Optional, "got uint, expected bstr / nil"),
        ("8443a10126a0f64000", TagPolicy::Optional, "extra bytes after data item"),
        ("8443a10126a0f6", TagPolicy::Optional, "unexpected end of input"),
        ("84a0a0f640", TagPolicy::Optional, "got map, expected bstr"),
    ];
    for (data, policy, err_msg) in tests {
        let data = hex::decode(data).unwrap();
        let mut storage = [Parameter::default(); 4];
        expect_err(decode_sign1(&data, policy, &[], &mut storage), err_msg);
    }
}

#[test]
fn test_decode_sign1_too_many_parameters() {
    let data = hex::decode("8443a10126a1044131f640").unwrap();
    let mut storage = [Parameter::default(); 1];
    let result = decode_sign1(&data, TagPolicy::Optional, &[], &mut storage).map(|_| ());
    assert_eq!(result, Err(CoseError::TooManyParameters));
    let mut storage = [Parameter::default(); 2];
    assert!(decode_sign1(&data, TagPolicy::Optional, &[], &mut storage).is_ok());
    assert_eq!(
        decode_sign1(&data[..5], TagPolicy::Optional, &[], &mut storage).map(|_| ()),
        Err(CoseError::Decode(DecodeError::HitEnd))
    );
}
