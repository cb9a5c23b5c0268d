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

//! COSE_Sign1 functionality.

use crate::{
    decode::Decoder,
    encode::{encode_head, Encoder, MajorType},
    header::{decode_headers, DecodedHeaders, Parameter, ParameterDecoders},
    iana,
    util::{
        append_message, consume_tags, encode_header_items, expect_array, expect_bytes,
        expect_bytes_or_nil, TagPolicy,
    },
    CoseError, Result,
};
use alloc::vec::Vec;
use digest::Update;
use log::{trace, warn};

#[cfg(test)]
mod tests;

/// Possible signature contexts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignatureContext {
    CoseSignature,
    CoseSign1,
}

impl SignatureContext {
    /// Return the context string as per RFC 9052 section 4.4.
    fn text(&self) -> &'static str {
        match self {
            SignatureContext::CoseSignature => "Signature",
            SignatureContext::CoseSign1 => "Signature1",
        }
    }

    /// Encoded array head and context string that open a `Sig_structure`.
    fn preamble(&self) -> &'static [u8] {
        match self {
            SignatureContext::CoseSignature => b"\x85\x69Signature",
            SignatureContext::CoseSign1 => b"\x84\x6aSignature1",
        }
    }

    fn for_signer(sign_protected: Option<&[u8]>) -> Self {
        match sign_protected {
            Some(_) => SignatureContext::CoseSignature,
            None => SignatureContext::CoseSign1,
        }
    }
}

/// Feed `data` to `sink` as a CBOR byte string.
pub(crate) fn update_bstr<H: Update>(sink: &mut H, data: &[u8]) {
    sink.update(encode_head(MajorType::ByteString, data.len() as u64, 0).as_bytes());
    sink.update(data);
}

/// Feed the to-be-signed `Sig_structure` into `hasher` without assembling it in memory.
///
/// A `sign_protected` value selects the `"Signature"` context used by COSE_Sign signers;
/// otherwise the `"Signature1"` context applies.
///
/// ```cddl
///  Sig_structure = [
///      context : "Signature" / "Signature1",
///      body_protected : empty_or_serialized_map,
///      ? sign_protected : empty_or_serialized_map,
///      external_aad : bstr,
///      payload : bstr
///  ]
/// ```
pub fn create_tbs_hash<H: Update>(
    hasher: &mut H,
    body_protected: &[u8],
    sign_protected: Option<&[u8]>,
    external_aad: &[u8],
    payload: &[u8],
) {
    hasher.update(SignatureContext::for_signer(sign_protected).preamble());
    update_bstr(hasher, body_protected);
    if let Some(sign_protected) = sign_protected {
        update_bstr(hasher, sign_protected);
    }
    update_bstr(hasher, external_aad);
    update_bstr(hasher, payload);
}

fn encode_tbs(
    enc: &mut Encoder<'_>,
    body_protected: &[u8],
    sign_protected: Option<&[u8]>,
    external_aad: &[u8],
    payload: &[u8],
) {
    enc.open_array();
    enc.append_text(SignatureContext::for_signer(sign_protected).text());
    enc.append_bytes(body_protected);
    if let Some(sign_protected) = sign_protected {
        enc.append_bytes(sign_protected);
    }
    enc.append_bytes(external_aad);
    enc.append_bytes(payload);
    enc.close_array();
}

/// Write the to-be-signed `Sig_structure` into `out`, returning its length.
pub fn create_tbs(
    out: &mut [u8],
    body_protected: &[u8],
    sign_protected: Option<&[u8]>,
    external_aad: &[u8],
    payload: &[u8],
) -> Result<usize> {
    let mut enc = Encoder::new(out);
    encode_tbs(&mut enc, body_protected, sign_protected, external_aad, payload);
    Ok(enc.finish()?.len())
}

/// Build the to-be-signed `Sig_structure` in a new vector.
pub fn create_tbs_vec(
    body_protected: &[u8],
    sign_protected: Option<&[u8]>,
    external_aad: &[u8],
    payload: &[u8],
) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut enc = Encoder::growable(&mut data);
    encode_tbs(&mut enc, body_protected, sign_protected, external_aad, payload);
    enc.finish()?;
    Ok(data)
}

/// The pieces of a signature computation, handed to signing and verification closures.
///
/// Hash-then-sign algorithms stream the `Sig_structure` with [`SignInputs::tbs_hash`];
/// algorithms that need the whole message (EdDSA) use [`SignInputs::tbs_vec`].
#[derive(Clone, Copy, Debug)]
pub struct SignInputs<'a> {
    pub body_protected: &'a [u8],
    pub sign_protected: Option<&'a [u8]>,
    pub external_aad: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> SignInputs<'a> {
    pub fn tbs_hash<H: Update>(&self, hasher: &mut H) {
        create_tbs_hash(
            hasher,
            self.body_protected,
            self.sign_protected,
            self.external_aad,
            self.payload,
        )
    }

    pub fn tbs_vec(&self) -> Result<Vec<u8>> {
        create_tbs_vec(
            self.body_protected,
            self.sign_protected,
            self.external_aad,
            self.payload,
        )
    }
}

/// Description of a COSE_Sign1 message to encode.
///
/// ```cddl
///  COSE_Sign1 = [
///      Headers,
///      payload : bstr / nil,
///      signature : bstr
///  ]
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Sign1Message<'a> {
    pub parameters: &'a [Parameter<'a>],
    pub external_aad: &'a [u8],
    pub payload: &'a [u8],
    /// Leave the payload out of the message, conveying it separately.
    pub detached: bool,
    /// Prefix the message with its CBOR tag.
    pub tagged: bool,
}

/// Builder for [`Sign1Message`] objects.
#[derive(Debug, Default)]
pub struct Sign1MessageBuilder<'a>(Sign1Message<'a>);

impl<'a> Sign1MessageBuilder<'a> {
    builder! {Sign1Message<'a>}
    builder_set! {parameters: &'a [Parameter<'a>]}
    builder_set! {external_aad: &'a [u8]}
    builder_set! {payload: &'a [u8]}
    builder_set! {detached: bool}
    builder_set! {tagged: bool}
}

/// Encode a COSE_Sign1 message into `enc`, using `sign` to produce the signature.
///
/// The session is left open so that the caller can `finish` it, or embed the message in a
/// larger structure.
pub fn encode_sign1<F>(enc: &mut Encoder<'_>, message: &Sign1Message<'_>, sign: F) -> Result<()>
where
    F: FnOnce(&SignInputs<'_>) -> Result<Vec<u8>>,
{
    let (headers, protected) = encode_header_items(*enc.config(), message.parameters)?;
    let inputs = SignInputs {
        body_protected: &headers[protected.clone()],
        sign_protected: None,
        external_aad: message.external_aad,
        payload: message.payload,
    };
    let signature = sign(&inputs)?;
    let tag = message.tagged.then_some(iana::CborTag::CoseSign1);
    append_message(enc, tag, &headers, protected.end, |enc| {
        if message.detached {
            enc.append_null();
        } else {
            enc.append_bytes(message.payload);
        }
        enc.append_bytes(&signature);
    })
}

/// A decoded COSE_Sign1 message, borrowing from the encoded data.
#[derive(Debug)]
pub struct DecodedSign1<'a, 's> {
    pub headers: DecodedHeaders<'a, 's>,
    /// Payload carried in the message; `None` if it was detached.
    pub payload: Option<&'a [u8]>,
    pub signature: &'a [u8],
}

impl<'a, 's> DecodedSign1<'a, 's> {
    /// Verify the signature using the provided `verify` function, feeding it the signature and
    /// the inputs to the `Sig_structure` (in that order).
    ///
    /// `detached_payload` is used when the message carries no payload of its own.
    pub fn verify<F>(
        &self,
        external_aad: &[u8],
        detached_payload: Option<&[u8]>,
        verify: F,
    ) -> Result<()>
    where
        F: FnOnce(&[u8], &SignInputs<'_>) -> Result<()>,
    {
        let payload = self.payload.or(detached_payload).ok_or_else(|| {
            warn!("no payload to verify COSE_Sign1 against");
            CoseError::NoPayload
        })?;
        let inputs = SignInputs {
            body_protected: self.headers.protected,
            sign_protected: None,
            external_aad,
            payload,
        };
        verify(self.signature, &inputs)
    }
}

/// Decode a COSE_Sign1 message, placing its header parameters in `storage`.
pub fn decode_sign1<'a, 's>(
    data: &'a [u8],
    policy: TagPolicy,
    decoders: ParameterDecoders<'_, 'a>,
    storage: &'s mut [Parameter<'a>],
) -> Result<DecodedSign1<'a, 's>> {
    trace!("decoding COSE_Sign1 of {} bytes", data.len());
    let mut dec = Decoder::new(data);
    let array = dec.next()?;
    consume_tags(&array, policy, iana::CborTag::CoseSign1 as u64)?;
    expect_array(&array, 4)?;
    let headers = decode_headers(&mut dec, decoders, storage)?;
    let payload = expect_bytes_or_nil(&dec.next()?)?;
    let signature = expect_bytes(&dec.next()?)?;
    dec.finish()?;
    Ok(DecodedSign1 {
        headers,
        payload,
        signature,
    })
}
