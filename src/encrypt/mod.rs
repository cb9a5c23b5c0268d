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

//! COSE_Encrypt0 functionality.

use crate::{
    decode::Decoder,
    encode::Encoder,
    header::{decode_headers, DecodedHeaders, Parameter, ParameterDecoders},
    iana,
    util::{
        append_message, consume_tags, encode_header_items, expect_array, expect_bytes_or_nil,
        TagPolicy,
    },
    CoseError, Result,
};
use alloc::vec::Vec;
use log::{trace, warn};


/// Possible encryption contexts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EncryptionContext {
    CoseEncrypt,
    CoseEncrypt0,
    EncRecipient,
    MacRecipient,
    RecRecipient,
}

impl EncryptionContext {
    /// Return the context string as per RFC 9052 section 5.3.
    fn text(&self) -> &'static str {
        match self {
            EncryptionContext::CoseEncrypt => "Encrypt",
            EncryptionContext::CoseEncrypt0 => "Encrypt0",
            EncryptionContext::EncRecipient => "Enc_Recipient",
            EncryptionContext::MacRecipient => "Mac_Recipient",
            EncryptionContext::RecRecipient => "Rec_Recipient",
        }
    }
}

fn encode_enc_structure(
    enc: &mut Encoder<'_>,
    context: EncryptionContext,
    protected: &[u8],
    external_aad: &[u8],
) {
    enc.open_array();
    enc.append_text(context.text());
    enc.append_bytes(protected);
    enc.append_bytes(external_aad);
    enc.close_array();
}

/// Write the `Enc_structure` used as AEAD additional data into `out`, returning its length.
///
/// ```cddl
///  Enc_structure = [
///      context : "Encrypt" / "Encrypt0" / "Enc_Recipient" /
///          "Mac_Recipient" / "Rec_Recipient",
///      protected : empty_or_serialized_map,
///      external_aad : bstr
///  ]
/// ```
pub fn create_enc_structure(
    out: &mut [u8],
    context: EncryptionContext,
    protected: &[u8],
    external_aad: &[u8],
) -> Result<usize> {
    let mut enc = Encoder::new(out);
    encode_enc_structure(&mut enc, context, protected, external_aad);
    Ok(enc.finish()?.len())
}

/// Build the `Enc_structure` in a new vector.
pub fn create_enc_structure_vec(
    context: EncryptionContext,
    protected: &[u8],
    external_aad: &[u8],
) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut enc = Encoder::growable(&mut data);
    encode_enc_structure(&mut enc, context, protected, external_aad);
    enc.finish()?;
    Ok(data)
}

/// Description of a COSE_Encrypt0 message to encode.
///
/// ```cddl
///  COSE_Encrypt0 = [
///      Headers,
///      ciphertext : bstr / nil,
///  ]
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Encrypt0Message<'a> {
    pub parameters: &'a [Parameter<'a>],
    pub external_aad: &'a [u8],
    pub plaintext: &'a [u8],
    /// Leave the ciphertext out of the message, conveying it separately.
    pub detached: bool,
    pub tagged: bool,
}

/// Builder for [`Encrypt0Message`] objects.
#[derive(Debug, Default)]
pub struct Encrypt0MessageBuilder<'a>(Encrypt0Message<'a>);

impl<'a> Encrypt0MessageBuilder<'a> {
    builder! {Encrypt0Message<'a>}
    builder_set! {parameters: &'a [Parameter<'a>]}
    builder_set! {external_aad: &'a [u8]}
    builder_set! {plaintext: &'a [u8]}
    builder_set! {detached: bool}
    builder_set! {tagged: bool}
}

/// Encode a COSE_Encrypt0 message into `enc`, using `cipher` to encrypt the plaintext.
///
/// `cipher` is fed the plaintext and the `Enc_structure` to use as additional data (in that
/// order), and returns the ciphertext. A detached ciphertext is returned to the caller instead
/// of being placed in the message.
pub fn encode_encrypt0<F>(
    enc: &mut Encoder<'_>,
    message: &Encrypt0Message<'_>,
    cipher: F,
) -> Result<Option<Vec<u8>>>
where
    F: FnOnce(&[u8], &[u8]) -> Result<Vec<u8>>,
{
    let (headers, protected) = encode_header_items(*enc.config(), message.parameters)?;
    let aad = create_enc_structure_vec(
        EncryptionContext::CoseEncrypt0,
        &headers[protected.clone()],
        message.external_aad,
    )?;
    let ciphertext = cipher(message.plaintext, &aad)?;
    let tag = message.tagged.then_some(iana::CborTag::CoseEncrypt0);
    append_message(enc, tag, &headers, protected.end, |enc| {
        if message.detached {
            enc.append_null();
        } else {
            enc.append_bytes(&ciphertext);
        }
    })?;
    Ok(message.detached.then_some(ciphertext))
}

/// A decoded COSE_Encrypt0 message, borrowing from the encoded data.
#[derive(Debug)]
pub struct DecodedEncrypt0<'a, 's> {
    pub headers: DecodedHeaders<'a, 's>,
    /// Ciphertext carried in the message; `None` if it was detached.
    pub ciphertext: Option<&'a [u8]>,
}

impl<'a, 's> DecodedEncrypt0<'a, 's> {
    /// Decrypt the ciphertext using `cipher`, feeding it the ciphertext and the `Enc_structure`
    /// to use as additional data (in that order).
    pub fn decrypt<F>(
        &self,
        external_aad: &[u8],
        detached_ciphertext: Option<&[u8]>,
        cipher: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce(&[u8], &[u8]) -> Result<Vec<u8>>,
    {
        let ciphertext = self.ciphertext.or(detached_ciphertext).ok_or_else(|| {
            warn!("no ciphertext to decrypt in COSE_Encrypt0");
            CoseError::NoPayload
        })?;
        let aad = create_enc_structure_vec(
            EncryptionContext::CoseEncrypt0,
            self.headers.protected,
            external_aad,
        )?;
        cipher(ciphertext, &aad)
    }
}

/// Decode a COSE_Encrypt0 message, placing its header parameters in `storage`.
pub fn decode_encrypt0<'a, 's>(
    data: &'a [u8],
    policy: TagPolicy,
    decoders: ParameterDecoders<'_, 'a>,
    storage: &'s mut [Parameter<'a>],
) -> Result<DecodedEncrypt0<'a, 's>> {
    trace!("decoding COSE_Encrypt0 of {} bytes", data.len());
    let mut dec = Decoder::new(data);
    let array = dec.next()?;
    consume_tags(&array, policy, iana::CborTag::CoseEncrypt0 as u64)?;
    expect_array(&array, 3)?;
    let headers = decode_headers(&mut dec, decoders, storage)?;
    let ciphertext = expect_bytes_or_nil(&dec.next()?)?;
    dec.finish()?;
    Ok(DecodedEncrypt0 {
        headers,
        ciphertext,
    })
}
