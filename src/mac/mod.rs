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

//! COSE_Mac0 functionality.

use crate::{
    decode::Decoder,
    encode::Encoder,
    header::{decode_headers, DecodedHeaders, Parameter, ParameterDecoders},
    iana,
    sign::update_bstr,
    util::{
        append_message, consume_tags, encode_header_items, expect_array, expect_bytes,
        expect_bytes_or_nil, TagPolicy,
    },
    CoseError, Result,
};
use alloc::vec::Vec;
use digest::Update;
use log::{trace, warn};


/// Possible MAC contexts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MacContext {
    CoseMac,
    CoseMac0,
}

impl MacContext {
    /// Return the context string as per RFC 9052 section 6.3.
    fn text(&self) -> &'static str {
        match self {
            MacContext::CoseMac => "MAC",
            MacContext::CoseMac0 => "MAC0",
        }
    }

    fn preamble(&self) -> &'static [u8] {
        match self {
            MacContext::CoseMac => b"\x84\x63MAC",
            MacContext::CoseMac0 => b"\x84\x64MAC0",
        }
    }
}

/// Feed the to-be-MACed `MAC_structure` into `mac`, one field at a time.
///
/// ```cddl
///  MAC_structure = [
///       context : "MAC" / "MAC0",
///       protected : empty_or_serialized_map,
///       external_aad : bstr,
///       payload : bstr
///  ]
/// ```
pub fn create_tbm<H: Update>(
    mac: &mut H,
    context: MacContext,
    protected: &[u8],
    external_aad: &[u8],
    payload: &[u8],
) {
    mac.update(context.preamble());
    update_bstr(mac, protected);
    update_bstr(mac, external_aad);
    update_bstr(mac, payload);
}

fn encode_mac_structure(
    enc: &mut Encoder<'_>,
    context: MacContext,
    protected: &[u8],
    external_aad: &[u8],
    payload: &[u8],
) {
    enc.open_array();
    enc.append_text(context.text());
    enc.append_bytes(protected);
    enc.append_bytes(external_aad);
    enc.append_bytes(payload);
    enc.close_array();
}

/// Write the `MAC_structure` into `out`, returning its length.
pub fn create_mac_structure(
    out: &mut [u8],
    context: MacContext,
    protected: &[u8],
    external_aad: &[u8],
    payload: &[u8],
) -> Result<usize> {
    let mut enc = Encoder::new(out);
    encode_mac_structure(&mut enc, context, protected, external_aad, payload);
    Ok(enc.finish()?.len())
}

/// Build the `MAC_structure` in a new vector.
pub fn create_mac_structure_vec(
    context: MacContext,
    protected: &[u8],
    external_aad: &[u8],
    payload: &[u8],
) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut enc = Encoder::growable(&mut data);
    encode_mac_structure(&mut enc, context, protected, external_aad, payload);
    enc.finish()?;
    Ok(data)
}

/// The pieces of a MAC computation, handed to tagging and verification closures.
#[derive(Clone, Copy, Debug)]
pub struct MacInputs<'a> {
    pub context: MacContext,
    pub protected: &'a [u8],
    pub external_aad: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> MacInputs<'a> {
    pub fn tbm<H: Update>(&self, mac: &mut H) {
        create_tbm(
            mac,
            self.context,
            self.protected,
            self.external_aad,
            self.payload,
        )
    }

    pub fn tbm_vec(&self) -> Result<Vec<u8>> {
        create_mac_structure_vec(self.context, self.protected, self.external_aad, self.payload)
    }
}

/// Description of a COSE_Mac0 message to encode.
///
/// ```cddl
///  COSE_Mac0 = [
///     Headers,
///     payload : bstr / nil,
///     tag : bstr,
///  ]
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Mac0Message<'a> {
    pub parameters: &'a [Parameter<'a>],
    pub external_aad: &'a [u8],
    pub payload: &'a [u8],
    pub detached: bool,
    pub tagged: bool,
}

/// Builder for [`Mac0Message`] objects.
#[derive(Debug, Default)]
pub struct Mac0MessageBuilder<'a>(Mac0Message<'a>);

impl<'a> Mac0MessageBuilder<'a> {
    builder! {Mac0Message<'a>}
    builder_set! {parameters: &'a [Parameter<'a>]}
    builder_set! {external_aad: &'a [u8]}
    builder_set! {payload: &'a [u8]}
    builder_set! {detached: bool}
    builder_set! {tagged: bool}
}

/// Encode a COSE_Mac0 message into `enc`, using `create_tag` to compute the tag.
pub fn encode_mac0<F>(enc: &mut Encoder<'_>, message: &Mac0Message<'_>, create_tag: F) -> Result<()>
where
    F: FnOnce(&MacInputs<'_>) -> Result<Vec<u8>>,
{
    let (headers, protected) = encode_header_items(*enc.config(), message.parameters)?;
    let inputs = MacInputs {
        context: MacContext::CoseMac0,
        protected: &headers[protected.clone()],
        external_aad: message.external_aad,
        payload: message.payload,
    };
    let tag = create_tag(&inputs)?;
    let cbor_tag = message.tagged.then_some(iana::CborTag::CoseMac0);
    append_message(enc, cbor_tag, &headers, protected.end, |enc| {
        if message.detached {
            enc.append_null();
        } else {
            enc.append_bytes(message.payload);
        }
        enc.append_bytes(&tag);
    })
}

/// A decoded COSE_Mac0 message, borrowing from the encoded data.
#[derive(Debug)]
pub struct DecodedMac0<'a, 's> {
    pub headers: DecodedHeaders<'a, 's>,
    pub payload: Option<&'a [u8]>,
    pub tag: &'a [u8],
}

impl<'a, 's> DecodedMac0<'a, 's> {
    /// Verify the `tag` value using the provided `verify` function, feeding it the tag and the
    /// inputs to the `MAC_structure` (in that order).
    pub fn verify_tag<F>(
        &self,
        external_aad: &[u8],
        detached_payload: Option<&[u8]>,
        verify: F,
    ) -> Result<()>
    where
        F: FnOnce(&[u8], &MacInputs<'_>) -> Result<()>,
    {
        let payload = self.payload.or(detached_payload).ok_or_else(|| {
            warn!("no payload to verify COSE_Mac0 against");
            CoseError::NoPayload
        })?;
        let inputs = MacInputs {
            context: MacContext::CoseMac0,
            protected: self.headers.protected,
            external_aad,
            payload,
        };
        verify(self.tag, &inputs)
    }
}

/// Decode a COSE_Mac0 message, placing its header parameters in `storage`.
pub fn decode_mac0<'a, 's>(
    data: &'a [u8],
    policy: TagPolicy,
    decoders: ParameterDecoders<'_, 'a>,
    storage: &'s mut [Parameter<'a>],
) -> Result<DecodedMac0<'a, 's>> {
    trace!("decoding COSE_Mac0 of {} bytes", data.len());
    let mut dec = Decoder::new(data);
    let array = dec.next()?;
    consume_tags(&array, policy, iana::CborTag::CoseMac0 as u64)?;
    expect_array(&array, 4)?;
    let headers = decode_headers(&mut dec, decoders, storage)?;
    let payload = expect_bytes_or_nil(&dec.next()?)?;
    let tag = expect_bytes(&dec.next()?)?;
    dec.finish()?;
    Ok(DecodedMac0 {
        headers,
        payload,
        tag,
    })
}
