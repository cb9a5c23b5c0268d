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

//! COSE_KDF_Context functionality.

use crate::{algs, encode::Encoder, iana, CoseError, Result};
use alloc::vec::Vec;
use log::debug;

#[cfg(test)]
mod tests;

/// A nonce value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Nonce<'a> {
    Bytes(&'a [u8]),
    Integer(i64),
}

/// Structure representing a party involved in key derivation.
///
/// ```cddl
///  PartyInfo = (
///      identity : bstr / nil,
///      nonce : bstr / int / nil,
///      other : bstr / nil
///  )
///  ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PartyInfo<'a> {
    pub identity: Option<&'a [u8]>,
    pub nonce: Option<Nonce<'a>>,
    pub other: Option<&'a [u8]>,
}

impl<'a> PartyInfo<'a> {
    fn encode(&self, enc: &mut Encoder<'_>) {
        enc.open_array();
        append_bytes_or_nil(enc, self.identity);
        match self.nonce {
            None => enc.append_null(),
            Some(Nonce::Bytes(b)) => enc.append_bytes(b),
            Some(Nonce::Integer(i)) => enc.append_int(i),
        }
        append_bytes_or_nil(enc, self.other);
        enc.close_array();
    }
}

/// Builder for [`PartyInfo`] objects.
#[derive(Debug, Default)]
pub struct PartyInfoBuilder<'a>(PartyInfo<'a>);

impl<'a> PartyInfoBuilder<'a> {
    builder! {PartyInfo<'a>}
    builder_set_optional! {identity: &'a [u8]}
    builder_set_optional! {nonce: Nonce<'a>}
    builder_set_optional! {other: &'a [u8]}
}

/// Structure representing supplemental public information.
///
/// ```cddl
///  SuppPubInfo : [
///      keyDataLength : uint,
///      protected : empty_or_serialized_map,
///      ? other : bstr
///  ],
///  ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SuppPubInfo<'a> {
    /// Length of the derived key, in bits.
    pub key_data_length: u64,
    /// Serialized protected header of the layer the key is derived for.
    pub protected: &'a [u8],
    pub other: Option<&'a [u8]>,
}

impl<'a> SuppPubInfo<'a> {
    /// Supplemental information for deriving a key for `alg`, taking the key length from the
    /// algorithm.
    pub fn for_algorithm(alg: iana::Algorithm, protected: &'a [u8]) -> Result<Self> {
        let key_data_length = algs::key_bits(alg).ok_or_else(|| {
            debug!("no key length known for {alg:?}");
            CoseError::UnsupportedAlgorithm
        })?;
        Ok(Self {
            key_data_length,
            protected,
            other: None,
        })
    }

    fn encode(&self, enc: &mut Encoder<'_>) {
        enc.open_array();
        enc.append_uint(self.key_data_length);
        enc.append_bytes(self.protected);
        if let Some(other) = self.other {
            enc.append_bytes(other);
        }
        enc.close_array();
    }
}

/// Builder for [`SuppPubInfo`] objects.
#[derive(Debug, Default)]
pub struct SuppPubInfoBuilder<'a>(SuppPubInfo<'a>);

impl<'a> SuppPubInfoBuilder<'a> {
    builder! {SuppPubInfo<'a>}
    builder_set! {key_data_length: u64}
    builder_set! {protected: &'a [u8]}
    builder_set_optional! {other: &'a [u8]}
}

/// Structure representing a key derivation context.
///
/// ```cddl
///  COSE_KDF_Context = [
///      AlgorithmID : int / tstr,
///      PartyUInfo : [ PartyInfo ],
///      PartyVInfo : [ PartyInfo ],
///      SuppPubInfo : [
///          keyDataLength : uint,
///          protected : empty_or_serialized_map,
///          ? other : bstr
///      ],
///      ? SuppPrivInfo : bstr
///  ]
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct KdfContext<'a> {
    pub algorithm_id: i64,
    pub party_u_info: PartyInfo<'a>,
    pub party_v_info: PartyInfo<'a>,
    pub supp_pub_info: SuppPubInfo<'a>,
    pub supp_priv_info: Option<&'a [u8]>,
}

impl<'a> KdfContext<'a> {
    fn encode(&self, enc: &mut Encoder<'_>) {
        enc.open_array();
        enc.append_int(self.algorithm_id);
        self.party_u_info.encode(enc);
        self.party_v_info.encode(enc);
        self.supp_pub_info.encode(enc);
        if let Some(supp_priv_info) = self.supp_priv_info {
            enc.append_bytes(supp_priv_info);
        }
        enc.close_array();
    }
}

/// Builder for [`KdfContext`] objects.
#[derive(Debug, Default)]
pub struct KdfContextBuilder<'a>(KdfContext<'a>);

impl<'a> KdfContextBuilder<'a> {
    builder! {KdfContext<'a>}
    builder_set! {party_u_info: PartyInfo<'a>}
    builder_set! {party_v_info: PartyInfo<'a>}
    builder_set! {supp_pub_info: SuppPubInfo<'a>}
    builder_set_optional! {supp_priv_info: &'a [u8]}

    /// Set the algorithm the derived key is for.
    pub fn algorithm(mut self, alg: iana::Algorithm) -> Self {
        self.0.algorithm_id = alg as i64;
        self
    }
}

fn append_bytes_or_nil(enc: &mut Encoder<'_>, data: Option<&[u8]>) {
    match data {
        Some(b) => enc.append_bytes(b),
        None => enc.append_null(),
    }
}

/// Write the serialized `COSE_KDF_Context` used as HKDF `info` into `out`, returning its
/// length.
pub fn create_kdf_context_info(out: &mut [u8], context: &KdfContext<'_>) -> Result<usize> {
    let mut enc = Encoder::new(out);
    context.encode(&mut enc);
    Ok(enc.finish()?.len())
}

/// Build the serialized `COSE_KDF_Context` in a new vector.
pub fn create_kdf_context_info_vec(context: &KdfContext<'_>) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut enc = Encoder::growable(&mut data);
    context.encode(&mut enc);
    enc.finish()?;
    Ok(data)
}

/// Size of the serialized `COSE_KDF_Context`, for sizing the buffer given to
/// [`create_kdf_context_info`].
pub fn kdf_context_info_size(context: &KdfContext<'_>) -> Result<usize> {
    let mut enc = Encoder::size_only();
    context.encode(&mut enc);
    Ok(enc.finish_get_size()?)
}
