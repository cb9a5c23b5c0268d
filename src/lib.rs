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

//! Core of a [CBOR Object Signing and Encryption (COSE)][COSE] implementation, built on a
//! streaming [CBOR][CBOR] encoder and a borrowing decoder.
//!
//! The crate produces and consumes the byte sequences that COSE cryptography operates on
//! (`Sig_structure`, `MAC_structure`, `Enc_structure` and the KDF context) and the header
//! buckets and message arrays around them. Cryptographic operations are supplied by the caller
//! as closures; the hash and MAC based structures are streamed into any [`digest::Update`]
//! implementation rather than materialized.
//!
//! The generic CBOR value model is [`ciborium`](https://docs.rs/ciborium)'s, re-exported as
//! [`cbor`].
//!
//! ## Usage
//!
//! ```
//! # struct FakeSigner {}
//! # impl FakeSigner {
//! #     fn sign(&self, data: &[u8]) -> Vec<u8> {
//! #         data.iter().rev().cloned().collect()
//! #     }
//! #     fn verify(&self, sig: &[u8], data: &[u8]) -> Result<(), cosec::CoseError> {
//! #         if sig != self.sign(data) {
//! #             Err(cosec::CoseError::VerificationFailed)
//! #         } else {
//! #             Ok(())
//! #         }
//! #     }
//! # }
//! # let signer = FakeSigner {};
//! # let verifier = FakeSigner {};
//! use cosec::{iana, Encoder, Parameter, Sign1MessageBuilder, TagPolicy};
//!
//! // Inputs.
//! let pt = b"This is the content";
//! let aad = b"this is additional data";
//!
//! // Describe a COSE_Sign1 message.
//! let params = [Parameter::alg(iana::Algorithm::ES256), Parameter::kid(b"11")];
//! let message = Sign1MessageBuilder::new()
//!     .parameters(&params)
//!     .external_aad(aad)
//!     .payload(pt)
//!     .tagged(true)
//!     .build();
//!
//! // Serialize to bytes, with a closure to do the sign operation.
//! let mut data = Vec::new();
//! let mut enc = Encoder::growable(&mut data);
//! cosec::encode_sign1(&mut enc, &message, |inputs| Ok(signer.sign(&inputs.tbs_vec()?)))?;
//! enc.finish()?;
//!
//! // At the receiving end, decode the bytes, with header parameters landing in `storage`.
//! let mut storage = [Parameter::default(); 4];
//! let sign1 = cosec::decode_sign1(&data, TagPolicy::Required, &[], &mut storage)?;
//! assert_eq!(sign1.headers.algorithm_id(), Some(iana::Algorithm::ES256 as i64));
//! assert_eq!(sign1.headers.key_id(), Some(&b"11"[..]));
//!
//! // Check the signature, which needs to have the same `aad` provided.
//! let result = sign1.verify(aad, None, |sig, inputs| verifier.verify(sig, &inputs.tbs_vec()?));
//! assert!(result.is_ok());
//!
//! // Providing a different `aad` means the signature won't validate.
//! assert!(sign1
//!     .verify(b"not aad", None, |sig, inputs| verifier.verify(sig, &inputs.tbs_vec()?))
//!     .is_err());
//! # Ok::<(), cosec::CoseError>(())
//! ```
//!
//! [COSE]: https://tools.ietf.org/html/rfc9052
//! [CBOR]: https://tools.ietf.org/html/rfc8949

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(rustdoc::broken_intra_doc_links)]
extern crate alloc;

/// Re-export of the `ciborium` crate used for the generic CBOR value model.
pub use ciborium as cbor;

#[macro_use]
pub(crate) mod util;
pub use util::{consume_tags, TagPolicy};

pub mod algs;
pub mod bignum;
pub mod decode;
pub use decode::{DecodeError, Decoder, Item, ItemValue};
pub mod encode;
pub use encode::{EncodeConfig, EncodeError, Encoder};
pub mod iana;
pub mod ieee754;

mod common;
pub use common::*;
mod context;
pub use context::*;
mod encrypt;
pub use encrypt::*;
mod header;
pub use header::*;
mod mac;
pub use mac::*;
mod sign;
pub use sign::*;
