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

//! Common internal utilities.

use crate::{
    decode::{Item, ItemValue},
    encode::{EncodeConfig, Encoder},
    header::{encode_headers, Parameter},
    iana, CoseError, Result,
};
use alloc::vec::Vec;
use core::ops::Range;
use log::warn;


/// How a COSE message tag is treated when decoding.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TagPolicy {
    /// The message must carry its tag.
    Required,
    /// The message must not carry any tag.
    Prohibited,
    /// The message may carry its tag.
    #[default]
    Optional,
}

/// Check the tags on a message's outer array against `policy`, where `tag` is the tag number of
/// the expected message type.
pub fn consume_tags(item: &Item<'_>, policy: TagPolicy, tag: u64) -> Result<()> {
    let tags = item.tags();
    match (policy, tags) {
        (TagPolicy::Required | TagPolicy::Optional, [t]) if *t == tag => Ok(()),
        (TagPolicy::Required, []) => {
            warn!("message lacks required tag {tag}");
            Err(CoseError::MissingTag(tag))
        }
        (TagPolicy::Prohibited | TagPolicy::Optional, []) => Ok(()),
        (_, [t, ..]) => {
            warn!("message has unexpected tag {t}");
            Err(CoseError::UnexpectedTag(*t))
        }
    }
}

/// Check that an item carries no tags.
pub(crate) fn untagged(item: &Item<'_>, want: &'static str) -> Result<()> {
    if item.tags().is_empty() {
        Ok(())
    } else {
        Err(CoseError::UnexpectedItem("tag", want))
    }
}

/// Extract an untagged byte string.
pub(crate) fn expect_bytes<'a>(item: &Item<'a>) -> Result<&'a [u8]> {
    untagged(item, "bstr")?;
    match item.value {
        ItemValue::Bytes(b) => Ok(b),
        v => Err(CoseError::UnexpectedItem(v.type_name(), "bstr")),
    }
}

/// Extract an untagged byte string or `nil`.
pub(crate) fn expect_bytes_or_nil<'a>(item: &Item<'a>) -> Result<Option<&'a [u8]>> {
    untagged(item, "bstr / nil")?;
    match item.value {
        ItemValue::Bytes(b) => Ok(Some(b)),
        ItemValue::Null => Ok(None),
        v => Err(CoseError::UnexpectedItem(v.type_name(), "bstr / nil")),
    }
}

/// Check an item is a definite-length array of `len` items.
pub(crate) fn expect_array(item: &Item<'_>, len: u64) -> Result<()> {
    match item.value {
        ItemValue::Array(Some(n)) if n == len => Ok(()),
        ItemValue::Array(_) => Err(CoseError::UnexpectedItem("array", "array of fixed length")),
        v => Err(CoseError::UnexpectedItem(v.type_name(), "array")),
    }
}

/// Encode the protected and unprotected buckets on their own, returning the encoded items and
/// the range of the protected contents within them.
pub(crate) fn encode_header_items(
    config: EncodeConfig,
    params: &[Parameter<'_>],
) -> Result<(Vec<u8>, Range<usize>)> {
    let mut data = Vec::new();
    let mut header_enc = Encoder::growable(&mut data).with_config(config);
    let protected = encode_headers(&mut header_enc, params)?;
    header_enc.finish()?;
    Ok((data, protected))
}

/// Append a complete message array to `enc`: optional tag, both header buckets, then `rest`.
pub(crate) fn append_message<F>(
    enc: &mut Encoder<'_>,
    tag: Option<iana::CborTag>,
    headers: &[u8],
    protected_end: usize,
    rest: F,
) -> Result<()>
where
    F: FnOnce(&mut Encoder<'_>),
{
    if let Some(tag) = tag {
        enc.add_tag_number(tag as u64);
    }
    enc.open_array();
    let (protected_item, unprotected_item) = headers.split_at(protected_end);
    enc.append_encoded(protected_item);
    enc.append_encoded(unprotected_item);
    rest(enc);
    enc.close_array();
    match enc.error() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Check for an expected error.
#[cfg(test)]
pub fn expect_err<T: core::fmt::Debug, E: core::fmt::Debug>(result: Result<T, E>, err_msg: &str) {
    use alloc::format;
    match result {
        Ok(v) => panic!("expected error containing '{err_msg}', got success {v:?}"),
        Err(err) => {
            assert!(
                format!("{err:?}").contains(err_msg),
                "unexpected error {err:?}, doesn't contain '{err_msg}'"
            );
        }
    }
}

// Macros to reduce boilerplate when creating `SomethingBuilder` structures.

/// Add `new()` and `build()` methods to the builder.
macro_rules! builder {
    ( $otype: ty ) => {
        /// Constructor for builder.
        pub fn new() -> Self {
            Self(<$otype>::default())
        }
        /// Build the completed object.
        pub fn build(self) -> $otype {
            self.0
        }
    };
}

/// Add a setter function for a field to the builder.
macro_rules! builder_set {
    ( $name:ident: $ftype:ty ) => {
        /// Set the associated field.
        pub fn $name(mut self, $name: $ftype) -> Self {
            self.0.$name = $name;
            self
        }
    };
}

/// Add a setter function for an optional field to the builder.
macro_rules! builder_set_optional {
    ( $name:ident: $ftype:ty ) => {
        /// Set the associated field.
        pub fn $name(mut self, $name: $ftype) -> Self {
            self.0.$name = Some($name);
            self
        }
    };
}
