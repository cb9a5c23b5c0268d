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

//! CBOR decoding cursor.
//!
//! A [`Decoder`] hands out one item per call to [`Decoder::next`], in wire order. Arrays and maps
//! are not returned as a whole: the container item carries its count, and its members follow as
//! separate items one nesting level deeper. Strings borrow from the input.

use crate::{
    encode::{
        MajorType, AI_EIGHT_BYTES, AI_FOUR_BYTES, AI_INDEFINITE, AI_ONE_BYTE, AI_TWO_BYTES, BREAK,
        MAX_ITEMS_IN_CONTAINER, MAX_NESTING,
    },
    ieee754,
};
use alloc::{boxed::Box, vec::Vec};
use ciborium::value::{Integer, Value};
use log::trace;

#[cfg(test)]
mod tests;

/// Maximum number of tag numbers recorded for one item.
pub const MAX_TAGS_PER_ITEM: usize = 4;

/// Failures reported by a [`Decoder`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// Input is not well-formed CBOR.
    NotWellFormed,
    /// Input ended in the middle of an item.
    HitEnd,
    /// Item is of a different type than required.
    UnexpectedType,
    /// More than [`MAX_NESTING`] levels of arrays and maps.
    NestingTooDeep,
    /// Array or map with more than [`MAX_ITEMS_IN_CONTAINER`] entries.
    ArrayTooLong,
    /// Item with more than [`MAX_TAGS_PER_ITEM`] tags.
    TooManyTags,
    /// Text string that is not UTF-8.
    InvalidUtf8,
    /// Indefinite-length byte or text string.
    IndefiniteStringUnsupported,
    /// Data left over after the last item.
    ExtraBytes,
    /// Input finished with arrays or maps not fully consumed.
    ArrayOrMapUnconsumed,
    /// No items left.
    NoMoreItems,
    /// Integer that does not fit the requested type.
    IntegerOverflow,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            DecodeError::NotWellFormed => "not well-formed CBOR",
            DecodeError::HitEnd => "unexpected end of input",
            DecodeError::UnexpectedType => "unexpected item type",
            DecodeError::NestingTooDeep => "nesting too deep",
            DecodeError::ArrayTooLong => "array or map too long",
            DecodeError::TooManyTags => "too many tags on item",
            DecodeError::InvalidUtf8 => "invalid UTF-8 in text string",
            DecodeError::IndefiniteStringUnsupported => "indefinite-length string",
            DecodeError::ExtraBytes => "extra bytes after data item",
            DecodeError::ArrayOrMapUnconsumed => "array or map not fully consumed",
            DecodeError::NoMoreItems => "no more items",
            DecodeError::IntegerOverflow => "integer out of range",
        };
        write!(f, "{msg}")
    }
}

/// Parsed CBOR head.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct RawHead {
    pub major: MajorType,
    /// Argument; zero for indefinite lengths.
    pub argument: u64,
    /// Additional information bits of the initial byte.
    pub additional: u8,
    /// Encoded length of the head.
    pub len: usize,
    pub indefinite: bool,
}

/// Parse the head at the start of `bytes`.
pub(crate) fn read_head(bytes: &[u8]) -> Result<RawHead, DecodeError> {
    let initial = *bytes.first().ok_or(DecodeError::HitEnd)?;
    let major = MajorType::from_initial_byte(initial);
    let additional = initial & 0x1f;
    let arg_len = match additional {
        0..=23 => 0,
        AI_ONE_BYTE => 1,
        AI_TWO_BYTES => 2,
        AI_FOUR_BYTES => 4,
        AI_EIGHT_BYTES => 8,
        AI_INDEFINITE => {
            return match major {
                MajorType::UnsignedInt | MajorType::NegativeInt | MajorType::Tag => {
                    Err(DecodeError::NotWellFormed)
                }
                _ => Ok(RawHead {
                    major,
                    argument: 0,
                    additional,
                    len: 1,
                    indefinite: true,
                }),
            };
        }
        _ => return Err(DecodeError::NotWellFormed),
    };
    let argument = if arg_len == 0 {
        additional as u64
    } else {
        let arg = bytes.get(1..1 + arg_len).ok_or(DecodeError::HitEnd)?;
        arg.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
    };
    Ok(RawHead {
        major,
        argument,
        additional,
        len: 1 + arg_len,
        indefinite: false,
    })
}

/// Value of a decoded item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ItemValue<'a> {
    UnsignedInt(u64),
    /// Major type 1 integer holding `n`, i.e. the value `-1 - n`.
    NegativeInt(u64),
    Bytes(&'a [u8]),
    Text(&'a str),
    /// Array with its item count, `None` for indefinite length.
    Array(Option<u64>),
    /// Map with its pair count, `None` for indefinite length.
    Map(Option<u64>),
    Float(f64),
    Bool(bool),
    Null,
    Undefined,
    /// Any other simple value.
    Simple(u8),
}

impl<'a> ItemValue<'a> {
    /// Short name of the item type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemValue::UnsignedInt(_) => "uint",
            ItemValue::NegativeInt(_) => "nint",
            ItemValue::Bytes(_) => "bstr",
            ItemValue::Text(_) => "tstr",
            ItemValue::Array(_) => "array",
            ItemValue::Map(_) => "map",
            ItemValue::Float(_) => "float",
            ItemValue::Bool(_) => "bool",
            ItemValue::Null => "null",
            ItemValue::Undefined => "undefined",
            ItemValue::Simple(_) => "simple",
        }
    }
}

/// One decoded item and its position in the nesting structure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Item<'a> {
    pub value: ItemValue<'a>,
    /// Nesting level of this item; top-level items are at level 0.
    pub nesting_level: usize,
    /// Nesting level of the item that follows. Lower than `nesting_level` when this item ends
    /// one or more containers; higher when this item is a non-empty container.
    pub next_nesting_level: usize,
    tags: [u64; MAX_TAGS_PER_ITEM],
    tag_count: usize,
}

impl<'a> Item<'a> {
    /// Tag numbers on this item, outermost first.
    pub fn tags(&self) -> &[u64] {
        &self.tags[..self.tag_count]
    }

    /// Integer value as an `i64`.
    pub fn as_i64(&self) -> Result<i64, DecodeError> {
        match self.value {
            ItemValue::UnsignedInt(n) => i64::try_from(n).map_err(|_| DecodeError::IntegerOverflow),
            ItemValue::NegativeInt(n) => i64::try_from(n)
                .map(|n| -1 - n)
                .map_err(|_| DecodeError::IntegerOverflow),
            _ => Err(DecodeError::UnexpectedType),
        }
    }

    /// Whether this item is an array or map whose members follow.
    pub fn is_container(&self) -> bool {
        matches!(self.value, ItemValue::Array(_) | ItemValue::Map(_))
    }
}

const INDEFINITE: u64 = u64::MAX;

#[derive(Clone, Copy, Debug)]
struct Level {
    /// Items still expected, or `INDEFINITE`.
    remaining: u64,
    is_map: bool,
    /// Items seen so far, used to check indefinite maps end on a pair boundary.
    seen: u64,
}

const EMPTY_LEVEL: Level = Level {
    remaining: 0,
    is_map: false,
    seen: 0,
};

/// A cursor over CBOR-encoded input.
pub struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    levels: [Level; MAX_NESTING],
    depth: usize,
}

impl<'a> Decoder<'a> {
    /// Start decoding `input`.
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            levels: [EMPTY_LEVEL; MAX_NESTING],
            depth: 0,
        }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Input not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Nesting level the next item will be at.
    pub fn peek_nesting_level(&self) -> usize {
        let mut depth = self.depth;
        let mut pos = self.pos;
        while depth > 0 {
            let level = &self.levels[depth - 1];
            if level.remaining == 0 {
                depth -= 1;
            } else if level.remaining == INDEFINITE && self.input.get(pos) == Some(&BREAK) {
                pos += 1;
                depth -= 1;
            } else {
                break;
            }
        }
        depth
    }

    /// Close completed containers down to `min_depth`, consuming the breaks of indefinite ones.
    fn ascend_to(&mut self, min_depth: usize) -> Result<(), DecodeError> {
        while self.depth > min_depth {
            let level = self.levels[self.depth - 1];
            if level.remaining == 0 {
                self.depth -= 1;
            } else if level.remaining == INDEFINITE && self.input.get(self.pos) == Some(&BREAK) {
                if level.is_map && level.seen % 2 != 0 {
                    return Err(DecodeError::NotWellFormed);
                }
                self.pos += 1;
                self.depth -= 1;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn take(&mut self, len: u64) -> Result<&'a [u8], DecodeError> {
        let end = usize::try_from(len)
            .ok()
            .and_then(|len| self.pos.checked_add(len))
            .filter(|end| *end <= self.input.len())
            .ok_or(DecodeError::HitEnd)?;
        let data = &self.input[self.pos..end];
        self.pos = end;
        Ok(data)
    }

    fn push(&mut self, count: Option<u64>, is_map: bool) -> Result<(), DecodeError> {
        if self.depth >= MAX_NESTING {
            return Err(DecodeError::NestingTooDeep);
        }
        let remaining = match count {
            None => INDEFINITE,
            Some(n) if n > MAX_ITEMS_IN_CONTAINER => return Err(DecodeError::ArrayTooLong),
            Some(n) if is_map => n * 2,
            Some(n) => n,
        };
        self.levels[self.depth] = Level {
            remaining,
            is_map,
            seen: 0,
        };
        self.depth += 1;
        Ok(())
    }

    /// Decode the next item.
    pub fn next(&mut self) -> Result<Item<'a>, DecodeError> {
        self.ascend_to(0)?;
        if self.depth == 0 && self.pos == self.input.len() {
            return Err(DecodeError::NoMoreItems);
        }
        let nesting_level = self.depth;

        let mut tags = [0u64; MAX_TAGS_PER_ITEM];
        let mut tag_count = 0;
        let head = loop {
            let head = read_head(&self.input[self.pos..])?;
            self.pos += head.len;
            if head.major != MajorType::Tag {
                break head;
            }
            if tag_count == MAX_TAGS_PER_ITEM {
                return Err(DecodeError::TooManyTags);
            }
            tags[tag_count] = head.argument;
            tag_count += 1;
        };

        if self.depth > 0 {
            let level = &mut self.levels[self.depth - 1];
            if level.remaining != INDEFINITE {
                level.remaining -= 1;
            }
            level.seen += 1;
        }

        let value = match head.major {
            MajorType::UnsignedInt => ItemValue::UnsignedInt(head.argument),
            MajorType::NegativeInt => ItemValue::NegativeInt(head.argument),
            MajorType::ByteString | MajorType::TextString if head.indefinite => {
                return Err(DecodeError::IndefiniteStringUnsupported);
            }
            MajorType::ByteString => ItemValue::Bytes(self.take(head.argument)?),
            MajorType::TextString => {
                let data = self.take(head.argument)?;
                ItemValue::Text(core::str::from_utf8(data).map_err(|_| DecodeError::InvalidUtf8)?)
            }
            MajorType::Array | MajorType::Map => {
                let count = if head.indefinite {
                    None
                } else {
                    Some(head.argument)
                };
                let is_map = head.major == MajorType::Map;
                self.push(count, is_map)?;
                if is_map {
                    ItemValue::Map(count)
                } else {
                    ItemValue::Array(count)
                }
            }
            MajorType::Tag => return Err(DecodeError::NotWellFormed),
            MajorType::Simple => match head.additional {
                20 => ItemValue::Bool(false),
                21 => ItemValue::Bool(true),
                22 => ItemValue::Null,
                23 => ItemValue::Undefined,
                0..=19 => ItemValue::Simple(head.additional),
                AI_ONE_BYTE if head.argument < 32 => return Err(DecodeError::NotWellFormed),
                AI_ONE_BYTE => ItemValue::Simple(head.argument as u8),
                AI_TWO_BYTES => ItemValue::Float(ieee754::half_to_double(head.argument as u16)),
                AI_FOUR_BYTES => ItemValue::Float(ieee754::single_to_double(head.argument as u32)),
                AI_EIGHT_BYTES => ItemValue::Float(f64::from_bits(head.argument)),
                // A break that does not end an indefinite-length container.
                _ => return Err(DecodeError::NotWellFormed),
            },
        };

        Ok(Item {
            value,
            nesting_level,
            next_nesting_level: self.peek_nesting_level(),
            tags,
            tag_count,
        })
    }

    /// Consume the members of `item` if it is a container. `item` must be the item most recently
    /// returned by [`Decoder::next`].
    pub fn skip(&mut self, item: &Item<'a>) -> Result<(), DecodeError> {
        while self.peek_nesting_level() > item.nesting_level {
            self.next()?;
        }
        self.ascend_to(item.nesting_level)
    }

    /// Decode the next item, including any members, returning its encoded bytes.
    pub fn next_raw(&mut self) -> Result<(Item<'a>, &'a [u8]), DecodeError> {
        self.ascend_to(0)?;
        let start = self.pos;
        let item = self.next()?;
        self.skip(&item)?;
        Ok((item, &self.input[start..self.pos]))
    }

    /// Decode the next item, including any members, as a generic CBOR value.
    pub fn next_value(&mut self) -> Result<Value, DecodeError> {
        let item = self.next()?;
        self.value_of(item)
    }

    fn value_of(&mut self, item: Item<'a>) -> Result<Value, DecodeError> {
        let mut value = match item.value {
            ItemValue::UnsignedInt(n) => Value::Integer(n.into()),
            ItemValue::NegativeInt(n) => Value::Integer(
                Integer::try_from(-1 - n as i128).map_err(|_| DecodeError::IntegerOverflow)?,
            ),
            ItemValue::Bytes(b) => Value::Bytes(b.to_vec()),
            ItemValue::Text(t) => Value::Text(t.into()),
            ItemValue::Float(f) => Value::Float(f),
            ItemValue::Bool(b) => Value::Bool(b),
            ItemValue::Null => Value::Null,
            ItemValue::Undefined | ItemValue::Simple(_) => return Err(DecodeError::UnexpectedType),
            ItemValue::Array(_) => {
                let mut members = Vec::new();
                while self.peek_nesting_level() > item.nesting_level {
                    let member = self.next()?;
                    members.push(self.value_of(member)?);
                }
                Value::Array(members)
            }
            ItemValue::Map(_) => {
                let mut entries = Vec::new();
                while self.peek_nesting_level() > item.nesting_level {
                    let label = self.next()?;
                    let label = self.value_of(label)?;
                    let value = self.next()?;
                    entries.push((label, self.value_of(value)?));
                }
                Value::Map(entries)
            }
        };
        for tag in item.tags().iter().rev() {
            value = Value::Tag(*tag, Box::new(value));
        }
        Ok(value)
    }

    /// Check that the input has been consumed exactly.
    pub fn finish(&mut self) -> Result<(), DecodeError> {
        self.ascend_to(0)?;
        if self.depth > 0 {
            trace!("finish with {} open levels", self.depth);
            return Err(DecodeError::ArrayOrMapUnconsumed);
        }
        if self.pos != self.input.len() {
            return Err(DecodeError::ExtraBytes);
        }
        Ok(())
    }
}
