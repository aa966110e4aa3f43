//! Depth-first binary encoding of tag trees.
//!
//! Every named entry is `id:u8, name_len:u16, name, payload`. Compounds are a
//! run of entries closed by id 0; lists are `element_id:u8, count:i32` followed
//! by bare payloads. All numbers are big-endian and strings are modified UTF-8.
//!
//! Both directions walk the tree with an explicit stack, so nesting depth is
//! bounded by [`MAX_DEPTH`] and never by the thread's call stack.

use super::mutf8;
use super::tag::{Compound, NamedTag, Tag, TagKind, TagList};

/// Deepest container nesting accepted, counting the root compound as depth 0.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum NbtError {
    #[error("unknown tag id {id}")]
    UnknownTag { id: u8 },
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },
    #[error("string of {len} bytes is not valid modified UTF-8")]
    InvalidString { len: usize },
    #[error("negative length {len} for {context}")]
    NegativeLength { len: i32, context: &'static str },
    #[error("root tag must be a compound, found {found}")]
    RootNotCompound { found: TagKind },
    #[error("{count} trailing bytes after root tag")]
    TrailingBytes { count: usize },
    #[error("list of End tags must be empty, found {count} elements")]
    NonEmptyEndList { count: usize },
    #[error("compound holds key `{key}` more than once")]
    DuplicateKey { key: String },
    #[error("string of {len} bytes exceeds the 65535 byte limit")]
    StringTooLong { len: usize },
    #[error("{len} elements exceed the i32 length limit")]
    LengthOverflow { len: usize },
    #[error("nesting deeper than 512 levels")]
    DepthExceeded,
}

pub fn decode(bytes: &[u8]) -> Result<NamedTag, NbtError> {
    let mut reader = SliceReader { bytes, pos: 0 };
    let id = reader.u8("root tag id")?;
    let kind = TagKind::from_id(id).ok_or(NbtError::UnknownTag { id })?;
    if kind != TagKind::Compound {
        return Err(NbtError::RootNotCompound { found: kind });
    }
    let name = reader.string()?;
    let tag = reader.compound_tree()?;
    let remaining = reader.bytes.len() - reader.pos;
    if remaining != 0 {
        return Err(NbtError::TrailingBytes { count: remaining });
    }
    Ok(NamedTag { name, tag })
}

pub fn encode(root: &NamedTag) -> Result<Vec<u8>, NbtError> {
    let Tag::Compound(compound) = &root.tag else {
        return Err(NbtError::RootNotCompound {
            found: root.tag.kind(),
        });
    };
    let mut out = Vec::new();
    out.push(TagKind::Compound.id());
    write_string(&mut out, &root.name)?;
    write_compound_tree(&mut out, compound)?;
    Ok(out)
}

/// A container whose children are still being read.
enum OpenContainer {
    Compound { compound: Compound, key: String },
    List { element_kind: TagKind, len: usize, items: Vec<Tag> },
}

impl OpenContainer {
    fn close(self) -> Tag {
        match self {
            OpenContainer::Compound { compound, .. } => Tag::Compound(compound),
            OpenContainer::List {
                element_kind, items, ..
            } => Tag::List(TagList::from_decoded(element_kind, items)),
        }
    }
}

struct SliceReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], NbtError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(NbtError::UnexpectedEof { context })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], NbtError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N, context)?);
        Ok(buf)
    }

    fn u8(&mut self, context: &'static str) -> Result<u8, NbtError> {
        Ok(self.array::<1>(context)?[0])
    }

    fn i32(&mut self, context: &'static str) -> Result<i32, NbtError> {
        Ok(i32::from_be_bytes(self.array(context)?))
    }

    fn length(&mut self, context: &'static str) -> Result<usize, NbtError> {
        let len = self.i32(context)?;
        usize::try_from(len).map_err(|_| NbtError::NegativeLength { len, context })
    }

    fn kind(&mut self, context: &'static str) -> Result<TagKind, NbtError> {
        let id = self.u8(context)?;
        TagKind::from_id(id).ok_or(NbtError::UnknownTag { id })
    }

    fn string(&mut self) -> Result<String, NbtError> {
        let len = u16::from_be_bytes(self.array("string length")?) as usize;
        let raw = self.take(len, "string bytes")?;
        mutf8::decode(raw).ok_or(NbtError::InvalidString { len })
    }

    /// Reads a compound payload whose id and name were already consumed.
    fn compound_tree(&mut self) -> Result<Tag, NbtError> {
        let mut open = vec![OpenContainer::Compound {
            compound: Compound::new(),
            key: String::new(),
        }];
        let mut finished: Option<Tag> = None;

        while let Some(top) = open.last_mut() {
            let next = match top {
                OpenContainer::Compound { compound, key } => {
                    if let Some(tag) = finished.take() {
                        let key = std::mem::take(key);
                        if compound.contains_key(&key) {
                            return Err(NbtError::DuplicateKey { key });
                        }
                        compound.insert(key, tag);
                    }
                    let kind = self.kind("compound entry id")?;
                    if kind == TagKind::End {
                        None
                    } else {
                        *key = self.string()?;
                        Some(kind)
                    }
                }
                OpenContainer::List { element_kind, len, items } => {
                    if let Some(tag) = finished.take() {
                        items.push(tag);
                    }
                    (items.len() < *len).then_some(*element_kind)
                }
            };
            finished = match next {
                Some(kind) => self.value(kind, &mut open)?,
                None => open.pop().map(OpenContainer::close),
            };
        }

        finished.ok_or(NbtError::UnexpectedEof {
            context: "compound",
        })
    }

    /// Reads a complete scalar, or pushes a container onto `open` and returns
    /// `None` until its children have been read.
    fn value(
        &mut self,
        kind: TagKind,
        open: &mut Vec<OpenContainer>,
    ) -> Result<Option<Tag>, NbtError> {
        if matches!(kind, TagKind::Compound | TagKind::List) && open.len() > MAX_DEPTH {
            return Err(NbtError::DepthExceeded);
        }
        let container = match kind {
            TagKind::End => return Err(NbtError::UnknownTag { id: 0 }),
            TagKind::Compound => OpenContainer::Compound {
                compound: Compound::new(),
                key: String::new(),
            },
            TagKind::List => {
                let element_kind = self.kind("list element id")?;
                let len = self.length("list length")?;
                if element_kind == TagKind::End {
                    if len != 0 {
                        return Err(NbtError::NonEmptyEndList { count: len });
                    }
                    return Ok(Some(Tag::List(TagList::empty())));
                }
                if len == 0 {
                    return Ok(Some(Tag::List(TagList::from_decoded(element_kind, Vec::new()))));
                }
                // Pre-allocation is capped by what the remaining input could hold.
                let remaining = self.bytes.len() - self.pos;
                OpenContainer::List {
                    element_kind,
                    len,
                    items: Vec::with_capacity(len.min(remaining)),
                }
            }
            TagKind::Byte => return Ok(Some(Tag::Byte(self.u8("byte")? as i8))),
            TagKind::Short => return Ok(Some(Tag::Short(i16::from_be_bytes(self.array("short")?)))),
            TagKind::Int => return Ok(Some(Tag::Int(self.i32("int")?))),
            TagKind::Long => return Ok(Some(Tag::Long(i64::from_be_bytes(self.array("long")?)))),
            TagKind::Float => return Ok(Some(Tag::Float(f32::from_be_bytes(self.array("float")?)))),
            TagKind::Double => {
                return Ok(Some(Tag::Double(f64::from_be_bytes(self.array("double")?))))
            }
            TagKind::String => return Ok(Some(Tag::String(self.string()?))),
            TagKind::ByteArray => {
                let len = self.length("byte array length")?;
                let raw = self.take(len, "byte array")?;
                return Ok(Some(Tag::ByteArray(raw.iter().map(|byte| *byte as i8).collect())));
            }
            TagKind::IntArray => {
                let len = self.length("int array length")?;
                let raw = self.take(len.saturating_mul(4), "int array")?;
                return Ok(Some(Tag::IntArray(
                    raw.chunks_exact(4)
                        .map(|word| i32::from_be_bytes([word[0], word[1], word[2], word[3]]))
                        .collect(),
                )));
            }
            TagKind::LongArray => {
                let len = self.length("long array length")?;
                let raw = self.take(len.saturating_mul(8), "long array")?;
                return Ok(Some(Tag::LongArray(
                    raw.chunks_exact(8)
                        .map(|word| {
                            let mut buf = [0u8; 8];
                            buf.copy_from_slice(word);
                            i64::from_be_bytes(buf)
                        })
                        .collect(),
                )));
            }
        };
        open.push(container);
        Ok(None)
    }
}

/// A container whose children are still being written.
enum PendingContainer<'a> {
    Compound(std::slice::Iter<'a, (String, Tag)>),
    List(std::slice::Iter<'a, Tag>),
}

fn write_compound_tree(out: &mut Vec<u8>, root: &Compound) -> Result<(), NbtError> {
    let mut pending = vec![PendingContainer::Compound(root.entries().iter())];

    while let Some(top) = pending.last_mut() {
        let next = match top {
            PendingContainer::Compound(entries) => match entries.next() {
                Some((name, tag)) => {
                    out.push(tag.kind().id());
                    write_string(out, name)?;
                    Some(tag)
                }
                None => {
                    out.push(TagKind::End.id());
                    None
                }
            },
            PendingContainer::List(items) => items.next(),
        };
        let Some(tag) = next else {
            pending.pop();
            continue;
        };

        let container = match tag {
            Tag::Compound(compound) => PendingContainer::Compound(compound.entries().iter()),
            Tag::List(list) => {
                out.push(list.element_kind().id());
                write_length(out, list.len())?;
                PendingContainer::List(list.iter())
            }
            Tag::Byte(value) => {
                out.push(*value as u8);
                continue;
            }
            Tag::Short(value) => {
                out.extend_from_slice(&value.to_be_bytes());
                continue;
            }
            Tag::Int(value) => {
                out.extend_from_slice(&value.to_be_bytes());
                continue;
            }
            Tag::Long(value) => {
                out.extend_from_slice(&value.to_be_bytes());
                continue;
            }
            Tag::Float(value) => {
                out.extend_from_slice(&value.to_be_bytes());
                continue;
            }
            Tag::Double(value) => {
                out.extend_from_slice(&value.to_be_bytes());
                continue;
            }
            Tag::ByteArray(values) => {
                write_length(out, values.len())?;
                out.extend(values.iter().map(|byte| *byte as u8));
                continue;
            }
            Tag::String(value) => {
                write_string(out, value)?;
                continue;
            }
            Tag::IntArray(values) => {
                write_length(out, values.len())?;
                for value in values {
                    out.extend_from_slice(&value.to_be_bytes());
                }
                continue;
            }
            Tag::LongArray(values) => {
                write_length(out, values.len())?;
                for value in values {
                    out.extend_from_slice(&value.to_be_bytes());
                }
                continue;
            }
        };

        if pending.len() > MAX_DEPTH {
            return Err(NbtError::DepthExceeded);
        }
        pending.push(container);
    }
    Ok(())
}

fn write_string(out: &mut Vec<u8>, value: &str) -> Result<(), NbtError> {
    let encoded = mutf8::encode(value);
    let len = u16::try_from(encoded.len()).map_err(|_| NbtError::StringTooLong {
        len: encoded.len(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}

fn write_length(out: &mut Vec<u8>, len: usize) -> Result<(), NbtError> {
    let len = i32::try_from(len).map_err(|_| NbtError::LengthOverflow { len })?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}
