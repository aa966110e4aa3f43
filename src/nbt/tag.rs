use std::fmt;

/// Wire id of each payload kind. `End` only appears as a compound terminator
/// or as the element kind of an empty list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagKind {
    End,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    ByteArray,
    String,
    List,
    Compound,
    IntArray,
    LongArray,
}

impl TagKind {
    pub fn id(self) -> u8 {
        match self {
            TagKind::End => 0,
            TagKind::Byte => 1,
            TagKind::Short => 2,
            TagKind::Int => 3,
            TagKind::Long => 4,
            TagKind::Float => 5,
            TagKind::Double => 6,
            TagKind::ByteArray => 7,
            TagKind::String => 8,
            TagKind::List => 9,
            TagKind::Compound => 10,
            TagKind::IntArray => 11,
            TagKind::LongArray => 12,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => TagKind::End,
            1 => TagKind::Byte,
            2 => TagKind::Short,
            3 => TagKind::Int,
            4 => TagKind::Long,
            5 => TagKind::Float,
            6 => TagKind::Double,
            7 => TagKind::ByteArray,
            8 => TagKind::String,
            9 => TagKind::List,
            10 => TagKind::Compound,
            11 => TagKind::IntArray,
            12 => TagKind::LongArray,
            _ => return None,
        })
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagKind::End => "End",
            TagKind::Byte => "Byte",
            TagKind::Short => "Short",
            TagKind::Int => "Int",
            TagKind::Long => "Long",
            TagKind::Float => "Float",
            TagKind::Double => "Double",
            TagKind::ByteArray => "ByteArray",
            TagKind::String => "String",
            TagKind::List => "List",
            TagKind::Compound => "Compound",
            TagKind::IntArray => "IntArray",
            TagKind::LongArray => "LongArray",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("missing key `{key}`")]
    KeyNotFound { key: String },
    #[error("`{key}` is {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: TagKind,
        found: TagKind,
    },
    #[error("list declared as {declared} cannot hold {found}")]
    HeterogeneousList { declared: TagKind, found: TagKind },
    #[error("list index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// One decoded payload value. Names live on the enclosing [`Compound`] entry
/// or on the [`NamedTag`] root; list elements have none.
#[derive(Clone, Debug)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(TagList),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::Byte(_) => TagKind::Byte,
            Tag::Short(_) => TagKind::Short,
            Tag::Int(_) => TagKind::Int,
            Tag::Long(_) => TagKind::Long,
            Tag::Float(_) => TagKind::Float,
            Tag::Double(_) => TagKind::Double,
            Tag::ByteArray(_) => TagKind::ByteArray,
            Tag::String(_) => TagKind::String,
            Tag::List(_) => TagKind::List,
            Tag::Compound(_) => TagKind::Compound,
            Tag::IntArray(_) => TagKind::IntArray,
            Tag::LongArray(_) => TagKind::LongArray,
        }
    }

    /// Same kind, new value. Fails if `value` is a different kind.
    pub fn with_value(&self, value: Tag) -> Result<Tag, TagError> {
        if value.kind() != self.kind() {
            return Err(TagError::TypeMismatch {
                key: String::new(),
                expected: self.kind(),
                found: value.kind(),
            });
        }
        Ok(value)
    }
}

// Floats compare by bit pattern so a decoded tree always equals itself and
// re-encodes to the same bytes.
impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Tag::Byte(a), Tag::Byte(b)) => a == b,
            (Tag::Short(a), Tag::Short(b)) => a == b,
            (Tag::Int(a), Tag::Int(b)) => a == b,
            (Tag::Long(a), Tag::Long(b)) => a == b,
            (Tag::Float(a), Tag::Float(b)) => a.to_bits() == b.to_bits(),
            (Tag::Double(a), Tag::Double(b)) => a.to_bits() == b.to_bits(),
            (Tag::ByteArray(a), Tag::ByteArray(b)) => a == b,
            (Tag::String(a), Tag::String(b)) => a == b,
            (Tag::List(a), Tag::List(b)) => a == b,
            (Tag::Compound(a), Tag::Compound(b)) => a == b,
            (Tag::IntArray(a), Tag::IntArray(b)) => a == b,
            (Tag::LongArray(a), Tag::LongArray(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Compound> for Tag {
    fn from(compound: Compound) -> Self {
        Tag::Compound(compound)
    }
}

impl From<TagList> for Tag {
    fn from(list: TagList) -> Self {
        Tag::List(list)
    }
}

/// Homogeneous list; every element has the declared kind.
#[derive(Clone, Debug, PartialEq)]
pub struct TagList {
    element_kind: TagKind,
    items: Vec<Tag>,
}

impl TagList {
    pub fn empty() -> Self {
        Self {
            element_kind: TagKind::End,
            items: Vec::new(),
        }
    }

    pub fn new(element_kind: TagKind, items: Vec<Tag>) -> Result<Self, TagError> {
        if let Some(bad) = items.iter().find(|item| item.kind() != element_kind) {
            return Err(TagError::HeterogeneousList {
                declared: element_kind,
                found: bad.kind(),
            });
        }
        Ok(Self {
            element_kind,
            items,
        })
    }

    /// Caller guarantees every item already has `element_kind`.
    pub(crate) fn from_decoded(element_kind: TagKind, items: Vec<Tag>) -> Self {
        debug_assert!(items.iter().all(|item| item.kind() == element_kind));
        Self {
            element_kind,
            items,
        }
    }

    pub fn element_kind(&self) -> TagKind {
        self.element_kind
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Result<&Tag, TagError> {
        self.items.get(index).ok_or(TagError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    pub fn get_double(&self, index: usize) -> Result<f64, TagError> {
        match self.get(index)? {
            Tag::Double(value) => Ok(*value),
            other => Err(TagError::TypeMismatch {
                key: format!("[{index}]"),
                expected: TagKind::Double,
                found: other.kind(),
            }),
        }
    }
}

/// Ordered name -> tag map. Keys are unique; iteration follows insertion order.
#[derive(Clone, Debug, Default)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Inserts or replaces in place, keeping the original slot of an existing
    /// key. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, tag: Tag) -> Option<Tag> {
        let key = key.into();
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, tag)),
            None => {
                self.entries.push((key, tag));
                None
            }
        }
    }

    pub fn with(mut self, key: impl Into<String>, tag: Tag) -> Self {
        self.insert(key, tag);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.position(key).map(|index| &self.entries[index].1)
    }

    pub fn require(&self, key: &str) -> Result<&Tag, TagError> {
        self.get(key).ok_or_else(|| TagError::KeyNotFound {
            key: key.to_string(),
        })
    }

    pub fn get_int(&self, key: &str) -> Result<i32, TagError> {
        match self.require(key)? {
            Tag::Int(value) => Ok(*value),
            other => Err(self.mismatch(key, TagKind::Int, other)),
        }
    }

    pub fn get_long(&self, key: &str) -> Result<i64, TagError> {
        match self.require(key)? {
            Tag::Long(value) => Ok(*value),
            other => Err(self.mismatch(key, TagKind::Long, other)),
        }
    }

    pub fn get_double(&self, key: &str) -> Result<f64, TagError> {
        match self.require(key)? {
            Tag::Double(value) => Ok(*value),
            other => Err(self.mismatch(key, TagKind::Double, other)),
        }
    }

    pub fn get_list(&self, key: &str) -> Result<&TagList, TagError> {
        match self.require(key)? {
            Tag::List(list) => Ok(list),
            other => Err(self.mismatch(key, TagKind::List, other)),
        }
    }

    pub fn get_compound(&self, key: &str) -> Result<&Compound, TagError> {
        match self.require(key)? {
            Tag::Compound(compound) => Ok(compound),
            other => Err(self.mismatch(key, TagKind::Compound, other)),
        }
    }

    /// Copies every entry of `source` whose key is not already present, in
    /// `source` order.
    pub fn merge_absent(&mut self, source: &Compound) {
        for (key, tag) in &source.entries {
            if !self.contains_key(key) {
                self.entries.push((key.clone(), tag.clone()));
            }
        }
    }

    pub(crate) fn entries(&self) -> &[(String, Tag)] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(existing, _)| existing == key)
    }

    fn mismatch(&self, key: &str, expected: TagKind, found: &Tag) -> TagError {
        TagError::TypeMismatch {
            key: key.to_string(),
            expected,
            found: found.kind(),
        }
    }
}

impl PartialEq for Compound {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(key, tag)| other.get(key) == Some(tag))
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<I: IntoIterator<Item = (String, Tag)>>(iter: I) -> Self {
        let mut compound = Compound::new();
        for (key, tag) in iter {
            compound.insert(key, tag);
        }
        compound
    }
}

/// Root of a payload: a tag together with its own name (usually empty).
#[derive(Clone, Debug, PartialEq)]
pub struct NamedTag {
    pub name: String,
    pub tag: Tag,
}

impl NamedTag {
    pub fn new(name: impl Into<String>, tag: Tag) -> Self {
        Self {
            name: name.into(),
            tag,
        }
    }

    pub fn compound(&self) -> Result<&Compound, TagError> {
        match &self.tag {
            Tag::Compound(compound) => Ok(compound),
            other => Err(TagError::TypeMismatch {
                key: self.name.clone(),
                expected: TagKind::Compound,
                found: other.kind(),
            }),
        }
    }
}
