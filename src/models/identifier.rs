//! Hierarchical node identifiers
//!
//! An identifier is an ordered list of `(kind, name)` segments. The textual
//! form joins `kind:name` pairs with `/`, e.g. `Container:Inner/Test:innerPass`.
//! The root has no segments and an empty path.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AggregateError, AggregateResult};

/// Kind of a single identifier segment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentKind {
    Container,
    Test,
    Dynamic,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Container => "Container",
            SegmentKind::Test => "Test",
            SegmentKind::Dynamic => "Dynamic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Container" => Some(SegmentKind::Container),
            "Test" => Some(SegmentKind::Test),
            "Dynamic" => Some(SegmentKind::Dynamic),
            _ => None,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(kind, name)` step in an identifier path
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    pub kind: SegmentKind,
    pub name: String,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Immutable identifier of a container, test or dynamic node
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    segments: Vec<Segment>,
}

impl Identifier {
    /// The synthetic run root
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Derive a child identifier
    pub fn child(&self, kind: SegmentKind, name: impl Into<String>) -> AggregateResult<Self> {
        let name = name.into();
        validate_name(&name)?;

        if let Some(last) = self.segments.last() {
            if last.kind == SegmentKind::Test {
                return Err(AggregateError::invalid_id(format!(
                    "test '{self}' cannot have children"
                )));
            }
        }

        let mut segments = self.segments.clone();
        segments.push(Segment { kind, name });
        Ok(Self { segments })
    }

    /// Identifier of the `index`-th dynamic child, e.g. `Dynamic:#3`
    pub fn dynamic_child(&self, index: u32) -> AggregateResult<Self> {
        self.child(SegmentKind::Dynamic, format!("#{index}"))
    }

    /// Parse the slash-joined `kind:name` form
    pub fn parse(path: &str) -> AggregateResult<Self> {
        if path.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for raw in path.split('/') {
            let (kind, name) = raw.split_once(':').ok_or_else(|| {
                AggregateError::invalid_id(format!("segment '{raw}' in '{path}' has no kind"))
            })?;
            let kind = SegmentKind::from_str(kind).ok_or_else(|| {
                AggregateError::invalid_id(format!("unknown segment kind '{kind}' in '{path}'"))
            })?;
            validate_name(name)?;
            if segments
                .last()
                .map(|s: &Segment| s.kind == SegmentKind::Test)
                .unwrap_or(false)
            {
                return Err(AggregateError::invalid_id(format!(
                    "'{path}' descends from a test segment"
                )));
            }
            segments.push(Segment {
                kind,
                name: name.to_string(),
            });
        }

        Ok(Self { segments })
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Strict descendant check; an identifier is not its own descendant
    pub fn is_descendant_of(&self, ancestor: &Identifier) -> bool {
        self.segments.len() > ancestor.segments.len()
            && self.segments[..ancestor.segments.len()] == ancestor.segments[..]
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Name of the last segment (empty for the root)
    pub fn name(&self) -> &str {
        self.segments.last().map(|s| s.name.as_str()).unwrap_or("")
    }

    /// Index encoded in a `Dynamic:#n` last segment
    pub fn dynamic_index(&self) -> Option<u32> {
        let last = self.segments.last()?;
        if last.kind != SegmentKind::Dynamic {
            return None;
        }
        let digits = last.name.strip_prefix('#')?;
        let index: u32 = digits.parse().ok()?;
        // `#01` and `#+1` would alias `#1`
        (index.to_string() == digits).then_some(index)
    }

    /// Textual path; the root is the empty string
    pub fn path(&self) -> String {
        self.segments
            .iter()
            .map(Segment::to_string)
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn validate_name(name: &str) -> AggregateResult<()> {
    if name.is_empty() {
        return Err(AggregateError::invalid_id("empty segment name"));
    }
    if name.contains('/') {
        return Err(AggregateError::invalid_id(format!(
            "segment name '{name}' contains '/'"
        )));
    }
    Ok(())
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.path())
        }
    }
}

impl TryFrom<String> for Identifier {
    type Error = AggregateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.path()
    }
}
