//! Dotted property paths for addressing within configuration documents
//!
//! Provides [`PropertyPath`] for hierarchical addressing of configuration
//! fields (`base.deviceId`, `component.color`). Paths are used by templates
//! (parameter substitution), the execution-trigger registry, and interaction
//! response bucketing.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde_json::Value;

use crate::document::ConfigSection;

/// Path within a configuration document
///
/// Hierarchical addressing using string segments joined by `.`.
/// The first segment may name a configuration section (layer prefix
/// convention: `component.color` targets the `component` layer).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyPath(Vec<String>);

impl PropertyPath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Create path from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    /// Empty path (document root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment (if not root)
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Append a segment, returning a new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        self.0 == other.0[..self.0.len()]
    }

    /// Split a leading section name off the path
    ///
    /// `component.color` → `(ConfigSection::Component, color)`.
    /// Returns `None` when the first segment is not a section name.
    #[must_use]
    pub fn split_section(&self) -> Option<(ConfigSection, PropertyPath)> {
        let head = self.first()?;
        let section = head.parse::<ConfigSection>().ok()?;
        Some((section, Self(self.0[1..].to_vec())))
    }

    /// Resolve the value this path addresses inside a JSON document
    ///
    /// Returns `None` when any intermediate segment is missing or not an
    /// object. The root path resolves to the document itself.
    #[must_use]
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.0 {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Assign a value at this path inside a JSON document
    ///
    /// Missing intermediate objects are created. Traversing through a
    /// non-object scalar is an error rather than a silent overwrite.
    ///
    /// # Errors
    /// Returns [`PathError::NotAnObject`] if an intermediate segment exists
    /// but is not an object, or the path is the root.
    pub fn assign(&self, root: &mut Value, new_value: Value) -> Result<(), PathError> {
        let Some((last, intermediate)) = self.0.split_last() else {
            return Err(PathError::NotAnObject {
                at: "<root>".to_string(),
            });
        };

        let mut current = root;
        let mut walked = Vec::with_capacity(intermediate.len());
        for segment in intermediate {
            walked.push(segment.clone());
            let map = current.as_object_mut().ok_or_else(|| PathError::NotAnObject {
                at: walked.join("."),
            })?;
            current = map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
        }

        let map = current.as_object_mut().ok_or_else(|| PathError::NotAnObject {
            at: self.to_string(),
        })?;
        map.insert(last.clone(), new_value);
        Ok(())
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Display for PropertyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for PropertyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let segments: Vec<String> = s
            .split('.')
            .map(|seg| {
                if seg.is_empty() {
                    Err(PathError::EmptySegment)
                } else if seg.contains(|c: char| !c.is_alphanumeric() && c != '_') {
                    Err(PathError::InvalidSegment(seg.to_string()))
                } else {
                    Ok(seg.to_string())
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

impl From<Vec<String>> for PropertyPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl Default for PropertyPath {
    fn default() -> Self {
        Self::root()
    }
}

/// Errors related to property paths
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("path contains empty segment")]
    EmptySegment,

    /// Invalid segment characters
    #[error("invalid segment: {0} (must be alphanumeric or underscore)")]
    InvalidSegment(String),

    /// Intermediate value is not an object
    #[error("cannot descend into non-object at '{at}'")]
    NotAnObject {
        /// Dotted prefix where traversal stopped
        at: String,
    },
}
