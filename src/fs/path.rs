//! Path normalization and tokenization

use crate::error::FsError;
use crate::store::is_valid_entry_name;
use std::fmt;
use std::str::FromStr;

/// A normalized, absolute path inside a snapshot filesystem
///
/// Holds only names, never a node; every access resolves it afresh against the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitPath {
    components: Vec<String>,
}

impl GitPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse and normalize a path string
    ///
    /// A single leading and a single trailing `/` are stripped, `.` is dropped and `..`
    /// pops the previous component (stopping at the root). Any other empty component
    /// (e.g. `a//b`) is rejected.
    pub fn parse(path: &str) -> Result<Self, FsError> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut components: Vec<String> = Vec::new();
        for part in trimmed.split('/') {
            match part {
                "" => {
                    return Err(FsError::InvalidPath(format!(
                        "empty path component in '{}'",
                        path
                    )))
                }
                "." => {}
                ".." => {
                    components.pop();
                }
                name if is_valid_entry_name(name) => components.push(name.to_string()),
                name => {
                    return Err(FsError::InvalidPath(format!(
                        "invalid name '{}' in '{}'",
                        name, path
                    )))
                }
            }
        }
        Ok(Self { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<GitPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Append a single validated name.
    pub fn join(&self, name: &str) -> Result<GitPath, FsError> {
        if !is_valid_entry_name(name) {
            return Err(FsError::InvalidPath(format!("invalid name '{}'", name)));
        }
        let mut components = self.components.clone();
        components.push(name.to_string());
        Ok(Self { components })
    }

    /// Path made of the first `len` components.
    pub fn prefix(&self, len: usize) -> GitPath {
        Self {
            components: self.components[..len.min(self.components.len())].to_vec(),
        }
    }

    /// Returns true if `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &GitPath) -> bool {
        self.components.starts_with(&other.components)
    }
}

impl fmt::Display for GitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for GitPath {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for GitPath {
    type Error = FsError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
