//! Include/exclude classification of watched paths.

use std::path::Path;

use regex::Regex;

use crate::error::{Result, WatchError};

/// Default exclude pattern: VCS metadata and dependency/build folders.
pub const DEFAULT_EXCLUDE: &str = r"((.*)/\.git|\.svn|node_modules|bower_components|/dist)";

/// Default include pattern: everything.
pub const DEFAULT_INCLUDE: &str = "*";

/// Outcome of checking a path against the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The path matches `include` and not `exclude`.
    Forward,

    /// The path does not match `include`.
    NotIncluded,

    /// The path matches `exclude`.
    Excluded,
}

/// Compiled include/exclude pair.
///
/// Both patterns are wrapped as `^(.*)<pattern>(.*)$` so they are tested
/// against the whole path with substring semantics.
#[derive(Debug, Clone)]
pub struct EventFilter {
    include: Regex,
    exclude: Regex,
}

impl EventFilter {
    /// Compile a filter from raw include and exclude patterns.
    pub fn new(include: &str, exclude: &str) -> Result<Self> {
        Ok(Self {
            include: anchored(include)?,
            exclude: anchored(exclude)?,
        })
    }

    /// Classify a path. Exclusion wins over inclusion.
    pub fn decide(&self, path: &Path) -> Decision {
        let path = path.to_string_lossy();

        if self.exclude.is_match(&path) {
            Decision::Excluded
        } else if !self.include.is_match(&path) {
            Decision::NotIncluded
        } else {
            Decision::Forward
        }
    }

    /// Whether a path should be forwarded.
    pub fn accepts(&self, path: &Path) -> bool {
        self.decide(path) == Decision::Forward
    }
}

fn anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(.*){pattern}(.*)$")).map_err(|source| WatchError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
