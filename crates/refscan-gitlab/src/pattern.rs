//! Branch name filtering with wildcard include/exclude lists.
//!
//! Patterns are space-separated names where `*` matches any run of
//! characters, e.g. `"main release-*"`. A branch is excluded when it matches
//! no include pattern or any exclude pattern.

use regex::Regex;

use crate::error::{Result, SourceError};

pub const DEFAULT_INCLUDES: &str = "*";
pub const DEFAULT_EXCLUDES: &str = "";

/// Compiled include/exclude filter over branch names.
#[derive(Debug)]
pub struct BranchNameFilter {
    includes: Option<Regex>,
    excludes: Option<Regex>,
}

impl BranchNameFilter {
    pub fn new(includes: &str, excludes: &str) -> Result<Self> {
        Ok(Self {
            includes: compile(includes)?,
            excludes: compile(excludes)?,
        })
    }

    /// Whether the discovery engine should skip this branch name.
    pub fn is_excluded(&self, name: &str) -> bool {
        let included = self
            .includes
            .as_ref()
            .map(|re| re.is_match(name))
            .unwrap_or(false);
        let excluded = self
            .excludes
            .as_ref()
            .map(|re| re.is_match(name))
            .unwrap_or(false);
        !included || excluded
    }
}

impl Default for BranchNameFilter {
    fn default() -> Self {
        Self::new(DEFAULT_INCLUDES, DEFAULT_EXCLUDES)
            .unwrap_or(Self { includes: None, excludes: None })
    }
}

/// Compile a space-separated wildcard list into one anchored alternation.
/// An empty list compiles to `None`, which matches nothing.
fn compile(patterns: &str) -> Result<Option<Regex>> {
    let mut alternatives = Vec::new();
    for pattern in patterns.split_whitespace() {
        let mut expr = String::new();
        for c in pattern.chars() {
            if c == '*' {
                expr.push_str(".*");
            } else {
                expr.push_str(&regex::escape(&c.to_string()));
            }
        }
        alternatives.push(expr);
    }
    if alternatives.is_empty() {
        return Ok(None);
    }
    let joined = format!("^(?:{})$", alternatives.join("|"));
    Regex::new(&joined)
        .map(Some)
        .map_err(|e| SourceError::Config(format!("invalid branch name pattern: {}", e)))
}
