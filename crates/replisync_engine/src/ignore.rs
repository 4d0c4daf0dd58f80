//! Ignore matching.

use std::collections::BTreeSet;

/// Decides which names are administratively excluded from syncing.
///
/// Matching must be pure: the same name always gives the same answer for
/// the lifetime of one folder operation.
pub trait IgnoreMatcher: Send + Sync {
    /// Returns true if `name` is ignored.
    fn should_ignore(&self, name: &str) -> bool;
}

/// Ignores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIgnores;

impl IgnoreMatcher for NoIgnores {
    fn should_ignore(&self, _name: &str) -> bool {
        false
    }
}

/// Ignores exact names and everything below listed directories.
#[derive(Debug, Default, Clone)]
pub struct IgnoreList {
    names: BTreeSet<String>,
    dirs: BTreeSet<String>,
}

impl IgnoreList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignores exactly `name`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    /// Ignores `dir` and every name below it.
    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        let dir: String = dir.into();
        self.dirs.insert(dir.trim_end_matches('/').to_string());
        self
    }
}

impl IgnoreMatcher for IgnoreList {
    fn should_ignore(&self, name: &str) -> bool {
        if self.names.contains(name) {
            return true;
        }
        self.dirs.iter().any(|dir| {
            name.strip_prefix(dir.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ignores() {
        assert!(!NoIgnores.should_ignore("anything"));
    }

    #[test]
    fn names_and_dirs() {
        let ignores = IgnoreList::new().with_name("secret.txt").with_dir("build/");

        assert!(ignores.should_ignore("secret.txt"));
        assert!(!ignores.should_ignore("docs/secret.txt"));
        assert!(ignores.should_ignore("build"));
        assert!(ignores.should_ignore("build/out/app"));
        assert!(!ignores.should_ignore("builder"));
        assert!(!ignores.should_ignore("src/build"));
    }
}
