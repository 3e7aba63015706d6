//! Permission Evaluation
//!
//! Declarative permission requirements evaluated against the granted set
//! from the current session. Requirements come in three shapes:
//!
//! - a bare name: `"view users"`
//! - an ordered collection (implicitly AND): `["view users", "view rooms"]`
//! - a wrapper: `{"any": [...]}` (OR) or `{"all": [...]}` (AND), each
//!   accepting a single name or a collection
//!
//! Names are compared case-insensitively after trimming whitespace. An
//! empty requirement is vacuously true.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One name or a collection of names inside an `any`/`all` wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameList {
    One(String),
    Many(Vec<String>),
}

impl NameList {
    fn names(&self) -> &[String] {
        match self {
            NameList::One(name) => std::slice::from_ref(name),
            NameList::Many(names) => names,
        }
    }
}

/// A declarative permission requirement supplied per UI binding
///
/// Wrapper variants come first so untagged deserialization tries the
/// object shapes before falling back to a bare string or list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionRequirement {
    /// At least one of the names must be granted
    Any { any: NameList },
    /// Every name must be granted
    All { all: NameList },
    /// A single required name
    One(String),
    /// Every name must be granted (implicit AND)
    Many(Vec<String>),
}

impl PermissionRequirement {
    /// OR requirement over the given names
    pub fn any<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Any {
            any: NameList::Many(names.into_iter().map(Into::into).collect()),
        }
    }

    /// AND requirement over the given names
    pub fn all<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::All {
            all: NameList::Many(names.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<&str> for PermissionRequirement {
    fn from(name: &str) -> Self {
        Self::One(name.to_string())
    }
}

impl From<Vec<String>> for PermissionRequirement {
    fn from(names: Vec<String>) -> Self {
        Self::Many(names)
    }
}

/// Normalize a permission name for comparison
fn norm(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Evaluate a requirement against the granted permission names
///
/// Pure: reads nothing but its arguments.
pub fn evaluate(requirement: &PermissionRequirement, granted: &[String]) -> bool {
    let granted: HashSet<String> = granted.iter().map(|name| norm(name)).collect();

    match requirement {
        PermissionRequirement::Any { any } => any
            .names()
            .iter()
            .any(|name| granted.contains(&norm(name))),
        PermissionRequirement::All { all } => all
            .names()
            .iter()
            .all(|name| granted.contains(&norm(name))),
        PermissionRequirement::One(name) => granted.contains(&norm(name)),
        PermissionRequirement::Many(names) => {
            names.iter().all(|name| granted.contains(&norm(name)))
        }
    }
}
