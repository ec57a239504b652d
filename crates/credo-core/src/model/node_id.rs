//! Stable node identity.
//!
//! A [`NodeId`] is a `(namespace, id)` pair. The namespace is optional;
//! uniqueness is per `(namespace, id)`. The textual form is `namespace/id`
//! (or the bare `id` when no namespace is set) and must survive any
//! re-projection of the store, so both components are validated at
//! construction: non-empty, no whitespace, no `/`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Identity of a node, unique per `(namespace, id)`.
///
/// Ordered so it can serve as a deterministic sort tie-break and as a
/// `BTreeMap` key. Namespaced ids sort after un-namespaced ones with the
/// same bare id (derived ordering over `(id, namespace)` tuples is avoided
/// in favor of the rendered form, which is what callers see).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    id: String,
    namespace: Option<String>,
}

/// Error returned when a node id component fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidNodeId {
    pub component: &'static str,
    pub got: String,
    pub reason: &'static str,
}

impl fmt::Display for InvalidNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid node id {}: '{}' ({})",
            self.component, self.got, self.reason
        )
    }
}

impl std::error::Error for InvalidNodeId {}

fn validate_component(component: &'static str, value: &str) -> Result<(), InvalidNodeId> {
    if value.is_empty() {
        return Err(InvalidNodeId {
            component,
            got: value.to_string(),
            reason: "must not be empty",
        });
    }
    if value.chars().any(char::is_whitespace) {
        return Err(InvalidNodeId {
            component,
            got: value.to_string(),
            reason: "must not contain whitespace",
        });
    }
    if value.contains('/') {
        return Err(InvalidNodeId {
            component,
            got: value.to_string(),
            reason: "must not contain '/'",
        });
    }
    Ok(())
}

impl NodeId {
    /// Create a validated node id.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidNodeId`] if either component is empty, contains
    /// whitespace, or contains `/`.
    pub fn new(
        id: impl Into<String>,
        namespace: Option<String>,
    ) -> Result<Self, InvalidNodeId> {
        let id = id.into();
        validate_component("id", &id)?;
        if let Some(ns) = &namespace {
            validate_component("namespace", ns)?;
        }
        Ok(Self { id, namespace })
    }

    /// Construct without validation. For test fixtures and trusted callers
    /// (e.g. ids read back from the record store, which were validated on
    /// the way in).
    #[must_use]
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: None,
        }
    }

    /// Construct a namespaced id without validation.
    #[must_use]
    pub fn namespaced_unchecked(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// The bare id component.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The namespace component, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.id),
            None => f.write_str(&self.id),
        }
    }
}

impl FromStr for NodeId {
    type Err = InvalidNodeId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((ns, id)) => Self::new(id, Some(ns.to_string())),
            None => Self::new(s, None),
        }
    }
}

// Ordering over the rendered form keeps sort output identical to what
// callers see in listings.
impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.namespace.as_deref(), self.id.as_str())
            .cmp(&(other.namespace.as_deref(), other.id.as_str()))
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Custom serde: a node id is a string on the wire.
impl Serialize for NodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// WorkspaceId
// ---------------------------------------------------------------------------

/// The tenancy boundary a store instance is scoped to.
///
/// One store owns exactly one workspace; no API accepts a foreign one, so
/// cross-workspace access is structurally impossible rather than filtered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Create a workspace id. Empty input falls back to `"default"`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.is_empty() {
            Self("default".to_string())
        } else {
            Self(id)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
