//! Filtering, sorting, and pagination over the committed arena.
//!
//! All filter fields are optional and combine with AND semantics. The
//! status filter defaults to **accepted only** — automated readers must
//! explicitly opt in to see proposed, rejected, or superseded nodes.
//!
//! Sorting is by a named field with a direction; ties always break by
//! node id ascending, so repeated queries against unchanged state return
//! the same order. `total` is computed before pagination.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;
use crate::graph::GraphView;
use crate::model::node::{Node, NodeKind, NodeStatus};
use crate::model::node_id::NodeId;
use crate::model::relationship::{Direction, RelationshipType};
use crate::store::StoreState;

/// Depth bound for transitive closures (ancestry, dependency chains)
/// when the filter does not set one.
const MAX_CLOSURE_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Named sort fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortField {
    CreatedAt,
    #[default]
    ModifiedAt,
    Title,
    Kind,
    Status,
    Version,
}

impl SortField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created-at",
            Self::ModifiedAt => "modified-at",
            Self::Title => "title",
            Self::Kind => "kind",
            Self::Status => "status",
            Self::Version => "version",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created-at" | "created_at" | "created" => Ok(Self::CreatedAt),
            "modified-at" | "modified_at" | "modified" => Ok(Self::ModifiedAt),
            "title" => Ok(Self::Title),
            "kind" => Ok(Self::Kind),
            "status" => Ok(Self::Status),
            "version" => Ok(Self::Version),
            other => Err(format!("unknown sort field: {other}")),
        }
    }
}

/// Sort direction. Defaults to descending (most recent first under the
/// default sort field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Closed/open date bounds; both ends optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<DateTime<Utc>>,
}

impl DateRange {
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if let Some(after) = self.after {
            if at < after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if at > before {
                return false;
            }
        }
        true
    }
}

/// Which shared text fields a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    Title,
    Content,
    Description,
}

/// Keyword / fielded / fuzzy search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFilter {
    pub query: String,
    /// Restrict the search to these fields; `None` covers all three.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<TextField>>,
    /// Token-level matching tolerant of prefixes and single-character
    /// typos, instead of plain substring containment.
    #[serde(default)]
    pub fuzzy: bool,
}

impl TextFilter {
    #[must_use]
    pub fn keyword(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            fields: None,
            fuzzy: false,
        }
    }
}

/// Relationship-aware lookup: nodes reachable from `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedFilter {
    pub to: NodeId,
    /// Relationship types to follow; `None` follows all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_types: Option<Vec<RelationshipType>>,
    /// Direction as seen from `to`.
    #[serde(default)]
    pub direction: Direction,
    /// Hop bound; defaults to 1 (direct neighbors).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

/// Whether an ancestry query walks up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AncestryDirection {
    /// Nodes the subject points at, transitively (e.g. its parents).
    Ancestors,
    /// Nodes pointing at the subject, transitively (e.g. its children).
    Descendants,
}

/// Ancestor/descendant closure over one relationship type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestryFilter {
    pub of: NodeId,
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
    pub direction: AncestryDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

/// Existence predicate over a node's relationships.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipPredicate {
    /// Required relationship type; `None` accepts any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_type: Option<RelationshipType>,
    /// Required kind of the node on the far end; `None` accepts any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_kind: Option<NodeKind>,
    #[serde(default)]
    pub direction: Direction,
}

/// The full filter surface. All fields optional, AND-combined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<NodeKind>>,
    /// Defaults to accepted-only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<NodeStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextFilter>,
    /// Every listed tag must be present.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_to: Option<RelatedFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestry: Option<AncestryFilter>,
    /// Nodes whose depends-on closure reaches this target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_relationship: Option<RelationshipPredicate>,
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

/// One page of results. `total` counts every match before pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    pub nodes: Vec<Node>,
    pub total: usize,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run a query against one committed snapshot.
pub(crate) fn run(state: &StoreState, config: &QueryConfig, query: &NodeQuery) -> QueryPage {
    let view = GraphView::new(state);

    // Graph-shaped filters resolve to candidate id sets up front.
    let related_ids = query.related_to.as_ref().map(|filter| {
        collect_ids(view.bfs(
            &filter.to,
            filter.rel_types.as_deref(),
            filter.direction,
            filter.max_depth.unwrap_or(1).min(MAX_CLOSURE_DEPTH),
        ))
    });
    let ancestry_ids = query.ancestry.as_ref().map(|filter| {
        let direction = match filter.direction {
            AncestryDirection::Ancestors => Direction::Outgoing,
            AncestryDirection::Descendants => Direction::Incoming,
        };
        collect_ids(view.bfs(
            &filter.of,
            Some(&[filter.rel_type]),
            direction,
            filter.max_depth.unwrap_or(MAX_CLOSURE_DEPTH).min(MAX_CLOSURE_DEPTH),
        ))
    });
    let dependent_ids = query.depends_on.as_ref().map(|target| {
        collect_ids(view.bfs(
            target,
            Some(&[RelationshipType::DependsOn]),
            Direction::Incoming,
            MAX_CLOSURE_DEPTH,
        ))
    });

    let mut matches: Vec<&Node> = state
        .nodes
        .iter()
        .filter(|node| {
            matches_filters(
                node,
                query,
                &view,
                related_ids.as_ref(),
                ancestry_ids.as_ref(),
                dependent_ids.as_ref(),
            )
        })
        .collect();

    matches.sort_by(|a, b| {
        let ordering = match query.sort_by {
            SortField::CreatedAt => a.metadata.created_at.cmp(&b.metadata.created_at),
            SortField::ModifiedAt => a.metadata.modified_at.cmp(&b.metadata.modified_at),
            SortField::Title => a.title.cmp(&b.title),
            SortField::Kind => a.kind().as_str().cmp(b.kind().as_str()),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::Version => a.metadata.version.cmp(&b.metadata.version),
        };
        let directed = match query.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        // Deterministic tie-break, always ascending by id.
        directed.then_with(|| a.id.cmp(&b.id))
    });

    let total = matches.len();
    let limit = query
        .limit
        .unwrap_or(config.default_limit)
        .min(config.max_limit);
    let offset = query.offset;

    let nodes: Vec<Node> = matches
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect();
    let has_more = (offset as usize).saturating_add(nodes.len()) < total;

    QueryPage {
        nodes,
        total,
        limit,
        offset,
        has_more,
    }
}

fn collect_ids(reached: Vec<(NodeId, usize)>) -> HashSet<NodeId> {
    reached.into_iter().map(|(id, _)| id).collect()
}

#[allow(clippy::too_many_lines)]
fn matches_filters(
    node: &Node,
    query: &NodeQuery,
    view: &GraphView<'_>,
    related_ids: Option<&HashSet<NodeId>>,
    ancestry_ids: Option<&HashSet<NodeId>>,
    dependent_ids: Option<&HashSet<NodeId>>,
) -> bool {
    // Status first: accepted-only unless the caller opted in.
    match &query.statuses {
        Some(statuses) => {
            if !statuses.contains(&node.status) {
                return false;
            }
        }
        None => {
            if node.status != NodeStatus::Accepted {
                return false;
            }
        }
    }

    if let Some(kinds) = &query.kinds {
        if !kinds.contains(&node.kind()) {
            return false;
        }
    }

    if let Some(namespace) = &query.namespace {
        if node.id.namespace() != Some(namespace.as_str()) {
            return false;
        }
    }

    if !query.tags.is_empty()
        && !query.tags.iter().all(|tag| node.metadata.tags.contains(tag))
    {
        return false;
    }

    if let Some(creator) = &query.created_by {
        if &node.metadata.created_by != creator {
            return false;
        }
    }
    if let Some(modifier) = &query.modified_by {
        if &node.metadata.modified_by != modifier {
            return false;
        }
    }
    if let Some(range) = &query.created {
        if !range.contains(node.metadata.created_at) {
            return false;
        }
    }
    if let Some(range) = &query.modified {
        if !range.contains(node.metadata.modified_at) {
            return false;
        }
    }

    if let Some(filter) = &query.text {
        if !text_matches(filter, node) {
            return false;
        }
    }

    if let Some(ids) = related_ids {
        if !ids.contains(&node.id) {
            return false;
        }
    }
    if let Some(ids) = ancestry_ids {
        if !ids.contains(&node.id) {
            return false;
        }
    }
    if let Some(ids) = dependent_ids {
        if !ids.contains(&node.id) {
            return false;
        }
    }

    if let Some(predicate) = &query.has_relationship {
        if !satisfies_predicate(node, predicate, view) {
            return false;
        }
    }

    true
}

fn satisfies_predicate(
    node: &Node,
    predicate: &RelationshipPredicate,
    view: &GraphView<'_>,
) -> bool {
    let types_storage;
    let types: Option<&[RelationshipType]> = match predicate.rel_type {
        Some(rel_type) => {
            types_storage = [rel_type];
            Some(&types_storage)
        }
        None => None,
    };
    view.neighbors(&node.id, types, predicate.direction)
        .into_iter()
        .any(|(_, other)| match predicate.target_kind {
            Some(kind) => view.node(&other).is_some_and(|n| n.kind() == kind),
            None => true,
        })
}

// ---------------------------------------------------------------------------
// Text matching
// ---------------------------------------------------------------------------

fn text_matches(filter: &TextFilter, node: &Node) -> bool {
    let all = [TextField::Title, TextField::Content, TextField::Description];
    let fields: &[TextField] = match &filter.fields {
        Some(fields) => fields,
        None => &all,
    };

    let needle = filter.query.to_lowercase();
    if needle.trim().is_empty() {
        return true;
    }

    let field_text = |field: TextField| -> Option<String> {
        match field {
            TextField::Title => Some(node.title.to_lowercase()),
            TextField::Content => Some(node.content.to_lowercase()),
            TextField::Description => node.description.as_ref().map(|d| d.to_lowercase()),
        }
    };

    if filter.fuzzy {
        // Every query token must match some field token by equality,
        // prefix, or a single-character edit.
        let haystack: Vec<String> = fields
            .iter()
            .filter_map(|&f| field_text(f))
            .flat_map(|text| {
                text.split(|c: char| !c.is_alphanumeric())
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        needle
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .all(|token| haystack.iter().any(|word| token_matches(word, token)))
    } else {
        fields
            .iter()
            .filter_map(|&f| field_text(f))
            .any(|text| text.contains(&needle))
    }
}

fn token_matches(word: &str, token: &str) -> bool {
    word == token || word.starts_with(token) || within_one_edit(word, token)
}

/// Levenshtein distance ≤ 1, without building the full matrix.
fn within_one_edit(a: &str, b: &str) -> bool {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (longer, shorter) = if a_chars.len() >= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };
    match longer.len() - shorter.len() {
        0 => {
            // Same length: at most one substitution.
            longer
                .iter()
                .zip(shorter.iter())
                .filter(|(x, y)| x != y)
                .count()
                <= 1
        }
        1 => {
            // One insertion: skip one char of the longer string.
            let mut mismatch_seen = false;
            let (mut i, mut j) = (0usize, 0usize);
            while i < longer.len() && j < shorter.len() {
                if longer[i] == shorter[j] {
                    i += 1;
                    j += 1;
                } else if mismatch_seen {
                    return false;
                } else {
                    mismatch_seen = true;
                    i += 1;
                }
            }
            true
        }
        _ => false,
    }
}
