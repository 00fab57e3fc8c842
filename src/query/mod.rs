//! Session query engine.
//!
//! Applies a `FilterSpec` to sessions already fetched from a provider:
//! filters, orders (most recent first, ties by id), then applies the
//! `limit` and `ids_only` projections. No I/O happens here.

pub mod diff;
pub mod filter;

pub use diff::{FieldChange, LabelChange, SessionDiff};
pub use filter::{FilterError, FilterOptions, FilterSpec};

use std::collections::HashSet;

use crate::session::Session;

/// Result of running a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Full session records
    Sessions(Vec<Session>),
    /// Ids only, in result order
    Ids(Vec<String>),
}

impl QueryOutput {
    pub fn len(&self) -> usize {
        match self {
            QueryOutput::Sessions(sessions) => sessions.len(),
            QueryOutput::Ids(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns every matching session in result order, ignoring `limit` and
/// `ids_only`.
///
/// Duplicate ids keep their first matching occurrence.
pub fn select<I>(spec: &FilterSpec, sessions: I) -> Vec<Session>
where
    I: IntoIterator<Item = Session>,
{
    let mut seen = HashSet::new();
    let mut matched: Vec<Session> = sessions
        .into_iter()
        .filter(|s| spec.matches(s))
        .filter(|s| seen.insert(s.id.clone()))
        .collect();

    matched.sort_by(|a, b| {
        b.started_at
            .cmp(&a.started_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    matched
}

/// Runs a full query: select, then truncate and project.
pub fn execute<I>(spec: &FilterSpec, sessions: I) -> QueryOutput
where
    I: IntoIterator<Item = Session>,
{
    let mut matched = select(spec, sessions);
    if let Some(limit) = spec.limit {
        matched.truncate(limit);
    }

    tracing::debug!(matched = matched.len(), "Query complete");

    if spec.ids_only {
        QueryOutput::Ids(matched.into_iter().map(|s| s.id).collect())
    } else {
        QueryOutput::Sessions(matched)
    }
}
