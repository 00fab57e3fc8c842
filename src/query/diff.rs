//! Side-by-side comparison of two sessions.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::session::Session;

/// A scalar field whose value differs between the two sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub left: String,
    pub right: String,
}

/// A label present on either side with differing values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelChange {
    pub key: String,
    pub left: Option<String>,
    pub right: Option<String>,
}

/// Differences between two sessions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDiff {
    pub left: Session,
    pub right: Session,
    pub fields: Vec<FieldChange>,
    pub labels: Vec<LabelChange>,
    pub functions_only_left: Vec<String>,
    pub functions_only_right: Vec<String>,
}

impl SessionDiff {
    pub fn new(left: Session, right: Session) -> Self {
        let fields = compare_fields(&left, &right);
        let labels = compare_labels(&left, &right);
        let functions_only_left = left
            .functions
            .difference(&right.functions)
            .cloned()
            .collect();
        let functions_only_right = right
            .functions
            .difference(&left.functions)
            .cloned()
            .collect();

        Self {
            left,
            right,
            fields,
            labels,
            functions_only_left,
            functions_only_right,
        }
    }

    /// True when nothing but the id differs.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.labels.is_empty()
            && self.functions_only_left.is_empty()
            && self.functions_only_right.is_empty()
    }
}

fn compare_fields(left: &Session, right: &Session) -> Vec<FieldChange> {
    let duration = |s: &Session| {
        s.duration()
            .map(|d| format!("{:.1}s", d.num_milliseconds() as f64 / 1000.0))
            .unwrap_or_else(|| "-".to_string())
    };
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    let candidates = [
        ("name", left.name.clone(), right.name.clone()),
        ("duration", duration(left), duration(right)),
        ("provider", optional(&left.provider), optional(&right.provider)),
        ("model", optional(&left.model), optional(&right.model)),
        (
            "llm_calls",
            left.llm_calls.to_string(),
            right.llm_calls.to_string(),
        ),
        (
            "function_calls",
            left.function_calls.to_string(),
            right.function_calls.to_string(),
        ),
        (
            "has_errors",
            left.has_errors.to_string(),
            right.has_errors.to_string(),
        ),
        (
            "evals_failed",
            left.evals_failed.to_string(),
            right.evals_failed.to_string(),
        ),
    ];

    candidates
        .into_iter()
        .filter(|(_, l, r)| l != r)
        .map(|(field, left, right)| FieldChange { field, left, right })
        .collect()
}

fn compare_labels(left: &Session, right: &Session) -> Vec<LabelChange> {
    let keys: BTreeSet<&String> = left.labels.keys().chain(right.labels.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let l = left.labels.get(key);
            let r = right.labels.get(key);
            (l != r).then(|| LabelChange {
                key: key.clone(),
                left: l.cloned(),
                right: r.cloned(),
            })
        })
        .collect()
}
