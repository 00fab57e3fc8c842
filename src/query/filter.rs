//! Filter specifications for session search.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::session::Session;

/// Error raised while building a `FilterSpec` from user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("Invalid date '{value}' for --{option}: expected YYYY-MM-DD")]
    InvalidDate { option: &'static str, value: String },

    #[error("Invalid label filter '{0}': expected KEY=VALUE")]
    InvalidLabel(String),

    #[error("Invalid limit {0}: must be at least 1")]
    InvalidLimit(usize),

    #[error("Invalid timestamp '{value}' for --{option}: expected ISO 8601 or YYYY-MM-DD")]
    InvalidTimestamp { option: &'static str, value: String },

    #[error("Invalid page {0}: pages start at 1")]
    InvalidPage(u32),
}

/// Raw filter options as the user typed them.
///
/// Both the one-shot CLI and the shell fill this in; `FilterSpec::parse`
/// validates it.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub query: Option<String>,
    pub labels: Vec<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub function: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub has_errors: bool,
    pub evals_failed: bool,
    pub limit: Option<usize>,
    pub ids_only: bool,
}

/// Validated search criteria.
///
/// Every criterion is optional; the ones that are set must all hold for a
/// session to match. `limit` and `ids_only` shape the output only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Case-insensitive substring of id, name or any label value, kept
    /// exactly as typed
    pub query: Option<String>,
    /// Label pairs that must all be present verbatim
    pub labels: Vec<(String, String)>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub function: Option<String>,
    /// Inclusive lower bound on the start day (UTC)
    pub after: Option<NaiveDate>,
    /// Inclusive upper bound on the start day (UTC)
    pub before: Option<NaiveDate>,
    pub has_errors: Option<bool>,
    pub evals_failed: Option<bool>,
    pub limit: Option<usize>,
    pub ids_only: bool,
}

impl FilterSpec {
    /// Validates raw options. Malformed dates, labels and limits are
    /// rejected here, before anything is fetched.
    pub fn parse(options: &FilterOptions) -> Result<Self, FilterError> {
        let labels = options
            .labels
            .iter()
            .map(|raw| parse_label(raw))
            .collect::<Result<Vec<_>, _>>()?;

        if options.limit == Some(0) {
            return Err(FilterError::InvalidLimit(0));
        }

        Ok(Self {
            query: options
                .query
                .clone()
                .filter(|q| !q.trim().is_empty()),
            labels,
            provider: non_empty(&options.provider),
            model: non_empty(&options.model),
            function: non_empty(&options.function),
            after: parse_date("after", options.after.as_deref())?,
            before: parse_date("before", options.before.as_deref())?,
            has_errors: options.has_errors.then_some(true),
            evals_failed: options.evals_failed.then_some(true),
            limit: options.limit,
            ids_only: options.ids_only,
        })
    }

    /// Returns true when the session satisfies every criterion.
    pub fn matches(&self, session: &Session) -> bool {
        if let Some(query) = &self.query {
            let needle = query.to_lowercase();
            let found = contains_folded(&session.id, &needle)
                || contains_folded(&session.name, &needle)
                || session
                    .labels
                    .values()
                    .any(|value| contains_folded(value, &needle));
            if !found {
                return false;
            }
        }

        if !self
            .labels
            .iter()
            .all(|(key, value)| session.labels.get(key) == Some(value))
        {
            return false;
        }

        if let Some(provider) = &self.provider {
            let mut seen = session.provider.iter().chain(&session.providers);
            if !seen.any(|p| eq_folded(p, provider)) {
                return false;
            }
        }

        if let Some(model) = &self.model {
            let mut seen = session.model.iter().chain(&session.models);
            if !seen.any(|m| eq_folded(m, model)) {
                return false;
            }
        }

        if let Some(function) = &self.function {
            if !session.functions.iter().any(|f| eq_folded(f, function)) {
                return false;
            }
        }

        let day = session.started_at.date_naive();
        if self.after.is_some_and(|after| day < after) {
            return false;
        }
        if self.before.is_some_and(|before| day > before) {
            return false;
        }

        if self.has_errors.is_some_and(|want| session.has_errors != want) {
            return false;
        }
        if self.evals_failed.is_some_and(|want| session.evals_failed != want) {
            return false;
        }

        true
    }
}

fn parse_label(raw: &str) -> Result<(String, String), FilterError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(FilterError::InvalidLabel(raw.to_string())),
    }
}

fn parse_date(option: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, FilterError> {
    raw.map(|value| {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| FilterError::InvalidDate {
            option,
            value: value.to_string(),
        })
    })
    .transpose()
}

/// Parses an ISO 8601 timestamp or a bare `YYYY-MM-DD` day (midnight UTC).
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(option: &'static str, raw: &str) -> Result<DateTime<Utc>, FilterError> {
    let value = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| FilterError::InvalidTimestamp {
            option,
            value: raw.to_string(),
        })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    haystack.to_lowercase().contains(folded_needle)
}

fn eq_folded(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
