//! Deterministic selection and ordering of review records.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::{ReviewRecord, ReviewStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    Pending,
    Approved,
    Rejected,
    All,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::Pending => "pending",
            StatusFilter::Approved => "approved",
            StatusFilter::Rejected => "rejected",
            StatusFilter::All => "all",
        }
    }

    pub fn admits(&self, status: ReviewStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == ReviewStatus::Pending,
            StatusFilter::Approved => status == ReviewStatus::Approved,
            StatusFilter::Rejected => status == ReviewStatus::Rejected,
        }
    }
}

/// Criteria narrowing the displayed reviews. Every present bound is
/// inclusive and all criteria must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewFilter {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_score_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_score_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ReviewFilter {
    pub fn matches(&self, record: &ReviewRecord) -> bool {
        let score = record.invite.fraud_score;

        self.status.admits(record.review_status)
            && self.fraud_score_min.map_or(true, |min| score >= min)
            && self.fraud_score_max.map_or(true, |max| score <= max)
            && self.date_from.map_or(true, |from| record.flagged_at() >= from)
            && self.date_to.map_or(true, |to| record.flagged_at() <= to)
            && self.search_term().map_or(true, |term| matches_search(record, &term))
    }

    /// Lower-cased search term; blank input imposes no restriction.
    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    /// Query parameters understood by `GET /reviews`.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("status", self.status.as_str().to_string())];
        if let Some(min) = self.fraud_score_min {
            pairs.push(("fraud_score_min", min.to_string()));
        }
        if let Some(max) = self.fraud_score_max {
            pairs.push(("fraud_score_max", max.to_string()));
        }
        if let Some(from) = self.date_from {
            pairs.push(("date_from", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(to) = self.date_to {
            pairs.push(("date_to", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(term) = self.search_term() {
            pairs.push(("search", term));
        }
        pairs
    }
}

fn matches_search(record: &ReviewRecord, term: &str) -> bool {
    [
        record.invite.inviter.email.as_str(),
        record.invite.invitee.email.as_str(),
        record.invite.invite_code.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(term))
}

/// Display order: newest first, ties broken by ascending id.
pub fn display_order(a: &ReviewRecord, b: &ReviewRecord) -> Ordering {
    b.flagged_at()
        .cmp(&a.flagged_at())
        .then_with(|| a.id.cmp(&b.id))
}

/// Records admitted by `filter`, in display order.
pub fn select(records: &[ReviewRecord], filter: &ReviewFilter) -> Vec<ReviewRecord> {
    let mut selected: Vec<ReviewRecord> = records
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect();
    selected.sort_by(display_order);
    selected
}

/// Per-status counts for the dashboard summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl ReviewStats {
    pub fn from_records(records: &[ReviewRecord]) -> Self {
        records.iter().fold(Self::default(), |mut stats, record| {
            stats.total += 1;
            match record.review_status {
                ReviewStatus::Pending => stats.pending += 1,
                ReviewStatus::Approved => stats.approved += 1,
                ReviewStatus::Rejected => stats.rejected += 1,
            }
            stats
        })
    }
}
