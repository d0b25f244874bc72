use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Review state of a flagged invite. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of an invitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteParty {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub id: String,
    pub inviter: InviteParty,
    pub invitee: InviteParty,
    pub invite_code: String,
    pub status: InviteStatus,
    /// Backend fraud score in `[0, 1]`.
    pub fraud_score: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Admin that decided a review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudIndicators {
    pub same_device: bool,
    pub suspicious_timing: bool,
    pub email_similarity: bool,
    pub ip_similarity: bool,
}

impl FraudIndicators {
    /// Names of the indicators that are raised.
    pub fn active(&self) -> Vec<&'static str> {
        [
            (self.same_device, "same_device"),
            (self.suspicious_timing, "suspicious_timing"),
            (self.email_similarity, "email_similarity"),
            (self.ip_similarity, "ip_similarity"),
        ]
        .into_iter()
        .filter_map(|(raised, name)| raised.then_some(name))
        .collect()
    }

    pub fn count(&self) -> usize {
        self.active().len()
    }
}

/// A flagged invitation awaiting (or past) moderator review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: String,
    pub invite: Invite,
    pub review_status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<Reviewer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fraud_indicators: FraudIndicators,
    /// When the backend flagged the invite for review. Older backends omit
    /// it; [`ReviewRecord::flagged_at`] then falls back to the invite's time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ReviewRecord {
    /// Timestamp used for date filtering and display order.
    pub fn flagged_at(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or(self.invite.created_at)
    }

    pub fn is_pending(&self) -> bool {
        self.review_status == ReviewStatus::Pending
    }

    /// Reviewer and review time are present exactly when the record has left `pending`.
    pub fn is_consistent(&self) -> bool {
        let decided = self.review_status.is_terminal();
        decided == self.reviewer.is_some() && decided == self.reviewed_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
        }
    }

    pub fn resulting_status(&self) -> ReviewStatus {
        match self {
            ReviewAction::Approve => ReviewStatus::Approved,
            ReviewAction::Reject => ReviewStatus::Rejected,
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /reviews/{id}/decision`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub action: ReviewAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One page of `GET /reviews`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPage {
    pub items: Vec<ReviewRecord>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_json(status: &str) -> serde_json::Value {
        json!({
            "id": "rev-1",
            "invite": {
                "id": "inv-1",
                "inviter": { "id": "u1", "email": "alice@example.com" },
                "invitee": { "id": "u2", "email": "bob@example.com", "username": "bob" },
                "invite_code": "ABC123",
                "status": "pending",
                "fraud_score": 0.82,
                "created_at": "2026-01-05T10:00:00Z"
            },
            "review_status": status,
            "fraud_indicators": { "same_device": true, "ip_similarity": true },
            "created_at": "2026-01-05T10:05:00Z"
        })
    }

    #[test]
    fn parses_backend_record() {
        let record: ReviewRecord = serde_json::from_value(record_json("pending")).unwrap();
        assert!(record.is_pending());
        assert!(record.is_consistent());
        assert_eq!(record.invite.invitee.username.as_deref(), Some("bob"));
        assert_eq!(record.fraud_indicators.active(), vec!["same_device", "ip_similarity"]);
        assert_eq!(record.fraud_indicators.count(), 2);
    }

    #[test]
    fn record_without_review_timestamp_uses_invite_time() {
        let mut raw = record_json("pending");
        raw.as_object_mut().unwrap().remove("created_at");

        let record: ReviewRecord = serde_json::from_value(raw).unwrap();
        assert!(record.created_at.is_none());
        assert_eq!(record.flagged_at(), record.invite.created_at);

        let serialized = serde_json::to_value(&record).unwrap();
        assert!(serialized.get("created_at").is_none());
    }

    #[test]
    fn review_timestamp_wins_when_present() {
        let record: ReviewRecord = serde_json::from_value(record_json("pending")).unwrap();
        assert_eq!(
            record.flagged_at().to_rfc3339(),
            "2026-01-05T10:05:00+00:00"
        );
    }

    #[test]
    fn decided_record_without_reviewer_is_inconsistent() {
        let record: ReviewRecord = serde_json::from_value(record_json("approved")).unwrap();
        assert!(!record.is_consistent());
    }

    #[test]
    fn decision_request_omits_missing_notes() {
        let body = serde_json::to_value(DecisionRequest {
            action: ReviewAction::Reject,
            notes: None,
        })
        .unwrap();
        assert_eq!(body, json!({ "action": "reject" }));
    }

    #[test]
    fn actions_map_to_terminal_states() {
        assert_eq!(ReviewAction::Approve.resulting_status(), ReviewStatus::Approved);
        assert_eq!(ReviewAction::Reject.resulting_status(), ReviewStatus::Rejected);
        assert!(ReviewStatus::Approved.is_terminal());
        assert!(!ReviewStatus::Pending.is_terminal());
    }
}
