use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::pricing::PlanTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    NoSubscription,
    TrialActive,
    Active,
    Expired,
    Canceled,
    PastDue,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::NoSubscription => "no_subscription",
            SubscriptionStatus::TrialActive => "trial_active",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trial_active" | "trial" => SubscriptionStatus::TrialActive,
            "active" => SubscriptionStatus::Active,
            "expired" => SubscriptionStatus::Expired,
            "canceled" | "cancelled" => SubscriptionStatus::Canceled,
            "past_due" => SubscriptionStatus::PastDue,
            _ => SubscriptionStatus::NoSubscription,
        }
    }

    /// Paid, non-trial, non-expired. The only state that satisfies
    /// `requires_active_subscription` without a trial carve-out.
    pub fn is_paid_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    /// Terminal for the current commitment; re-entered via a new upgrade.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Expired | SubscriptionStatus::Canceled
        )
    }
}

/// Per-organization subscription record. The temporal authority for trial,
/// active and expired decisions; unique per organization.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Legacy plan column, still the tier authority for capability checks.
    pub plan: Option<PlanTier>,
    pub status: SubscriptionStatus,
    pub subscription_model_id: Option<Uuid>,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub trial_expires_at: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Trial eligibility is a pure function of stored timestamps and the
    /// supplied clock value. Expiry is evaluated lazily on every resolution.
    pub fn in_trial(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::TrialActive
            && self.trial_expires_at.map(|t| t > now).unwrap_or(false)
    }

    /// Whole days left in the trial window, for UI banners only. Never an
    /// authorization signal.
    pub fn trial_days_remaining(&self, now: DateTime<Utc>) -> i64 {
        match self.trial_expires_at {
            Some(expires) => {
                let secs = (expires - now).num_seconds();
                if secs <= 0 {
                    0
                } else {
                    // ceil to whole days
                    (secs + 86_399) / 86_400
                }
            }
            None => 0,
        }
    }
}
