//! Subscription gate: may an agent answer right now?
//!
//! Only the most recently created subscription row is consulted, so a newer
//! pending purchase shadows an older paid one.

use chrono::{DateTime, Utc};
use sentinels_core::model::{PaymentStatus, Subscription};

/// Why an agent is not allowed to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoSubscription,
    PaymentPending,
    Expired { days_since: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(DenyReason),
}

/// Decide from the agent's latest subscription row.
pub fn evaluate(latest: Option<&Subscription>, now: DateTime<Utc>) -> GateDecision {
    let Some(sub) = latest else {
        return GateDecision::Deny(DenyReason::NoSubscription);
    };
    if sub.payment_status != PaymentStatus::Confirmed {
        return GateDecision::Deny(DenyReason::PaymentPending);
    }
    if sub.expiry_date <= now {
        let days_since = (now - sub.expiry_date).num_days().max(0);
        return GateDecision::Deny(DenyReason::Expired { days_since });
    }
    GateDecision::Allow
}

impl DenyReason {
    /// Text sent to the Telegram chat instead of an answer.
    pub fn message(&self) -> String {
        match self {
            Self::NoSubscription => "⚠️ This agent is not active: no subscription found. \
                 The project owner needs to purchase a subscription to activate it."
                .to_string(),
            Self::PaymentPending => "⏳ This agent is not active yet: payment pending \
                 confirmation. Please try again later."
                .to_string(),
            Self::Expired { days_since } => {
                let unit = if *days_since == 1 { "day" } else { "days" };
                format!(
                    "⚠️ This agent's subscription expired {days_since} {unit} ago. \
                     The project owner needs to renew it to reactivate the agent."
                )
            }
        }
    }
}

impl GateDecision {
    /// Short status label for dashboards.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allow => "active",
            Self::Deny(DenyReason::NoSubscription) => "no_subscription",
            Self::Deny(DenyReason::PaymentPending) => "payment_pending",
            Self::Deny(DenyReason::Expired { .. }) => "expired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sub(status: PaymentStatus, expiry: DateTime<Utc>) -> Subscription {
        Subscription {
            id: "s1".into(),
            agent_id: "a1".into(),
            tier: "monthly".into(),
            cost: 25.0,
            payment_status: status,
            transaction_hash: Some("0xabc".into()),
            expiry_date: expiry,
            auto_renew: false,
            created_at: expiry - Duration::days(30),
        }
    }

    #[test]
    fn test_no_row_denies() {
        let decision = evaluate(None, Utc::now());
        assert_eq!(decision, GateDecision::Deny(DenyReason::NoSubscription));
        let GateDecision::Deny(reason) = decision else {
            unreachable!()
        };
        assert!(reason.message().contains("no subscription found"));
    }

    #[test]
    fn test_pending_denies_even_with_future_expiry() {
        let now = Utc::now();
        let s = sub(PaymentStatus::Pending, now + Duration::days(20));
        assert_eq!(
            evaluate(Some(&s), now),
            GateDecision::Deny(DenyReason::PaymentPending)
        );
        assert!(DenyReason::PaymentPending
            .message()
            .contains("payment pending"));

        let unknown = sub(PaymentStatus::Unknown, now + Duration::days(20));
        assert_eq!(
            evaluate(Some(&unknown), now),
            GateDecision::Deny(DenyReason::PaymentPending)
        );
    }

    #[test]
    fn test_expired_reports_whole_days() {
        let now = Utc::now();
        let s = sub(PaymentStatus::Confirmed, now - Duration::days(3) - Duration::hours(5));
        let decision = evaluate(Some(&s), now);
        assert_eq!(
            decision,
            GateDecision::Deny(DenyReason::Expired { days_since: 3 })
        );
        assert!(DenyReason::Expired { days_since: 3 }.message().contains('3'));
        assert_eq!(decision.label(), "expired");
    }

    #[test]
    fn test_expiry_exactly_now_is_expired_zero_days() {
        let now = Utc::now();
        let s = sub(PaymentStatus::Confirmed, now);
        assert_eq!(
            evaluate(Some(&s), now),
            GateDecision::Deny(DenyReason::Expired { days_since: 0 })
        );
    }

    #[test]
    fn test_active_allows() {
        let now = Utc::now();
        let s = sub(PaymentStatus::Confirmed, now + Duration::seconds(1));
        assert_eq!(evaluate(Some(&s), now), GateDecision::Allow);
        assert_eq!(GateDecision::Allow.label(), "active");
    }
}
