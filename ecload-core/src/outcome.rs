use std::time::Duration;

/// Closed set of semantic results of one action invocation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeCategory {
    Success,
    RejectedDuplicate,
    RejectedCapacity,
    RejectedOther,
    TransportError,
}

impl OutcomeCategory {
    pub const ALL: [Self; 5] = [
        Self::Success,
        Self::RejectedDuplicate,
        Self::RejectedCapacity,
        Self::RejectedOther,
        Self::TransportError,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub category: OutcomeCategory,
    pub latency: Duration,
    pub status: u16,
}

impl Outcome {
    #[must_use]
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.category == OutcomeCategory::Success
    }
}

const EXCERPT_CHARS: usize = 200;

/// Leading part of a non-success response body, for diagnostics.
#[must_use]
pub fn failure_excerpt(category: OutcomeCategory, body: &str) -> Option<&str> {
    if category == OutcomeCategory::Success || body.is_empty() {
        return None;
    }
    let end = body
        .char_indices()
        .nth(EXCERPT_CHARS)
        .map_or(body.len(), |(i, _)| i);
    Some(&body[..end])
}

pub trait Classifier: Send + Sync {
    fn classify(&self, status: u16, body: &str) -> OutcomeCategory;
}

/// Which rejection wins when a response matches both the duplicate and the capacity rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum RejectionPrecedence {
    #[default]
    DuplicateFirst,
    CapacityFirst,
}

/// Status-code-first classifier with case-insensitive body keyword fallbacks.
///
/// Rules, in order (the two rejection rules swap under [`RejectionPrecedence::CapacityFirst`]):
/// 1. success status => `Success`
/// 2. conflict status, or body mentions a duplicate term => `RejectedDuplicate`
/// 3. bad-request status, or body mentions a capacity term => `RejectedCapacity`
/// 4. status 0 => `TransportError`
/// 5. anything else => `RejectedOther`
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    pub success_status: u16,
    pub conflict_status: u16,
    pub bad_request_status: u16,
    pub duplicate_terms: Vec<String>,
    pub capacity_terms: Vec<String>,
    pub precedence: RejectionPrecedence,
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self {
            success_status: 200,
            conflict_status: 409,
            bad_request_status: 400,
            duplicate_terms: vec!["already".to_string(), "duplicate".to_string()],
            capacity_terms: vec![
                "sold out".to_string(),
                "exhausted".to_string(),
                "quantity".to_string(),
                "수량".to_string(),
            ],
            precedence: RejectionPrecedence::DuplicateFirst,
        }
    }
}

impl StatusClassifier {
    #[must_use]
    pub fn with_precedence(mut self, precedence: RejectionPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    fn is_duplicate(&self, status: u16, body: &str) -> bool {
        status == self.conflict_status || mentions_any(body, &self.duplicate_terms)
    }

    fn is_capacity(&self, status: u16, body: &str) -> bool {
        status == self.bad_request_status || mentions_any(body, &self.capacity_terms)
    }
}

/// `body` must already be lowercase; terms may be in any case.
fn mentions_any(body: &str, terms: &[String]) -> bool {
    terms.iter().any(|t| body.contains(t.to_lowercase().as_str()))
}

impl Classifier for StatusClassifier {
    fn classify(&self, status: u16, body: &str) -> OutcomeCategory {
        if status == self.success_status {
            return OutcomeCategory::Success;
        }

        let body = body.to_lowercase();
        let duplicate = self.is_duplicate(status, &body);
        let capacity = self.is_capacity(status, &body);

        match self.precedence {
            RejectionPrecedence::DuplicateFirst if duplicate => OutcomeCategory::RejectedDuplicate,
            RejectionPrecedence::DuplicateFirst if capacity => OutcomeCategory::RejectedCapacity,
            RejectionPrecedence::CapacityFirst if capacity => OutcomeCategory::RejectedCapacity,
            RejectionPrecedence::CapacityFirst if duplicate => OutcomeCategory::RejectedDuplicate,
            _ if status == 0 => OutcomeCategory::TransportError,
            _ => OutcomeCategory::RejectedOther,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_decide_first() {
        let c = StatusClassifier::default();
        assert_eq!(c.classify(200, ""), OutcomeCategory::Success);
        assert_eq!(c.classify(409, ""), OutcomeCategory::RejectedDuplicate);
        assert_eq!(c.classify(400, ""), OutcomeCategory::RejectedCapacity);
        assert_eq!(c.classify(0, ""), OutcomeCategory::TransportError);
        assert_eq!(c.classify(500, "boom"), OutcomeCategory::RejectedOther);
        assert_eq!(c.classify(201, ""), OutcomeCategory::RejectedOther);
    }

    #[test]
    fn success_status_ignores_body() {
        let c = StatusClassifier::default();
        assert_eq!(
            c.classify(200, "{\"note\":\"already sold out\"}"),
            OutcomeCategory::Success
        );
    }

    #[test]
    fn body_keywords_are_case_insensitive() {
        let c = StatusClassifier::default();
        assert_eq!(
            c.classify(500, "Coupon ALREADY issued"),
            OutcomeCategory::RejectedDuplicate
        );
        assert_eq!(
            c.classify(422, "Duplicate request"),
            OutcomeCategory::RejectedDuplicate
        );
        assert_eq!(
            c.classify(503, "Coupon SOLD OUT"),
            OutcomeCategory::RejectedCapacity
        );
        assert_eq!(
            c.classify(500, "쿠폰 수량이 모두 소진되었습니다"),
            OutcomeCategory::RejectedCapacity
        );
    }

    #[test]
    fn failure_excerpt_skips_successes_and_truncates_long_bodies() {
        assert_eq!(failure_excerpt(OutcomeCategory::Success, "ok"), None);
        assert_eq!(failure_excerpt(OutcomeCategory::RejectedOther, ""), None);
        assert_eq!(
            failure_excerpt(OutcomeCategory::RejectedCapacity, "sold out"),
            Some("sold out")
        );

        let long = "수".repeat(EXCERPT_CHARS + 50);
        let excerpt = failure_excerpt(OutcomeCategory::RejectedOther, &long)
            .unwrap_or_else(|| panic!("expected an excerpt"));
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn custom_terms_match_regardless_of_case() {
        let c = StatusClassifier {
            duplicate_terms: vec!["Already Claimed".to_string()],
            capacity_terms: vec!["Sold Out".to_string()],
            ..StatusClassifier::default()
        };
        assert_eq!(c.classify(503, "Sold Out"), OutcomeCategory::RejectedCapacity);
        assert_eq!(c.classify(503, "SOLD OUT today"), OutcomeCategory::RejectedCapacity);
        assert_eq!(
            c.classify(500, "ticket already claimed"),
            OutcomeCategory::RejectedDuplicate
        );
    }

    #[test]
    fn conflict_mentioning_exhaustion_is_a_duplicate_by_default() {
        let c = StatusClassifier::default();
        assert_eq!(
            c.classify(409, "coupon exhausted"),
            OutcomeCategory::RejectedDuplicate
        );
    }

    #[test]
    fn capacity_first_swaps_the_rejection_rules() {
        let c = StatusClassifier::default().with_precedence(RejectionPrecedence::CapacityFirst);
        assert_eq!(
            c.classify(409, "coupon exhausted"),
            OutcomeCategory::RejectedCapacity
        );
        assert_eq!(
            c.classify(409, ""),
            OutcomeCategory::RejectedDuplicate
        );
        assert_eq!(
            c.classify(400, "already issued"),
            OutcomeCategory::RejectedCapacity
        );
    }

    #[test]
    fn categories_render_snake_case() {
        let names: Vec<&str> = OutcomeCategory::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "success",
                "rejected_duplicate",
                "rejected_capacity",
                "rejected_other",
                "transport_error"
            ]
        );
        assert_eq!(
            "rejected_capacity".parse::<OutcomeCategory>().ok(),
            Some(OutcomeCategory::RejectedCapacity)
        );
        assert_eq!(
            "capacity-first".parse::<RejectionPrecedence>().ok(),
            Some(RejectionPrecedence::CapacityFirst)
        );
    }
}
