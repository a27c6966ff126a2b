use crate::config::MissingOriginPolicy;
use axum::http::HeaderValue;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// Listed origin, echoed back in `Access-Control-Allow-Origin`.
    Allowed(HeaderValue),
    /// No Origin header and the policy lets it through. No CORS headers.
    Anonymous,
    Rejected,
}

impl OriginDecision {
    pub fn cors_origin(&self) -> Option<&HeaderValue> {
        match self {
            OriginDecision::Allowed(origin) => Some(origin),
            _ => None,
        }
    }
}

// Static allow-list of browser origins
#[derive(Debug, Clone)]
pub struct OriginGate {
    allowed: HashSet<String>,
    missing_policy: MissingOriginPolicy,
}

impl OriginGate {
    pub fn new<I, S>(origins: I, missing_policy: MissingOriginPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: origins.into_iter().map(Into::into).collect(),
            missing_policy,
        }
    }

    // exact byte match only, no case folding or trailing-slash tolerance
    pub fn check(&self, origin: Option<&HeaderValue>) -> OriginDecision {
        let Some(origin) = origin else {
            return match self.missing_policy {
                MissingOriginPolicy::Reject => OriginDecision::Rejected,
                MissingOriginPolicy::Allow => OriginDecision::Anonymous,
            };
        };

        match origin.to_str() {
            Ok(value) if self.allowed.contains(value) => OriginDecision::Allowed(origin.clone()),
            _ => OriginDecision::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(policy: MissingOriginPolicy) -> OriginGate {
        OriginGate::new(["https://pool.example", "http://localhost:8000"], policy)
    }

    #[test]
    fn listed_origin_is_echoed() {
        let origin = HeaderValue::from_static("https://pool.example");
        let decision = gate(MissingOriginPolicy::Reject).check(Some(&origin));
        assert_eq!(decision.cors_origin(), Some(&origin));
    }

    #[test]
    fn near_misses_are_rejected() {
        let gate = gate(MissingOriginPolicy::Allow);
        for candidate in [
            "https://POOL.example",
            "https://pool.example/",
            "http://pool.example",
            "https://pool.example.evil.example",
            "https://disallowed.example",
            "null",
        ] {
            let value = HeaderValue::from_static(candidate);
            assert_eq!(gate.check(Some(&value)), OriginDecision::Rejected, "{candidate}");
        }
    }

    #[test]
    fn non_ascii_origin_is_rejected() {
        let value = HeaderValue::from_bytes(b"https://p\xf6ol.example").unwrap();
        assert_eq!(
            gate(MissingOriginPolicy::Allow).check(Some(&value)),
            OriginDecision::Rejected
        );
    }

    #[test]
    fn missing_origin_follows_policy() {
        assert_eq!(
            gate(MissingOriginPolicy::Reject).check(None),
            OriginDecision::Rejected
        );
        let anonymous = gate(MissingOriginPolicy::Allow).check(None);
        assert_eq!(anonymous, OriginDecision::Anonymous);
        assert!(anonymous.cors_origin().is_none());
    }
}
