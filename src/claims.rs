//! Decoded claim set and semantic validation.
//!
//! Claims stay an open mapping so hosts can forward application claims
//! downstream; the reserved claims this filter acts on are projected out
//! through typed accessors. Validation is ordered and first-failure-wins,
//! with each check independently testable.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AuthError;
use crate::policy::ValidationPolicy;

/// The decoded JWT payload: an open claim-name to JSON-value mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    claims: Map<String, Value>,
}

impl TokenClaims {
    pub(crate) fn from_slice(bytes: &[u8]) -> Result<Self, AuthError> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(claims)) => Ok(Self { claims }),
            Ok(other) => {
                debug!(kind = json_kind(&other), "token payload is not a JSON object");
                Err(AuthError::InvalidClaims)
            }
            Err(e) => {
                debug!(error = %e, "token payload is not valid JSON");
                Err(AuthError::InvalidClaims)
            }
        }
    }

    /// Look up any claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Expiry, seconds since epoch.
    pub fn exp(&self) -> Option<i64> {
        self.get("exp").and_then(Value::as_i64)
    }

    /// Not-before, seconds since epoch.
    pub fn nbf(&self) -> Option<i64> {
        self.get("nbf").and_then(Value::as_i64)
    }

    /// Issuer.
    pub fn iss(&self) -> Option<&str> {
        self.get("iss").and_then(Value::as_str)
    }

    /// Token id. Required by this filter's policy; replay detection keys on it.
    pub fn jti(&self) -> Option<&str> {
        self.get("jti").and_then(Value::as_str)
    }

    /// Audience membership test. A single string `aud` is treated as a
    /// one-element set; a missing or non-string `aud` matches nothing.
    pub fn has_audience(&self, audience: &str) -> bool {
        match self.get("aud") {
            Some(Value::String(s)) => s == audience,
            Some(Value::Array(items)) => {
                items.iter().any(|v| v.as_str() == Some(audience))
            }
            _ => false,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Semantic claim checks, in order; the first failure wins.
///
/// 1. `exp` present and numeric, and `now <= exp + leeway`
/// 2. if `nbf` present, `now >= nbf - leeway`
/// 3. exact issuer match when the policy expects one
/// 4. audience membership when the policy expects one
/// 5. `jti` present and a string
///
/// Leeway is applied symmetrically to `exp` and `nbf`.
pub fn validate(
    claims: &TokenClaims,
    policy: &ValidationPolicy,
    now: i64,
) -> Result<(), AuthError> {
    let leeway = policy.leeway_secs() as i64;

    let Some(exp) = claims.exp() else {
        debug!("claims rejected: exp missing or not numeric");
        return Err(AuthError::InvalidClaims);
    };
    if now > exp + leeway {
        debug!(exp, now, "claims rejected: token expired");
        return Err(AuthError::Expired);
    }

    if let Some(nbf) = claims.nbf() {
        if now < nbf - leeway {
            debug!(nbf, now, "claims rejected: token not yet valid");
            return Err(AuthError::NotYetValid);
        }
    }

    if let Some(expected) = policy.issuer_expected() {
        if claims.iss() != Some(expected) {
            debug!(expected, "claims rejected: issuer mismatch");
            return Err(AuthError::IssuerMismatch);
        }
    }

    if let Some(expected) = policy.audience_expected() {
        if !claims.has_audience(expected) {
            debug!(expected, "claims rejected: audience mismatch");
            return Err(AuthError::AudienceMismatch);
        }
    }

    if claims.jti().is_none() {
        debug!("claims rejected: jti missing or not a string");
        return Err(AuthError::MissingJti);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims_of(value: Value) -> TokenClaims {
        TokenClaims::from_slice(value.to_string().as_bytes()).unwrap()
    }

    fn bare_policy() -> ValidationPolicy {
        ValidationPolicy::new().leeway(0)
    }

    #[test]
    fn expired_one_second_past() {
        let c = claims_of(json!({"exp": 999, "jti": "a"}));
        assert_eq!(
            validate(&c, &bare_policy(), 1000),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn leeway_applies_symmetrically() {
        let policy = ValidationPolicy::new().leeway(30);
        let c = claims_of(json!({"exp": 1000, "jti": "a"}));
        // now = exp + leeway - 1 is inside the tolerance window
        assert_eq!(validate(&c, &policy, 1029), Ok(()));
        assert_eq!(validate(&c, &policy, 1030), Ok(()));
        // one past the tolerance is out
        assert_eq!(validate(&c, &policy, 1031), Err(AuthError::Expired));

        let c = claims_of(json!({"exp": 5000, "nbf": 1000, "jti": "a"}));
        assert_eq!(validate(&c, &policy, 970), Ok(()));
        assert_eq!(validate(&c, &policy, 969), Err(AuthError::NotYetValid));
    }

    #[test]
    fn missing_exp_is_invalid_claims() {
        let c = claims_of(json!({"jti": "a"}));
        assert_eq!(
            validate(&c, &bare_policy(), 0),
            Err(AuthError::InvalidClaims)
        );
    }

    #[test]
    fn issuer_must_match_exactly() {
        let policy = ValidationPolicy::new().leeway(0).issuer("https://good");
        let c = claims_of(json!({"exp": 10, "iss": "https://evil", "jti": "a"}));
        assert_eq!(validate(&c, &policy, 0), Err(AuthError::IssuerMismatch));
        let c = claims_of(json!({"exp": 10, "jti": "a"}));
        assert_eq!(validate(&c, &policy, 0), Err(AuthError::IssuerMismatch));
    }

    #[test]
    fn audience_accepts_string_or_set_membership() {
        let policy = ValidationPolicy::new().leeway(0).audience("api");
        let single = claims_of(json!({"exp": 10, "aud": "api", "jti": "a"}));
        assert_eq!(validate(&single, &policy, 0), Ok(()));
        let set = claims_of(json!({"exp": 10, "aud": ["web", "api"], "jti": "a"}));
        assert_eq!(validate(&set, &policy, 0), Ok(()));
        let wrong = claims_of(json!({"exp": 10, "aud": ["web"], "jti": "a"}));
        assert_eq!(validate(&wrong, &policy, 0), Err(AuthError::AudienceMismatch));
        let missing = claims_of(json!({"exp": 10, "jti": "a"}));
        assert_eq!(
            validate(&missing, &policy, 0),
            Err(AuthError::AudienceMismatch)
        );
    }

    #[test]
    fn non_string_jti_is_rejected() {
        let numeric = claims_of(json!({"exp": 10, "jti": 12345}));
        assert_eq!(
            validate(&numeric, &bare_policy(), 0),
            Err(AuthError::MissingJti)
        );
        let boolean = claims_of(json!({"exp": 10, "jti": true}));
        assert_eq!(
            validate(&boolean, &bare_policy(), 0),
            Err(AuthError::MissingJti)
        );
    }

    #[test]
    fn open_claims_stay_reachable() {
        let c = claims_of(json!({"exp": 10, "jti": "a", "org_id": "acme"}));
        assert_eq!(c.get("org_id").and_then(Value::as_str), Some("acme"));
    }
}
