//! Error taxonomy for the request decision path.
//!
//! Every failure a request can hit is one of these variants. They are
//! terminal, local, non-retryable decisions for that request: token
//! validation is deterministic given a fixed token and policy, so nothing
//! here triggers an internal retry.
//!
//! Callers only ever see the coarse [`reason_code`](AuthError::reason_code);
//! the fine-grained cause (exact crypto failure, serde error, ...) goes to
//! `tracing` where it is visible to operators but not to the peer that sent
//! the token.

use serde_json::Value;

/// Terminal failure causes for a single request decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(thiserror::Error)]
pub enum AuthError {
    /// No bearer credential anywhere the policy allows us to look.
    #[error("no token found in request")]
    TokenNotFound,
    /// The request body was supposed to carry the token but is not valid JSON.
    #[error("request body is not valid JSON")]
    BodyParseError,
    /// The credential does not have exactly three non-empty dot-separated
    /// segments. Structural, not a validation failure.
    #[error("token does not have exactly three segments")]
    MalformedToken,
    /// A token segment is not valid unpadded base64url.
    #[error("token segment is not valid base64url")]
    InvalidEncoding,
    /// The payload decoded but is not a JSON claims object, or a structurally
    /// required claim has the wrong shape.
    #[error("token payload is not a valid claims object")]
    InvalidClaims,
    /// The header algorithm is outside the policy allow-list.
    #[error("token algorithm is not allowed by policy")]
    AlgorithmNotAllowed,
    /// No configured key matches the token's key id.
    #[error("no configured key matches the token key id")]
    KeyNotFound,
    /// Cryptographic verification of the signature failed.
    #[error("signature verification failed")]
    SignatureInvalid,
    /// `exp` (plus leeway) is in the past.
    #[error("token has expired")]
    Expired,
    /// `nbf` (minus leeway) is in the future.
    #[error("token is not yet valid")]
    NotYetValid,
    /// `iss` does not exactly match the policy issuer.
    #[error("issuer claim does not match policy")]
    IssuerMismatch,
    /// The policy audience is not a member of `aud`.
    #[error("audience claim does not match policy")]
    AudienceMismatch,
    /// `jti` is absent or not a string. Required here even though the JWT
    /// standard treats it as optional; replay detection depends on it.
    #[error("jti claim is missing or not a string")]
    MissingJti,
    /// The token id was already admitted within its validity window.
    #[error("token id has already been used")]
    ReplayDetected,
}

impl AuthError {
    /// The coarse reason code surfaced to callers in the 401 body.
    ///
    /// Deliberately low-resolution: a peer probing the filter learns which
    /// stage rejected it, never why the cryptography failed.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::TokenNotFound => "token_not_found",
            AuthError::BodyParseError => "body_parse_error",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidEncoding => "invalid_encoding",
            AuthError::InvalidClaims => "invalid_claims",
            AuthError::AlgorithmNotAllowed => "algorithm_not_allowed",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::Expired => "expired",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::MissingJti => "missing_jti",
            AuthError::ReplayDetected => "replay_detected",
        }
    }

    /// JSON body the host emits alongside HTTP 401 when short-circuiting.
    pub fn rejection_body(&self) -> Value {
        serde_json::json!({ "error": self.reason_code() })
    }
}
