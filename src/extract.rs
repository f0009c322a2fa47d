//! Candidate token extraction from the request.
//!
//! Two sources, with fixed precedence: an `Authorization: Bearer` header
//! always wins; a `{"token": "..."}` JSON body field is consulted only when
//! the policy permits it and the request actually carries a JSON body.
//! "No credential anywhere" and "body was unreadable" surface as different
//! failures - callers report them separately and neither is ever confused
//! with a malformed JWT.

use serde_json::Value;
use tracing::debug;

use crate::error::AuthError;
use crate::host::RequestContext;
use crate::policy::ValidationPolicy;

/// Pull the candidate token out of the request.
pub fn extract_token(
    ctx: &dyn RequestContext,
    policy: &ValidationPolicy,
) -> Result<String, AuthError> {
    if let Some(header) = ctx.header("authorization") {
        if let Some(token) = header.strip_prefix("Bearer ") {
            if !token.is_empty() {
                debug!("token extracted from authorization header");
                return Ok(token.to_string());
            }
        }
    }

    if policy.body_token_allowed() && has_json_body(ctx) {
        let body = ctx.body().filter(|b| !b.is_empty());
        let Some(body) = body else {
            debug!("no authorization header and no request body");
            return Err(AuthError::TokenNotFound);
        };
        let json: Value = serde_json::from_slice(body).map_err(|e| {
            debug!(error = %e, "request body is not valid JSON");
            AuthError::BodyParseError
        })?;
        return match json.get("token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => {
                debug!("token extracted from request body");
                Ok(token.to_string())
            }
            _ => {
                debug!("request body has no usable token field");
                Err(AuthError::TokenNotFound)
            }
        };
    }

    debug!("no token in authorization header, body sourcing not applicable");
    Err(AuthError::TokenNotFound)
}

/// Does the method/content-type pair indicate a JSON body worth reading?
fn has_json_body(ctx: &dyn RequestContext) -> bool {
    if !matches!(ctx.method(), "POST" | "PUT" | "PATCH") {
        return false;
    }
    ctx.header("content-type").is_some_and(|ct| {
        ct.split(';')
            .next()
            .unwrap_or("")
            .trim()
            .eq_ignore_ascii_case("application/json")
    })
}
