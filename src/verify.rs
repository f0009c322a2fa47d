//! Cryptographic signature verification.
//!
//! Algorithm dispatch happens before any cryptographic work: the header's
//! algorithm must sit in the policy allow-list, which closes the door on a
//! sender steering verification toward a weaker or no-op scheme. The
//! primitives themselves come from `jsonwebtoken` - constant-time MAC
//! comparison for HS*, library-grade RSA verification for RS* - and are
//! never reimplemented here.
//!
//! The signing input (the exact `header.payload` bytes as received) is not
//! assembled in this crate: the verifier hands `jsonwebtoken::decode` the
//! original compact token text via [`RawToken::as_str`], and the crate
//! splits that text itself and verifies over those exact bytes. Decoded
//! JSON is never re-encoded into the signing input - re-encoding is not
//! guaranteed to reproduce the bytes that were signed.

use std::collections::HashSet;

use jsonwebtoken::{Algorithm, Validation};
use tracing::{debug, warn};

use crate::codec::RawToken;
use crate::error::AuthError;
use crate::policy::ValidationPolicy;

/// Verify the token signature against the policy's key material.
///
/// Verification covers the exact original base64url `header.payload` text,
/// taken from the compact token as received (see the module docs for why
/// the signing input is never re-assembled here). Claim semantics are
/// entirely out of scope at this stage - the claims validator owns them -
/// so every claim check is disabled.
pub fn verify_signature(
    raw: &RawToken<'_>,
    header: &jsonwebtoken::Header,
    policy: &ValidationPolicy,
) -> Result<(), AuthError> {
    let alg = supported_algorithm(header.alg)?;
    if !policy.allows(alg) {
        warn!(alg = ?alg, "signature rejected: algorithm not in policy allow-list");
        return Err(AuthError::AlgorithmNotAllowed);
    }

    let kid = header.kid.as_deref();
    let Some(key) = policy.key_for(kid) else {
        warn!(kid = kid.unwrap_or("<none>"), "signature rejected: no matching key");
        return Err(AuthError::KeyNotFound);
    };

    let mut validation = Validation::new(alg);
    // Signature only; the claims validator is the sole authority on claim
    // semantics and runs after this stage.
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    match jsonwebtoken::decode::<serde_json::Value>(raw.as_str(), key, &validation) {
        Ok(_) => {
            debug!(alg = ?alg, "signature verified");
            Ok(())
        }
        Err(e) => {
            // Exact failure kind stays internal; callers see one coarse code.
            debug!(error = ?e.kind(), "signature verification failed");
            Err(AuthError::SignatureInvalid)
        }
    }
}

/// Algorithms this filter verifies. Everything else is rejected before any
/// key is touched, even if the policy allow-list were to name it.
fn supported_algorithm(alg: Algorithm) -> Result<Algorithm, AuthError> {
    match alg {
        Algorithm::HS256
        | Algorithm::HS384
        | Algorithm::HS512
        | Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512 => Ok(alg),
        unsupported => {
            warn!(alg = ?unsupported, "signature rejected: unsupported algorithm");
            Err(AuthError::AlgorithmNotAllowed)
        }
    }
}
