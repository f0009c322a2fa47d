//! Per-request decision orchestration.
//!
//! The engine runs each request through a fixed stage sequence -
//! extraction, structural parsing, signature verification, claim
//! validation, replay check - and the first failing stage short-circuits
//! into a [`Verdict::Rejected`] carrying that stage's error kind. Nothing
//! here performs I/O: the verdict and cookie directive go back to the
//! host's [`DecisionSink`], which owns the actual response headers.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::claims::{self, TokenClaims};
use crate::codec::RawToken;
use crate::error::AuthError;
use crate::extract;
use crate::host::{DecisionSink, RequestContext};
use crate::policy::{SameSite, ValidationPolicy};
use crate::replay::{ReplayGuard, ReplayStats};
use crate::verify;

/// Instruction for the host to establish the session cookie.
///
/// The value is the admitted token's `jti`; the lifetime is the lesser of
/// the token's remaining validity and the policy ceiling. `HttpOnly` is
/// unconditional - the cookie is never script-readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieDirective {
    pub name: String,
    pub value: String,
    pub max_age_secs: i64,
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieDirective {
    /// Render the `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}; HttpOnly", self.name, self.value);
        if self.secure {
            out.push_str("; Secure");
        }
        out.push_str(&format!(
            "; SameSite={}; Max-Age={}",
            self.same_site, self.max_age_secs
        ));
        out
    }
}

/// Terminal output of the decision engine for one request. Not persisted.
#[derive(Debug)]
pub enum Verdict {
    /// Request is authenticated; continue routing and set the cookie.
    Admitted {
        claims: TokenClaims,
        cookie: CookieDirective,
    },
    /// Request is refused; short-circuit with 401 and the reason code.
    Rejected { reason: AuthError },
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admitted { .. })
    }
}

/// Orchestrates token validation for every request of one filter instance.
///
/// Holds the immutable [`ValidationPolicy`] and the single shared
/// [`ReplayGuard`]. The engine is `Send + Sync`; the host's parallel
/// workers share one instance (typically behind an `Arc`).
pub struct DecisionEngine {
    policy: ValidationPolicy,
    replay: ReplayGuard,
}

impl DecisionEngine {
    pub fn new(policy: ValidationPolicy) -> Self {
        let replay = ReplayGuard::new(
            policy.replay_window_duration(),
            policy.replay_capacity_limit(),
            policy.is_replay_fail_open(),
        );
        Self { policy, replay }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Replay guard counters, for the host's observability surface.
    pub fn replay_stats(&self) -> ReplayStats {
        self.replay.stats()
    }

    /// Decide a request against the system clock.
    pub fn decide(&self, ctx: &dyn RequestContext) -> Verdict {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        self.decide_at(ctx, now)
    }

    /// Decide a request at an explicit clock reading (epoch seconds).
    pub fn decide_at(&self, ctx: &dyn RequestContext, now: i64) -> Verdict {
        match self.evaluate(ctx, now) {
            Ok((claims, cookie)) => {
                debug!(jti = %cookie.value, "request admitted");
                Verdict::Admitted { claims, cookie }
            }
            Err(reason) => {
                warn!(reason = reason.reason_code(), "request rejected");
                Verdict::Rejected { reason }
            }
        }
    }

    /// Decide a request and hand the verdict to the host sink.
    pub fn run(&self, ctx: &dyn RequestContext, sink: &mut dyn DecisionSink) {
        let verdict = self.decide(ctx);
        sink.on_verdict(&verdict);
    }

    // The stage pipeline. Each `?` is a transition to Rejected carrying the
    // originating stage's error kind.
    fn evaluate(
        &self,
        ctx: &dyn RequestContext,
        now: i64,
    ) -> Result<(TokenClaims, CookieDirective), AuthError> {
        let token = extract::extract_token(ctx, &self.policy)?;
        let raw = RawToken::parse(&token)?;
        let header = raw.decode_header()?;
        let claims = raw.decode_claims()?;
        raw.decode_signature()?;
        verify::verify_signature(&raw, &header, &self.policy)?;
        claims::validate(&claims, &self.policy, now)?;

        // validate() guarantees both; the fallbacks are unreachable.
        let jti = claims.jti().ok_or(AuthError::MissingJti)?;
        let exp = claims.exp().ok_or(AuthError::InvalidClaims)?;
        self.replay.check_and_record(jti, exp, now)?;

        let cookie = self.cookie_for(jti, exp, now);
        Ok((claims, cookie))
    }

    fn cookie_for(&self, jti: &str, exp: i64, now: i64) -> CookieDirective {
        let policy = self.policy.cookie_policy();
        let ceiling = policy.max_age.as_secs() as i64;
        CookieDirective {
            name: policy.name.clone(),
            value: jti.to_string(),
            max_age_secs: (exp - now).min(ceiling).max(0),
            secure: policy.secure,
            same_site: policy.same_site,
        }
    }
}
