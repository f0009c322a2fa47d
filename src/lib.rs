//! # tokengate
//!
//! **tokengate** is a request-path authentication filter for proxy
//! sandboxes: it validates a JSON Web Token supplied as a bearer credential
//! or inside a JSON request body, guards against token replay, and issues
//! an HttpOnly session cookie once validation succeeds.
//!
//! ## Overview
//!
//! The crate is the decision core only. The embedding host (an Envoy/Istio
//! style proxy module, or any test harness) owns transport, configuration
//! distribution, and response emission; it talks to the core through two
//! narrow traits and receives a terminal verdict per request.
//!
//! ## Architecture
//!
//! The library is organized into small, separately testable stages:
//!
//! - **[`extract`]** - candidate token extraction (`Authorization: Bearer`
//!   header, or a `{"token": ...}` JSON body field when policy permits)
//! - **[`codec`]** - structural three-segment parsing and base64url/JSON
//!   decoding; purely syntactic, no key material
//! - **[`verify`]** - algorithm allow-list dispatch and cryptographic
//!   signature verification via `jsonwebtoken`
//! - **[`claims`]** - semantic claim checks: expiry and not-before with
//!   clock-skew leeway, issuer, audience, required `jti`
//! - **[`replay`]** - bounded, expiry-ordered cache of recently admitted
//!   token ids; rejects reuse within the validity window
//! - **[`engine`]** - per-request orchestration of the stages above,
//!   verdict construction, session cookie directive
//! - **[`policy`]** - the immutable [`ValidationPolicy`], JWKS-document key
//!   parsing, and YAML/JSON policy file loading
//! - **[`host`]** - the [`RequestContext`]/[`DecisionSink`] boundary traits
//! - **[`error`]** - the terminal error taxonomy and its coarse reason codes
//!
//! ### Request Decision Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as Host Proxy
//!     participant Engine as DecisionEngine
//!     participant Codec as RawToken
//!     participant Verify as Signature Verifier
//!     participant Claims as Claims Validator
//!     participant Replay as ReplayGuard
//!
//!     Host->>Engine: run(ctx, sink)
//!     Engine->>Engine: extract_token(ctx, policy)
//!     Engine->>Codec: parse / decode_header / decode_claims
//!     Engine->>Verify: verify_signature(raw, header, policy)
//!     Verify->>Verify: allow-list check BEFORE any crypto
//!     Engine->>Claims: validate(claims, policy, now)
//!     Engine->>Replay: check_and_record(jti, exp, now)
//!     Note over Replay: at-most-one-winner per jti
//!     alt any stage fails
//!         Engine-->>Host: Rejected { reason } → 401 {"error": code}
//!     else all stages pass
//!         Engine-->>Host: Admitted { claims, cookie } → Set-Cookie, continue
//!     end
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use jsonwebtoken::{Algorithm, DecodingKey};
//! use tokengate::{DecisionEngine, ValidationPolicy};
//!
//! let policy = ValidationPolicy::new()
//!     .allow_algorithm(Algorithm::RS256)
//!     .allow_algorithm(Algorithm::HS256)
//!     .key("2024-07", DecodingKey::from_secret(b"shared-secret"))
//!     .issuer("https://auth.example.com")
//!     .audience("my-api")
//!     .leeway(30)
//!     .body_token(true);
//!
//! let engine = DecisionEngine::new(policy);
//! // Per request: engine.run(&request_context, &mut decision_sink);
//! ```
//!
//! ## Concurrency
//!
//! Every stage is pure computation over in-memory buffers - no blocking, no
//! suspension points, no internal timeouts. One [`DecisionEngine`] is shared
//! across the host's parallel workers; the only shared mutable state is the
//! replay cache behind a single exclusive lock, so two concurrent requests
//! presenting the same `jti` can never both be admitted. Policy and key
//! material are read-only and shared without copying.
//!
//! ## State
//!
//! The replay cache is process-lifetime, in-memory only, and lost on
//! restart; tokens expire naturally, so no durable state is kept anywhere.

pub mod claims;
pub mod codec;
pub mod engine;
pub mod error;
pub mod extract;
pub mod host;
pub mod policy;
pub mod replay;
pub mod verify;

pub use claims::TokenClaims;
pub use codec::RawToken;
pub use engine::{CookieDirective, DecisionEngine, Verdict};
pub use error::AuthError;
pub use host::{DecisionSink, RequestContext};
pub use policy::{keys_from_jwks, CookiePolicy, PolicyFile, SameSite, ValidationPolicy};
pub use replay::{ReplayGuard, ReplayStats};
