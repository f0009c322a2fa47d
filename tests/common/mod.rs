//! Shared fixtures for integration tests: a request double, a recording
//! sink, and token minting helpers.

#![allow(dead_code)]

use std::collections::HashMap;

use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::Value;
use tokengate::{DecisionSink, RequestContext, ValidationPolicy, Verdict};

/// Secret shared by minted test tokens and the test policy.
pub const TEST_SECRET: &[u8] = b"tokengate-test-secret";

/// Key id the test policy registers.
pub const TEST_KID: &str = "test-key";

/// Initialize test tracing once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Mint an HS256 token over the given claims with the shared test secret.
pub fn mint_hs256(claims: &Value) -> String {
    mint(Algorithm::HS256, Some(TEST_KID), TEST_SECRET, claims)
}

/// Mint a token with full control over algorithm, kid, and secret.
pub fn mint(alg: Algorithm, kid: Option<&str>, secret: &[u8], claims: &Value) -> String {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &EncodingKey::from_secret(secret))
        .expect("minting test token")
}

/// Policy matching the minted tokens: HS256 only, test key, body tokens on.
pub fn test_policy() -> ValidationPolicy {
    ValidationPolicy::new()
        .allow_algorithm(Algorithm::HS256)
        .key(TEST_KID, DecodingKey::from_secret(TEST_SECRET))
        .body_token(true)
        .leeway(0)
}

/// Minimal request double for driving the engine without a host runtime.
pub struct MockRequest {
    method: String,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
}

impl MockRequest {
    pub fn get() -> Self {
        Self {
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// POST with a JSON body and matching content type.
    pub fn post_json(body: &Value) -> Self {
        Self::post_raw(&body.to_string())
    }

    /// POST with raw (possibly invalid) body bytes.
    pub fn post_raw(body: &str) -> Self {
        let mut req = Self {
            method: "POST".to_string(),
            headers: HashMap::new(),
            body: Some(body.as_bytes().to_vec()),
        };
        req.headers
            .insert("content-type".to_string(), "application/json".to_string());
        req
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.headers
            .insert("authorization".to_string(), format!("Bearer {token}"));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

impl RequestContext for MockRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Records what a host sink would have emitted for the verdict.
#[derive(Default)]
pub struct RecordingSink {
    /// `Set-Cookie` header value on admission.
    pub set_cookie: Option<String>,
    /// Short-circuit status on rejection.
    pub status: Option<u16>,
    /// JSON error body on rejection.
    pub body: Option<Value>,
}

impl DecisionSink for RecordingSink {
    fn on_verdict(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Admitted { cookie, .. } => {
                self.set_cookie = Some(cookie.to_header_value());
            }
            Verdict::Rejected { reason } => {
                self.status = Some(401);
                self.body = Some(reason.rejection_body());
            }
        }
    }
}
