//! Resolved validation policy and its configuration sources.
//!
//! A [`ValidationPolicy`] is constructed once, before the filter starts
//! serving traffic, and threaded explicitly through every call - never
//! ambient state. It is immutable and shared read-only across concurrent
//! requests; key material (`jsonwebtoken::DecodingKey`) is cheap to share
//! and never copied per request.
//!
//! Key distribution and JWKS refresh belong to the policy source outside
//! this crate. What this module does provide is the parsing half:
//! [`keys_from_jwks`] turns an externally supplied JWKS document into key
//! material, and [`ValidationPolicy::from_file`] loads a YAML or JSON policy
//! file at startup.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// `SameSite` attribute of the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        };
        f.write_str(s)
    }
}

/// Attributes of the session cookie issued on admission.
///
/// The cookie value is the admitted token's `jti` and its lifetime is
/// bounded by both the token expiry and `max_age` - a deliberate policy
/// choice of this filter, not a wire-format requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    /// Cookie name.
    pub name: String,
    /// Ceiling on the cookie lifetime; the token's own expiry may shorten it.
    pub max_age: Duration,
    /// Emit the `Secure` attribute.
    pub secure: bool,
    /// `SameSite` attribute.
    pub same_site: SameSite,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            max_age: Duration::from_secs(3600),
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}

/// Immutable, resolved configuration for one filter instance.
#[derive(Clone)]
pub struct ValidationPolicy {
    allowed_algs: Vec<Algorithm>,
    keys: HashMap<String, DecodingKey>,
    default_key: Option<DecodingKey>,
    issuer: Option<String>,
    audience: Option<String>,
    leeway_secs: u64,
    replay_window: Duration,
    replay_capacity: usize,
    replay_fail_open: bool,
    body_token: bool,
    cookie: CookiePolicy,
}

impl fmt::Debug for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // DecodingKey is opaque; log key ids only.
        f.debug_struct("ValidationPolicy")
            .field("allowed_algs", &self.allowed_algs)
            .field("key_ids", &self.keys.keys().collect::<Vec<_>>())
            .field("has_default_key", &self.default_key.is_some())
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_secs", &self.leeway_secs)
            .field("replay_window", &self.replay_window)
            .field("replay_capacity", &self.replay_capacity)
            .field("replay_fail_open", &self.replay_fail_open)
            .field("body_token", &self.body_token)
            .field("cookie", &self.cookie)
            .finish()
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            allowed_algs: Vec::new(),
            keys: HashMap::new(),
            default_key: None,
            issuer: None,
            audience: None,
            leeway_secs: 30,
            replay_window: Duration::from_secs(300),
            replay_capacity: 10_000,
            replay_fail_open: false,
            body_token: false,
            cookie: CookiePolicy::default(),
        }
    }
}

impl ValidationPolicy {
    /// Create a policy with defaults: empty allow-list and key set, 30s
    /// leeway, 300s replay window, 10k replay capacity, fail-closed,
    /// header-only token sourcing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an algorithm to the allow-list.
    pub fn allow_algorithm(mut self, alg: Algorithm) -> Self {
        if !self.allowed_algs.contains(&alg) {
            self.allowed_algs.push(alg);
        }
        self
    }

    /// Register key material under a key id, selected by the token's `kid`.
    pub fn key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid.into(), key);
        self
    }

    /// Register the key used when the token carries no `kid`.
    pub fn default_key(mut self, key: DecodingKey) -> Self {
        self.default_key = Some(key);
        self
    }

    /// Configure the expected issuer claim. Exact match.
    pub fn issuer(mut self, iss: impl Into<String>) -> Self {
        self.issuer = Some(iss.into());
        self
    }

    /// Configure the expected audience claim.
    pub fn audience(mut self, aud: impl Into<String>) -> Self {
        self.audience = Some(aud.into());
        self
    }

    /// Clock-skew tolerance applied symmetrically to `exp` and `nbf`.
    pub fn leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    /// Ceiling on how long a `jti` is held for replay detection.
    pub fn replay_window(mut self, window: Duration) -> Self {
        self.replay_window = window;
        self
    }

    /// Maximum number of remembered `jti` values.
    pub fn replay_capacity(mut self, capacity: usize) -> Self {
        self.replay_capacity = capacity.max(1);
        self
    }

    /// Behavior when replay storage itself fails: `true` admits, `false`
    /// rejects. Default is fail-closed to preserve the replay guarantee.
    pub fn replay_fail_open(mut self, fail_open: bool) -> Self {
        self.replay_fail_open = fail_open;
        self
    }

    /// Permit token extraction from a JSON request body.
    pub fn body_token(mut self, allowed: bool) -> Self {
        self.body_token = allowed;
        self
    }

    /// Session cookie attributes.
    pub fn cookie(mut self, cookie: CookiePolicy) -> Self {
        self.cookie = cookie;
        self
    }

    /// Is this algorithm in the allow-list?
    pub fn allows(&self, alg: Algorithm) -> bool {
        self.allowed_algs.contains(&alg)
    }

    /// Select key material for a token.
    ///
    /// With a `kid`, only the exact entry matches; without one, the default
    /// key applies. `None` means no usable key, which callers surface as
    /// a key-selection failure distinct from bad cryptography.
    pub fn key_for(&self, kid: Option<&str>) -> Option<&DecodingKey> {
        match kid {
            Some(kid) => self.keys.get(kid),
            None => self.default_key.as_ref(),
        }
    }

    pub fn issuer_expected(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn audience_expected(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    pub fn leeway_secs(&self) -> u64 {
        self.leeway_secs
    }

    pub fn replay_window_duration(&self) -> Duration {
        self.replay_window
    }

    pub fn replay_capacity_limit(&self) -> usize {
        self.replay_capacity
    }

    pub fn is_replay_fail_open(&self) -> bool {
        self.replay_fail_open
    }

    pub fn body_token_allowed(&self) -> bool {
        self.body_token
    }

    pub fn cookie_policy(&self) -> &CookiePolicy {
        &self.cookie
    }

    /// Load a policy from a YAML or JSON file, dispatched on extension.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading policy file {}", path.display()))?;
        let file: PolicyFile = if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            serde_yaml::from_str(&content).context("parsing YAML policy")?
        } else {
            serde_json::from_str(&content).context("parsing JSON policy")?
        };
        Self::from_config(file)
    }

    /// Build a resolved policy from the deserialized file form.
    pub fn from_config(file: PolicyFile) -> anyhow::Result<Self> {
        let mut policy = ValidationPolicy::new();
        for alg in &file.algorithms {
            let parsed: Algorithm = alg
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown algorithm {alg:?} in policy"))?;
            policy = policy.allow_algorithm(parsed);
        }
        if let Some(jwks) = &file.jwks {
            for (kid, key) in keys_from_jwks(jwks) {
                if kid.is_empty() {
                    policy = policy.default_key(key);
                } else {
                    policy = policy.key(kid, key);
                }
            }
        }
        if let Some(iss) = file.issuer {
            policy = policy.issuer(iss);
        }
        if let Some(aud) = file.audience {
            policy = policy.audience(aud);
        }
        policy = policy
            .leeway(file.leeway_secs)
            .replay_window(Duration::from_secs(file.replay.window_secs))
            .replay_capacity(file.replay.capacity)
            .replay_fail_open(file.replay.fail_open)
            .body_token(file.body_token)
            .cookie(CookiePolicy {
                name: file.cookie.name,
                max_age: Duration::from_secs(file.cookie.max_age_secs),
                secure: file.cookie.secure,
                same_site: file.cookie.same_site,
            });
        anyhow::ensure!(
            !policy.allowed_algs.is_empty(),
            "policy must allow at least one algorithm"
        );
        anyhow::ensure!(
            !policy.keys.is_empty() || policy.default_key.is_some(),
            "policy must configure at least one key"
        );
        Ok(policy)
    }
}

/// Parse an externally supplied JWKS document into key material.
///
/// Supports `oct` keys for HS* algorithms (base64url secret in `k`) and RSA
/// public keys for RS* (`n`/`e` components). Entries with an unsupported
/// kty/alg combination are skipped. A key without a `kid` lands under the
/// empty string, which [`ValidationPolicy::from_config`] treats as the
/// default key.
pub fn keys_from_jwks(doc: &Value) -> HashMap<String, DecodingKey> {
    let mut map: HashMap<String, DecodingKey> = HashMap::new();
    let Some(keys) = doc.get("keys").and_then(Value::as_array) else {
        return map;
    };
    for k in keys {
        let kid = k.get("kid").and_then(Value::as_str).unwrap_or("");
        let kty = k.get("kty").and_then(Value::as_str).unwrap_or("");
        let alg = k.get("alg").and_then(Value::as_str).unwrap_or("");
        // HMAC (oct) keys for HS* algorithms
        if kty.eq_ignore_ascii_case("oct")
            && (alg.eq_ignore_ascii_case("HS256")
                || alg.eq_ignore_ascii_case("HS384")
                || alg.eq_ignore_ascii_case("HS512"))
        {
            if let Some(kval) = k.get("k").and_then(Value::as_str) {
                if let Ok(secret) = URL_SAFE_NO_PAD.decode(kval) {
                    map.insert(kid.to_string(), DecodingKey::from_secret(&secret));
                } else {
                    debug!(kid, "skipping oct key with non-base64url secret");
                }
            }
            continue;
        }
        // RSA public keys for RS* algorithms
        if kty.eq_ignore_ascii_case("RSA")
            && (alg.eq_ignore_ascii_case("RS256")
                || alg.eq_ignore_ascii_case("RS384")
                || alg.eq_ignore_ascii_case("RS512"))
        {
            let Some(n) = k.get("n").and_then(Value::as_str) else {
                continue;
            };
            let Some(e) = k.get("e").and_then(Value::as_str) else {
                continue;
            };
            // base64url-encoded components, as published in JWKS
            if let Ok(dk) = DecodingKey::from_rsa_components(n, e) {
                map.insert(kid.to_string(), dk);
            } else {
                debug!(kid, "skipping RSA key with unusable components");
            }
            continue;
        }
        debug!(kid, kty, alg, "skipping unsupported JWKS entry");
    }
    map
}

/// On-disk policy file shape.
#[derive(Debug, Deserialize)]
pub struct PolicyFile {
    /// Algorithm allow-list, e.g. `["HS256", "RS256"]`.
    pub algorithms: Vec<String>,
    /// Inline JWKS document supplying key material.
    #[serde(default)]
    pub jwks: Option<Value>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
    #[serde(default)]
    pub replay: ReplaySection,
    /// Permit body-sourced tokens.
    #[serde(default)]
    pub body_token: bool,
    #[serde(default)]
    pub cookie: CookieSection,
}

fn default_leeway_secs() -> u64 {
    30
}

/// `replay:` section of the policy file.
#[derive(Debug, Deserialize)]
pub struct ReplaySection {
    #[serde(default = "default_replay_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_replay_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub fail_open: bool,
}

fn default_replay_window_secs() -> u64 {
    300
}

fn default_replay_capacity() -> usize {
    10_000
}

impl Default for ReplaySection {
    fn default() -> Self {
        Self {
            window_secs: default_replay_window_secs(),
            capacity: default_replay_capacity(),
            fail_open: false,
        }
    }
}

/// `cookie:` section of the policy file.
#[derive(Debug, Deserialize)]
pub struct CookieSection {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    #[serde(default = "default_cookie_max_age_secs")]
    pub max_age_secs: u64,
    #[serde(default = "default_true")]
    pub secure: bool,
    #[serde(default = "default_same_site")]
    pub same_site: SameSite,
}

fn default_cookie_name() -> String {
    "session".to_string()
}

fn default_cookie_max_age_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_same_site() -> SameSite {
    SameSite::Lax
}

impl Default for CookieSection {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            max_age_secs: default_cookie_max_age_secs(),
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}
