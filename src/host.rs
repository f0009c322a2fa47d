//! Boundary traits between the decision core and its embedding host.
//!
//! The surrounding proxy (or a test harness) implements both sides: a
//! [`RequestContext`] the core reads from, and a [`DecisionSink`] it hands
//! the terminal [`Verdict`](crate::engine::Verdict) to. Keeping the pair
//! this narrow is what lets the engine run host-agnostic and unit-test
//! without any sandbox runtime.

use crate::engine::Verdict;

/// Read-only view of one inbound request.
pub trait RequestContext {
    /// HTTP method, uppercase (`GET`, `POST`, ...).
    fn method(&self) -> &str;

    /// Header lookup. `name` is given lowercase; implementations match
    /// case-insensitively against the wire headers.
    fn header(&self, name: &str) -> Option<&str>;

    /// The fully buffered request body, if the host has one available.
    fn body(&self) -> Option<&[u8]>;
}

/// Receiver for the terminal verdict of a request.
///
/// On `Admitted` the host sets the `Set-Cookie` response header (see
/// [`CookieDirective::to_header_value`](crate::engine::CookieDirective::to_header_value))
/// and lets the request continue to routing. On `Rejected` it
/// short-circuits with HTTP 401 and the JSON body from
/// [`AuthError::rejection_body`](crate::error::AuthError::rejection_body).
pub trait DecisionSink {
    fn on_verdict(&mut self, verdict: &Verdict);
}
