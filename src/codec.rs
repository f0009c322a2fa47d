//! Structural parsing and decoding of the compact JWT form.
//!
//! This stage is purely syntactic: it splits the three-segment token string,
//! base64url-decodes segments, and JSON-decodes the header and claims. It
//! never consults key material or the clock, which keeps it fuzzable in
//! isolation. Signature bytes are decoded but never interpreted as JSON.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use tracing::debug;

use crate::claims::TokenClaims;
use crate::error::AuthError;

/// A structurally validated JWT, borrowed from the extracted credential.
///
/// Invariant: exactly three non-empty dot-separated segments. Violating that
/// is [`AuthError::MalformedToken`], distinct from every validation failure.
/// The original text is kept whole (the header decoder and the signature
/// verifier both consume it as received); the payload and signature segments
/// are kept as slices for their decoders.
#[derive(Debug, Clone, Copy)]
pub struct RawToken<'t> {
    token: &'t str,
    claims_seg: &'t str,
    signature_seg: &'t str,
}

impl<'t> RawToken<'t> {
    /// Split a candidate credential into its three segments.
    pub fn parse(token: &'t str) -> Result<Self, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_seg), Some(claims_seg), Some(signature_seg), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            debug!("token parse failed: segment count is not 3");
            return Err(AuthError::MalformedToken);
        };
        if header_seg.is_empty() || claims_seg.is_empty() || signature_seg.is_empty() {
            debug!("token parse failed: empty segment");
            return Err(AuthError::MalformedToken);
        }
        Ok(Self {
            token,
            claims_seg,
            signature_seg,
        })
    }

    /// The full compact token as received. The signature verifier consumes
    /// this original text, so the signed `header.payload` bytes reach the
    /// cryptography exactly as they arrived.
    pub fn as_str(&self) -> &'t str {
        self.token
    }

    /// Decode the header segment into its typed form.
    pub fn decode_header(&self) -> Result<jsonwebtoken::Header, AuthError> {
        jsonwebtoken::decode_header(self.token).map_err(|e| {
            debug!(error = ?e.kind(), "token header decode failed");
            AuthError::InvalidEncoding
        })
    }

    /// Decode the payload segment into the open claims mapping.
    ///
    /// Bad base64url is [`AuthError::InvalidEncoding`]; bytes that decode but
    /// are not a JSON object are [`AuthError::InvalidClaims`]. Callers report
    /// the two causes separately.
    pub fn decode_claims(&self) -> Result<TokenClaims, AuthError> {
        let bytes = URL_SAFE_NO_PAD.decode(self.claims_seg).map_err(|e| {
            debug!(error = %e, "token payload is not valid base64url");
            AuthError::InvalidEncoding
        })?;
        TokenClaims::from_slice(&bytes)
    }

    /// Decode the signature segment to raw bytes.
    pub fn decode_signature(&self) -> Result<Vec<u8>, AuthError> {
        URL_SAFE_NO_PAD.decode(self.signature_seg).map_err(|e| {
            debug!(error = %e, "token signature is not valid base64url");
            AuthError::InvalidEncoding
        })
    }
}
