//! Credentials carried as connection sub-protocols.
//!
//! Browser-style websocket transports cannot set custom headers, so the
//! bearer token travels in the `Sec-WebSocket-Protocol` offer instead.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// `base64url.bearer.authorization.<domain>.<token>` for the given token.
pub fn bearer_protocol(domain: &str, token: &str) -> String {
    format!(
        "base64url.bearer.authorization.{}.{}",
        domain,
        URL_SAFE_NO_PAD.encode(token.as_bytes())
    )
}

/// Full sub-protocol offer: framing tag, caller extras, then the bearer tag.
pub fn stream_protocols(
    binary_protocol: &str,
    domain: &str,
    token: Option<&str>,
    extra: &[String],
) -> Vec<String> {
    let mut protocols = Vec::with_capacity(extra.len() + 2);
    protocols.push(binary_protocol.to_string());
    protocols.extend(extra.iter().cloned());
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        protocols.push(bearer_protocol(domain, token));
    }
    protocols
}
