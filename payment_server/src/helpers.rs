use std::{net::IpAddr, str::FromStr, sync::OnceLock};

use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::{debug, trace};
use regex::Regex;
use sha2::Sha256;

use crate::errors::AuthError;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| forwarded_for_regex().captures(v))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str().trim_matches('"'))
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

fn forwarded_for_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"for=(?P<ip>[^;,]+)"#).unwrap())
}

/// Checks a base64-encoded HMAC-SHA256 `signature` of `data`, keyed with `secret`.
///
/// The comparison runs in constant time. Signatures that are not valid base64 never match.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &[u8]) -> bool {
    let Ok(signature) = base64::decode(signature) else {
        debug!("🔐️ HMAC signature is not valid base64");
        return false;
    };
    // HMAC accepts keys of any length, so this cannot fail
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&signature).is_ok()
}

/// Base64-encoded HMAC-SHA256 of `data`, keyed with `secret`.
#[cfg(test)]
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC takes keys of any length");
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}

/// Parses an HTTP Basic `Authorization` header value into a username and password.
pub fn parse_basic_auth(header: &str) -> Result<(String, String), AuthError> {
    let encoded = header
        .strip_prefix("Basic ")
        .or_else(|| header.strip_prefix("basic "))
        .ok_or_else(|| AuthError::PoorlyFormattedCredentials("Expected Basic authorization".into()))?;
    let decoded = base64::decode(encoded.trim())
        .map_err(|e| AuthError::PoorlyFormattedCredentials(format!("Credentials are not valid base64. {e}")))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| AuthError::PoorlyFormattedCredentials("Credentials are not valid UTF-8".into()))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| AuthError::PoorlyFormattedCredentials("Expected username:password".into()))?;
    Ok((username.to_string(), password.to_string()))
}
