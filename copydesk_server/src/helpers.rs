use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::{debug, trace};
use sha2::Sha256;

/// Base64-encoded HMAC-SHA256 over `data`, as the checkout provider computes it for webhook signatures.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in
/// decreasing order of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result =
            req.headers().get("X-Forwarded-For").and_then(|v| v.to_str().ok()).and_then(|s| IpAddr::from_str(s).ok());
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
            .and_then(|v| v.split(';').find_map(|part| part.trim().strip_prefix("for=")))
            .and_then(|s| IpAddr::from_str(s.trim_matches('"')).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.and_then(|s| IpAddr::from_str(&s).ok())
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hmac_is_stable_and_key_sensitive() {
        let sig = calculate_hmac("whsec_test", b"{\"id\":\"evt_1\"}");
        assert_eq!(sig, calculate_hmac("whsec_test", b"{\"id\":\"evt_1\"}"));
        assert_ne!(sig, calculate_hmac("whsec_other", b"{\"id\":\"evt_1\"}"));
        assert_ne!(sig, calculate_hmac("whsec_test", b"{\"id\":\"evt_2\"}"));
    }
}
