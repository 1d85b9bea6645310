//! Webhook signature verification.
//!
//! The provider signs notifications with an `x-signature` header of the form
//! `ts=<unix>,v1=<hex hmac>`. The signed manifest is
//! `id:<data.id>;request-id:<x-request-id>;ts:<ts>;` and the key is the
//! webhook secret configured for the application.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader<'a> {
    ts: &'a str,
    v1: &'a str,
}

fn parse_header(header: &str) -> Option<SignatureHeader<'_>> {
    let mut ts = None;
    let mut v1 = None;

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key.trim() {
            "ts" => ts = Some(value.trim()),
            "v1" => v1 = Some(value.trim()),
            _ => {}
        }
    }

    Some(SignatureHeader { ts: ts?, v1: v1? })
}

fn manifest(data_id: &str, request_id: Option<&str>, ts: &str) -> String {
    let mut manifest = format!("id:{};", data_id.to_ascii_lowercase());
    if let Some(request_id) = request_id.filter(|r| !r.is_empty()) {
        manifest.push_str(&format!("request-id:{};", request_id));
    }
    manifest.push_str(&format!("ts:{};", ts));
    manifest
}

pub fn sign(secret: &str, data_id: &str, request_id: Option<&str>, ts: &str) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(manifest(data_id, request_id, ts).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Maximum distance between the signed `ts` and the local clock.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

pub fn verify(secret: &str, header: &str, request_id: Option<&str>, data_id: &str) -> bool {
    verify_at(secret, header, request_id, data_id, chrono::Utc::now().timestamp())
}

/// Same as [`verify`] against an explicit clock, in unix seconds.
pub fn verify_at(
    secret: &str,
    header: &str,
    request_id: Option<&str>,
    data_id: &str,
    now: i64,
) -> bool {
    let Some(parsed) = parse_header(header) else {
        return false;
    };

    let Some(signed_at) = timestamp_secs(parsed.ts) else {
        return false;
    };
    if (now - signed_at).abs() > TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(ts = parsed.ts, "Webhook signature timestamp outside tolerance");
        return false;
    }

    let expected = sign(secret, data_id, request_id, parsed.ts);
    if expected.is_empty() {
        return false;
    }

    expected
        .as_bytes()
        .ct_eq(parsed.v1.to_ascii_lowercase().as_bytes())
        .into()
}

// The provider has sent `ts` both in seconds and in milliseconds.
fn timestamp_secs(ts: &str) -> Option<i64> {
    let value: i64 = ts.parse().ok()?;
    if value > 100_000_000_000 {
        Some(value / 1000)
    } else {
        Some(value)
    }
}
