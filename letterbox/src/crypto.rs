//! Signed download links and random affiliate codes.
//!
//! A download link carries `expires` (unix seconds) and `signature`, the hex HMAC-SHA256 of
//! `{purchase_id}.{expires}` keyed with the server secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::prelude::RngExt;
use rand::rng;
use sha2::Sha256;

use crate::types::PurchaseId;

type HmacSha256 = Hmac<Sha256>;

const AFFILIATE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const AFFILIATE_CODE_LENGTH: usize = 8;

fn download_mac(secret: &str, purchase_id: PurchaseId, expires: i64) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("{purchase_id}.{expires}").as_bytes());
    Some(mac)
}

/// Signature for a download of `purchase_id` valid until `expires`.
pub fn sign_download(secret: &str, purchase_id: PurchaseId, expires: i64) -> Option<String> {
    let mac = download_mac(secret, purchase_id, expires)?;
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Path of a signed download link, relative to the API root.
pub fn download_path(secret: &str, purchase_id: PurchaseId, expires_at: DateTime<Utc>) -> Option<String> {
    let expires = expires_at.timestamp();
    let signature = sign_download(secret, purchase_id, expires)?;
    Some(format!("/api/downloads/{purchase_id}?expires={expires}&signature={signature}"))
}

/// Whether the link is unexpired at `now` and the signature matches. Constant time in the
/// signature.
pub fn verify_download(secret: &str, purchase_id: PurchaseId, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
    if expires < now.timestamp() {
        return false;
    }

    let Ok(expected) = hex::decode(signature) else {
        return false;
    };

    download_mac(secret, purchase_id, expires).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

/// Random affiliate code without easily confused characters (no 0/O, 1/I).
pub fn generate_affiliate_code() -> String {
    let mut rng = rng();
    (0..AFFILIATE_CODE_LENGTH)
        .map(|_| AFFILIATE_CODE_ALPHABET[rng.random_range(0..AFFILIATE_CODE_ALPHABET.len())] as char)
        .collect()
}
