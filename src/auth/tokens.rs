//! Account activation tokens.
//!
//! A token has the form `<timestamp base36>-<hmac hex>`. The MAC covers the
//! user's id, password hash and active flag along with the timestamp, so a
//! token stops verifying as soon as the account is activated or its password
//! changes. No server-side state is kept.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::db::models::User;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub struct ActivationTokens<'a> {
    secret: &'a [u8],
    ttl_secs: i64,
}

impl<'a> ActivationTokens<'a> {
    pub fn new(secret: &'a [u8], ttl_hours: u64) -> Self {
        let ttl_secs = i64::try_from(ttl_hours.saturating_mul(3600)).unwrap_or(i64::MAX);
        Self { secret, ttl_secs }
    }

    pub fn make_token(&self, user: &User) -> AppResult<String> {
        self.make_token_at(user, chrono::Utc::now().timestamp())
    }

    pub fn check_token(&self, user: &User, token: &str) -> bool {
        self.check_token_at(user, token, chrono::Utc::now().timestamp())
    }

    fn make_token_at(&self, user: &User, timestamp: i64) -> AppResult<String> {
        let mac = self
            .mac(user, timestamp)
            .map_err(|e| AppError::Internal(format!("activation key: {e}")))?
            .finalize()
            .into_bytes();
        Ok(format!("{}-{}", to_base36(timestamp), hex::encode(mac)))
    }

    fn check_token_at(&self, user: &User, token: &str, now: i64) -> bool {
        let Some((ts, digest)) = token.split_once('-') else {
            return false;
        };
        let Some(timestamp) = from_base36(ts) else {
            return false;
        };
        let Ok(digest) = hex::decode(digest) else {
            return false;
        };

        if now.saturating_sub(timestamp) > self.ttl_secs {
            return false;
        }

        match self.mac(user, timestamp) {
            Ok(mac) => mac.verify_slice(&digest).is_ok(),
            Err(_) => false,
        }
    }

    fn mac(&self, user: &User, timestamp: i64) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(self.secret)?;
        mac.update(b"parse-blog.activation");
        mac.update(user.id.to_string().as_bytes());
        mac.update(user.password_hash.as_bytes());
        mac.update(if user.is_active { b"1" } else { b"0" });
        mac.update(timestamp.to_string().as_bytes());
        Ok(mac)
    }
}

/// URL-safe base64 of the decimal user id, as used in activation links.
pub fn encode_uid(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64).ok()?;
    std::str::from_utf8(&bytes).ok()?.parse().ok()
}

fn to_base36(mut n: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn from_base36(s: &str) -> Option<i64> {
    if s.is_empty() || s.len() > 12 {
        return None;
    }
    i64::from_str_radix(s, 36).ok().filter(|n| *n >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn user(is_active: bool) -> User {
        User {
            id: 42,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$2b$04$abcdefghijklmnopqrstuv".to_string(),
            is_active,
            date_joined: "2026-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn fresh_token_verifies() {
        let tokens = ActivationTokens::new(SECRET, 72);
        let inactive = user(false);
        let token = tokens.make_token(&inactive).unwrap();
        assert!(tokens.check_token(&inactive, &token));
    }

    #[test]
    fn token_is_single_use() {
        let tokens = ActivationTokens::new(SECRET, 72);
        let token = tokens.make_token(&user(false)).unwrap();
        // Once activated, the same token no longer matches
        assert!(!tokens.check_token(&user(true), &token));
    }

    #[test]
    fn tampered_token_fails() {
        let tokens = ActivationTokens::new(SECRET, 72);
        let inactive = user(false);
        let token = tokens.make_token(&inactive).unwrap();

        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });
        assert!(!tokens.check_token(&inactive, &tampered));

        assert!(!tokens.check_token(&inactive, "garbage"));
        assert!(!tokens.check_token(&inactive, "zz-nothex"));
        assert!(!tokens.check_token(&inactive, ""));
    }

    #[test]
    fn token_bound_to_user_and_secret() {
        let tokens = ActivationTokens::new(SECRET, 72);
        let token = tokens.make_token(&user(false)).unwrap();

        let mut other = user(false);
        other.id = 43;
        assert!(!tokens.check_token(&other, &token));

        let other_secret = ActivationTokens::new(b"another", 72);
        assert!(!other_secret.check_token(&user(false), &token));
    }

    #[test]
    fn token_expires() {
        let tokens = ActivationTokens::new(SECRET, 1);
        let inactive = user(false);
        let issued = 1_700_000_000;
        let token = tokens.make_token_at(&inactive, issued).unwrap();

        assert!(tokens.check_token_at(&inactive, &token, issued + 3600));
        assert!(!tokens.check_token_at(&inactive, &token, issued + 3601));
    }

    #[test]
    fn uid_round_trip() {
        assert_eq!(encode_uid(42), "NDI");
        assert_eq!(decode_uid("NDI"), Some(42));
        assert_eq!(decode_uid("!!"), None);
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("abc")), None);
    }

    #[test]
    fn base36_round_trip() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(from_base36("10"), Some(36));
        assert_eq!(from_base36(&to_base36(1_700_000_000)), Some(1_700_000_000));
        assert_eq!(from_base36(""), None);
        assert_eq!(from_base36("-1"), None);
    }
}
