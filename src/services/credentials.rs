use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

fn keyed_mac(secret: &str, parts: &[&str]) -> Option<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
    for part in parts {
        mac.update(part.as_bytes());
        mac.update(b"\x1f");
    }
    Some(mac)
}

fn keyed_digest(secret: &str, parts: &[&str]) -> String {
    keyed_mac(secret, parts)
        .map(|mac| base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

fn verify_digest(secret: &str, parts: &[&str], expected_b64: &str) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(expected_b64) else {
        return false;
    };
    match keyed_mac(secret, parts) {
        Some(mac) => mac.verify_slice(&expected).is_ok(),
        None => false,
    }
}

/// bcrypt with the given work factor; the salt is embedded in the returned hash.
pub fn hash_password(password: &str, cost: u32) -> anyhow::Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// OTP digests are bound to the admin so a code cannot be replayed across accounts.
pub fn hash_otp(secret: &str, admin_id: i64, code: &str) -> String {
    keyed_digest(secret, &["otp", &admin_id.to_string(), code.trim()])
}

pub fn verify_otp(secret: &str, admin_id: i64, code: &str, hash: &str) -> bool {
    verify_digest(secret, &["otp", &admin_id.to_string(), code.trim()], hash)
}

/// Six decimal digits drawn from a v4 UUID's random bits.
pub fn generate_otp_code() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 1_000_000;
    format!("{n:06}")
}

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn password_problems(password: &str) -> Vec<String> {
    let mut problems = vec![];
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("password must contain a digit".to_string());
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        problems.push("password must contain a letter".to_string());
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("hunter22", TEST_COST).unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not a bcrypt hash"));
    }

    #[test]
    fn test_password_hash_is_salted() {
        let first = hash_password("hunter22", TEST_COST).unwrap();
        let second = hash_password("hunter22", TEST_COST).unwrap();
        assert_ne!(first, second);
        assert!(verify_password("hunter22", &second));
    }

    #[test]
    fn test_otp_bound_to_admin() {
        let hash = hash_otp("secret", 1, "123456");
        assert!(verify_otp("secret", 1, " 123456 ", &hash));
        assert!(!verify_otp("secret", 2, "123456", &hash));
        assert!(!verify_otp("secret", 1, "654321", &hash));
        assert!(!verify_otp("secret", 1, "123456", "not base64!"));
    }

    #[test]
    fn test_otp_code_shape() {
        for _ in 0..20 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_password_problems() {
        assert!(password_problems("cleaner2024").is_empty());
        assert_eq!(password_problems("short1").len(), 1);
        assert_eq!(password_problems("abcdefghij").len(), 1);
        assert_eq!(password_problems("").len(), 3);
    }
}
