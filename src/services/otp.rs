use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::services::credentials;

pub const MAX_ATTEMPTS: i64 = 5;

#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub code_hash: String,
    pub expires_at: NaiveDateTime,
    pub attempts: i64,
}

/// Time-boxed one-time codes keyed by admin id.
pub trait OtpStore: Send + Sync {
    /// Replaces any outstanding code for the admin and resets its attempt count.
    fn put(&self, admin_id: i64, code_hash: &str, expires_at: NaiveDateTime) -> anyhow::Result<()>;
    fn get(&self, admin_id: i64) -> anyhow::Result<Option<OtpRecord>>;
    /// Returns the attempt count after recording the failure.
    fn record_failure(&self, admin_id: i64) -> anyhow::Result<i64>;
    fn remove(&self, admin_id: i64) -> anyhow::Result<()>;
    fn purge_expired(&self, now: NaiveDateTime) -> anyhow::Result<usize>;
}

/// Durable store backed by the `admin_otps` table.
pub struct SqliteOtpStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteOtpStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }
}

impl OtpStore for SqliteOtpStore {
    fn put(&self, admin_id: i64, code_hash: &str, expires_at: NaiveDateTime) -> anyhow::Result<()> {
        queries::upsert_otp(&*self.conn()?, admin_id, code_hash, &expires_at)
    }

    fn get(&self, admin_id: i64) -> anyhow::Result<Option<OtpRecord>> {
        Ok(queries::get_otp(&*self.conn()?, admin_id)?.map(|o| OtpRecord {
            code_hash: o.code_hash,
            expires_at: o.expires_at,
            attempts: o.attempts,
        }))
    }

    fn record_failure(&self, admin_id: i64) -> anyhow::Result<i64> {
        queries::increment_otp_attempts(&*self.conn()?, admin_id)
    }

    fn remove(&self, admin_id: i64) -> anyhow::Result<()> {
        queries::delete_otp(&*self.conn()?, admin_id)
    }

    fn purge_expired(&self, now: NaiveDateTime) -> anyhow::Result<usize> {
        queries::delete_expired_otps(&*self.conn()?, &now)
    }
}

/// Process-local store. Codes are lost on restart and not shared between
/// instances; only suitable for single-instance development setups.
#[derive(Default)]
pub struct MemoryOtpStore {
    entries: Mutex<HashMap<i64, OtpRecord>>,
}

impl MemoryOtpStore {
    fn entries(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<i64, OtpRecord>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("otp store lock poisoned"))
    }
}

impl OtpStore for MemoryOtpStore {
    fn put(&self, admin_id: i64, code_hash: &str, expires_at: NaiveDateTime) -> anyhow::Result<()> {
        self.entries()?.insert(
            admin_id,
            OtpRecord {
                code_hash: code_hash.to_string(),
                expires_at,
                attempts: 0,
            },
        );
        Ok(())
    }

    fn get(&self, admin_id: i64) -> anyhow::Result<Option<OtpRecord>> {
        Ok(self.entries()?.get(&admin_id).cloned())
    }

    fn record_failure(&self, admin_id: i64) -> anyhow::Result<i64> {
        Ok(self
            .entries()?
            .get_mut(&admin_id)
            .map(|r| {
                r.attempts += 1;
                r.attempts
            })
            .unwrap_or(0))
    }

    fn remove(&self, admin_id: i64) -> anyhow::Result<()> {
        self.entries()?.remove(&admin_id);
        Ok(())
    }

    fn purge_expired(&self, now: NaiveDateTime) -> anyhow::Result<usize> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|_, r| r.expires_at > now);
        Ok(before - entries.len())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("no verification code has been issued for this account")]
    NotIssued,

    #[error("the verification code has expired, please request a new one")]
    Expired,

    #[error("the verification code is incorrect ({remaining} attempts left)")]
    Invalid { remaining: i64 },

    #[error("too many incorrect attempts, please request a new code")]
    TooManyAttempts,

    #[error("otp store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Issues a fresh code and returns it in plain text for delivery.
pub fn issue(
    store: &dyn OtpStore,
    secret: &str,
    admin_id: i64,
    ttl_minutes: i64,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let code = credentials::generate_otp_code();
    let hash = credentials::hash_otp(secret, admin_id, &code);
    store.put(admin_id, &hash, now + Duration::minutes(ttl_minutes))?;
    tracing::info!(admin_id, ttl_minutes, "issued admin verification code");
    Ok(code)
}

/// Checks a submitted code. A correct code is consumed; expiry or too many
/// failures also drop it so the admin has to request a new one.
pub fn verify(
    store: &dyn OtpStore,
    secret: &str,
    admin_id: i64,
    code: &str,
    now: NaiveDateTime,
) -> Result<(), OtpError> {
    let record = store.get(admin_id)?.ok_or(OtpError::NotIssued)?;

    if record.expires_at <= now {
        store.remove(admin_id)?;
        return Err(OtpError::Expired);
    }
    if record.attempts >= MAX_ATTEMPTS {
        store.remove(admin_id)?;
        return Err(OtpError::TooManyAttempts);
    }

    if credentials::verify_otp(secret, admin_id, code, &record.code_hash) {
        store.remove(admin_id)?;
        return Ok(());
    }

    let attempts = store.record_failure(admin_id)?;
    tracing::warn!(admin_id, attempts, "incorrect admin verification code");
    if attempts >= MAX_ATTEMPTS {
        store.remove(admin_id)?;
        return Err(OtpError::TooManyAttempts);
    }
    Err(OtpError::Invalid {
        remaining: MAX_ATTEMPTS - attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    const SECRET: &str = "test-secret";

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-10-19 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn sqlite_store() -> SqliteOtpStore {
        let conn = db::init_db(":memory:").unwrap();
        queries::create_admin(&conn, "ops@example.com", "Ops").unwrap();
        SqliteOtpStore::new(Arc::new(Mutex::new(conn)))
    }

    fn exercise_happy_path(store: &dyn OtpStore) {
        let code = issue(store, SECRET, 1, 10, now()).unwrap();
        assert!(verify(store, SECRET, 1, &code, now() + Duration::minutes(5)).is_ok());
        // consumed
        assert!(matches!(
            verify(store, SECRET, 1, &code, now()),
            Err(OtpError::NotIssued)
        ));
    }

    fn exercise_expiry(store: &dyn OtpStore) {
        let code = issue(store, SECRET, 1, 10, now()).unwrap();
        assert!(matches!(
            verify(store, SECRET, 1, &code, now() + Duration::minutes(10)),
            Err(OtpError::Expired)
        ));
        assert!(store.get(1).unwrap().is_none());
    }

    fn exercise_lockout(store: &dyn OtpStore) {
        let code = issue(store, SECRET, 1, 10, now()).unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };
        for remaining in (1..MAX_ATTEMPTS).rev() {
            match verify(store, SECRET, 1, wrong, now()) {
                Err(OtpError::Invalid { remaining: r }) => assert_eq!(r, remaining),
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert!(matches!(
            verify(store, SECRET, 1, wrong, now()),
            Err(OtpError::TooManyAttempts)
        ));
        // even the right code is gone now
        assert!(matches!(
            verify(store, SECRET, 1, &code, now()),
            Err(OtpError::NotIssued)
        ));
    }

    #[test]
    fn test_sqlite_store_flow() {
        exercise_happy_path(&sqlite_store());
        exercise_expiry(&sqlite_store());
        exercise_lockout(&sqlite_store());
    }

    #[test]
    fn test_memory_store_flow() {
        exercise_happy_path(&MemoryOtpStore::default());
        exercise_expiry(&MemoryOtpStore::default());
        exercise_lockout(&MemoryOtpStore::default());
    }

    #[test]
    fn test_reissue_resets_attempts() {
        let store = MemoryOtpStore::default();
        issue(&store, SECRET, 1, 10, now()).unwrap();
        store.record_failure(1).unwrap();
        store.record_failure(1).unwrap();
        issue(&store, SECRET, 1, 10, now()).unwrap();
        assert_eq!(store.get(1).unwrap().unwrap().attempts, 0);
    }

    #[test]
    fn test_purge_expired() {
        let store = sqlite_store();
        issue(&store, SECRET, 1, 10, now()).unwrap();
        assert_eq!(store.purge_expired(now()).unwrap(), 0);
        assert_eq!(store.purge_expired(now() + Duration::minutes(11)).unwrap(), 1);

        let store = MemoryOtpStore::default();
        issue(&store, SECRET, 7, 10, now()).unwrap();
        assert_eq!(store.purge_expired(now() + Duration::minutes(11)).unwrap(), 1);
    }
}
