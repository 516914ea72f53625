//! Ownership-transfer authorization registry.
//!
//! A pending authorization binds a 4-digit token to the current
//! holder's phone. Only a message from that phone can resolve it, and
//! it expires 30 minutes after issuance. Expiry is enforced both
//! lazily on reply and by a periodic sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

pub const TOKEN_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone)]
pub struct TransferAuthorization {
    pub token: String,
    /// Phone of the current holder, the only party allowed to reply.
    pub authorizer_phone: String,
    /// Phone of the session that initiated the transfer.
    pub requester_phone: String,
    pub old_user_id: i64,
    pub new_user_id: i64,
    pub new_holder_name: String,
    pub event_id: String,
    pub event_title: String,
    pub expires_at: DateTime<Utc>,
}

impl TransferAuthorization {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Clone, Default)]
pub struct TransferRegistry {
    inner: Arc<Mutex<HashMap<String, TransferAuthorization>>>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TransferAuthorization>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Draw an unused 4-digit token.
    pub fn new_token(&self) -> String {
        let map = self.lock();
        let mut rng = rand::rng();
        loop {
            let token = format!("{:04}", rng.random_range(0..10_000));
            if !map.contains_key(&token) {
                return token;
            }
        }
    }

    pub fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::minutes(TOKEN_TTL_MINUTES)
    }

    pub fn insert(&self, auth: TransferAuthorization) {
        self.lock().insert(auth.token.clone(), auth);
    }

    pub fn get(&self, token: &str) -> Option<TransferAuthorization> {
        self.lock().get(token).cloned()
    }

    pub fn remove(&self, token: &str) -> Option<TransferAuthorization> {
        self.lock().remove(token)
    }

    /// Remove and return every authorization past its deadline.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<TransferAuthorization> {
        let mut map = self.lock();
        let expired: Vec<String> = map
            .iter()
            .filter(|(_, a)| a.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        expired.into_iter().filter_map(|k| map.remove(&k)).collect()
    }
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(token: &str, expires_at: DateTime<Utc>) -> TransferAuthorization {
        TransferAuthorization {
            token: token.to_string(),
            authorizer_phone: "5547999887766".into(),
            requester_phone: "5547988776655".into(),
            old_user_id: 1,
            new_user_id: 2,
            new_holder_name: "Ana".into(),
            event_id: "10".into(),
            event_title: "Corrida 5K".into(),
            expires_at,
        }
    }

    #[test]
    fn tokens_are_four_digits_and_unique_among_pending() {
        let reg = TransferRegistry::new();
        let t = reg.new_token();
        assert_eq!(t.len(), 4);
        assert!(t.chars().all(|c| c.is_ascii_digit()));

        reg.insert(auth(&t, Utc::now() + Duration::minutes(30)));
        let t2 = reg.new_token();
        assert_ne!(t, t2);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let reg = TransferRegistry::new();
        let now = Utc::now();
        reg.insert(auth("1111", now - Duration::minutes(1)));
        reg.insert(auth("2222", now + Duration::minutes(10)));

        let expired = reg.sweep_expired(now);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].token, "1111");
        assert!(reg.get("1111").is_none());
        assert!(reg.get("2222").is_some());
    }

    #[test]
    fn expiry_deadline_is_thirty_minutes() {
        let now = Utc::now();
        let a = auth("3333", TransferRegistry::expiry_from(now));
        assert!(!a.is_expired_at(now + Duration::minutes(30)));
        assert!(a.is_expired_at(now + Duration::minutes(30) + Duration::seconds(1)));
    }
}
