use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use std::time::Duration;

/// Safety margin before the real expiry at which a credential is considered stale.
pub const EXPIRATION_WINDOW: Duration = Duration::from_secs(10);

/// Token issued by a successful login, together with its absolute expiry.
#[derive(Debug, Clone)]
pub struct Credential {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: SecretString, expires_at: DateTime<Utc>) -> Self {
        Self { token, expires_at }
    }

    /// Credential issued at `now` and valid for `ttl`
    pub fn issued(token: SecretString, now: DateTime<Utc>, ttl: Duration) -> Self {
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self { token, expires_at }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Stale once `now + EXPIRATION_WINDOW` reaches the expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match now.checked_add_signed(window()) {
            Some(deadline) => self.expires_at <= deadline,
            None => true,
        }
    }
}

/// An absent credential is always stale.
pub fn is_stale(credential: Option<&Credential>, now: DateTime<Utc>) -> bool {
    credential.is_none_or(|c| c.is_expired(now))
}

fn window() -> TimeDelta {
    TimeDelta::from_std(EXPIRATION_WINDOW).unwrap_or(TimeDelta::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use secrecy::ExposeSecret;

    fn token() -> SecretString {
        SecretString::from("t1".to_string())
    }

    fn epoch_plus(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_absent_credential_is_stale() {
        assert!(is_stale(None, Utc::now()));
        assert!(is_stale(None, DateTime::<Utc>::MIN_UTC));
    }

    #[test]
    fn test_zero_expiry_is_expired() {
        let credential = Credential::new(token(), epoch_plus(0));
        assert!(credential.is_expired(Utc::now()));
        assert!(credential.is_expired(epoch_plus(0)));
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let now = Utc::now();
        let credential = Credential::new(token(), now - TimeDelta::seconds(1));
        assert!(credential.is_expired(now));
    }

    #[test]
    fn test_expiry_beyond_window_is_valid() {
        let now = Utc::now();
        let credential = Credential::new(token(), now + TimeDelta::seconds(11));
        assert!(!credential.is_expired(now));
        assert!(!is_stale(Some(&credential), now));
    }

    #[test]
    fn test_expiry_exactly_at_window_is_expired() {
        let now = Utc::now();
        let credential = Credential::new(token(), now + TimeDelta::seconds(10));
        assert!(credential.is_expired(now));
    }

    #[test]
    fn test_issued_adds_ttl() {
        let now = epoch_plus(1_000);
        let credential = Credential::issued(token(), now, Duration::from_secs(60));
        assert_eq!(credential.expires_at(), epoch_plus(1_060));
        assert_eq!(credential.token().expose_secret(), "t1");
    }

    #[test]
    fn test_sixty_second_ttl_timeline() {
        let issued_at = epoch_plus(0);
        let credential = Credential::issued(token(), issued_at, Duration::from_secs(60));

        assert!(!credential.is_expired(epoch_plus(0)));
        assert!(!credential.is_expired(epoch_plus(30)));
        // 5s left, inside the 10s window
        assert!(credential.is_expired(epoch_plus(55)));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let credential = Credential::issued(token(), Utc::now(), Duration::MAX);
        assert_eq!(credential.expires_at(), DateTime::<Utc>::MAX_UTC);
    }
}
