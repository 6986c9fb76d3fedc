use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use sociogram_core::config::CredentialsConfig;
use sociogram_core::error::{ErrorCode, SociogramError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::transport::FailureKind;

const FINGERPRINT_MIN_LEN: usize = 8;
const FINGERPRINT_TAIL: usize = 4;

/// An API key. `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(Arc<str>);

impl Credential {
    pub fn new(secret: impl AsRef<str>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Last four characters of keys longer than eight, nothing otherwise.
    pub fn fingerprint(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= FINGERPRINT_MIN_LEN {
            return "…".to_string();
        }
        let tail: String = chars[chars.len() - FINGERPRINT_TAIL..].iter().collect();
        format!("…{}", tail)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fingerprint())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSlot {
    pub credential: Credential,
    pub consecutive_failures: u32,
    pub cooldown_until: Option<Instant>,
}

impl CredentialSlot {
    fn new(credential: Credential) -> Self {
        Self {
            credential,
            consecutive_failures: 0,
            cooldown_until: None,
        }
    }

    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSettings {
    pub cooldown: Duration,
    pub auth_cooldown: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from(&CredentialsConfig::default())
    }
}

impl From<&CredentialsConfig> for PoolSettings {
    fn from(config: &CredentialsConfig) -> Self {
        Self {
            cooldown: Duration::from_secs(config.cooldown_secs),
            auth_cooldown: Duration::from_secs(config.auth_cooldown_secs),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("credential pool is empty")]
    Empty,
    #[error("all {size} credentials are cooling down; next available in {retry_after:?}")]
    Exhausted { size: usize, retry_after: Duration },
    #[error("credential {0} does not belong to this pool")]
    UnknownCredential(String),
    #[error("credential pool lock poisoned")]
    LockPoisoned,
}

impl SociogramError for PoolError {
    fn error_code(&self) -> ErrorCode {
        match self {
            PoolError::Empty | PoolError::Exhausted { .. } => ErrorCode::ResourceExhausted,
            PoolError::UnknownCredential(_) => ErrorCode::InvalidArgument,
            PoolError::LockPoisoned => ErrorCode::Internal,
        }
    }
}

struct PoolState {
    slots: Vec<CredentialSlot>,
    rng: StdRng,
}

/// Owns the API keys of one deployment and decides which key the next AI
/// call uses. Safe to share across concurrent analyses behind an `Arc`; the
/// lock is only held while slot bookkeeping changes.
pub struct CredentialPool {
    state: Mutex<PoolState>,
    settings: PoolSettings,
}

impl CredentialPool {
    pub fn new(
        credentials: impl IntoIterator<Item = Credential>,
        settings: PoolSettings,
        seed: Option<u64>,
    ) -> Self {
        let mut slots: Vec<CredentialSlot> = Vec::new();
        for credential in credentials {
            if credential.expose().trim().is_empty() {
                continue;
            }
            if slots.iter().any(|slot| slot.credential == credential) {
                continue;
            }
            slots.push(CredentialSlot::new(credential));
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!("Credential pool created with {} keys", slots.len());
        Self {
            state: Mutex::new(PoolState { slots, rng }),
            settings,
        }
    }

    pub fn from_config(config: &CredentialsConfig) -> Self {
        Self::new(
            config.keys.iter().map(|key| Credential::new(key.trim())),
            PoolSettings::from(config),
            config.seed,
        )
    }

    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    pub fn len(&self) -> Result<usize, PoolError> {
        let state = self.state.lock().map_err(|_| PoolError::LockPoisoned)?;
        Ok(state.slots.len())
    }

    pub fn is_empty(&self) -> Result<bool, PoolError> {
        Ok(self.len()? == 0)
    }

    pub fn slots(&self) -> Result<Vec<CredentialSlot>, PoolError> {
        let state = self.state.lock().map_err(|_| PoolError::LockPoisoned)?;
        Ok(state.slots.clone())
    }

    /// Number of credentials currently eligible for selection.
    pub fn available(&self) -> Result<usize, PoolError> {
        let now = Instant::now();
        let state = self.state.lock().map_err(|_| PoolError::LockPoisoned)?;
        Ok(state
            .slots
            .iter()
            .filter(|slot| !slot.is_cooling_down(now))
            .count())
    }

    pub fn acquire(&self) -> Result<Credential, PoolError> {
        self.acquire_at(Instant::now(), &[])
    }

    /// Like [`acquire`](Self::acquire) but prefers credentials not in `tried`;
    /// falls back to a tried one when nothing else is usable.
    pub fn acquire_excluding(&self, tried: &[Credential]) -> Result<Credential, PoolError> {
        self.acquire_at(Instant::now(), tried)
    }

    pub fn report_success(&self, credential: &Credential) -> Result<(), PoolError> {
        let mut state = self.state.lock().map_err(|_| PoolError::LockPoisoned)?;
        let slot = find_slot(&mut state.slots, credential)?;
        slot.consecutive_failures = 0;
        Ok(())
    }

    pub fn report_failure(
        &self,
        credential: &Credential,
        kind: FailureKind,
    ) -> Result<(), PoolError> {
        self.report_failure_at(credential, kind, Instant::now())
    }

    pub(crate) fn acquire_at(
        &self,
        now: Instant,
        tried: &[Credential],
    ) -> Result<Credential, PoolError> {
        let mut state = self.state.lock().map_err(|_| PoolError::LockPoisoned)?;
        if state.slots.is_empty() {
            return Err(PoolError::Empty);
        }

        for slot in state.slots.iter_mut() {
            if slot.cooldown_until.is_some_and(|until| until <= now) {
                debug!("Credential {} left cooldown", slot.credential);
                slot.cooldown_until = None;
                slot.consecutive_failures = 0;
            }
        }

        let usable: Vec<usize> = state
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.cooldown_until.is_none())
            .map(|(idx, _)| idx)
            .collect();

        if usable.is_empty() {
            let retry_after = state
                .slots
                .iter()
                .filter_map(|slot| slot.cooldown_until)
                .min()
                .map(|until| until.saturating_duration_since(now))
                .unwrap_or_default();
            return Err(PoolError::Exhausted {
                size: state.slots.len(),
                retry_after,
            });
        }

        let fresh: Vec<usize> = usable
            .iter()
            .copied()
            .filter(|idx| !tried.contains(&state.slots[*idx].credential))
            .collect();
        let candidates = if fresh.is_empty() { usable } else { fresh };

        let pick = candidates[state.rng.gen_range(0..candidates.len())];
        Ok(state.slots[pick].credential.clone())
    }

    pub(crate) fn report_failure_at(
        &self,
        credential: &Credential,
        kind: FailureKind,
        now: Instant,
    ) -> Result<(), PoolError> {
        let settings = self.settings;
        let mut state = self.state.lock().map_err(|_| PoolError::LockPoisoned)?;
        let slot = find_slot(&mut state.slots, credential)?;
        slot.consecutive_failures = slot.consecutive_failures.saturating_add(1);

        let cooldown = if kind.triggers_cooldown() {
            match kind {
                FailureKind::AuthRejected => Some(settings.auth_cooldown),
                _ => Some(settings.cooldown),
            }
        } else if slot.consecutive_failures >= settings.max_consecutive_failures {
            Some(settings.cooldown)
        } else {
            None
        };

        if let Some(duration) = cooldown {
            slot.cooldown_until = Some(now + duration);
            warn!(
                "Credential {} cooling down for {:?} after {} ({} consecutive failures)",
                slot.credential, duration, kind, slot.consecutive_failures
            );
        } else {
            debug!(
                "Credential {} failed with {} ({} consecutive failures)",
                slot.credential, kind, slot.consecutive_failures
            );
        }

        Ok(())
    }
}

fn find_slot<'a>(
    slots: &'a mut [CredentialSlot],
    credential: &Credential,
) -> Result<&'a mut CredentialSlot, PoolError> {
    slots
        .iter_mut()
        .find(|slot| &slot.credential == credential)
        .ok_or_else(|| PoolError::UnknownCredential(credential.fingerprint()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pool_of(n: usize) -> CredentialPool {
        CredentialPool::new(
            (0..n).map(|i| Credential::new(format!("key-{i}"))),
            PoolSettings {
                cooldown: Duration::from_secs(60),
                auth_cooldown: Duration::from_secs(600),
                max_consecutive_failures: 3,
            },
            Some(7),
        )
    }

    #[test]
    fn debug_output_redacts_secret() {
        let credential = Credential::new("AIzaSecretValue1234");
        let rendered = format!("{:?} {}", credential, credential);
        assert!(!rendered.contains("Secret"));
        assert!(rendered.contains("1234"));
    }

    #[test]
    fn short_keys_are_fully_hidden() {
        for secret in ["abcd", "k1", "12345678"] {
            let credential = Credential::new(secret);
            let rendered = format!("{:?} {}", credential, credential);
            assert!(!rendered.contains(secret), "{rendered}");
        }
        assert_eq!(Credential::new("123456789").fingerprint(), "…6789");
    }

    #[test]
    fn auth_rejection_uses_the_longer_cooldown() {
        let pool = pool_of(1);
        let now = Instant::now();
        pool.report_failure_at(&Credential::new("key-0"), FailureKind::AuthRejected, now)
            .unwrap();

        let slot = &pool.slots().unwrap()[0];
        assert_eq!(slot.cooldown_until, Some(now + Duration::from_secs(600)));
        assert_eq!(slot.consecutive_failures, 1);
    }

    #[test]
    fn new_skips_blank_and_duplicate_keys() {
        let pool = CredentialPool::new(
            ["a", "", "a", " ", "b"].iter().map(Credential::new),
            PoolSettings::default(),
            Some(1),
        );
        assert_eq!(pool.len().unwrap(), 2);
        assert!(!pool.is_empty().unwrap());
        assert!(pool_of(0).is_empty().unwrap());
    }

    #[test]
    fn acquire_spreads_over_all_usable_keys() {
        let pool = pool_of(3);
        let seen: HashSet<Credential> = (0..200).map(|_| pool.acquire().unwrap()).collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn last_usable_key_is_always_returned() {
        let pool = pool_of(3);
        let now = Instant::now();
        pool.report_failure_at(&Credential::new("key-0"), FailureKind::QuotaExceeded, now)
            .unwrap();
        pool.report_failure_at(&Credential::new("key-2"), FailureKind::AuthRejected, now)
            .unwrap();

        for _ in 0..50 {
            assert_eq!(
                pool.acquire_at(now, &[]).unwrap(),
                Credential::new("key-1")
            );
        }
    }

    #[test]
    fn all_cooling_down_is_exhausted() {
        let pool = pool_of(2);
        let now = Instant::now();
        for key in ["key-0", "key-1"] {
            pool.report_failure_at(&Credential::new(key), FailureKind::QuotaExceeded, now)
                .unwrap();
        }

        let err = pool.acquire_at(now, &[]).unwrap_err();
        assert_eq!(
            err,
            PoolError::Exhausted {
                size: 2,
                retry_after: Duration::from_secs(60)
            }
        );
        assert_eq!(err.error_code(), ErrorCode::ResourceExhausted);
    }

    #[test]
    fn cooldown_expires() {
        let pool = pool_of(1);
        let now = Instant::now();
        pool.report_failure_at(&Credential::new("key-0"), FailureKind::QuotaExceeded, now)
            .unwrap();
        assert!(pool.acquire_at(now, &[]).is_err());

        let later = now + Duration::from_secs(61);
        assert_eq!(
            pool.acquire_at(later, &[]).unwrap(),
            Credential::new("key-0")
        );
        assert_eq!(pool.slots().unwrap()[0].consecutive_failures, 0);
    }

    #[test]
    fn transient_failures_cool_down_only_after_threshold() {
        let pool = pool_of(1);
        let key = Credential::new("key-0");
        let now = Instant::now();

        pool.report_failure_at(&key, FailureKind::Transient, now).unwrap();
        pool.report_failure_at(&key, FailureKind::MalformedResponse, now)
            .unwrap();
        assert!(pool.acquire_at(now, &[]).is_ok());

        pool.report_failure_at(&key, FailureKind::Transient, now).unwrap();
        assert!(pool.acquire_at(now, &[]).is_err());
    }

    #[test]
    fn success_resets_failure_count() {
        let pool = pool_of(1);
        let key = Credential::new("key-0");
        pool.report_failure(&key, FailureKind::Transient).unwrap();
        pool.report_failure(&key, FailureKind::Transient).unwrap();
        pool.report_success(&key).unwrap();
        assert_eq!(pool.slots().unwrap()[0].consecutive_failures, 0);
    }

    #[test]
    fn acquire_excluding_prefers_untried_keys() {
        let pool = pool_of(2);
        let tried = vec![Credential::new("key-0")];
        for _ in 0..20 {
            assert_eq!(
                pool.acquire_excluding(&tried).unwrap(),
                Credential::new("key-1")
            );
        }
        let both = vec![Credential::new("key-0"), Credential::new("key-1")];
        assert!(pool.acquire_excluding(&both).is_ok());
    }

    #[test]
    fn empty_and_unknown_credentials_are_errors() {
        let pool = pool_of(0);
        assert_eq!(pool.acquire().unwrap_err(), PoolError::Empty);

        let pool = pool_of(1);
        let err = pool
            .report_failure(&Credential::new("stranger"), FailureKind::Transient)
            .unwrap_err();
        assert!(matches!(err, PoolError::UnknownCredential(_)));
    }
}
