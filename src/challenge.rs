use rand::RngCore;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::{CHALLENGE_LEN, CHALLENGE_TIMEOUT_SECS};
use crate::codec::hex;
use crate::webauthn::ChallengeContext;

struct PendingChallenge {
    context: ChallengeContext,
    expires_at: Instant,
}

/// Challenges issued per session token. Each can be taken once.
pub struct ChallengeStore {
    pending: HashMap<String, PendingChallenge>,
    ttl: Duration,
}

impl Default for ChallengeStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(CHALLENGE_TIMEOUT_SECS))
    }
}

impl ChallengeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            ttl,
        }
    }

    /// Start a ceremony. Returns the session token and the challenge to send to the client.
    pub fn issue(
        &mut self,
        rp_id: &str,
        origin: &str,
        require_user_verification: bool,
    ) -> (String, Vec<u8>) {
        let mut rng = rand::thread_rng();
        let mut challenge = vec![0u8; CHALLENGE_LEN];
        rng.fill_bytes(&mut challenge);
        let mut token = [0u8; 16];
        rng.fill_bytes(&mut token);
        let token = hex(&token);

        let context = ChallengeContext::new(rp_id, origin, challenge.clone())
            .with_user_verification(require_user_verification);
        self.pending.insert(
            token.clone(),
            PendingChallenge {
                context,
                expires_at: Instant::now() + self.ttl,
            },
        );
        tracing::debug!(pending = self.pending.len(), "Challenge issued");
        (token, challenge)
    }

    /// Remove and return the context for `token`. Expired entries are dropped.
    pub fn take(&mut self, token: &str) -> Option<ChallengeContext> {
        let pending = self.pending.remove(token)?;
        if Instant::now() >= pending.expires_at {
            tracing::debug!("Challenge expired");
            return None;
        }
        Some(pending.context)
    }

    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.pending.len();
        self.pending.retain(|_, p| p.expires_at > now);
        before - self.pending.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
