use std::collections::BTreeMap;
use std::fmt;

use tracing::{info, warn};

pub type CompletionCallback = Box<dyn FnOnce(&str)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// No active challenge carries this id.
    Unknown,
    Remaining(u32),
    Completed,
}

struct ActiveChallenge {
    remaining: u32,
    on_complete: Option<CompletionCallback>,
}

impl fmt::Debug for ActiveChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveChallenge")
            .field("remaining", &self.remaining)
            .field("has_callback", &self.on_complete.is_some())
            .finish()
    }
}

/// Counts down the kills each running challenge still needs.
#[derive(Debug, Default)]
pub struct ChallengeTracker {
    active: BTreeMap<String, ActiveChallenge>,
}

impl ChallengeTracker {
    /// Starts tracking `id`. Rejects empty ids, ids already running and
    /// challenges with nothing to kill.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        enemy_count: u32,
        on_complete: Option<CompletionCallback>,
    ) -> bool {
        let id = id.into();
        if id.trim().is_empty() {
            warn!("challenge_register_rejected_empty_id");
            return false;
        }
        if enemy_count == 0 {
            warn!(challenge = %id, "challenge_register_rejected_no_enemies");
            return false;
        }
        if self.active.contains_key(&id) {
            warn!(challenge = %id, "challenge_register_rejected_already_active");
            return false;
        }
        info!(challenge = %id, enemy_count, "challenge_registered");
        self.active.insert(
            id,
            ActiveChallenge {
                remaining: enemy_count,
                on_complete,
            },
        );
        true
    }

    pub fn on_enemy_killed(&mut self, id: &str) -> KillOutcome {
        let Some(challenge) = self.active.get_mut(id) else {
            warn!(challenge = %id, "challenge_kill_for_unknown_challenge");
            return KillOutcome::Unknown;
        };
        challenge.remaining = challenge.remaining.saturating_sub(1);
        if challenge.remaining > 0 {
            return KillOutcome::Remaining(challenge.remaining);
        }

        if let Some(challenge) = self.active.remove(id) {
            info!(challenge = %id, "challenge_completed");
            if let Some(on_complete) = challenge.on_complete {
                on_complete(id);
            }
        }
        KillOutcome::Completed
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    pub fn remaining(&self, id: &str) -> Option<u32> {
        self.active.get(id).map(|challenge| challenge.remaining)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
