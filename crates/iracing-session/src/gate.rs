//! Re-authentication gate state machine
//!
//! Pure state machine: the session layer feeds it probe outcomes and gets
//! back (new_state, action). All I/O, probes and logins and metrics alike,
//! stays with the caller.
//!
//! `Degraded` counts the login attempts made since the last passing probe.
//! Each attempt arms a cooldown that doubles per attempt, so a flapping or
//! dead upstream sees a bounded, decelerating trickle of login traffic
//! instead of one login per incoming request. When the attempt budget is
//! spent the gate locks and stays locked until a login succeeds out of band
//! (startup retry, OAuth callback) or the process restarts.

use std::time::{Duration, Instant};

/// Retry budget and pacing for automatic re-login.
#[derive(Debug, Clone)]
pub struct ReauthPolicy {
    /// Consecutive login attempts allowed before the gate locks
    pub max_attempts: u32,
    /// Base pause between attempts; doubles per attempt. Zero disables the
    /// pause, restoring one-attempt-per-request behavior.
    pub cooldown: Duration,
}

impl Default for ReauthPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            cooldown: Duration::from_secs(5),
        }
    }
}

impl ReauthPolicy {
    /// Pause armed after the given attempt (1-based): `cooldown * 2^(n-1)`,
    /// saturating rather than overflowing for absurd attempt budgets.
    fn backoff_after(&self, attempt: u32) -> Duration {
        self.cooldown
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Gate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Last probe passed (or nothing has failed yet)
    Authenticated,
    /// Probes are failing; automatic re-login is underway
    Degraded {
        attempts: u32,
        cooldown_until: Instant,
    },
    /// Attempt budget spent; terminal until an out-of-band login
    Locked,
}

impl GateState {
    /// Short label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            GateState::Authenticated => "authenticated",
            GateState::Degraded { .. } => "degraded",
            GateState::Locked => "locked",
        }
    }
}

/// Events that drive gate transitions.
#[derive(Debug)]
pub enum GateEvent {
    /// The credential probe answered 200
    VerifyPassed,
    /// The probe failed: bad status, transport error, or no credential held
    VerifyFailed,
    /// A login completed outside the gate (startup or OAuth callback)
    CredentialInstalled,
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The attempt budget is spent
    Locked,
    /// A re-login pause is still armed
    CoolingDown,
}

impl RejectReason {
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::Locked => "locked",
            RejectReason::CoolingDown => "cooling_down",
        }
    }
}

/// Actions the caller executes after a transition.
#[derive(Debug, PartialEq, Eq)]
pub enum GateAction {
    /// Let the request through
    Proceed,
    /// Run one password login, then let the request through
    Reauthenticate,
    /// Answer with an authentication failure, no upstream traffic
    Reject(RejectReason),
}

/// Handle a gate transition. Pure function: no I/O.
pub fn advance(
    state: GateState,
    event: GateEvent,
    now: Instant,
    policy: &ReauthPolicy,
) -> (GateState, GateAction) {
    match (state, event) {
        // Locked ignores probe outcomes entirely; only an installed
        // credential opens it again.
        (GateState::Locked, GateEvent::VerifyPassed | GateEvent::VerifyFailed) => {
            (GateState::Locked, GateAction::Reject(RejectReason::Locked))
        }

        // A passing probe clears the attempt counter wherever it happens.
        (_, GateEvent::VerifyPassed) => (GateState::Authenticated, GateAction::Proceed),

        // An out-of-band login resets everything, Locked included.
        (_, GateEvent::CredentialInstalled) => (GateState::Authenticated, GateAction::Proceed),

        // First failure: enter Degraded and spend attempt #1 immediately.
        (GateState::Authenticated, GateEvent::VerifyFailed) => (
            GateState::Degraded {
                attempts: 1,
                cooldown_until: now + policy.backoff_after(1),
            },
            GateAction::Reauthenticate,
        ),

        // Budget spent: lock, reject, and stop generating login traffic.
        (GateState::Degraded { attempts, .. }, GateEvent::VerifyFailed)
            if attempts >= policy.max_attempts =>
        {
            (GateState::Locked, GateAction::Reject(RejectReason::Locked))
        }

        // Pause still armed: reject without consuming an attempt.
        (
            GateState::Degraded {
                attempts,
                cooldown_until,
            },
            GateEvent::VerifyFailed,
        ) if now < cooldown_until => (
            GateState::Degraded {
                attempts,
                cooldown_until,
            },
            GateAction::Reject(RejectReason::CoolingDown),
        ),

        // Pause elapsed: spend the next attempt and arm a longer pause.
        (GateState::Degraded { attempts, .. }, GateEvent::VerifyFailed) => {
            let attempts = attempts + 1;
            (
                GateState::Degraded {
                    attempts,
                    cooldown_until: now + policy.backoff_after(attempts),
                },
                GateAction::Reauthenticate,
            )
        }
    }
}
