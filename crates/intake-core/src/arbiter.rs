//! Single owner of the intake motor.
//!
//! Every authority reaches the actuator through [`ActuatorArbiter::submit`].
//! Precedence is `StallRecovery > ColorSort > Manual`: while an authority
//! holds an [`AuthorityLease`], intents from lower authorities are rejected
//! with [`ArbitrationError::PreemptedByHigherAuthority`] and never reach the
//! motor. Nothing is queued; the rejected caller retries on its next tick.

use crate::error::{ArbitrationError, LifecycleError};
use crate::ports::ActuatorHandle;
use crate::types::{Authority, CommandIntent, CommandKind, VelocitySample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

const HISTORY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Status types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Preempted { holder: Authority },
    Invalid { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationEvent {
    pub authority: Authority,
    pub kind: CommandKind,
    pub outcome: Outcome,
    pub at: DateTime<Utc>,
}

/// Read-only snapshot for diagnostics displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterStatus {
    pub holder: Option<Authority>,
    pub commanded_velocity: f64,
    pub actual_velocity: f64,
    pub stopped: bool,
    pub applied: u64,
    pub rejected: u64,
    pub monitor_claimed: bool,
    /// Most recent first.
    pub recent: Vec<ArbitrationEvent>,
}

// ---------------------------------------------------------------------------
// ActuatorArbiter
// ---------------------------------------------------------------------------

struct Inner {
    actuator: Box<dyn ActuatorHandle>,
    /// Outstanding leases per authority, indexed by `Authority::index`.
    holds: [u32; 3],
    applied: u64,
    rejected: u64,
    history: VecDeque<ArbitrationEvent>,
}

impl Inner {
    fn holder(&self) -> Option<Authority> {
        Authority::all()
            .iter()
            .rev()
            .copied()
            .find(|a| self.holds[a.index()] > 0)
    }

    fn record(&mut self, intent: CommandIntent, outcome: Outcome) {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_back();
        }
        self.history.push_front(ArbitrationEvent {
            authority: intent.authority,
            kind: intent.kind,
            outcome,
            at: Utc::now(),
        });
    }
}

pub struct ActuatorArbiter {
    inner: Mutex<Inner>,
    monitor_claimed: AtomicBool,
}

impl ActuatorArbiter {
    pub fn new(actuator: impl ActuatorHandle + 'static) -> Self {
        Self::from_boxed(Box::new(actuator))
    }

    pub fn from_boxed(actuator: Box<dyn ActuatorHandle>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                actuator,
                holds: [0; 3],
                applied: 0,
                rejected: 0,
                history: VecDeque::with_capacity(HISTORY_LEN),
            }),
            monitor_claimed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicked holder never leaves Inner half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `intent` unless a higher authority currently holds the actuator.
    pub fn submit(&self, intent: CommandIntent) -> Result<(), ArbitrationError> {
        let mut inner = self.lock();

        if let Err(reason) = validate(&intent.kind) {
            inner.rejected += 1;
            inner.record(
                intent,
                Outcome::Invalid {
                    reason: reason.clone(),
                },
            );
            return Err(ArbitrationError::InvalidCommand(reason));
        }

        if let Some(holder) = inner.holder() {
            if intent.authority < holder {
                inner.rejected += 1;
                inner.record(intent, Outcome::Preempted { holder });
                debug!(
                    requested = %intent.authority,
                    holder = %holder,
                    kind = intent.kind.label(),
                    "intent pre-empted"
                );
                return Err(ArbitrationError::PreemptedByHigherAuthority {
                    requested: intent.authority,
                    holder,
                });
            }
        }

        match intent.kind {
            CommandKind::SetVelocity { velocity } => inner.actuator.set_velocity(velocity),
            CommandKind::RelativeMove { delta, speed } => {
                inner.actuator.move_relative(delta, speed)
            }
            CommandKind::Hold => {}
        }
        inner.applied += 1;
        inner.record(intent, Outcome::Applied);
        trace!(authority = %intent.authority, kind = ?intent.kind, "intent applied");
        Ok(())
    }

    /// Take exclusive hold of the actuator for `authority` until the lease
    /// is dropped. Fails if a higher authority already holds it.
    pub fn acquire(&self, authority: Authority) -> Result<AuthorityLease<'_>, ArbitrationError> {
        let mut inner = self.lock();
        if let Some(holder) = inner.holder() {
            if authority < holder {
                return Err(ArbitrationError::PreemptedByHigherAuthority {
                    requested: authority,
                    holder,
                });
            }
        }
        inner.holds[authority.index()] += 1;
        debug!(authority = %authority, "actuator acquired");
        Ok(AuthorityLease {
            arbiter: self,
            authority,
        })
    }

    fn release(&self, authority: Authority) {
        let mut inner = self.lock();
        let slot = &mut inner.holds[authority.index()];
        *slot = slot.saturating_sub(1);
        debug!(authority = %authority, "actuator released");
    }

    /// The highest authority with an outstanding lease.
    pub fn holder(&self) -> Option<Authority> {
        self.lock().holder()
    }

    pub fn actual_velocity(&self) -> f64 {
        self.lock().actuator.actual_velocity()
    }

    pub fn target_velocity(&self) -> f64 {
        self.lock().actuator.target_velocity()
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().actuator.is_stopped()
    }

    /// Actual and commanded velocity read under one lock.
    pub fn sample(&self) -> VelocitySample {
        let inner = self.lock();
        VelocitySample::new(
            inner.actuator.actual_velocity(),
            inner.actuator.target_velocity(),
        )
    }

    pub fn status(&self) -> ArbiterStatus {
        let inner = self.lock();
        ArbiterStatus {
            holder: inner.holder(),
            commanded_velocity: inner.actuator.target_velocity(),
            actual_velocity: inner.actuator.actual_velocity(),
            stopped: inner.actuator.is_stopped(),
            applied: inner.applied,
            rejected: inner.rejected,
            monitor_claimed: self.monitor_claimed.load(Ordering::Acquire),
            recent: inner.history.iter().cloned().collect(),
        }
    }

    /// Reserve the single monitor slot for this actuator. The claim is
    /// released when the returned token is dropped.
    pub fn claim_monitor(self: &Arc<Self>) -> Result<MonitorClaim, LifecycleError> {
        self.monitor_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LifecycleError::AlreadyRunning)?;
        Ok(MonitorClaim {
            arbiter: Arc::clone(self),
        })
    }

    pub fn monitor_claimed(&self) -> bool {
        self.monitor_claimed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ActuatorArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ActuatorArbiter")
            .field("holder", &inner.holder())
            .field("applied", &inner.applied)
            .field("rejected", &inner.rejected)
            .finish()
    }
}

fn validate(kind: &CommandKind) -> Result<(), String> {
    match *kind {
        CommandKind::SetVelocity { velocity } if !velocity.is_finite() => {
            Err(format!("velocity {velocity} is not finite"))
        }
        CommandKind::RelativeMove { delta, speed } if !(delta.is_finite() && speed.is_finite()) => {
            Err(format!("relative move ({delta}, {speed}) is not finite"))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Exclusive hold of the actuator by one authority. Released on drop.
#[must_use = "the hold is released as soon as the lease is dropped"]
pub struct AuthorityLease<'a> {
    arbiter: &'a ActuatorArbiter,
    authority: Authority,
}

impl AuthorityLease<'_> {
    pub fn authority(&self) -> Authority {
        self.authority
    }
}

impl Drop for AuthorityLease<'_> {
    fn drop(&mut self) {
        self.arbiter.release(self.authority);
    }
}

impl std::fmt::Debug for AuthorityLease<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityLease")
            .field("authority", &self.authority)
            .finish()
    }
}

/// Proof that a monitor loop is live for this actuator.
#[derive(Debug)]
pub struct MonitorClaim {
    arbiter: Arc<ActuatorArbiter>,
}

impl Drop for MonitorClaim {
    fn drop(&mut self) {
        self.arbiter.monitor_claimed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeState {
        target: f64,
        actual: f64,
        moves: Vec<(f64, f64)>,
    }

    #[derive(Clone, Default)]
    struct FakeActuator(Arc<Mutex<FakeState>>);

    impl ActuatorHandle for FakeActuator {
        fn set_velocity(&mut self, velocity: f64) {
            self.0.lock().unwrap().target = velocity;
        }

        fn move_relative(&mut self, delta_degrees: f64, speed: f64) {
            let mut s = self.0.lock().unwrap();
            s.moves.push((delta_degrees, speed));
            s.target = speed;
        }

        fn actual_velocity(&self) -> f64 {
            self.0.lock().unwrap().actual
        }

        fn target_velocity(&self) -> f64 {
            self.0.lock().unwrap().target
        }

        fn is_stopped(&self) -> bool {
            self.0.lock().unwrap().actual == 0.0
        }
    }

    fn arbiter() -> (ActuatorArbiter, FakeActuator) {
        let fake = FakeActuator::default();
        (ActuatorArbiter::new(fake.clone()), fake)
    }

    fn manual(v: f64) -> CommandIntent {
        CommandIntent::set_velocity(Authority::Manual, v)
    }

    #[test]
    fn manual_applies_when_nobody_holds() {
        let (arb, fake) = arbiter();
        arb.submit(manual(600.0)).unwrap();
        assert_eq!(fake.0.lock().unwrap().target, 600.0);
        assert_eq!(arb.holder(), None);
        assert_eq!(arb.status().applied, 1);
    }

    #[test]
    fn manual_rejected_while_recovery_holds() {
        let (arb, fake) = arbiter();
        arb.submit(manual(600.0)).unwrap();

        let lease = arb.acquire(Authority::StallRecovery).unwrap();
        arb.submit(CommandIntent::relative_move(
            Authority::StallRecovery,
            -90.0,
            -100.0,
        ))
        .unwrap();

        let err = arb.submit(manual(0.0)).unwrap_err();
        assert_eq!(
            err,
            ArbitrationError::PreemptedByHigherAuthority {
                requested: Authority::Manual,
                holder: Authority::StallRecovery,
            }
        );
        // the rejected intent left the commanded velocity alone
        assert_eq!(fake.0.lock().unwrap().target, -100.0);

        drop(lease);
        arb.submit(manual(0.0)).unwrap();
        assert_eq!(fake.0.lock().unwrap().target, 0.0);
    }

    #[test]
    fn nested_holds_resolve_to_highest() {
        let (arb, _fake) = arbiter();
        let sort = arb.acquire(Authority::ColorSort).unwrap();
        assert_eq!(arb.holder(), Some(Authority::ColorSort));
        assert!(arb.submit(manual(1.0)).is_err());

        let recovery = arb.acquire(Authority::StallRecovery).unwrap();
        assert_eq!(arb.holder(), Some(Authority::StallRecovery));
        assert!(arb
            .submit(CommandIntent::set_velocity(Authority::ColorSort, 0.0))
            .is_err());

        drop(recovery);
        assert_eq!(arb.holder(), Some(Authority::ColorSort));
        arb.submit(CommandIntent::set_velocity(Authority::ColorSort, 0.0))
            .unwrap();
        assert!(arb.submit(manual(1.0)).is_err());

        drop(sort);
        assert_eq!(arb.holder(), None);
        arb.submit(manual(1.0)).unwrap();
    }

    #[test]
    fn lower_authority_cannot_acquire_over_higher() {
        let (arb, _fake) = arbiter();
        let _recovery = arb.acquire(Authority::StallRecovery).unwrap();
        let err = arb.acquire(Authority::ColorSort).unwrap_err();
        assert!(matches!(
            err,
            ArbitrationError::PreemptedByHigherAuthority {
                holder: Authority::StallRecovery,
                ..
            }
        ));
        // the failed acquire did not leave a hold behind
        assert_eq!(arb.holder(), Some(Authority::StallRecovery));
    }

    #[test]
    fn higher_authority_submits_without_lease() {
        let (arb, fake) = arbiter();
        let _sort = arb.acquire(Authority::ColorSort).unwrap();
        arb.submit(CommandIntent::set_velocity(Authority::StallRecovery, 42.0))
            .unwrap();
        assert_eq!(fake.0.lock().unwrap().target, 42.0);
    }

    #[test]
    fn non_finite_commands_never_reach_motor() {
        let (arb, fake) = arbiter();
        arb.submit(manual(600.0)).unwrap();
        let err = arb.submit(manual(f64::NAN)).unwrap_err();
        assert!(matches!(err, ArbitrationError::InvalidCommand(_)));
        let err = arb
            .submit(CommandIntent::relative_move(
                Authority::StallRecovery,
                f64::INFINITY,
                -100.0,
            ))
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::InvalidCommand(_)));

        let state = fake.0.lock().unwrap();
        assert_eq!(state.target, 600.0);
        assert!(state.moves.is_empty());
    }

    #[test]
    fn hold_changes_nothing() {
        let (arb, fake) = arbiter();
        arb.submit(manual(300.0)).unwrap();
        arb.submit(CommandIntent::hold(Authority::Manual)).unwrap();
        assert_eq!(fake.0.lock().unwrap().target, 300.0);
    }

    #[test]
    fn status_tracks_history_most_recent_first() {
        let (arb, _fake) = arbiter();
        for i in 0..(HISTORY_LEN + 5) {
            arb.submit(manual(i as f64)).unwrap();
        }
        let _lease = arb.acquire(Authority::ColorSort).unwrap();
        let _ = arb.submit(manual(1.0));

        let status = arb.status();
        assert_eq!(status.recent.len(), HISTORY_LEN);
        assert_eq!(status.applied, (HISTORY_LEN + 5) as u64);
        assert_eq!(status.rejected, 1);
        assert_eq!(status.holder, Some(Authority::ColorSort));
        assert_eq!(
            status.recent[0].outcome,
            Outcome::Preempted {
                holder: Authority::ColorSort
            }
        );
    }

    #[test]
    fn monitor_claim_is_exclusive_and_released_on_drop() {
        let arb = Arc::new(ActuatorArbiter::new(FakeActuator::default()));
        let claim = arb.claim_monitor().unwrap();
        assert!(arb.monitor_claimed());
        assert_eq!(
            arb.claim_monitor().unwrap_err(),
            LifecycleError::AlreadyRunning
        );
        drop(claim);
        assert!(!arb.monitor_claimed());
        let _again = arb.claim_monitor().unwrap();
    }

    #[test]
    fn sample_reads_both_velocities() {
        let (arb, fake) = arbiter();
        arb.submit(manual(600.0)).unwrap();
        fake.0.lock().unwrap().actual = 12.5;
        assert_eq!(arb.sample(), VelocitySample::new(12.5, 600.0));
    }
}
