use crate::error::{IntakeError, Result};
use crate::types::Alliance;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Process-wide alliance selection.
///
/// Written by match setup (autonomous selector, CLI flag), read by every
/// classification. The value is a single atomic byte so readers never see a
/// torn update. Within one match phase it may be set at most once.
#[derive(Debug)]
pub struct AllianceSetting {
    value: AtomicU8,
    locked: AtomicBool,
}

impl AllianceSetting {
    pub fn new(initial: Alliance) -> Self {
        Self {
            value: AtomicU8::new(encode(initial)),
            locked: AtomicBool::new(false),
        }
    }

    pub fn get(&self) -> Alliance {
        decode(self.value.load(Ordering::Acquire))
    }

    /// Set the alliance for the current match phase.
    ///
    /// Fails with [`IntakeError::AllianceAlreadySet`] if it was already set
    /// since the last [`begin_phase`](Self::begin_phase).
    pub fn set(&self, alliance: Alliance) -> Result<()> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(IntakeError::AllianceAlreadySet(self.get().to_string()));
        }
        self.value.store(encode(alliance), Ordering::Release);
        tracing::info!(alliance = %alliance, "alliance set");
        Ok(())
    }

    /// Start a new match phase; the alliance may be set once more.
    pub fn begin_phase(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

impl Default for AllianceSetting {
    fn default() -> Self {
        Self::new(Alliance::default())
    }
}

fn encode(alliance: Alliance) -> u8 {
    match alliance {
        Alliance::Red => 0,
        Alliance::Blue => 1,
    }
}

fn decode(raw: u8) -> Alliance {
    match raw {
        1 => Alliance::Blue,
        _ => Alliance::Red,
    }
}
