use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::error::ApiError;

/// Progress of the refresh cycle for one namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshStatus {
    Idle,
    InFlight,
    Refreshed(String),
    Failed(ApiError),
}

/// The refresh cycle of one namespace, tagged with the session epoch it
/// belongs to. A cycle from an older epoch says nothing about the current
/// session.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Cycle {
    pub epoch: u64,
    pub status: RefreshStatus,
}

impl Default for Cycle {
    fn default() -> Self {
        Cycle {
            epoch: 0,
            status: RefreshStatus::Idle,
        }
    }
}

/// What a request that hit a 401 should do next.
#[derive(Debug, PartialEq)]
pub(crate) enum Claim {
    /// Start the refresh; everyone else will wait on it.
    Lead,
    /// A refresh is already running; wait for it.
    Follow,
    /// A newer token than the one that was rejected is already available.
    Ready(String),
    /// The caller's session has ended; a newer epoch owns the slot.
    Ended,
}

pub(crate) type Slot = Arc<watch::Sender<Cycle>>;

/// Per-namespace refresh channels.
///
/// Each namespace gets its own `watch` channel, so sessions in different
/// namespaces never wait on each other.
#[derive(Default)]
pub(crate) struct RefreshSlots {
    slots: Mutex<HashMap<String, Slot>>,
}

impl RefreshSlots {
    pub fn slot(&self, namespace: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(watch::channel(Cycle::default()).0))
            .clone()
    }

    /// Status of the namespace's cycle, `Idle` if it belongs to another epoch.
    pub fn status(&self, namespace: &str, epoch: u64) -> RefreshStatus {
        let slot = self.slot(namespace);
        let cycle = slot.borrow();
        if cycle.epoch == epoch {
            cycle.status.clone()
        } else {
            RefreshStatus::Idle
        }
    }
}

/// Decides, atomically with respect to other callers, who runs the refresh.
///
/// `rejected` is the token the server just refused and `epoch` the session
/// epoch the caller is acting for. A cycle left over from an older epoch is
/// reset, so nothing an ended session refreshed is ever handed out.
pub(crate) fn claim(slot: &watch::Sender<Cycle>, epoch: u64, rejected: &str) -> Claim {
    let mut claim = Claim::Follow;
    slot.send_if_modified(|cycle| {
        if cycle.epoch > epoch {
            claim = Claim::Ended;
            return false;
        }
        if cycle.epoch < epoch {
            cycle.epoch = epoch;
            cycle.status = RefreshStatus::Idle;
        }
        match &cycle.status {
            RefreshStatus::InFlight => false,
            RefreshStatus::Refreshed(token) if token.as_str() != rejected => {
                claim = Claim::Ready(token.clone());
                false
            }
            _ => {
                cycle.status = RefreshStatus::InFlight;
                claim = Claim::Lead;
                true
            }
        }
    });
    claim
}

/// Records the outcome of the cycle started for `epoch`.
///
/// Dropped if a newer epoch has taken the slot over meanwhile.
pub(crate) fn settle(slot: &watch::Sender<Cycle>, epoch: u64, status: RefreshStatus) -> bool {
    slot.send_if_modified(|cycle| {
        if cycle.epoch != epoch {
            return false;
        }
        cycle.status = status;
        true
    })
}
