//! Scheduler-owned timer registry.
//!
//! Components never hold a [`Timer`] directly — they hold a stable
//! [`TimerHandle`] used only for cancellation, the way `iface::neighbor::Cache`
//! and `iface::route::Routes` hand back opaque handles rather than
//! references into their own storage.

use crate::error::SimError;
use crate::packet::EndpointId;

pub type TimerHandle = u64;
pub type SenderId = EndpointId;

/// What a timer is for. Currently only the retransmission timer exists, but
/// the enum is left open the way `socket::tcp::Timer` carries several
/// variants for one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Rto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTarget {
    pub sender: SenderId,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Running,
    Cancelled,
    Fired,
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    #[allow(dead_code)]
    handle: TimerHandle,
    fire_at: u64,
    target: TimerTarget,
    state: TimerState,
}

/// A single scheduler-owned ordered list of pending timers. At most one RTO
/// timer per sender is enforced by [`TimerWheel::arm`].
#[derive(Debug, Default)]
pub struct TimerWheel {
    entries: Vec<TimerEntry>,
    next_handle: TimerHandle,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer for `sender`/`kind`, firing at `fire_at`. Arming a timer
    /// for a sender/kind pair that already has one running is a programmer
    /// error.
    pub fn arm(&mut self, sender: SenderId, kind: TimerKind, fire_at: u64) -> Result<TimerHandle, SimError> {
        if self.entries.iter().any(|e| {
            e.target.sender == sender && e.target.kind == kind && e.state == TimerState::Running
        }) {
            return Err(SimError::TimerAlreadyArmed { sender });
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.entries.push(TimerEntry {
            handle,
            fire_at,
            target: TimerTarget { sender, kind },
            state: TimerState::Running,
        });
        Ok(handle)
    }

    /// Cancel the running timer for `sender`/`kind`. Cancelling a timer that
    /// is not currently running is a programmer error.
    pub fn cancel(&mut self, sender: SenderId, kind: TimerKind) -> Result<(), SimError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.target.sender == sender && e.target.kind == kind && e.state == TimerState::Running)
            .ok_or(SimError::TimerNotArmed { sender })?;
        entry.state = TimerState::Cancelled;
        Ok(())
    }

    /// Drain and mark `Fired` every running timer belonging to `sender` whose
    /// `fire_at <= now`. Called after every endpoint operation.
    pub fn take_expired(&mut self, sender: SenderId, now: u64) -> Vec<TimerTarget> {
        let mut fired = Vec::new();
        for entry in self.entries.iter_mut() {
            if entry.target.sender == sender && entry.state == TimerState::Running && entry.fire_at <= now {
                entry.state = TimerState::Fired;
                fired.push(entry.target);
            }
        }
        self.entries.retain(|e| {
            !(e.target.sender == sender && matches!(e.state, TimerState::Fired | TimerState::Cancelled))
        });
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_arm_is_an_error() {
        let mut wheel = TimerWheel::new();
        wheel.arm(0, TimerKind::Rto, 5).unwrap();
        assert_eq!(wheel.arm(0, TimerKind::Rto, 7), Err(SimError::TimerAlreadyArmed { sender: 0 }));
    }

    #[test]
    fn cancel_unarmed_is_an_error() {
        let mut wheel = TimerWheel::new();
        assert_eq!(wheel.cancel(0, TimerKind::Rto), Err(SimError::TimerNotArmed { sender: 0 }));
    }

    #[test]
    fn fires_at_or_after_deadline() {
        let mut wheel = TimerWheel::new();
        wheel.arm(3, TimerKind::Rto, 10).unwrap();
        assert!(wheel.take_expired(3, 9).is_empty());
        let fired = wheel.take_expired(3, 10);
        assert_eq!(fired.len(), 1);
        assert!(wheel.take_expired(3, 11).is_empty());
    }

    #[test]
    fn cancel_then_rearm() {
        let mut wheel = TimerWheel::new();
        wheel.arm(1, TimerKind::Rto, 10).unwrap();
        wheel.cancel(1, TimerKind::Rto).unwrap();
        wheel.arm(1, TimerKind::Rto, 20).unwrap();
        assert!(wheel.take_expired(1, 15).is_empty());
        assert_eq!(wheel.take_expired(1, 20).len(), 1);
    }
}
