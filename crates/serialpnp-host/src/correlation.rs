//! Matching COMMAND_RESPONSE packets to the command waiting for them.
//!
//! The wire protocol has no transaction id: at most one command is in flight
//! and the next response naming that command completes it.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serialpnp_descriptor::NamedValue;

use crate::error::{HostError, Result};

/// A completed command response: raw status byte plus body.
#[derive(Debug, Clone)]
pub(crate) struct Completion {
    pub status: u8,
    pub message: NamedValue,
}

/// Outcome of handing a response to the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// No command is waiting (late response after a timeout, or unsolicited).
    NoWaiter,
    /// A command is waiting, but for a different name.
    Mismatch,
}

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<(u8, String)>,
    completion: Option<Completion>,
    disconnected: Option<String>,
}

/// Single in-flight command slot shared by callers and the receive loop.
#[derive(Debug, Default)]
pub(crate) struct CommandSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl CommandSlot {
    /// Register the command about to be sent. Callers serialize through the
    /// session command lock, so the slot is always empty here.
    pub fn arm(&self, interface: u8, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.disconnected {
            return Err(HostError::Disconnected(reason.clone()));
        }
        state.pending = Some((interface, name.to_string()));
        state.completion = None;
        Ok(())
    }

    /// Drop the registration without waiting (send failed).
    pub fn disarm(&self) {
        let mut state = self.state.lock();
        state.pending = None;
        state.completion = None;
    }

    /// Called by the receive loop for every decoded COMMAND_RESPONSE.
    pub fn deliver(&self, status: u8, message: NamedValue) -> Delivery {
        let mut state = self.state.lock();
        let matches = match &state.pending {
            None => return Delivery::NoWaiter,
            Some((interface, name)) => *interface == message.interface && *name == message.name,
        };
        if !matches {
            return Delivery::Mismatch;
        }
        state.pending = None;
        state.completion = Some(Completion { status, message });
        self.ready.notify_all();
        Delivery::Delivered
    }

    /// Block until the armed command completes, times out, or the link drops.
    ///
    /// On timeout the slot is cleared so a late response finds no waiter.
    pub fn wait(&self, timeout: Duration) -> Result<Completion> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(completion) = state.completion.take() {
                return Ok(completion);
            }
            if let Some(reason) = state.disconnected.clone() {
                state.pending = None;
                return Err(HostError::Disconnected(reason));
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                if let Some(completion) = state.completion.take() {
                    return Ok(completion);
                }
                state.pending = None;
                return Err(HostError::Timeout(timeout));
            }
        }
    }

    /// Mark the link as gone and wake any waiter.
    pub fn disconnect(&self, reason: &str) {
        let mut state = self.state.lock();
        state.disconnected = Some(reason.to_string());
        self.ready.notify_all();
    }
}
