//! Deferred signal delivery.
//!
//! Signals are caught on a background thread and forwarded as
//! [`SignalMessage`]s over a channel. The main loop never acts inside a
//! handler: it sleeps on the channel between ticks and records what arrived
//! in [`PendingSignals`], which it consumes at the start of the next tick.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::logger::Log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMessage {
    /// SIGINT, SIGTERM or SIGHUP
    Shutdown,
    /// SIGUSR1
    ToggleDisable,
    /// SIGUSR2
    Reload,
}

impl SignalMessage {
    pub fn from_signal(signal: i32) -> Option<Self> {
        match signal {
            SIGINT | SIGTERM | SIGHUP => Some(SignalMessage::Shutdown),
            SIGUSR1 => Some(SignalMessage::ToggleDisable),
            SIGUSR2 => Some(SignalMessage::Reload),
            _ => None,
        }
    }
}

/// Sticky request flags, set when a message arrives and cleared by the
/// controller when it handles them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSignals {
    pub exit: bool,
    pub toggle: bool,
    pub reload: bool,
}

impl PendingSignals {
    pub fn record(&mut self, message: SignalMessage) {
        match message {
            SignalMessage::Shutdown => self.exit = true,
            SignalMessage::ToggleDisable => self.toggle = true,
            SignalMessage::Reload => self.reload = true,
        }
    }
}

/// Receiving end of the signal channel.
pub struct SignalState {
    receiver: Receiver<SignalMessage>,
}

impl SignalState {
    pub fn from_receiver(receiver: Receiver<SignalMessage>) -> Self {
        Self { receiver }
    }

    /// Sleep for up to `timeout`, returning early when a message arrives.
    ///
    /// Every queued message is recorded in `pending`.
    pub fn wait(&self, timeout: Duration, pending: &mut PendingSignals) {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => {
                pending.record(message);
                self.drain(pending);
            }
            Err(RecvTimeoutError::Timeout) => {}
            // No sender left: nothing can interrupt the sleep any more
            Err(RecvTimeoutError::Disconnected) => thread::sleep(timeout),
        }
    }

    /// Record queued messages without blocking.
    pub fn drain(&self, pending: &mut PendingSignals) {
        while let Ok(message) = self.receiver.try_recv() {
            pending.record(message);
        }
    }
}

/// Install handlers for the signals the daemon reacts to.
///
/// A background thread forwards each caught signal to the returned state.
pub fn setup_signal_handler() -> Result<SignalState> {
    let (sender, receiver) = mpsc::channel::<SignalMessage>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    thread::spawn(move || {
        for signal in signals.forever() {
            let Some(message) = SignalMessage::from_signal(signal) else {
                continue;
            };
            Log::log_debug(&format!("Received signal {} ({:?})", signal, message));
            if sender.send(message).is_err() {
                break;
            }
        }
    });

    Ok(SignalState::from_receiver(receiver))
}
