//! Server-side receive loop and the control flags it shares with the driver.
//!
//! The driver (the instrumented collector) owns the frame writer and calls
//! into [`ServerInterpreter`](crate::ServerInterpreter) at event boundaries
//! and safepoints. Visualizer requests arrive on a separate task that only
//! flips flags here; the driver reads them at its next safepoint.
//!
//! ```text
//! visualizer ──frames──▶ receive loop ──flags──▶ ControlState ◀── driver
//!                                          │
//!                                          └── Notify wakes a paused driver
//! ```

use heapscope_model::EventFilters;
use heapscope_session::{dispatch_to_server, ReceivedCommand, SessionError, SessionState};
use heapscope_transport::FrameReader;
use tokio::io::AsyncRead;
use tokio::sync::{Mutex, Notify};

/// Flags written by the receive loop and consumed by the driver.
#[derive(Debug, Clone)]
pub(crate) struct ControlFlags {
    pub(crate) state: SessionState,
    /// Pause at the next safepoint.
    pub(crate) pause_now: bool,
    /// Leave the current pause for one event.
    pub(crate) play_one: bool,
    pub(crate) shutdown_requested: bool,
    pub(crate) filters: EventFilters,
}

impl ControlFlags {
    pub(crate) fn new(event_count: usize) -> Self {
        Self {
            state: SessionState::Disconnected,
            pause_now: false,
            play_one: false,
            shutdown_requested: false,
            filters: EventFilters::new(event_count),
        }
    }

    /// Clears everything a previous visualizer left behind.
    pub(crate) fn reset(&mut self) {
        self.pause_now = false;
        self.play_one = false;
        self.shutdown_requested = false;
        self.filters.revert_to_defaults();
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Drops to `Disconnected`, wherever the session was.
    pub(crate) fn disconnect(&mut self) {
        if self.state.can_transition_to(SessionState::Disconnected) {
            self.state = SessionState::Disconnected;
        }
    }

    /// Applies one visualizer request.
    pub(crate) fn apply(&mut self, command: ReceivedCommand) -> Result<(), SessionError> {
        match command {
            ReceivedCommand::PauseRequest => self.pause_now = true,
            ReceivedCommand::Restart => {
                if self.state.is_paused() {
                    self.state.transition(SessionState::Running)?;
                }
            }
            ReceivedCommand::PlayOne => self.play_one = true,
            ReceivedCommand::ShutdownRequest => self.shutdown_requested = true,
            ReceivedCommand::EventFilters(filters) => {
                if filters.len() != self.filters.len() {
                    return Err(heapscope_model::ModelError::LengthMismatch {
                        what: "event filters",
                        expected: self.filters.len(),
                        actual: filters.len(),
                    }
                    .into());
                }
                self.filters = filters;
            }
            other => return Err(SessionError::UnexpectedCommand(other.opcode())),
        }
        Ok(())
    }
}

/// [`ControlFlags`] behind a lock, plus a wakeup for a paused driver.
#[derive(Debug)]
pub(crate) struct ControlState {
    pub(crate) flags: Mutex<ControlFlags>,
    pub(crate) changed: Notify,
}

impl ControlState {
    pub(crate) fn new(event_count: usize) -> Self {
        Self {
            flags: Mutex::new(ControlFlags::new(event_count)),
            changed: Notify::new(),
        }
    }

    pub(crate) async fn disconnect(&self) {
        self.flags.lock().await.disconnect();
        self.changed.notify_waiters();
    }
}

/// Why a server receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReceiveExit {
    /// The visualizer asked for shutdown; the driver acknowledges it at its
    /// next safepoint.
    ShutdownRequested,
    /// The connection ended or carried a malformed frame.
    Disconnected,
}

/// Reads visualizer frames until shutdown is requested or the connection
/// ends.
pub(crate) async fn receive_loop<R>(
    mut reader: FrameReader<R>,
    control: &ControlState,
) -> ReceiveExit
where
    R: AsyncRead + Unpin,
{
    let id = reader.id();
    tracing::debug!(%id, "server receive loop started");

    loop {
        match reader.receive().await {
            Ok(Some(len)) => tracing::trace!(%id, len, "request frame"),
            Ok(None) => {
                tracing::info!(%id, "visualizer disconnected");
                break;
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "receive failed");
                break;
            }
        }

        let mut commands = Vec::new();
        let mut input = reader.decoder();
        if let Err(e) = dispatch_to_server(&mut input, |command| {
            commands.push(command);
            Ok(())
        }) {
            tracing::warn!(%id, error = %e, "malformed request, dropping visualizer");
            break;
        }

        let shutdown = {
            let mut flags = control.flags.lock().await;
            let applied = commands.into_iter().try_for_each(|command| {
                tracing::debug!(%id, command = %command.opcode(), "request");
                flags.apply(command)
            });
            match applied {
                Ok(()) => Some(flags.shutdown_requested),
                Err(e) => {
                    tracing::warn!(%id, error = %e, "rejected request, dropping visualizer");
                    None
                }
            }
        };
        control.changed.notify_waiters();

        match shutdown {
            Some(true) => {
                tracing::info!(%id, "shutdown requested");
                return ReceiveExit::ShutdownRequested;
            }
            Some(false) => {}
            None => break,
        }
    }

    control.disconnect().await;
    ReceiveExit::Disconnected
}
