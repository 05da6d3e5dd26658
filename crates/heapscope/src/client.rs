//! The visualizer role.
//!
//! [`ClientInterpreter::connect`] runs the handshake and rebuilds the
//! server's heap description. [`split`](ClientInterpreter::split) then
//! separates the two directions:
//!
//! - [`ClientController`] owns the writer and sends requests (pause,
//!   restart, play one, shutdown, event filters).
//! - [`ClientReceiver`] owns the reader and the decoded [`HeapState`]. Its
//!   [`run`](ClientReceiver::run) loop applies every update and publishes
//!   [`Notification`]s on a bounded channel.

use std::sync::Arc;

use heapscope_model::{EventFilters, Space};
use heapscope_session::{
    client_handshake, dispatch_to_client, ClientHello, Command, Heap, ReceivedCommand,
    SessionError,
};
use heapscope_transport::{connect, FrameReader, FrameWriter};
use serde::{Deserialize, Serialize};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::ToSocketAddrs;
use tokio::sync::mpsc;

use crate::{ClientConfig, HeapscopeError};

// ---------------------------------------------------------------------------
// HeapState
// ---------------------------------------------------------------------------

/// Everything a visualizer knows about the server's heap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapState {
    heap: Heap,
    event_counts: Vec<i32>,
}

impl HeapState {
    fn new(heap: Heap) -> Self {
        Self {
            event_counts: vec![0; heap.events.len()],
            heap,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// How often each event has occurred, as last reported by the server.
    pub fn event_counts(&self) -> &[i32] {
        &self.event_counts
    }
}

/// What the receive loop tells the visualizer.
#[derive(Debug, Clone)]
pub enum Notification {
    /// An event finished; `state` is the heap as of that event, with
    /// max-var maxima recomputed.
    Event {
        event: u8,
        elapsed: i32,
        compensation: i32,
        state: Arc<HeapState>,
    },
    /// The server sent a new description of a space (it was resized).
    SpaceReplaced(Space),
    /// The server acknowledged a pause.
    Paused,
    /// The server acknowledged a shutdown request; no more notifications
    /// follow.
    Shutdown,
}

/// Why [`ClientReceiver::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The server acknowledged a shutdown.
    Shutdown,
    /// The connection ended without a shutdown.
    Disconnected,
}

// ---------------------------------------------------------------------------
// ClientInterpreter
// ---------------------------------------------------------------------------

/// A connected, bootstrapped visualizer session.
pub struct ClientInterpreter {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    server_name: String,
    heap: Heap,
    filters: EventFilters,
    config: ClientConfig,
}

impl ClientInterpreter {
    /// Connects to a heap server, performs the handshake (the visualizer
    /// speaks first) and receives the bootstrap.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        config: ClientConfig,
    ) -> Result<Self, HeapscopeError> {
        let conn = connect(addr, config.frame_config()).await?;
        let id = conn.id();
        let (mut reader, mut writer) = conn.into_split();

        let hello = ClientHello {
            pause_at_start: config.pause_at_start,
        };
        let server = client_handshake(&mut reader, &mut writer, hello).await?;
        let heap = Heap::receive_bootstrap(&mut reader).await?;
        let filters = EventFilters::new(heap.events.len());

        tracing::info!(
            %id,
            server = %server.name,
            spaces = heap.spaces().len(),
            events = heap.events.len(),
            "connected to heap server"
        );
        Ok(Self {
            reader,
            writer,
            server_name: server.name,
            heap,
            filters,
            config,
        })
    }

    /// The name the server announced.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// The heap as received at bootstrap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn event_filters(&self) -> &EventFilters {
        &self.filters
    }

    /// Separates the request side from the update side. The returned
    /// channel carries the receive loop's notifications.
    pub fn split(self) -> (ClientController, ClientReceiver, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(self.config.notification_capacity.max(1));
        let controller = ClientController {
            writer: self.writer,
            filters: self.filters,
        };
        let receiver = ClientReceiver {
            reader: self.reader,
            state: HeapState::new(self.heap),
            notifications: tx,
        };
        (controller, receiver, rx)
    }
}

// ---------------------------------------------------------------------------
// ClientController
// ---------------------------------------------------------------------------

/// Sends visualizer requests to the server.
pub struct ClientController {
    writer: FrameWriter<OwnedWriteHalf>,
    filters: EventFilters,
}

impl ClientController {
    /// Asks the server to pause at its next safepoint.
    pub async fn pause_request(&mut self) -> Result<(), HeapscopeError> {
        self.send(Command::PauseRequest).await
    }

    /// Lets a paused server run freely again.
    pub async fn restart(&mut self) -> Result<(), HeapscopeError> {
        self.send(Command::Restart).await
    }

    /// Lets a paused server run until its next safepoint.
    pub async fn play_one(&mut self) -> Result<(), HeapscopeError> {
        self.send(Command::PlayOne).await
    }

    /// Asks the server to end the session. The server answers with a
    /// shutdown acknowledgement at its next safepoint.
    pub async fn shutdown_request(&mut self) -> Result<(), HeapscopeError> {
        self.send(Command::ShutdownRequest).await
    }

    /// The filters as last sent (defaults until then).
    pub fn event_filters(&self) -> &EventFilters {
        &self.filters
    }

    /// Edits the filters locally; call [`send_event_filters`](Self::send_event_filters)
    /// to push them.
    pub fn event_filters_mut(&mut self) -> &mut EventFilters {
        &mut self.filters
    }

    /// Pushes the current filters to the server.
    pub async fn send_event_filters(&mut self) -> Result<(), HeapscopeError> {
        Command::EventFilters(&self.filters)
            .send(&mut self.writer)
            .await?;
        tracing::debug!(filters = self.filters.len(), "event filters sent");
        Ok(())
    }

    /// Replaces the filters and pushes them.
    pub async fn set_event_filters(&mut self, filters: EventFilters) -> Result<(), HeapscopeError> {
        self.filters = filters;
        self.send_event_filters().await
    }

    async fn send(&mut self, command: Command<'_>) -> Result<(), HeapscopeError> {
        command.send(&mut self.writer).await?;
        tracing::debug!(command = %command.opcode(), "request sent");
        Ok(())
    }

    /// Closes the sending direction.
    pub async fn close(mut self) -> Result<(), HeapscopeError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ClientReceiver
// ---------------------------------------------------------------------------

/// Applies server updates and publishes notifications.
pub struct ClientReceiver {
    reader: FrameReader<OwnedReadHalf>,
    state: HeapState,
    notifications: mpsc::Sender<Notification>,
}

impl ClientReceiver {
    pub fn state(&self) -> &HeapState {
        &self.state
    }

    /// Runs until the server acknowledges a shutdown or the connection
    /// ends. A malformed frame aborts the session with its error.
    pub async fn run(mut self) -> Result<LoopExit, HeapscopeError> {
        let id = self.reader.id();
        tracing::debug!(%id, "client receive loop started");

        loop {
            if self.reader.receive().await?.is_none() {
                tracing::info!(%id, "server disconnected");
                return Ok(LoopExit::Disconnected);
            }

            let mut outbox = Vec::new();
            let mut shutdown = false;
            let HeapState { heap, event_counts } = &mut self.state;
            let mut input = self.reader.decoder();
            dispatch_to_client(&mut input, heap, |command, heap| {
                tracing::debug!(%id, command = %command.opcode(), "update");
                apply(command, heap, event_counts, &mut outbox, &mut shutdown)
            })
            .map_err(|e| match e {
                SessionError::UnknownEvent { event, count } => {
                    HeapscopeError::UnknownEvent { event, count }
                }
                other => other.into(),
            })?;

            for notification in outbox {
                self.notifications
                    .send(notification)
                    .await
                    .map_err(|_| HeapscopeError::NotificationChannelClosed)?;
            }
            if shutdown {
                tracing::info!(%id, "shutdown acknowledged by server");
                return Ok(LoopExit::Shutdown);
            }
        }
    }
}

/// Applies one update to the visualizer's model.
fn apply(
    command: ReceivedCommand,
    heap: &mut Heap,
    event_counts: &mut Vec<i32>,
    outbox: &mut Vec<Notification>,
    shutdown: &mut bool,
) -> Result<(), SessionError> {
    match command {
        ReceivedCommand::Pause => outbox.push(Notification::Paused),
        ReceivedCommand::Shutdown => {
            *shutdown = true;
            outbox.push(Notification::Shutdown);
        }
        ReceivedCommand::Stream {
            space,
            stream,
            data,
        } => {
            heap.space_mut(space)?
                .stream_mut(usize::from(stream))
                .ok_or(SessionError::UnknownStream { space, stream })?
                .apply_data(data)?;
        }
        ReceivedCommand::Event {
            event,
            elapsed,
            compensation,
        } => {
            let count = heap.events.len();
            if usize::from(event) >= count {
                return Err(SessionError::UnknownEvent { event, count });
            }
            heap.calc_maxima();
            let state = Arc::new(HeapState {
                heap: heap.clone(),
                event_counts: event_counts.clone(),
            });
            outbox.push(Notification::Event {
                event,
                elapsed,
                compensation,
                state,
            });
        }
        ReceivedCommand::Control { space, control } => {
            heap.space_mut(space)?.set_controls(control)?;
        }
        ReceivedCommand::EventCount(counts) => *event_counts = counts,
        ReceivedCommand::Summary {
            space,
            stream,
            summary,
        } => {
            heap.space_mut(space)?
                .stream_mut(usize::from(stream))
                .ok_or(SessionError::UnknownStream { space, stream })?
                .set_summary(summary);
        }
        ReceivedCommand::SpaceInfo { space, info } => {
            heap.space_mut(space)?.set_space_info(info);
        }
        ReceivedCommand::Space(space) => {
            heap.replace_space(space.clone())?;
            outbox.push(Notification::SpaceReplaced(space));
        }
        other => return Err(SessionError::UnexpectedCommand(other.opcode())),
    }
    Ok(())
}
