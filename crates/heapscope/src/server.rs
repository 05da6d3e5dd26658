//! `ServerInterpreter` builder and the driver-facing server role.
//!
//! A heap server lives inside an instrumented runtime. The runtime (the
//! *driver*) keeps running whether or not a visualizer is attached and
//! calls into the interpreter at two kinds of points:
//!
//! - **Event boundaries** ([`event_boundary`](ServerInterpreter::event_boundary),
//!   [`counting_event_boundary`](ServerInterpreter::counting_event_boundary)):
//!   a GC event just finished. If the event passes the visualizer's filters
//!   the whole heap description is transmitted, followed by the event.
//! - **Safepoints** ([`safepoint`](ServerInterpreter::safepoint)): the
//!   driver can be held here while the visualizer has the heap paused.
//!
//! Connections are accepted and handshaken on a background task. The driver
//! picks a waiting visualizer up at its next boundary or safepoint, sends
//! it the bootstrap, and from then on is the connection's only writer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use heapscope_model::{EventFilters, Events, ModelError, Space};
use heapscope_session::{
    server_handshake, ClientHello, Command, Heap, SessionError, SessionState,
};
use heapscope_transport::{
    FrameReader, FrameWriter, TcpTransport, Transport, TransportError,
};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::handler::{receive_loop, ControlState, ReceiveExit};
use crate::stopwatch::Stopwatch;
use crate::{HeapscopeError, ServerConfig};

/// Largest number of events; event IDs travel as a byte.
pub const MAX_EVENTS: usize = i8::MAX as usize;

/// A visualizer that completed the handshake and waits for its bootstrap.
struct PendingClient {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    hello: ClientHello,
}

/// The attached visualizer: our writer plus its receive task.
struct ClientLink {
    writer: FrameWriter<OwnedWriteHalf>,
    receiver: JoinHandle<ReceiveExit>,
}

/// What a paused safepoint should do next.
enum PauseAction {
    Wait,
    PlayOne,
    Restarted,
    Shutdown,
    Gone,
}

// ---------------------------------------------------------------------------
// ServerBuilder
// ---------------------------------------------------------------------------

/// Builder for a heap server.
///
/// # Example
///
/// ```rust,no_run
/// use heapscope::prelude::*;
///
/// # async fn run() -> Result<(), HeapscopeError> {
/// let mut nursery = Space::new("Nursery", "copying", 64, "Block ", "32K", None, true);
/// nursery.add_stream(StreamSpec::new("Used", DataType::Int).range(0, 32 * 1024))?;
///
/// let mut server = ServerInterpreter::builder()
///     .bind("0.0.0.0:3000")
///     .events(["Young GC", "Full GC"])
///     .space(nursery)
///     .build()
///     .await?;
///
/// // ... after each collection:
/// server.counting_event_boundary(0).await?;
/// # Ok(())
/// # }
/// ```
pub struct ServerBuilder {
    bind_addr: String,
    config: ServerConfig,
    events: Vec<String>,
    spaces: Vec<Space>,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            config: ServerConfig::default(),
            events: Vec::new(),
            spaces: Vec::new(),
        }
    }

    /// Sets the address to listen on. Port `0` picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the names of the events the driver reports, in ID order.
    pub fn events<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = names.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a space; spaces get IDs in the order they are added.
    pub fn space(mut self, space: Space) -> Self {
        self.spaces.push(space);
        self
    }

    /// Validates the heap description, binds the listener and starts
    /// accepting visualizers.
    pub async fn build(self) -> Result<ServerInterpreter, HeapscopeError> {
        if self.events.len() > MAX_EVENTS {
            return Err(ModelError::TooMany {
                what: "events",
                count: self.events.len(),
                max: MAX_EVENTS,
            }
            .into());
        }
        let event_count = self.events.len();
        let mut heap = Heap::new(self.config.general_info.clone(), Events::new(self.events));
        for space in self.spaces {
            heap.add_space(space)?;
        }

        let transport = TcpTransport::bind(&self.bind_addr, self.config.frame_config()).await?;
        let local_addr = transport.local_addr()?;
        let control = Arc::new(ControlState::new(event_count));
        let (tx, incoming) = mpsc::channel(1);
        let acceptor = tokio::spawn(accept_loop(
            transport,
            self.config.name.clone(),
            Arc::clone(&control),
            tx,
        ));

        Ok(ServerInterpreter {
            config: self.config,
            heap,
            local_addr,
            incoming,
            acceptor,
            link: None,
            control,
            event_counts: vec![0; event_count],
            elapsed: Stopwatch::new(),
            compensation: Stopwatch::new(),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts one visualizer at a time: handshake, hand it to the driver,
/// then wait for it to go away before accepting the next.
async fn accept_loop(
    mut transport: TcpTransport,
    name: String,
    control: Arc<ControlState>,
    clients: mpsc::Sender<PendingClient>,
) {
    loop {
        tracing::info!("waiting for visualizer to connect");
        let conn = match transport.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
                continue;
            }
        };
        let id = conn.id();
        let (mut reader, mut writer) = conn.into_split();

        if let Err(e) = control
            .flags
            .lock()
            .await
            .state
            .transition(SessionState::Handshaking)
        {
            tracing::warn!(%id, error = %e, "visualizer refused");
            continue;
        }
        match server_handshake(&mut reader, &mut writer, &name).await {
            Ok(hello) => {
                let pending = PendingClient {
                    reader,
                    writer,
                    hello,
                };
                if clients.send(pending).await.is_err() {
                    tracing::debug!("server dropped, acceptor exiting");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "handshake failed");
                control.disconnect().await;
                continue;
            }
        }

        wait_until_disconnected(&control).await;
    }
}

async fn wait_until_disconnected(control: &ControlState) {
    loop {
        let notified = control.changed.notified();
        if control.flags.lock().await.state == SessionState::Disconnected {
            return;
        }
        notified.await;
    }
}

// ---------------------------------------------------------------------------
// ServerInterpreter
// ---------------------------------------------------------------------------

/// The server role of the protocol.
///
/// Owned by the driver. All sends happen on the driver's task, so there is
/// exactly one writer per connection.
pub struct ServerInterpreter {
    config: ServerConfig,
    heap: Heap,
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<PendingClient>,
    acceptor: JoinHandle<()>,
    link: Option<ClientLink>,
    control: Arc<ControlState>,
    event_counts: Vec<i32>,
    elapsed: Stopwatch,
    compensation: Stopwatch,
}

impl ServerInterpreter {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The heap description, for the driver to update between events.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn space_mut(&mut self, id: u8) -> Result<&mut Space, HeapscopeError> {
        Ok(self.heap.space_mut(id)?)
    }

    pub fn event_counts(&self) -> &[i32] {
        &self.event_counts
    }

    /// The filters most recently pushed by the visualizer.
    pub async fn event_filters(&self) -> EventFilters {
        self.control.flags.lock().await.filters.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.control.flags.lock().await.state
    }

    pub async fn is_connected(&self) -> bool {
        self.link.is_some() && self.control.flags.lock().await.is_connected()
    }

    // -- connection -----------------------------------------------------------

    /// Blocks until a visualizer is attached and bootstrapped, then runs a
    /// safepoint so a visualizer that asked to pause at start gets its
    /// pause before the first event.
    pub async fn wait_for_client(&mut self) -> Result<(), HeapscopeError> {
        self.poll_client().await?;
        if self.link.is_none() {
            let pending = self.incoming.recv().await.ok_or_else(|| {
                TransportError::ConnectionClosed("listener stopped".into())
            })?;
            self.adopt(pending).await?;
        }
        self.safepoint().await
    }

    /// Drops a link whose visualizer went away and picks up a waiting one.
    async fn poll_client(&mut self) -> Result<(), HeapscopeError> {
        if self.link.is_some() && !self.control.flags.lock().await.is_connected() {
            self.close_link().await;
        }
        if self.link.is_none() {
            if let Ok(pending) = self.incoming.try_recv() {
                self.adopt(pending).await?;
            }
        }
        Ok(())
    }

    async fn adopt(&mut self, pending: PendingClient) -> Result<(), HeapscopeError> {
        let PendingClient {
            reader,
            mut writer,
            hello,
        } = pending;
        let id = writer.id();
        {
            let mut flags = self.control.flags.lock().await;
            flags.reset();
            flags.pause_now = hello.pause_at_start;
            flags.state.transition(SessionState::Connected)?;
        }

        if let Err(e) = self.heap.send_bootstrap(&mut writer).await {
            tracing::warn!(%id, error = %e, "bootstrap failed");
            self.control.disconnect().await;
            return Err(e.into());
        }
        if self.config.collect_stats {
            self.reset_timers();
        }
        self.control
            .flags
            .lock()
            .await
            .state
            .transition(SessionState::Running)?;

        let control = Arc::clone(&self.control);
        let receiver = tokio::spawn(async move { receive_loop(reader, &control).await });
        self.link = Some(ClientLink { writer, receiver });
        tracing::info!(%id, pause_at_start = hello.pause_at_start, "visualizer connected");
        Ok(())
    }

    /// Closes the connection and lets the acceptor take the next visualizer.
    async fn close_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.writer.shutdown().await {
                tracing::debug!(error = %e, "closing connection failed");
            }
            link.receiver.abort();
        }
        // A visualizer that already left may have been followed by one the
        // acceptor is handshaking; leave its state alone.
        let mut flags = self.control.flags.lock().await;
        if flags.is_connected() {
            flags.disconnect();
            drop(flags);
            self.control.changed.notify_waiters();
        }
    }

    /// Aborts the session on a failed send.
    async fn check_sent(&mut self, result: Result<(), SessionError>) -> Result<(), HeapscopeError> {
        if let Err(e) = result {
            tracing::warn!(error = %e, "send failed, dropping visualizer");
            self.close_link().await;
            return Err(e.into());
        }
        Ok(())
    }

    fn check_event(&self, event: u8) -> Result<(), HeapscopeError> {
        let count = self.heap.events.len();
        if usize::from(event) >= count {
            return Err(HeapscopeError::UnknownEvent { event, count });
        }
        Ok(())
    }

    // -- sends ----------------------------------------------------------------

    /// Sends every space: the full description of spaces flagged as changed,
    /// then each stream's data and summary, the space info and the control
    /// array. Does nothing without a visualizer.
    pub async fn transmit_streams(&mut self) -> Result<(), HeapscopeError> {
        let Some(link) = self.link.as_mut() else {
            return Ok(());
        };
        let result = send_streams(&mut self.heap, &mut link.writer).await;
        self.check_sent(result).await
    }

    /// Sends the per-event counters.
    pub async fn send_event_count(&mut self) -> Result<(), HeapscopeError> {
        let Some(link) = self.link.as_mut() else {
            return Ok(());
        };
        let result = Command::EventCount(&self.event_counts)
            .send(&mut link.writer)
            .await;
        self.check_sent(result).await
    }

    /// Tells the visualizer that `event` happened.
    pub async fn send_event(
        &mut self,
        event: u8,
        elapsed: i32,
        compensation: i32,
    ) -> Result<(), HeapscopeError> {
        self.check_event(event)?;
        self.send(Command::Event {
            event,
            elapsed,
            compensation,
        })
        .await
    }

    async fn send(&mut self, command: Command<'_>) -> Result<(), HeapscopeError> {
        let Some(link) = self.link.as_mut() else {
            return Ok(());
        };
        let result = command.send(&mut link.writer).await;
        self.check_sent(result).await
    }

    // -- event boundaries -----------------------------------------------------

    /// Whether `event` should be transmitted now: a visualizer is attached,
    /// the event is enabled, and its counter is a multiple of its period.
    pub async fn should_transmit(&self, event: u8) -> bool {
        if self.link.is_none() {
            return false;
        }
        let flags = self.control.flags.lock().await;
        let Some(filter) = flags.filters.get(usize::from(event)) else {
            return false;
        };
        let count = self.event_counts.get(usize::from(event)).copied().unwrap_or(0);
        flags.is_connected() && filter.enabled && count % filter.period == 0
    }

    /// Reports `event` with caller-measured times, if it passes the filters.
    pub async fn event_boundary(
        &mut self,
        event: u8,
        elapsed: i32,
        compensation: i32,
    ) -> Result<(), HeapscopeError> {
        self.check_event(event)?;
        self.poll_client().await?;
        if self.should_transmit(event).await {
            self.internal_event_boundary(event, elapsed, compensation)
                .await?;
        }
        Ok(())
    }

    /// Counts `event` and reports it with the built-in stopwatches, if it
    /// passes the filters. Without stats collection nothing is counted or
    /// timed and the reported times are zero.
    pub async fn counting_event_boundary(&mut self, event: u8) -> Result<(), HeapscopeError> {
        self.check_event(event)?;
        self.poll_client().await?;
        if self.config.collect_stats {
            self.update_event_counter(event);
        }
        if !self.should_transmit(event).await {
            return Ok(());
        }

        if self.config.collect_stats {
            self.elapsed.stop();
        }
        let (elapsed, compensation) = (self.elapsed.millis(), self.compensation.millis());
        self.internal_event_boundary(event, elapsed, compensation)
            .await?;
        if self.config.collect_stats {
            self.reset_timers();
        }
        Ok(())
    }

    pub fn update_event_counter(&mut self, event: u8) {
        if let Some(count) = self.event_counts.get_mut(usize::from(event)) {
            *count = count.wrapping_add(1);
        }
    }

    async fn internal_event_boundary(
        &mut self,
        event: u8,
        elapsed: i32,
        compensation: i32,
    ) -> Result<(), HeapscopeError> {
        self.transmit_streams().await?;
        self.send_event_count().await?;
        self.send_event(event, elapsed, compensation).await?;
        tracing::debug!(event, elapsed, compensation, "event transmitted");

        let filter = self
            .control
            .flags
            .lock()
            .await
            .filters
            .get(usize::from(event))
            .copied()
            .unwrap_or_default();
        if filter.delay > 0 {
            let delay = u64::try_from(filter.delay).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if filter.pause {
            self.control.flags.lock().await.pause_now = true;
        }

        self.internal_safepoint().await
    }

    // -- safepoints -----------------------------------------------------------

    /// Acknowledges a pending shutdown or pause, and holds the driver here
    /// while the visualizer keeps the heap paused.
    pub async fn safepoint(&mut self) -> Result<(), HeapscopeError> {
        self.poll_client().await?;
        if self.is_connected().await {
            self.internal_safepoint().await?;
        }
        Ok(())
    }

    async fn internal_safepoint(&mut self) -> Result<(), HeapscopeError> {
        if self.link.is_none() {
            return Ok(());
        }
        let (shutdown, pause_now) = {
            let mut flags = self.control.flags.lock().await;
            (flags.shutdown_requested, std::mem::take(&mut flags.pause_now))
        };
        if shutdown {
            return self.acknowledge_shutdown().await;
        }

        if pause_now {
            // Paused before the acknowledgement goes out, so a restart sent
            // in reply always finds the heap paused.
            {
                let mut flags = self.control.flags.lock().await;
                if !flags.state.is_paused() {
                    flags.state.transition(SessionState::Paused)?;
                }
            }
            self.send(Command::Pause).await?;
            tracing::info!("paused");
        }

        if !self.control.flags.lock().await.state.is_paused() {
            return Ok(());
        }
        let control = Arc::clone(&self.control);
        loop {
            let notified = control.changed.notified();
            let action = {
                let mut flags = control.flags.lock().await;
                if !flags.is_connected() {
                    PauseAction::Gone
                } else if flags.shutdown_requested {
                    PauseAction::Shutdown
                } else if flags.play_one {
                    flags.play_one = false;
                    PauseAction::PlayOne
                } else if !flags.state.is_paused() {
                    PauseAction::Restarted
                } else {
                    PauseAction::Wait
                }
            };
            match action {
                PauseAction::Wait => notified.await,
                PauseAction::PlayOne => {
                    tracing::info!("play one");
                    return Ok(());
                }
                PauseAction::Restarted => {
                    tracing::info!("restarted");
                    return Ok(());
                }
                PauseAction::Shutdown => return self.acknowledge_shutdown().await,
                PauseAction::Gone => {
                    self.close_link().await;
                    return Ok(());
                }
            }
        }
    }

    async fn acknowledge_shutdown(&mut self) -> Result<(), HeapscopeError> {
        self.send(Command::Shutdown).await?;
        tracing::info!("shutdown acknowledged");
        self.close_link().await;
        Ok(())
    }

    // -- statistics -----------------------------------------------------------

    /// Starts timing work that should be reported as compensation (for
    /// example the cost of the instrumentation itself).
    pub fn start_compensation_timer(&mut self) {
        self.compensation.start();
    }

    pub fn stop_compensation_timer(&mut self) {
        self.compensation.stop();
    }

    fn reset_timers(&mut self) {
        self.compensation.reset();
        self.elapsed.reset();
        self.elapsed.start();
    }

    /// Closes any visualizer connection and stops listening.
    pub async fn shutdown(mut self) {
        self.close_link().await;
        self.acceptor.abort();
        tracing::info!("server stopped");
    }
}

impl Drop for ServerInterpreter {
    fn drop(&mut self) {
        self.acceptor.abort();
        if let Some(link) = &self.link {
            link.receiver.abort();
        }
    }
}

async fn send_streams<W>(heap: &mut Heap, writer: &mut FrameWriter<W>) -> Result<(), SessionError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    for space in heap.spaces_mut() {
        if space.changed() {
            Command::Space(space).send(writer).await?;
            space.unflag_changed();
        }
        let id = space.id();
        let count = match space.tiles_to_send() {
            0 => space.tile_count(),
            n => n,
        };
        for stream in space.streams() {
            Command::Stream {
                space: id,
                stream: stream.id(),
                data: stream.data(),
                count,
            }
            .send(writer)
            .await?;
            Command::Summary {
                space: id,
                stream: stream.id(),
                summary: stream.summary(),
            }
            .send(writer)
            .await?;
        }
        Command::SpaceInfo {
            space: id,
            info: space.space_info().unwrap_or(""),
        }
        .send(writer)
        .await?;
        Command::Control {
            space: id,
            control: space.control(),
        }
        .send(writer)
        .await?;
    }
    Ok(())
}
