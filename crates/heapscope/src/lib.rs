#![allow(async_fn_in_trait)]
//! # Heapscope
//!
//! Live heap visualization over TCP.
//!
//! A *heap server* runs inside an instrumented memory manager and describes
//! its heap as spaces of tiles, each with per-tile data streams. A
//! *visualizer* connects, receives the description, and then gets a fresh
//! snapshot after every GC event it has not filtered out. It can pause the
//! server at safepoints, step it one event at a time, and ask it to end the
//! session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use heapscope::prelude::*;
//!
//! # async fn run() -> Result<(), HeapscopeError> {
//! let mut client = ClientInterpreter::connect("127.0.0.1:3000", ClientConfig::default()).await?;
//! println!("attached to {}", client.server_name());
//!
//! let (mut controller, receiver, mut notifications) = client.split();
//! tokio::spawn(receiver.run());
//! while let Some(notification) = notifications.recv().await {
//!     if let Notification::Event { event, elapsed, .. } = notification {
//!         println!("event {event} took {elapsed}ms");
//!         controller.pause_request().await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod handler;
mod server;
mod stopwatch;

pub use client::{
    ClientController, ClientInterpreter, ClientReceiver, HeapState, LoopExit, Notification,
};
pub use config::{ClientConfig, ServerConfig};
pub use error::HeapscopeError;
pub use server::{ServerBuilder, ServerInterpreter, MAX_EVENTS};
pub use stopwatch::Stopwatch;

/// Everything a driver or a visualizer usually needs.
pub mod prelude {
    pub use crate::{
        ClientConfig, ClientController, ClientInterpreter, ClientReceiver, HeapState,
        HeapscopeError, LoopExit, Notification, ServerBuilder, ServerConfig, ServerInterpreter,
        Stopwatch, MAX_EVENTS,
    };
    pub use heapscope_model::{
        Control, DataType, EventFilter, EventFilters, Events, PaintStyle, Presentation, Space,
        Stream, StreamData, StreamSpec,
    };
    pub use heapscope_protocol::Rgb;
    pub use heapscope_session::{Heap, SessionState};
}
