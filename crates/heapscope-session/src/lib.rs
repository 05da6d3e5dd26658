#![allow(async_fn_in_trait)]
//! Session layer of the heapscope protocol.
//!
//! Everything both roles agree on once frames can move:
//!
//! 1. [`client_handshake`] / [`server_handshake`] exchange magic strings.
//! 2. The server sends its [`Heap`] description
//!    ([`Heap::send_bootstrap`]); the visualizer rebuilds it
//!    ([`Heap::receive_bootstrap`]).
//! 3. Each later frame holds one [`Command`]; receivers decode them into
//!    [`ReceivedCommand`]s through [`dispatch_to_server`] and [`dispatch_to_client`].
//!
//! Payloads are produced and consumed through [`OutputGenerator`] and
//! [`InputGenerator`], implemented for live frame halves and for the
//! in-memory [`MemoryTrace`].

mod command;
mod error;
mod generator;
mod handshake;
mod heap;
mod opcode;
mod state;

pub use command::{dispatch_to_client, dispatch_to_server, Command, ReceivedCommand};
pub use error::SessionError;
pub use generator::{InputGenerator, MemoryTrace, OutputGenerator};
pub use handshake::{
    client_handshake, server_handshake, ClientHello, ServerHello, ENDIANNESS, MAGIC_STRING,
};
pub use heap::{Heap, MAX_SPACES};
pub use opcode::{Direction, Opcode};
pub use state::SessionState;
