//! The heap entity model carried by the heapscope protocol.
//!
//! A server describes its heap once, at bootstrap, and then keeps the
//! description's arrays up to date:
//!
//! - [`Events`]: the GC events the server reports, by index.
//! - [`EventFilters`]: per-event transmission settings owned by the
//!   visualizer and pushed to the server.
//! - [`Space`]: a heap region of tiles, each with a [`Control`] byte.
//! - [`Stream`]: one metric across every tile of a space, stored as
//!   [`StreamData`] in one of three widths and read through a
//!   [`DataAccessor`].
//!
//! Each entity has an `encode`/`decode` pair whose field order is the
//! compatibility contract between independently built servers and
//! visualizers: decoding and re-encoding an entity yields the same bytes.
//! Entities also derive serde traits for storage outside the wire format.

mod accessor;
mod control;
mod error;
mod events;
pub mod format;
mod space;
mod stream;

pub use accessor::DataAccessor;
pub use control::Control;
pub use error::ModelError;
pub use events::{EventFilter, EventFilters, Events};
pub use space::{Space, DEFAULT_UNUSED_STRING};
pub use stream::{DataType, PaintStyle, Presentation, Stream, StreamData, StreamSpec};
