//! The heap description both peers hold, and its bootstrap transfer.

use heapscope_model::{Events, Space};
use serde::{Deserialize, Serialize};

use crate::{InputGenerator, OutputGenerator, SessionError};

/// Largest number of spaces; space IDs travel as a byte in commands.
pub const MAX_SPACES: usize = i8::MAX as usize;

/// Everything a server describes at bootstrap: free-text info, the event
/// list, and the spaces in ID order.
///
/// # Bootstrap transfer
///
/// One payload with the header, then one payload per space:
///
/// ```text
/// short space count | string general info | events
/// space 0
/// space 1
/// ...
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heap {
    pub general_info: String,
    pub events: Events,
    spaces: Vec<Space>,
}

impl Heap {
    pub fn new(general_info: impl Into<String>, events: Events) -> Self {
        Self {
            general_info: general_info.into(),
            events,
            spaces: Vec::new(),
        }
    }

    /// Adds a space, assigning it the next ID.
    pub fn add_space(&mut self, mut space: Space) -> Result<u8, SessionError> {
        let id = self.spaces.len();
        if id >= MAX_SPACES {
            return Err(heapscope_model::ModelError::TooMany {
                what: "spaces",
                count: id + 1,
                max: MAX_SPACES,
            }
            .into());
        }
        let id = id as u8;
        space.set_id(id);
        self.spaces.push(space);
        Ok(id)
    }

    pub fn spaces(&self) -> &[Space] {
        &self.spaces
    }

    pub fn spaces_mut(&mut self) -> &mut [Space] {
        &mut self.spaces
    }

    pub fn space(&self, id: u8) -> Result<&Space, SessionError> {
        self.spaces
            .get(usize::from(id))
            .ok_or(SessionError::UnknownSpace(id))
    }

    pub fn space_mut(&mut self, id: u8) -> Result<&mut Space, SessionError> {
        self.spaces
            .get_mut(usize::from(id))
            .ok_or(SessionError::UnknownSpace(id))
    }

    /// Replaces the space with the same ID as `space`.
    pub fn replace_space(&mut self, space: Space) -> Result<(), SessionError> {
        let id = space.id();
        *self.space_mut(id)? = space;
        Ok(())
    }

    /// Recomputes max-var maxima in every space.
    pub fn calc_maxima(&mut self) {
        for space in &mut self.spaces {
            space.calc_maxima();
        }
    }

    /// Sends the header payload followed by one payload per space.
    pub async fn send_bootstrap<G: OutputGenerator>(
        &self,
        generator: &mut G,
    ) -> Result<(), SessionError> {
        let mut out = generator.buffer();
        let count = i16::try_from(self.spaces.len()).map_err(|_| {
            heapscope_model::ModelError::TooMany {
                what: "spaces",
                count: self.spaces.len(),
                max: MAX_SPACES,
            }
        })?;
        out.write_short(count)?;
        out.write_string(&self.general_info)?;
        self.events.encode(&mut out)?;
        let len = out.len();
        generator.done(len).await?;

        for space in &self.spaces {
            let mut out = generator.buffer();
            space.encode(&mut out)?;
            let len = out.len();
            generator.done(len).await?;
        }
        tracing::debug!(
            spaces = self.spaces.len(),
            events = self.events.len(),
            "bootstrap sent"
        );
        Ok(())
    }

    /// Receives what [`send_bootstrap`](Self::send_bootstrap) sent. Every
    /// payload must be consumed exactly.
    pub async fn receive_bootstrap<G: InputGenerator>(
        generator: &mut G,
    ) -> Result<Self, SessionError> {
        let (space_count, general_info, events) = {
            let mut input = generator.next_input().await?;
            let count = input.read_short()?;
            let count = usize::try_from(count).map_err(|_| {
                heapscope_model::ModelError::Negative {
                    what: "space count",
                    value: count.into(),
                }
            })?;
            let general_info = input.read_string()?;
            let events = Events::decode(&mut input)?;
            input.close()?;
            (count, general_info, events)
        };

        let mut spaces = Vec::with_capacity(space_count.min(MAX_SPACES));
        for _ in 0..space_count {
            let mut input = generator.next_input().await?;
            let space = Space::decode(&mut input)?;
            input.close()?;
            spaces.push(space);
        }
        tracing::debug!(spaces = spaces.len(), events = events.len(), "bootstrap received");
        Ok(Self {
            general_info,
            events,
            spaces,
        })
    }
}
