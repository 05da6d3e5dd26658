//! Heap spaces: named regions made of tiles, with one stream per metric.

use heapscope_protocol::{Decoder, Encoder, ProtocolError};
use serde::{Deserialize, Serialize};

use crate::events::{non_negative, short_count};
use crate::{Control, DataAccessor, ModelError, Stream, StreamSpec};

/// Shown for unused tiles unless the driver supplies its own text.
pub const DEFAULT_UNUSED_STRING: &str = "NOT USED";

/// A named heap region.
///
/// Every stream's data array holds exactly [`tile_count`](Self::tile_count)
/// values; [`resize`](Self::resize) reallocates them all together.
///
/// # Wire layout
///
/// ```text
/// short  id
/// string name, driver name, title, block info
/// int    tile count
/// string unused string
/// bool   main space
/// short  stream count, then each stream
/// string tile name × tile count
/// ```
///
/// The control array is not part of this layout. It travels as a separate
/// control command and starts out all [`Control::USED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    id: u8,
    name: String,
    driver_name: String,
    title: String,
    block_info: String,
    tile_names: Vec<String>,
    streams: Vec<Stream>,
    space_info: Option<String>,
    unused_string: String,
    main_space: bool,
    control: Vec<Control>,
    changed: bool,
    tiles_to_send: usize,
}

impl Space {
    /// Largest number of streams per space; stream IDs travel as a signed
    /// byte.
    pub const MAX_STREAMS: usize = i8::MAX as usize;

    /// Largest number of values (streams times tiles) a decoded space may
    /// hold.
    pub const MAX_TILE_VALUES: usize = 16 * 1024 * 1024;

    /// Creates a space with `tile_count` tiles, no streams, empty tile
    /// names and every tile marked used.
    pub fn new(
        name: impl Into<String>,
        driver_name: impl Into<String>,
        tile_count: usize,
        title: impl Into<String>,
        block_info: impl Into<String>,
        unused_string: Option<&str>,
        main_space: bool,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            driver_name: driver_name.into(),
            title: title.into(),
            block_info: block_info.into(),
            tile_names: vec![String::new(); tile_count],
            streams: Vec::new(),
            space_info: None,
            unused_string: unused_string.unwrap_or(DEFAULT_UNUSED_STRING).to_owned(),
            main_space,
            control: vec![Control::USED; tile_count],
            changed: false,
            tiles_to_send: 0,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn set_id(&mut self, id: u8) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }

    /// `name  [driver]`.
    pub fn full_name(&self) -> String {
        format!("{}  [{}]", self.name, self.driver_name)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn block_info(&self) -> &str {
        &self.block_info
    }

    pub fn tile_count(&self) -> usize {
        self.tile_names.len()
    }

    pub fn tile_name(&self, tile: usize) -> Option<&str> {
        self.tile_names.get(tile).map(String::as_str)
    }

    pub fn tile_names(&self) -> &[String] {
        &self.tile_names
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn stream(&self, id: usize) -> Option<&Stream> {
        self.streams.get(id)
    }

    pub fn stream_mut(&mut self, id: usize) -> Option<&mut Stream> {
        self.streams.get_mut(id)
    }

    /// A typed view over stream `id`, resolving its percent-var sibling.
    pub fn accessor(&self, id: usize) -> Option<DataAccessor<'_>> {
        let stream = self.streams.get(id)?;
        let max_stream = self.streams.get(usize::from(stream.max_stream_index()));
        Some(DataAccessor::new(stream, max_stream))
    }

    pub fn control(&self) -> &[Control] {
        &self.control
    }

    pub fn space_info(&self) -> Option<&str> {
        self.space_info.as_deref()
    }

    pub fn set_space_info(&mut self, info: impl Into<String>) {
        self.space_info = Some(info.into());
    }

    pub fn unused_string(&self) -> &str {
        &self.unused_string
    }

    pub fn is_main_space(&self) -> bool {
        self.main_space
    }

    // -- server side --------------------------------------------------------

    /// Adds a stream sized to the current tile count and returns its ID.
    pub fn add_stream(&mut self, spec: StreamSpec) -> Result<u8, ModelError> {
        let id = self.streams.len();
        if id >= Self::MAX_STREAMS {
            return Err(ModelError::TooMany {
                what: "streams",
                count: id + 1,
                max: Self::MAX_STREAMS,
            });
        }
        let mut stream = Stream::new(spec, self.tile_count())?;
        let id = id as u8;
        stream.set_id(id);
        self.streams.push(stream);
        Ok(id)
    }

    pub fn set_tile_name(&mut self, tile: usize, name: impl Into<String>) -> Result<(), ModelError> {
        let len = self.tile_names.len();
        let slot = self
            .tile_names
            .get_mut(tile)
            .ok_or(ModelError::IndexOutOfRange {
                what: "tile",
                index: tile,
                len,
            })?;
        *slot = name.into();
        Ok(())
    }

    /// Changes the tile count.
    ///
    /// Every stream gets a fresh zeroed array, all tiles go back to used,
    /// tiles that still exist keep their names, and the space is flagged as
    /// changed so it is retransmitted in full.
    pub fn resize(&mut self, tile_count: usize) {
        for stream in &mut self.streams {
            stream.resize(tile_count);
        }
        self.tile_names.resize(tile_count, String::new());
        self.control = vec![Control::USED; tile_count];
        self.changed = true;
        tracing::debug!(space = %self.name, tile_count, "space resized");
    }

    /// Resets every stream to its default value and zeroes summaries.
    pub fn reset_data(&mut self) {
        for stream in &mut self.streams {
            stream.reset();
        }
    }

    /// Marks every tile used, ready for a new round of control updates.
    pub fn start_control(&mut self) {
        self.control.fill(Control::USED);
    }

    /// Adds `tag` to tile `tile`'s control. Background and unused tags
    /// clear the used bit first.
    pub fn set_control(&mut self, tag: Control, tile: usize) -> Result<(), ModelError> {
        let len = self.control.len();
        let slot = self
            .control
            .get_mut(tile)
            .ok_or(ModelError::IndexOutOfRange {
                what: "tile",
                index: tile,
                len,
            })?;
        if tag.is_background() || tag.is_unused() {
            *slot = slot.without(Control::USED);
        }
        *slot |= tag;
        Ok(())
    }

    /// [`set_control`](Self::set_control) over `len` tiles from `start`.
    pub fn set_control_range(
        &mut self,
        tag: Control,
        start: usize,
        len: usize,
    ) -> Result<(), ModelError> {
        let end = start.saturating_add(len);
        if end > self.control.len() {
            return Err(ModelError::IndexOutOfRange {
                what: "tile",
                index: end.saturating_sub(1),
                len: self.control.len(),
            });
        }
        for tile in start..end {
            self.set_control(tag, tile)?;
        }
        Ok(())
    }

    /// Replaces the whole control array.
    pub fn set_controls(&mut self, control: Vec<Control>) -> Result<(), ModelError> {
        if control.len() != self.control.len() {
            return Err(ModelError::LengthMismatch {
                what: "control",
                expected: self.control.len(),
                actual: control.len(),
            });
        }
        self.control = control;
        Ok(())
    }

    /// `true` if the space's shape changed since it was last transmitted.
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn flag_changed(&mut self) {
        self.changed = true;
    }

    pub fn unflag_changed(&mut self) {
        self.changed = false;
    }

    /// How many leading tiles of each stream to transmit; `0` means all.
    pub fn tiles_to_send(&self) -> usize {
        self.tiles_to_send
    }

    pub fn set_tiles_to_send(&mut self, tiles: usize) {
        self.tiles_to_send = tiles;
    }

    // -- client side --------------------------------------------------------

    /// Recomputes the maximum of every max-var stream from used tiles.
    pub fn calc_maxima(&mut self) {
        for stream in &mut self.streams {
            stream.calc_max_if_necessary(&self.control);
        }
    }

    /// Tooltip-style text for one tile; `None` past the last tile.
    pub fn present_tile(&self, tile: usize) -> Option<String> {
        let control = *self.control.get(tile)?;
        let mut text = format!("{}{tile}", self.title);
        if control.is_background() {
            text.push('\n');
        } else {
            text.push_str(self.tile_name(tile).unwrap_or_default());
            text.push('\n');
            text.push_str(&self.block_info);
        }
        if control.is_used() {
            for id in 0..self.streams.len() {
                if let Some(line) = self.accessor(id).and_then(|a| a.present(tile)) {
                    text.push_str(&line);
                }
                text.push('\n');
            }
        } else if control.is_background() {
            text.push_str("BACKGROUND");
        } else if control.is_unused() {
            text.push_str(&self.unused_string);
        }
        Some(text)
    }

    /// Space info followed by each stream's summary block.
    pub fn present_summary(&self, prefix1: &str, prefix2: &str) -> String {
        let mut text = self.space_info.clone().unwrap_or_default();
        for stream in &self.streams {
            text.push_str(&stream.present_full_summary(prefix1, prefix2));
        }
        text
    }

    // -- wire ---------------------------------------------------------------

    pub fn encode(&self, out: &mut Encoder<'_>) -> Result<(), ModelError> {
        out.write_short(i16::from(self.id))?;
        out.write_string(&self.name)?;
        out.write_string(&self.driver_name)?;
        out.write_string(&self.title)?;
        out.write_string(&self.block_info)?;
        let tile_count = i32::try_from(self.tile_count()).map_err(|_| ModelError::TooMany {
            what: "tiles",
            count: self.tile_count(),
            max: i32::MAX as usize,
        })?;
        out.write_int(tile_count)?;
        out.write_string(&self.unused_string)?;
        out.write_bool(self.main_space)?;
        out.write_short(short_count("streams", self.streams.len())?)?;
        for stream in &self.streams {
            stream.encode(out)?;
        }
        for name in &self.tile_names {
            out.write_string(name)?;
        }
        Ok(())
    }

    pub fn decode(input: &mut Decoder<'_>) -> Result<Self, ModelError> {
        let id = input.read_short()?;
        let id = u8::try_from(id).map_err(|_| ModelError::Negative {
            what: "space id",
            value: id.into(),
        })?;
        let name = input.read_string()?;
        let driver_name = input.read_string()?;
        let title = input.read_string()?;
        let block_info = input.read_string()?;
        let tile_count = non_negative("tile count", input.read_int()?.into())?;
        // Every tile name occupies at least its terminator.
        if tile_count > input.remaining() {
            return Err(ProtocolError::InvalidMessage(format!(
                "tile count {tile_count} exceeds the {} bytes left in the frame",
                input.remaining()
            ))
            .into());
        }
        let unused_string = input.read_string()?;
        let main_space = input.read_bool()?;
        let stream_count = non_negative("stream count", input.read_short()?.into())?;
        if stream_count > Self::MAX_STREAMS {
            return Err(ModelError::TooMany {
                what: "streams",
                count: stream_count,
                max: Self::MAX_STREAMS,
            });
        }
        if stream_count.saturating_mul(tile_count) > Self::MAX_TILE_VALUES {
            return Err(ProtocolError::InvalidMessage(format!(
                "{stream_count} streams of {tile_count} tiles exceed {} values",
                Self::MAX_TILE_VALUES
            ))
            .into());
        }
        // Headers and names first: data arrays are only allocated once the
        // whole description has been read.
        let mut streams = (0..stream_count)
            .map(|_| Stream::decode(input, 0))
            .collect::<Result<Vec<_>, _>>()?;
        let tile_names = (0..tile_count)
            .map(|_| input.read_string())
            .collect::<Result<Vec<_>, _>>()?;
        for stream in &mut streams {
            stream.fill_default(tile_count);
        }

        Ok(Self {
            id,
            name,
            driver_name,
            title,
            block_info,
            tile_names,
            streams,
            space_info: None,
            unused_string,
            main_space,
            control: vec![Control::USED; tile_count],
            changed: false,
            tiles_to_send: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use heapscope_protocol::Rgb;

    use super::*;
    use crate::{DataType, PaintStyle, Presentation, StreamData};

    fn heap() -> Space {
        let mut space = Space::new("Old", "mark-compact", 3, "Block #", "32K", None, true);
        space
            .add_stream(
                StreamSpec::new("Used", DataType::Int)
                    .range(0, 32_768)
                    .prefix("Used: ")
                    .suffix(" bytes")
                    .presentation(Presentation::Percent)
                    .color(Rgb::new(255, 0, 0)),
            )
            .unwrap();
        space
            .add_stream(
                StreamSpec::new("Objects", DataType::Short)
                    .range(0, 100)
                    .prefix("Objects: ")
                    .presentation(Presentation::MaxVar)
                    .paint_style(PaintStyle::Zero),
            )
            .unwrap();
        for tile in 0..3 {
            space.set_tile_name(tile, format!("  0x{:x}", tile * 0x8000)).unwrap();
        }
        space
    }

    fn encode(space: &Space) -> Vec<u8> {
        let mut buf = vec![0u8; 1024];
        let mut out = Encoder::new(&mut buf);
        space.encode(&mut out).unwrap();
        let len = out.len();
        buf.truncate(len);
        buf
    }

    // =====================================================================
    // Construction
    // =====================================================================

    #[test]
    fn test_new_space_defaults() {
        let space = Space::new("Young", "copying", 4, "t", "b", None, false);
        assert_eq!(space.unused_string(), "NOT USED");
        assert_eq!(space.control(), &[Control::USED; 4]);
        assert_eq!(space.full_name(), "Young  [copying]");
        assert!(!space.changed());
        assert_eq!(space.space_info(), None);
    }

    #[test]
    fn test_add_stream_assigns_consecutive_ids() {
        let space = heap();
        assert_eq!(space.stream(0).unwrap().id(), 0);
        assert_eq!(space.stream(1).unwrap().id(), 1);
        assert!(space.streams().iter().all(|s| s.data().len() == 3));
    }

    // =====================================================================
    // Server-side mutation
    // =====================================================================

    #[test]
    fn test_resize_reallocates_and_flags_change() {
        let mut space = heap();
        space.set_control(Control::UNUSED, 1).unwrap();
        space.resize(5);
        assert_eq!(space.tile_count(), 5);
        assert!(space.streams().iter().all(|s| s.data().len() == 5));
        assert_eq!(space.control(), &[Control::USED; 5]);
        assert_eq!(space.tile_name(2), Some("  0x10000"));
        assert_eq!(space.tile_name(4), Some(""));
        assert!(space.changed());

        space.resize(2);
        assert_eq!(space.tile_names().len(), 2);
        assert!(space.streams().iter().all(|s| s.data().len() == 2));
    }

    #[test]
    fn test_set_control_clears_used_for_background_and_unused() {
        let mut space = heap();
        space.set_control(Control::BACKGROUND, 0).unwrap();
        space.set_control(Control::SEPARATOR, 1).unwrap();
        space.set_control(Control::UNUSED | Control::LINK, 2).unwrap();
        assert_eq!(space.control()[0], Control::BACKGROUND);
        assert_eq!(space.control()[1], Control::USED | Control::SEPARATOR);
        assert_eq!(space.control()[2], Control::UNUSED | Control::LINK);

        space.start_control();
        assert_eq!(space.control(), &[Control::USED; 3]);
    }

    #[test]
    fn test_set_control_range_bounds() {
        let mut space = heap();
        space.set_control_range(Control::UNUSED, 1, 2).unwrap();
        assert_eq!(space.control()[0], Control::USED);
        assert_eq!(space.control()[2], Control::UNUSED);
        assert!(matches!(
            space.set_control_range(Control::UNUSED, 2, 2),
            Err(ModelError::IndexOutOfRange { index: 3, len: 3, .. })
        ));
    }

    #[test]
    fn test_reset_data_uses_defaults() {
        let mut space = heap();
        space.stream_mut(0).unwrap().set_value(0, 99).unwrap();
        space.reset_data();
        assert_eq!(space.stream(0).unwrap().data().get(0), Some(0));
    }

    #[test]
    fn test_set_controls_checks_length() {
        let mut space = heap();
        assert!(space.set_controls(vec![Control::USED; 2]).is_err());
        space
            .set_controls(vec![Control::BACKGROUND, Control::USED, Control::UNUSED])
            .unwrap();
        assert!(space.control()[0].is_background());
    }

    // =====================================================================
    // Client-side presentation
    // =====================================================================

    #[test]
    fn test_calc_maxima_updates_max_var_streams() {
        let mut space = heap();
        space
            .stream_mut(1)
            .unwrap()
            .set_data(StreamData::Short(vec![3, 40, 12]))
            .unwrap();
        space.calc_maxima();
        assert_eq!(space.stream(1).unwrap().max_value(), 40);
        assert_eq!(space.stream(0).unwrap().max_value(), 32_768);
    }

    #[test]
    fn test_present_tile() {
        let mut space = heap();
        space
            .stream_mut(0)
            .unwrap()
            .set_data(StreamData::Int(vec![8192, 0, 0]))
            .unwrap();
        space
            .stream_mut(1)
            .unwrap()
            .set_data(StreamData::Short(vec![1500, 0, 0]))
            .unwrap();
        space.set_control(Control::BACKGROUND, 1).unwrap();
        space.set_control(Control::UNUSED, 2).unwrap();

        assert_eq!(
            space.present_tile(0).unwrap(),
            "Block #0  0x0\n32KUsed: 8,192 bytes  (25.0%)\nObjects: 1,500\n"
        );
        assert_eq!(space.present_tile(1).unwrap(), "Block #1\nBACKGROUND");
        assert_eq!(space.present_tile(2).unwrap(), "Block #2  0x10000\n32KNOT USED");
        assert_eq!(space.present_tile(3), None);
    }

    #[test]
    fn test_present_summary() {
        let mut space = heap();
        assert_eq!(space.present_summary("  ", "    "), "");
        space.set_space_info("Old generation\n");
        space.stream_mut(0).unwrap().set_summary(vec![16_384, 32_768]);
        space.stream_mut(1).unwrap().set_summary(vec![12]);
        assert_eq!(
            space.present_summary("  ", "    "),
            "Old generation\n  Used: 50.0%  (16,384 bytes)\n  Objects: 12\n"
        );
    }

    // =====================================================================
    // Wire
    // =====================================================================

    #[test]
    fn test_decode_then_encode_is_identical() {
        let mut original = heap();
        original.set_id(3);
        let bytes = encode(&original);
        let decoded = Space::decode(&mut Decoder::new(&bytes)).unwrap();

        assert_eq!(decoded.id(), 3);
        assert_eq!(decoded.name(), "Old");
        assert_eq!(decoded.driver_name(), "mark-compact");
        assert_eq!(decoded.tile_names(), original.tile_names());
        assert_eq!(decoded.stream_count(), 2);
        assert_eq!(decoded.control(), &[Control::USED; 3]);
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn test_control_is_not_serialized() {
        let mut space = heap();
        let before = encode(&space);
        space.set_control(Control::UNUSED, 0).unwrap();
        assert_eq!(encode(&space), before);
    }

    #[test]
    fn test_wire_header_layout() {
        let space = Space::new("S", "D", 1, "T", "B", Some("-"), true);
        let bytes = encode(&space);
        let mut expected = vec![0, 0];
        expected.extend_from_slice(b"S\0D\0T\0B\0");
        expected.extend_from_slice(&[0, 0, 0, 1]);
        expected.extend_from_slice(b"-\0");
        expected.extend_from_slice(&[1, 0, 0, 0]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_decode_rejects_implausible_tile_count() {
        let mut bytes = vec![0, 0];
        bytes.extend_from_slice(b"S\0D\0T\0B\0");
        bytes.extend_from_slice(&i32::MAX.to_be_bytes());
        bytes.extend_from_slice(b"\0");
        assert!(matches!(
            Space::decode(&mut Decoder::new(&bytes)),
            Err(ModelError::Protocol(ProtocolError::InvalidMessage(_)))
        ));
    }

    fn header(tile_count: i32, stream_count: i16) -> Vec<u8> {
        let mut bytes = vec![0, 0];
        bytes.extend_from_slice(b"S\0D\0T\0B\0");
        bytes.extend_from_slice(&tile_count.to_be_bytes());
        bytes.extend_from_slice(b"\0");
        bytes.push(1);
        bytes.extend_from_slice(&stream_count.to_be_bytes());
        bytes
    }

    #[test]
    fn test_decode_bounds_total_tile_values() {
        // Enough padding for the tile count to pass on its own.
        let mut bytes = header(200_000, 127);
        bytes.resize(256 * 1024, 0);
        assert!(matches!(
            Space::decode(&mut Decoder::new(&bytes)),
            Err(ModelError::Protocol(ProtocolError::InvalidMessage(_)))
        ));
    }

    #[test]
    fn test_decode_rejects_too_many_streams() {
        let mut bytes = header(1, 128);
        bytes.resize(64, 0);
        assert!(matches!(
            Space::decode(&mut Decoder::new(&bytes)),
            Err(ModelError::TooMany { what: "streams", count: 128, .. })
        ));
    }

    #[test]
    fn test_truncated_space_is_capacity_error() {
        let bytes = encode(&heap());
        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(
            Space::decode(&mut Decoder::new(truncated)),
            Err(ModelError::Protocol(ProtocolError::Capacity { .. }))
        ));
    }
}
