//! Metric streams: one value per tile of a space.

use std::fmt;

use heapscope_protocol::{Decoder, Encoder, Rgb};
use serde::{Deserialize, Serialize};

use crate::format::{format_percentage, format_size, pad_left, pad_right, percentage};
use crate::{Control, ModelError, Space};

// ---------------------------------------------------------------------------
// Wire enums
// ---------------------------------------------------------------------------

/// Storage width of a stream's per-tile values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Byte = 0,
    Short = 1,
    Int = 2,
}

impl DataType {
    pub fn from_wire(value: i8) -> Result<Self, ModelError> {
        match value {
            0 => Ok(Self::Byte),
            1 => Ok(Self::Short),
            2 => Ok(Self::Int),
            other => Err(ModelError::UnknownDataType(other)),
        }
    }

    pub fn to_wire(self) -> i8 {
        self as i8
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
        })
    }
}

/// How raw values are interpreted for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Presentation {
    /// Shown as is.
    Plain = 0,
    /// Values above the maximum are shown as `max+`.
    Plus = 1,
    /// The maximum is recomputed from the data after every event.
    MaxVar = 2,
    /// A percentage of a fixed maximum.
    Percent = 3,
    /// A percentage of the same tile's value in another stream.
    PercentVar = 4,
    /// Values index into the stream's enum names.
    Enum = 5,
}

impl Presentation {
    pub fn from_wire(value: i8) -> Result<Self, ModelError> {
        match value {
            0 => Ok(Self::Plain),
            1 => Ok(Self::Plus),
            2 => Ok(Self::MaxVar),
            3 => Ok(Self::Percent),
            4 => Ok(Self::PercentVar),
            5 => Ok(Self::Enum),
            other => Err(ModelError::UnknownPresentation(other)),
        }
    }

    pub fn to_wire(self) -> i8 {
        self as i8
    }

    /// Number of summary values a stream with this presentation carries.
    pub fn summary_len(self, enum_count: usize) -> usize {
        match self {
            Self::Plain | Self::Plus | Self::MaxVar => 1,
            Self::Percent | Self::PercentVar => 2,
            Self::Enum => enum_count,
        }
    }
}

/// How tiles are painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaintStyle {
    Plain = 0,
    /// Tiles equal to the zero value are highlighted.
    Zero = 1,
}

impl PaintStyle {
    pub fn from_wire(value: i8) -> Result<Self, ModelError> {
        match value {
            0 => Ok(Self::Plain),
            1 => Ok(Self::Zero),
            other => Err(ModelError::UnknownPaintStyle(other)),
        }
    }

    pub fn to_wire(self) -> i8 {
        self as i8
    }
}

// ---------------------------------------------------------------------------
// StreamData
// ---------------------------------------------------------------------------

/// Per-tile values in one of the three storage widths.
///
/// Values are exchanged as `i32` and narrowed on store, truncating like a
/// two's-complement cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamData {
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
}

impl StreamData {
    /// `len` copies of `value` stored as `data_type`.
    pub fn filled(data_type: DataType, len: usize, value: i32) -> Self {
        match data_type {
            DataType::Byte => Self::Byte(vec![value as i8; len]),
            DataType::Short => Self::Short(vec![value as i16; len]),
            DataType::Int => Self::Int(vec![value; len]),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Byte(_) => DataType::Byte,
            Self::Short(_) => DataType::Short,
            Self::Int(_) => DataType::Int,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::Short(v) => v.len(),
            Self::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<i32> {
        match self {
            Self::Byte(v) => v.get(i).map(|&x| x.into()),
            Self::Short(v) => v.get(i).map(|&x| x.into()),
            Self::Int(v) => v.get(i).copied(),
        }
    }

    pub fn set(&mut self, i: usize, value: i32) -> Result<(), ModelError> {
        let len = self.len();
        let out_of_range = || ModelError::IndexOutOfRange {
            what: "tile",
            index: i,
            len,
        };
        match self {
            Self::Byte(v) => *v.get_mut(i).ok_or_else(out_of_range)? = value as i8,
            Self::Short(v) => *v.get_mut(i).ok_or_else(out_of_range)? = value as i16,
            Self::Int(v) => *v.get_mut(i).ok_or_else(out_of_range)? = value,
        }
        Ok(())
    }

    pub fn fill(&mut self, value: i32) {
        match self {
            Self::Byte(v) => v.fill(value as i8),
            Self::Short(v) => v.fill(value as i16),
            Self::Int(v) => v.fill(value),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Copies `incoming` over the front of this array.
    ///
    /// A server may send fewer values than there are tiles; the rest keep
    /// their previous values.
    pub fn overwrite_prefix(&mut self, incoming: StreamData) -> Result<(), ModelError> {
        let (expected, actual) = (self.data_type(), incoming.data_type());
        if incoming.len() > self.len() {
            return Err(ModelError::LengthMismatch {
                what: "stream data",
                expected: self.len(),
                actual: incoming.len(),
            });
        }
        match (self, incoming) {
            (Self::Byte(dst), Self::Byte(src)) => dst[..src.len()].copy_from_slice(&src),
            (Self::Short(dst), Self::Short(src)) => dst[..src.len()].copy_from_slice(&src),
            (Self::Int(dst), Self::Int(src)) => dst[..src.len()].copy_from_slice(&src),
            _ => return Err(ModelError::DataTypeMismatch { expected, actual }),
        }
        Ok(())
    }

    /// Writes the first `count` values as a length-prefixed array.
    pub fn encode(&self, out: &mut Encoder<'_>, count: usize) -> Result<(), ModelError> {
        let count = count.min(self.len());
        match self {
            Self::Byte(v) => out.write_byte_array(&v[..count])?,
            Self::Short(v) => out.write_short_array(&v[..count])?,
            Self::Int(v) => out.write_int_array(&v[..count])?,
        }
        Ok(())
    }

    pub fn decode(data_type: DataType, input: &mut Decoder<'_>) -> Result<Self, ModelError> {
        Ok(match data_type {
            DataType::Byte => Self::Byte(input.read_byte_array()?),
            DataType::Short => Self::Short(input.read_short_array()?),
            DataType::Int => Self::Int(input.read_int_array()?),
        })
    }
}

// ---------------------------------------------------------------------------
// StreamSpec
// ---------------------------------------------------------------------------

/// Construction parameters for a [`Stream`].
///
/// ```rust
/// use heapscope_model::{DataType, PaintStyle, Presentation, StreamSpec};
///
/// let spec = StreamSpec::new("Used Space", DataType::Int)
///     .range(0, 32 * 1024)
///     .suffix(" bytes")
///     .presentation(Presentation::Percent)
///     .paint_style(PaintStyle::Zero);
/// assert_eq!(spec.max_value, 32 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    pub name: String,
    pub data_type: DataType,
    pub min_value: i32,
    pub max_value: i32,
    pub zero_value: i32,
    pub default_value: i32,
    pub prefix: String,
    pub suffix: String,
    pub presentation: Presentation,
    pub paint_style: PaintStyle,
    pub max_stream_index: u8,
    pub color: Rgb,
    pub enum_names: Vec<String>,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            min_value: 0,
            max_value: 0,
            zero_value: 0,
            default_value: 0,
            prefix: String::new(),
            suffix: String::new(),
            presentation: Presentation::Plain,
            paint_style: PaintStyle::Plain,
            max_stream_index: 0,
            color: Rgb::new(255, 255, 255),
            enum_names: Vec::new(),
        }
    }

    pub fn range(mut self, min: i32, max: i32) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    pub fn zero_value(mut self, value: i32) -> Self {
        self.zero_value = value;
        self
    }

    pub fn default_value(mut self, value: i32) -> Self {
        self.default_value = value;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn paint_style(mut self, paint_style: PaintStyle) -> Self {
        self.paint_style = paint_style;
        self
    }

    /// The stream whose values serve as per-tile maxima for
    /// [`Presentation::PercentVar`].
    pub fn max_stream(mut self, index: u8) -> Self {
        self.max_stream_index = index;
        self
    }

    pub fn color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    pub fn enum_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_names = names.into_iter().map(Into::into).collect();
        self
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// A named metric channel across all tiles of a space.
///
/// # Wire layout
///
/// ```text
/// byte   id
/// byte   data type (0 byte, 1 short, 2 int)
/// string name
/// int    min, max, zero, default
/// string prefix, suffix
/// byte   presentation
/// byte   paint style
/// byte   max stream index
/// color  color
/// byte   enum name count, then that many strings
/// ```
///
/// Data and summary arrays travel separately as stream and summary
/// commands. Decoding a max-var stream resets its maximum to `min + 4`
/// until the first [`calc_max_if_necessary`](Self::calc_max_if_necessary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    id: u8,
    name: String,
    data_type: DataType,
    min_value: i32,
    max_value: i32,
    zero_value: i32,
    default_value: i32,
    prefix: String,
    suffix: String,
    presentation: Presentation,
    paint_style: PaintStyle,
    max_stream_index: u8,
    color: Rgb,
    enum_names: Vec<String>,
    data: StreamData,
    summary: Vec<i32>,
}

impl Stream {
    /// Largest number of enum names the wire's signed count byte can carry.
    pub const MAX_ENUM_NAMES: usize = i8::MAX as usize;

    /// Builds a stream with `tile_count` zeroed values and a zeroed summary
    /// sized for its presentation. The ID is assigned when the stream is
    /// added to a space.
    pub fn new(spec: StreamSpec, tile_count: usize) -> Result<Self, ModelError> {
        if spec.enum_names.len() > Self::MAX_ENUM_NAMES {
            return Err(ModelError::TooMany {
                what: "enum names",
                count: spec.enum_names.len(),
                max: Self::MAX_ENUM_NAMES,
            });
        }
        let summary_len = spec.presentation.summary_len(spec.enum_names.len());
        Ok(Self {
            id: 0,
            data: StreamData::filled(spec.data_type, tile_count, 0),
            summary: vec![0; summary_len],
            name: spec.name,
            data_type: spec.data_type,
            min_value: spec.min_value,
            max_value: spec.max_value,
            zero_value: spec.zero_value,
            default_value: spec.default_value,
            prefix: spec.prefix,
            suffix: spec.suffix,
            presentation: spec.presentation,
            paint_style: spec.paint_style,
            max_stream_index: spec.max_stream_index,
            color: spec.color,
            enum_names: spec.enum_names,
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> u8 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: u8) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn min_value(&self) -> i32 {
        self.min_value
    }

    pub fn max_value(&self) -> i32 {
        self.max_value
    }

    pub fn zero_value(&self) -> i32 {
        self.zero_value
    }

    pub fn default_value(&self) -> i32 {
        self.default_value
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn paint_style(&self) -> PaintStyle {
        self.paint_style
    }

    pub fn max_stream_index(&self) -> u8 {
        self.max_stream_index
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn enum_names(&self) -> &[String] {
        &self.enum_names
    }

    pub fn data(&self) -> &StreamData {
        &self.data
    }

    pub fn summary(&self) -> &[i32] {
        &self.summary
    }

    // -- mutation -----------------------------------------------------------

    /// Stores one tile value (narrowed to the stream's width).
    pub fn set_value(&mut self, tile: usize, value: i32) -> Result<(), ModelError> {
        self.data.set(tile, value)
    }

    /// Replaces the whole data array. Width and length must match.
    pub fn set_data(&mut self, data: StreamData) -> Result<(), ModelError> {
        if data.data_type() != self.data_type {
            return Err(ModelError::DataTypeMismatch {
                expected: self.data_type,
                actual: data.data_type(),
            });
        }
        if data.len() != self.data.len() {
            return Err(ModelError::LengthMismatch {
                what: "stream data",
                expected: self.data.len(),
                actual: data.len(),
            });
        }
        self.data = data;
        Ok(())
    }

    /// Applies a data array received from the wire (possibly shorter than
    /// the tile count).
    pub fn apply_data(&mut self, data: StreamData) -> Result<(), ModelError> {
        self.data.overwrite_prefix(data)
    }

    pub fn set_summary(&mut self, summary: Vec<i32>) {
        self.summary = summary;
    }

    /// Sets every tile to the default value and zeroes the summary.
    pub fn reset(&mut self) {
        self.data.fill(self.default_value);
        self.summary.fill(0);
    }

    /// Reallocates the data array to `tile_count` default values.
    pub(crate) fn fill_default(&mut self, tile_count: usize) {
        self.data = StreamData::filled(self.data_type, tile_count, self.default_value);
    }

    /// Reallocates the data array to `tile_count` zeroed values.
    pub(crate) fn resize(&mut self, tile_count: usize) {
        if self.data.len() != tile_count {
            self.data = StreamData::filled(self.data_type, tile_count, 0);
        }
    }

    /// For max-var streams, sets the maximum to the largest value among
    /// used tiles, floored at `min + 4` (zero paint style) or `min + 2`.
    pub fn calc_max_if_necessary(&mut self, control: &[Control]) {
        if self.presentation != Presentation::MaxVar {
            return;
        }
        let observed = self
            .data
            .iter()
            .zip(control)
            .filter(|(_, c)| c.is_used())
            .map(|(v, _)| v)
            .fold(self.min_value.saturating_sub(1), i32::max);
        let floor = match self.paint_style {
            PaintStyle::Zero => self.min_value.saturating_add(4),
            PaintStyle::Plain => self.min_value.saturating_add(2),
        };
        self.max_value = observed.max(floor);
    }

    // -- interpretation -----------------------------------------------------

    /// A raw value relative to the stream's minimum (clamped to the maximum
    /// for [`Presentation::Plus`]). `None` for percent-var, whose
    /// adjustment depends on the tile; see
    /// [`DataAccessor::adjusted`](crate::DataAccessor::adjusted).
    pub fn adjust_value(&self, value: i32) -> Option<i32> {
        match self.presentation {
            Presentation::Plain
            | Presentation::MaxVar
            | Presentation::Percent
            | Presentation::Enum => Some(value.wrapping_sub(self.min_value)),
            Presentation::Plus => Some(value.min(self.max_value).wrapping_sub(self.min_value)),
            Presentation::PercentVar => None,
        }
    }

    /// Width of the value range, or 100 for percent-var.
    pub fn adjusted_max(&self) -> i32 {
        match self.presentation {
            Presentation::PercentVar => 100,
            _ => self.max_value.wrapping_sub(self.min_value),
        }
    }

    /// `true` if `value` should be painted as zero.
    pub fn is_zero(&self, value: i32) -> bool {
        self.paint_style == PaintStyle::Zero && value == self.zero_value
    }

    /// `true` if `value` exceeds the maximum of a plus stream.
    pub fn is_overflow(&self, value: i32) -> bool {
        self.presentation == Presentation::Plus && value > self.max_value
    }

    /// Percentage of `value` within `[min, max]`.
    fn range_percentage(&self, value: i32) -> f64 {
        percentage(
            i64::from(value) - i64::from(self.min_value),
            i64::from(self.max_value) - i64::from(self.min_value),
        )
    }

    fn enum_name(&self, value: i32) -> String {
        usize::try_from(value)
            .ok()
            .and_then(|i| self.enum_names.get(i))
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }

    /// Compact text for a single value, without prefix or suffix.
    pub fn present_data_small(&self, value: i32) -> String {
        match self.presentation {
            Presentation::Plain | Presentation::MaxVar => format_size(value.into()),
            Presentation::Plus if value > self.max_value => {
                format!("{}+", format_size(self.max_value.into()))
            }
            Presentation::Plus => format_size(value.into()),
            Presentation::Percent => format!(
                "{} ({}%)",
                format_size(value.into()),
                format_percentage(self.range_percentage(value))
            ),
            Presentation::PercentVar => format!("{value}%"),
            Presentation::Enum => self.enum_name(value),
        }
    }

    /// Full text for a value, given the tile's maximum (only consulted for
    /// percent-var).
    pub(crate) fn present_value(&self, value: i32, max_at: i32) -> String {
        let size = format_size(value.into());
        let (pre, post) = (&self.prefix, &self.suffix);
        match self.presentation {
            Presentation::Plain | Presentation::MaxVar => format!("{pre}{size}{post}"),
            Presentation::Plus if value > self.max_value => format!(
                "{pre}{size} ({}+){post}",
                format_size(self.max_value.into())
            ),
            Presentation::Plus => format!("{pre}{size}{post}"),
            Presentation::Percent => format!(
                "{pre}{size}{post}  ({}%)",
                format_percentage(self.range_percentage(value))
            ),
            Presentation::PercentVar if max_at == 0 => format!("{pre}{size}{post}  (N/A%)"),
            Presentation::PercentVar => format!(
                "{pre}{size}{post}  ({}%)",
                format_percentage(percentage(value.into(), max_at.into()))
            ),
            Presentation::Enum => format!("{pre}{}", self.enum_name(value)),
        }
    }

    /// The summary lines, each starting with `prefix`; `None` until a
    /// summary has been received.
    pub fn present_summary(&self, prefix: &str) -> Option<String> {
        if self.summary.is_empty() {
            return None;
        }
        let post = &self.suffix;
        let text = match self.presentation {
            Presentation::Plain | Presentation::Plus | Presentation::MaxVar => {
                format!("{prefix}{}{post}\n", format_size(self.summary[0].into()))
            }
            Presentation::Percent | Presentation::PercentVar => {
                let used = self.summary[0];
                let total = self.summary.get(1).copied().unwrap_or(0);
                if total == 0 {
                    format!("{prefix}N/A%  ({}{post})\n", format_size(used.into()))
                } else {
                    format!(
                        "{prefix}{}%  ({}{post})\n",
                        format_percentage(percentage(used.into(), total.into())),
                        format_size(used.into())
                    )
                }
            }
            Presentation::Enum => {
                let values: Vec<String> = self
                    .summary
                    .iter()
                    .map(|&v| format_size(v.into()))
                    .collect();
                let name_width = self.enum_names.iter().map(|n| n.len()).max().unwrap_or(0);
                let value_width = values.iter().map(String::len).max().unwrap_or(0);
                self.enum_names
                    .iter()
                    .zip(&values)
                    .map(|(name, value)| {
                        format!(
                            "{prefix}{} {}\n",
                            pad_right(name, name_width),
                            pad_left(value, value_width)
                        )
                    })
                    .collect()
            }
        };
        Some(text)
    }

    /// The summary block shown for this stream in a space summary:
    /// `prefix1` before the stream's prefix, `prefix2` before each enum
    /// line. Empty until a summary has been received.
    pub fn present_full_summary(&self, prefix1: &str, prefix2: &str) -> String {
        match self.presentation {
            Presentation::Enum => match self.present_summary(prefix2) {
                Some(lines) => format!("{prefix1}{}\n{lines}", self.prefix),
                None => String::new(),
            },
            _ => match self.present_summary("") {
                Some(line) => format!("{prefix1}{}{line}", self.prefix),
                None => String::new(),
            },
        }
    }

    // -- wire ---------------------------------------------------------------

    pub fn encode(&self, out: &mut Encoder<'_>) -> Result<(), ModelError> {
        out.write_ubyte(self.id)?;
        out.write_byte(self.data_type.to_wire())?;
        out.write_string(&self.name)?;
        out.write_int(self.min_value)?;
        out.write_int(self.max_value)?;
        out.write_int(self.zero_value)?;
        out.write_int(self.default_value)?;
        out.write_string(&self.prefix)?;
        out.write_string(&self.suffix)?;
        out.write_byte(self.presentation.to_wire())?;
        out.write_byte(self.paint_style.to_wire())?;
        let max_stream = i8::try_from(self.max_stream_index).map_err(|_| ModelError::TooMany {
            what: "max stream index",
            count: usize::from(self.max_stream_index),
            max: Space::MAX_STREAMS,
        })?;
        out.write_byte(max_stream)?;
        out.write_color(self.color)?;
        let count = i8::try_from(self.enum_names.len()).map_err(|_| ModelError::TooMany {
            what: "enum names",
            count: self.enum_names.len(),
            max: Self::MAX_ENUM_NAMES,
        })?;
        out.write_byte(count)?;
        for name in &self.enum_names {
            out.write_string(name)?;
        }
        Ok(())
    }

    /// Decodes a stream description. Its data array is allocated with
    /// `tile_count` default values; its summary stays empty until one is
    /// received.
    pub fn decode(input: &mut Decoder<'_>, tile_count: usize) -> Result<Self, ModelError> {
        let id = input.read_byte()?;
        let id = u8::try_from(id).map_err(|_| ModelError::Negative {
            what: "stream id",
            value: id.into(),
        })?;
        let data_type = DataType::from_wire(input.read_byte()?)?;
        let name = input.read_string()?;
        let min_value = input.read_int()?;
        let mut max_value = input.read_int()?;
        let zero_value = input.read_int()?;
        let default_value = input.read_int()?;
        let prefix = input.read_string()?;
        let suffix = input.read_string()?;
        let presentation = Presentation::from_wire(input.read_byte()?)?;
        let paint_style = PaintStyle::from_wire(input.read_byte()?)?;
        let max_stream_index = input.read_byte()?;
        let max_stream_index = u8::try_from(max_stream_index).map_err(|_| ModelError::Negative {
            what: "max stream index",
            value: max_stream_index.into(),
        })?;
        let color = input.read_color()?;
        let count = input.read_byte()?;
        let count = usize::try_from(count).map_err(|_| ModelError::Negative {
            what: "enum name count",
            value: count.into(),
        })?;
        let enum_names = (0..count)
            .map(|_| input.read_string())
            .collect::<Result<Vec<_>, _>>()?;

        if presentation == Presentation::MaxVar {
            max_value = min_value.wrapping_add(4);
        }

        Ok(Self {
            id,
            name,
            data_type,
            min_value,
            max_value,
            zero_value,
            default_value,
            prefix,
            suffix,
            presentation,
            paint_style,
            max_stream_index,
            color,
            enum_names,
            data: StreamData::filled(data_type, tile_count, default_value),
            summary: Vec::new(),
        })
    }
}
