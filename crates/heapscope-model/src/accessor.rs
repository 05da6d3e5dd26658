//! Uniform read access to a stream's values regardless of storage width.

use crate::{Presentation, Stream};

/// A read-only view over one stream of a space.
///
/// Obtained from [`Space::accessor`](crate::Space::accessor). Percent-var
/// streams take their per-tile maximum from a sibling stream, so the view
/// carries that sibling along.
#[derive(Debug, Clone, Copy)]
pub struct DataAccessor<'a> {
    stream: &'a Stream,
    max_stream: Option<&'a Stream>,
}

impl<'a> DataAccessor<'a> {
    pub(crate) fn new(stream: &'a Stream, max_stream: Option<&'a Stream>) -> Self {
        Self { stream, max_stream }
    }

    pub fn stream(&self) -> &'a Stream {
        self.stream
    }

    pub fn len(&self) -> usize {
        self.stream.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_data_available(&self) -> bool {
        !self.is_empty()
    }

    /// The raw value of tile `i`, widened to `i32`.
    pub fn get(&self, i: usize) -> Option<i32> {
        self.stream.data().get(i)
    }

    /// The maximum that applies to tile `i`: the sibling stream's value for
    /// percent-var (0 when the sibling is missing), the stream maximum
    /// otherwise.
    pub fn max_value_at(&self, i: usize) -> i32 {
        match self.stream.presentation() {
            Presentation::PercentVar => self.max_stream.and_then(|s| s.data().get(i)).unwrap_or(0),
            _ => self.stream.max_value(),
        }
    }

    /// Tile `i` relative to the stream's range; for percent-var, its
    /// percentage of [`max_value_at`](Self::max_value_at).
    pub fn adjusted(&self, i: usize) -> Option<i32> {
        let value = self.get(i)?;
        match self.stream.presentation() {
            Presentation::PercentVar => {
                let max = self.max_value_at(i);
                Some((f64::from(value) * 100.0 / f64::from(max)) as i32)
            }
            _ => self.stream.adjust_value(value),
        }
    }

    pub fn adjusted_max(&self) -> i32 {
        self.stream.adjusted_max()
    }

    pub fn is_zero(&self, i: usize) -> bool {
        self.get(i).is_some_and(|v| self.stream.is_zero(v))
    }

    pub fn is_overflow(&self, i: usize) -> bool {
        self.get(i).is_some_and(|v| self.stream.is_overflow(v))
    }

    /// Display text for tile `i`, with the stream's prefix and suffix.
    pub fn present(&self, i: usize) -> Option<String> {
        let value = self.get(i)?;
        Some(self.stream.present_value(value, self.max_value_at(i)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{DataType, PaintStyle, Presentation, Space, StreamData, StreamSpec};

    fn space() -> Space {
        let mut space = Space::new("Heap", "mark-sweep", 3, "Block ", "", None, true);
        space
            .add_stream(
                StreamSpec::new("Used", DataType::Int)
                    .range(0, 100)
                    .suffix(" B")
                    .presentation(Presentation::PercentVar)
                    .max_stream(1),
            )
            .unwrap();
        space
            .add_stream(StreamSpec::new("Size", DataType::Int).range(0, 100))
            .unwrap();
        space
            .add_stream(
                StreamSpec::new("Marks", DataType::Byte)
                    .range(0, 10)
                    .paint_style(PaintStyle::Zero)
                    .presentation(Presentation::Plus),
            )
            .unwrap();
        space
    }

    #[test]
    fn test_percent_var_uses_sibling_maximum() {
        let mut space = space();
        space
            .stream_mut(0)
            .unwrap()
            .set_data(StreamData::Int(vec![25, 10, 7]))
            .unwrap();
        space
            .stream_mut(1)
            .unwrap()
            .set_data(StreamData::Int(vec![100, 40, 0]))
            .unwrap();

        let used = space.accessor(0).unwrap();
        assert_eq!(used.max_value_at(0), 100);
        assert_eq!(used.adjusted(0), Some(25));
        assert_eq!(used.adjusted(1), Some(25));
        assert_eq!(used.adjusted_max(), 100);
        assert_eq!(used.present(1).unwrap(), "10 B  (25.0%)");
        assert_eq!(used.present(2).unwrap(), "7 B  (N/A%)");
        assert_eq!(used.get(3), None);
    }

    #[test]
    fn test_zero_and_overflow_by_index() {
        let mut space = space();
        space
            .stream_mut(2)
            .unwrap()
            .set_data(StreamData::Byte(vec![0, 11, 5]))
            .unwrap();
        let marks = space.accessor(2).unwrap();
        assert!(marks.is_zero(0));
        assert!(!marks.is_zero(2));
        assert!(marks.is_overflow(1));
        assert_eq!(marks.adjusted(1), Some(10));
        assert_eq!(marks.present(1).unwrap(), "11 (10+)");
        assert!(marks.is_data_available());
        assert_eq!(marks.len(), 3);
    }
}
