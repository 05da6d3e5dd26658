//! GC events and the per-event filters a visualizer pushes to the server.

use heapscope_protocol::{Decoder, Encoder};
use serde::{Deserialize, Serialize};

use crate::ModelError;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The ordered list of event names a server reports.
///
/// Fixed for the lifetime of a connection; an event's ID is its index.
///
/// Wire layout: `short count` followed by `count` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    names: Vec<String>,
}

impl Events {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The name of event `id`, if it exists.
    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn encode(&self, out: &mut Encoder<'_>) -> Result<(), ModelError> {
        out.write_short(short_count("events", self.names.len())?)?;
        for name in &self.names {
            out.write_string(name)?;
        }
        Ok(())
    }

    pub fn decode(input: &mut Decoder<'_>) -> Result<Self, ModelError> {
        let count = non_negative("event count", input.read_short()?.into())?;
        let names = (0..count)
            .map(|_| input.read_string())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { names })
    }
}

// ---------------------------------------------------------------------------
// EventFilters
// ---------------------------------------------------------------------------

/// Filter settings for a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Whether the server transmits at this event at all.
    pub enabled: bool,
    /// Milliseconds the server sleeps after transmitting.
    pub delay: i32,
    /// Whether the server pauses at the next safepoint after this event.
    pub pause: bool,
    /// Transmit only every `period`-th occurrence.
    pub period: i32,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            enabled: EventFilters::ENABLED_DEFAULT,
            delay: EventFilters::DELAY_DEFAULT,
            pause: EventFilters::PAUSE_DEFAULT,
            period: EventFilters::PERIOD_DEFAULT,
        }
    }
}

/// One [`EventFilter`] per event, indexed by event ID.
///
/// Wire layout: `short count`, then per event
/// `bool enabled, int delay, bool pause, int period`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilters {
    filters: Vec<EventFilter>,
}

impl EventFilters {
    pub const ENABLED_DEFAULT: bool = true;
    pub const DELAY_DEFAULT: i32 = 0;
    pub const DELAY_MIN: i32 = 0;
    pub const DELAY_MAX: i32 = 10_000;
    pub const PAUSE_DEFAULT: bool = false;
    pub const PERIOD_DEFAULT: i32 = 1;
    pub const PERIOD_MIN: i32 = 1;
    pub const PERIOD_MAX: i32 = 1_000;

    /// Default filters for `event_count` events.
    pub fn new(event_count: usize) -> Self {
        Self {
            filters: vec![EventFilter::default(); event_count],
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&EventFilter> {
        self.filters.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventFilter> {
        self.filters.iter()
    }

    pub fn revert_to_defaults(&mut self) {
        self.filters.fill(EventFilter::default());
    }

    pub fn enable_all(&mut self) {
        self.filters.iter_mut().for_each(|f| f.enabled = true);
    }

    pub fn disable_all(&mut self) {
        self.filters.iter_mut().for_each(|f| f.enabled = false);
    }

    pub fn clear_delays(&mut self) {
        self.filters
            .iter_mut()
            .for_each(|f| f.delay = Self::DELAY_DEFAULT);
    }

    pub fn clear_pauses(&mut self) {
        self.filters
            .iter_mut()
            .for_each(|f| f.pause = Self::PAUSE_DEFAULT);
    }

    pub fn reset_periods(&mut self) {
        self.filters
            .iter_mut()
            .for_each(|f| f.period = Self::PERIOD_DEFAULT);
    }

    pub fn set_enabled(&mut self, id: usize, enabled: bool) -> Result<(), ModelError> {
        self.filter_mut(id)?.enabled = enabled;
        Ok(())
    }

    pub fn set_delay(&mut self, id: usize, delay: i32) -> Result<(), ModelError> {
        check_bounds("delay", delay, Self::DELAY_MIN, Self::DELAY_MAX)?;
        self.filter_mut(id)?.delay = delay;
        Ok(())
    }

    pub fn set_pause(&mut self, id: usize, pause: bool) -> Result<(), ModelError> {
        self.filter_mut(id)?.pause = pause;
        Ok(())
    }

    pub fn set_period(&mut self, id: usize, period: i32) -> Result<(), ModelError> {
        check_bounds("period", period, Self::PERIOD_MIN, Self::PERIOD_MAX)?;
        self.filter_mut(id)?.period = period;
        Ok(())
    }

    /// Replaces the filter for event `id`, validating both bounds.
    pub fn set(&mut self, id: usize, filter: EventFilter) -> Result<(), ModelError> {
        validate(&filter)?;
        *self.filter_mut(id)? = filter;
        Ok(())
    }

    pub fn encode(&self, out: &mut Encoder<'_>) -> Result<(), ModelError> {
        out.write_short(short_count("event filters", self.filters.len())?)?;
        for f in &self.filters {
            out.write_bool(f.enabled)?;
            out.write_int(f.delay)?;
            out.write_bool(f.pause)?;
            out.write_int(f.period)?;
        }
        Ok(())
    }

    /// Decodes filters, rejecting any delay or period outside its bounds.
    pub fn decode(input: &mut Decoder<'_>) -> Result<Self, ModelError> {
        let count = non_negative("event filter count", input.read_short()?.into())?;
        let mut filters = Vec::with_capacity(count);
        for _ in 0..count {
            let filter = EventFilter {
                enabled: input.read_bool()?,
                delay: input.read_int()?,
                pause: input.read_bool()?,
                period: input.read_int()?,
            };
            validate(&filter)?;
            filters.push(filter);
        }
        Ok(Self { filters })
    }

    fn filter_mut(&mut self, id: usize) -> Result<&mut EventFilter, ModelError> {
        let len = self.filters.len();
        self.filters
            .get_mut(id)
            .ok_or(ModelError::IndexOutOfRange {
                what: "event",
                index: id,
                len,
            })
    }
}

fn validate(filter: &EventFilter) -> Result<(), ModelError> {
    check_bounds(
        "delay",
        filter.delay,
        EventFilters::DELAY_MIN,
        EventFilters::DELAY_MAX,
    )?;
    check_bounds(
        "period",
        filter.period,
        EventFilters::PERIOD_MIN,
        EventFilters::PERIOD_MAX,
    )
}

fn check_bounds(field: &'static str, value: i32, min: i32, max: i32) -> Result<(), ModelError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ModelError::FilterOutOfBounds {
            field,
            value,
            min,
            max,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire helpers shared with the rest of the model
// ---------------------------------------------------------------------------

pub(crate) fn short_count(what: &'static str, count: usize) -> Result<i16, ModelError> {
    i16::try_from(count).map_err(|_| ModelError::TooMany {
        what,
        count,
        max: i16::MAX as usize,
    })
}

pub(crate) fn non_negative(what: &'static str, value: i64) -> Result<usize, ModelError> {
    usize::try_from(value).map_err(|_| ModelError::Negative { what, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_with(f: impl FnOnce(&mut Encoder<'_>)) -> Vec<u8> {
        let mut buf = vec![0u8; 256];
        let mut out = Encoder::new(&mut buf);
        f(&mut out);
        let len = out.len();
        buf.truncate(len);
        buf
    }

    // =====================================================================
    // Events
    // =====================================================================

    #[test]
    fn test_events_wire_layout() {
        let events = Events::new(["Young GC", "Old GC"]);
        let bytes = encode_with(|out| events.encode(out).unwrap());
        let mut expected = vec![0, 2];
        expected.extend_from_slice(b"Young GC\0Old GC\0");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_events_decode_then_encode_is_identical() {
        let bytes = encode_with(|out| Events::new(["a", "", "c"]).encode(out).unwrap());
        let decoded = Events::decode(&mut Decoder::new(&bytes)).unwrap();
        assert_eq!(decoded.name(2), Some("c"));
        assert_eq!(decoded.name(3), None);
        assert_eq!(encode_with(|out| decoded.encode(out).unwrap()), bytes);
    }

    #[test]
    fn test_events_negative_count_rejected() {
        let bytes = (-1i16).to_be_bytes();
        assert!(matches!(
            Events::decode(&mut Decoder::new(&bytes)),
            Err(ModelError::Negative { value: -1, .. })
        ));
    }

    // =====================================================================
    // EventFilters
    // =====================================================================

    #[test]
    fn test_filter_defaults() {
        let filters = EventFilters::new(3);
        assert_eq!(filters.len(), 3);
        for f in filters.iter() {
            assert!(f.enabled);
            assert_eq!(f.delay, 0);
            assert!(!f.pause);
            assert_eq!(f.period, 1);
        }
    }

    #[test]
    fn test_filter_bulk_operations() {
        let mut filters = EventFilters::new(2);
        filters.disable_all();
        filters.set_delay(0, 500).unwrap();
        filters.set_pause(1, true).unwrap();
        filters.set_period(1, 10).unwrap();
        assert!(filters.iter().all(|f| !f.enabled));

        filters.clear_delays();
        filters.clear_pauses();
        filters.reset_periods();
        filters.enable_all();
        assert_eq!(filters, EventFilters::new(2));

        filters.set_delay(0, 10).unwrap();
        filters.revert_to_defaults();
        assert_eq!(filters, EventFilters::new(2));
    }

    #[test]
    fn test_filter_bounds_enforced() {
        let mut filters = EventFilters::new(1);
        assert!(filters.set_delay(0, EventFilters::DELAY_MAX).is_ok());
        assert!(matches!(
            filters.set_delay(0, 10_001),
            Err(ModelError::FilterOutOfBounds { field: "delay", .. })
        ));
        assert!(matches!(
            filters.set_period(0, 0),
            Err(ModelError::FilterOutOfBounds { field: "period", .. })
        ));
        assert!(matches!(
            filters.set_enabled(1, false),
            Err(ModelError::IndexOutOfRange { index: 1, len: 1, .. })
        ));
    }

    #[test]
    fn test_filters_wire_layout() {
        let mut filters = EventFilters::new(1);
        filters.set_delay(0, 250).unwrap();
        filters.set_period(0, 4).unwrap();
        let bytes = encode_with(|out| filters.encode(out).unwrap());
        assert_eq!(bytes, vec![0, 1, 1, 0, 0, 0, 250, 0, 0, 0, 0, 4]);

        let decoded = EventFilters::decode(&mut Decoder::new(&bytes)).unwrap();
        assert_eq!(decoded, filters);
    }

    #[test]
    fn test_filters_decode_rejects_out_of_bounds() {
        let bytes = encode_with(|out| {
            out.write_short(1).unwrap();
            out.write_bool(true).unwrap();
            out.write_int(0).unwrap();
            out.write_bool(false).unwrap();
            out.write_int(5000).unwrap();
        });
        assert!(matches!(
            EventFilters::decode(&mut Decoder::new(&bytes)),
            Err(ModelError::FilterOutOfBounds { field: "period", value: 5000, .. })
        ));
    }

    #[test]
    fn test_filters_serde_json() {
        let filters = EventFilters::new(2);
        let json = serde_json::to_string(&filters).unwrap();
        let back: EventFilters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filters);
    }
}
