//! Tick to microsecond conversion.

use midly::{MetaMessage, TrackEvent, TrackEventKind};

/// Tempo in effect before the first Set Tempo event (120 BPM).
pub const DEFAULT_US_PER_BEAT: u32 = 500_000;

/// A tempo breakpoint: from `tick` on, one beat lasts `us_per_beat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoChange {
    pub tick: u64,
    pub us_per_beat: u32,
}

/// Piecewise-constant tempo as a function of absolute tick.
///
/// Always starts with a breakpoint at tick 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempoMap {
    ticks_per_beat: u16,
    changes: Vec<TempoChange>,
}

impl TempoMap {
    /// A map holding only the default tempo.
    pub fn new(ticks_per_beat: u16) -> Self {
        Self {
            ticks_per_beat: ticks_per_beat.max(1),
            changes: vec![TempoChange {
                tick: 0,
                us_per_beat: DEFAULT_US_PER_BEAT,
            }],
        }
    }

    /// Collect the Set Tempo events of one track (normally the first).
    pub fn from_track(events: &[TrackEvent<'_>], ticks_per_beat: u16) -> Self {
        let mut map = Self::new(ticks_per_beat);
        let mut tick = 0u64;
        for event in events {
            tick += u64::from(event.delta.as_int());
            if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                map.insert(tick, tempo.as_int());
            }
        }
        map
    }

    /// Add a breakpoint, replacing any existing one at the same tick.
    pub fn insert(&mut self, tick: u64, us_per_beat: u32) {
        let change = TempoChange { tick, us_per_beat };
        match self.changes.binary_search_by_key(&tick, |c| c.tick) {
            Ok(i) => self.changes[i] = change,
            Err(i) => self.changes.insert(i, change),
        }
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Microseconds elapsed from tick 0 to `tick`.
    ///
    /// Each fully elapsed segment contributes
    /// `floor(length * us_per_beat / ticks_per_beat)`; the segment containing
    /// `tick` contributes its partial length the same way.
    pub fn tick_to_us(&self, tick: u64) -> u64 {
        let next_ticks = self
            .changes
            .iter()
            .skip(1)
            .map(|c| c.tick)
            .chain(std::iter::once(u64::MAX));

        self.changes
            .iter()
            .zip(next_ticks)
            .take_while(|(change, _)| change.tick < tick)
            .map(|(change, next)| self.scale(tick.min(next) - change.tick, change.us_per_beat))
            .fold(0u64, u64::saturating_add)
    }

    fn scale(&self, ticks: u64, us_per_beat: u32) -> u64 {
        let us = u128::from(ticks) * u128::from(us_per_beat) / u128::from(self.ticks_per_beat);
        u64::try_from(us).unwrap_or(u64::MAX)
    }
}
