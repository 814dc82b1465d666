// Conversion between calendar time and the PIMS millisecond timescale
//
// The historian's integer clock has no single documented origin, so the
// mapping is piecewise: each anchor pins one calendar instant to one PIMS
// value and the segment after it advances one millisecond per millisecond.

use crate::core::error::{PimsError, Result};
use crate::core::format::{PimsTimestamp, PimsWindow, TimeWindow};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A known (calendar, PIMS) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub calendar: NaiveDateTime,
    pub pims: PimsTimestamp,
}

impl Anchor {
    pub fn new(calendar: NaiveDateTime, pims: PimsTimestamp) -> Self {
        Self { calendar, pims }
    }
}

fn anchor_at(y: i32, m: u32, d: u32, milli: u32, pims: PimsTimestamp) -> Option<Anchor> {
    let calendar = NaiveDate::from_ymd_opt(y, m, d)?.and_hms_milli_opt(0, 0, 0, milli)?;
    Some(Anchor::new(calendar, pims))
}

/// Anchors observed on production gateways, newest first.
pub fn reference_anchors() -> Vec<Anchor> {
    [
        anchor_at(2022, 6, 21, 1, 1_655_780_400_001),
        anchor_at(2022, 6, 21, 0, 1_655_780_400_000),
        anchor_at(2022, 6, 20, 0, 1_655_694_000_000),
        anchor_at(2018, 1, 1, 0, 1_514_772_000_000),
        anchor_at(2000, 1, 1, 0, 946_692_000_000),
        anchor_at(1970, 1, 1, 0, 10_800_000),
        anchor_at(1960, 1, 1, 0, -315_608_400_000),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[derive(Debug, Clone)]
pub struct TimestampCodec {
    // Newest first; calendar and PIMS values strictly decreasing together.
    anchors: Vec<Anchor>,
}

impl TimestampCodec {
    pub fn new(mut anchors: Vec<Anchor>) -> Result<Self> {
        if anchors.is_empty() {
            return Err(PimsError::Config("anchor table is empty".to_string()));
        }

        anchors.sort_by(|a, b| b.calendar.cmp(&a.calendar));

        for pair in anchors.windows(2) {
            let (newer, older) = (&pair[0], &pair[1]);
            if newer.calendar == older.calendar {
                return Err(PimsError::Config(format!(
                    "duplicate anchor at {}",
                    newer.calendar
                )));
            }
            if newer.pims <= older.pims {
                return Err(PimsError::Config(format!(
                    "anchor at {} ({}) does not advance past {} ({})",
                    newer.calendar, newer.pims, older.calendar, older.pims
                )));
            }
        }

        Ok(Self { anchors })
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    fn oldest_index(&self) -> usize {
        self.anchors.len() - 1
    }

    fn encode_index(&self, time: NaiveDateTime) -> Option<usize> {
        self.anchors.iter().position(|a| a.calendar <= time)
    }

    fn decode_index(&self, pims: PimsTimestamp) -> Option<usize> {
        self.anchors.iter().position(|a| a.pims <= pims)
    }

    // Anchor used to encode `time`, and whether it had to be extrapolated.
    fn locate(&self, time: NaiveDateTime) -> (usize, bool) {
        match self.encode_index(time) {
            Some(i) => (i, false),
            None => (self.oldest_index(), true),
        }
    }

    /// Encodes `time`, reporting times older than every anchor.
    ///
    /// Such times are still extrapolated from the oldest anchor; the error
    /// carries that value as `clamped`.
    pub fn encode_checked(&self, time: NaiveDateTime) -> Result<PimsTimestamp> {
        let (i, extrapolated) = self.locate(time);
        let anchor = &self.anchors[i];
        let pims = offset_from(anchor, time);
        if extrapolated {
            return Err(PimsError::EncodingAmbiguity {
                time,
                oldest: anchor.calendar,
                clamped: pims,
            });
        }
        Ok(pims)
    }

    pub fn encode(&self, time: NaiveDateTime) -> PimsTimestamp {
        let (i, extrapolated) = self.locate(time);
        let anchor = &self.anchors[i];
        if extrapolated {
            warn!("{} predates oldest anchor {}, extrapolating", time, anchor.calendar);
        }
        offset_from(anchor, time)
    }

    pub fn decode(&self, pims: PimsTimestamp) -> Result<NaiveDateTime> {
        let anchor = &self.anchors[self.decode_index(pims).unwrap_or(self.oldest_index())];

        pims.checked_sub(anchor.pims)
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|delta| anchor.calendar.checked_add_signed(delta))
            .ok_or(PimsError::TimestampOutOfRange(pims))
    }

    /// True when `time` encodes into a value that decoding attributes to a
    /// different anchor, i.e. it sits in a fold where two segments overlap.
    pub fn is_ambiguous(&self, time: NaiveDateTime) -> bool {
        let (encoded_with, _) = self.locate(time);
        let pims = offset_from(&self.anchors[encoded_with], time);
        let decoded_with = self.decode_index(pims).unwrap_or(self.oldest_index());
        encoded_with != decoded_with
    }

    pub fn encode_window(&self, window: &TimeWindow) -> PimsWindow {
        PimsWindow {
            start: self.encode(window.start),
            stop: self.encode(window.stop),
        }
    }
}

impl Default for TimestampCodec {
    fn default() -> Self {
        Self {
            anchors: reference_anchors(),
        }
    }
}

fn offset_from(anchor: &Anchor, time: NaiveDateTime) -> PimsTimestamp {
    anchor.pims + round_millis(time - anchor.calendar)
}

// Half away from zero; sub-millisecond input is the only thing rounded.
fn round_millis(delta: TimeDelta) -> i64 {
    let whole = delta.num_milliseconds();
    let rest = (delta - TimeDelta::milliseconds(whole))
        .num_nanoseconds()
        .unwrap_or(0);
    if rest >= 500_000 {
        whole + 1
    } else if rest <= -500_000 {
        whole - 1
    } else {
        whole
    }
}
