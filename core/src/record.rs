//! Uplink record and digest chunk formatting
//!
//! Raw samples travel as one text line each:
//!
//! ```text
//! <ISO-8601 timestamp>,<origin>,<x>,<y>,<z>\n
//! ```
//!
//! Digest backlog travels as chunks of consecutive minute counts:
//!
//! ```text
//! <minute-offset>:<count>[,<count>]*
//! ```

use core::fmt::Write;

use heapless::String;

use crate::calendar::CivilTime;
use crate::error::Error;
use crate::sample::MotionSample;

/// Line buffer size for one sample record
pub const LINE_CAPACITY: usize = 128;

/// Largest chunk a [`ChunkWriter`] can hold
pub const CHUNK_CAPACITY: usize = 256;

/// Room kept free at the end of a chunk: the widest `,<u16>` field plus a
/// terminator
pub const CHUNK_RESERVE: usize = 6 + 1;

/// Widest possible leading `<u16>:<u16>` field
pub const MAX_LEAD_FIELD: usize = 11;

pub type RecordLine = String<LINE_CAPACITY>;

/// Format one sample as an uplink line
///
/// Fails with [`Error::RecordOverrun`] rather than emitting a truncated line.
pub fn format_sample(sample: &MotionSample) -> Result<RecordLine, Error> {
    let mut line = RecordLine::new();
    writeln!(
        line,
        "{},{},{},{},{}",
        CivilTime::from_unix(sample.timestamp),
        sample.origin.as_char(),
        sample.x,
        sample.y,
        sample.z
    )
    .map_err(|_| Error::RecordOverrun)?;
    Ok(line)
}

/// Accumulates consecutive minute counts into one bounded chunk
pub struct ChunkWriter {
    buf: String<CHUNK_CAPACITY>,
    budget: usize,
    max_minutes: usize,
    first_minute: Option<u16>,
    minutes: usize,
}

impl ChunkWriter {
    /// `budget` is clamped to [`CHUNK_CAPACITY`]
    pub fn new(budget: usize, max_minutes: usize) -> Self {
        Self {
            buf: String::new(),
            budget: budget.min(CHUNK_CAPACITY),
            max_minutes,
            first_minute: None,
            minutes: 0,
        }
    }

    /// Append the count for the next consecutive minute
    ///
    /// The first call of a chunk records `minute` as the chunk's offset;
    /// later calls only append the count.
    pub fn push(&mut self, minute: u16, count: u16) -> Result<(), Error> {
        let written = if self.first_minute.is_none() {
            self.first_minute = Some(minute);
            write!(self.buf, "{}:{}", minute, count)
        } else {
            write!(self.buf, ",{}", count)
        };
        written.map_err(|_| Error::RecordOverrun)?;
        self.minutes += 1;
        Ok(())
    }

    /// Whether the chunk must be sent before another minute is appended
    pub fn is_full(&self) -> bool {
        self.buf.len() > self.budget.saturating_sub(CHUNK_RESERVE)
            || self.minutes >= self.max_minutes
    }

    pub fn is_empty(&self) -> bool {
        self.minutes == 0
    }

    /// Minutes carried by the current chunk
    pub fn minutes(&self) -> usize {
        self.minutes
    }

    pub fn first_minute(&self) -> Option<u16> {
        self.first_minute
    }

    pub fn as_str(&self) -> &str {
        self.buf.as_str()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    /// Start a new chunk
    pub fn clear(&mut self) {
        self.buf.clear();
        self.first_minute = None;
        self.minutes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Axes, Origin};

    #[test]
    fn test_sample_line_format() {
        let sample = MotionSample::new(1486894830, Origin::Interrupt, Axes::new(12, -340, 1024));
        let line = format_sample(&sample).unwrap();
        assert_eq!(line.as_str(), "2017-02-12T10:20:30Z,i,12,-340,1024\n");

        let sample = MotionSample::new(0, Origin::Stream, Axes::new(i16::MIN, i16::MAX, 0));
        let line = format_sample(&sample).unwrap();
        assert_eq!(line.as_str(), "1970-01-01T00:00:00Z,s,-32768,32767,0\n");
    }

    #[test]
    fn test_chunk_layout() {
        let mut chunk = ChunkWriter::new(CHUNK_CAPACITY, 30);
        assert!(chunk.is_empty());
        chunk.push(1439, 3).unwrap();
        chunk.push(0, 0).unwrap();
        chunk.push(1, 65535).unwrap();
        assert_eq!(chunk.as_str(), "1439:3,0,65535");
        assert_eq!(chunk.first_minute(), Some(1439));
        assert_eq!(chunk.minutes(), 3);

        chunk.clear();
        assert!(chunk.is_empty());
        chunk.push(7, 1).unwrap();
        assert_eq!(chunk.as_str(), "7:1");
    }

    #[test]
    fn test_chunk_closes_on_minute_limit() {
        let mut chunk = ChunkWriter::new(CHUNK_CAPACITY, 3);
        for minute in 0..3 {
            assert!(!chunk.is_full());
            chunk.push(minute, 1).unwrap();
        }
        assert!(chunk.is_full());
    }

    #[test]
    fn test_chunk_never_exceeds_budget() {
        let budget = 64;
        let mut chunk = ChunkWriter::new(budget, usize::MAX);
        let mut minute = 1000;
        while !chunk.is_full() {
            chunk.push(minute, u16::MAX).unwrap();
            minute += 1;
        }
        // the terminator still fits
        assert!(chunk.as_str().len() < budget);
        assert!(chunk.as_str().len() > budget - CHUNK_RESERVE);
    }
}
