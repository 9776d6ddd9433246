//! Rhythm generator: drives a set of instruments bar by bar and writes the
//! resulting events into a track.

use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{JazzError, Result};
use crate::random::RandomSource;
use crate::rhythm::{RHYTHM_VERSION, Rhythm};
use crate::text::TokenReader;

/// Bar cursor over the song's meter
pub trait BarInfo {
    /// Absolute tick at which the current bar starts
    fn clock(&self) -> i64;
    fn ticks_per_bar(&self) -> i64;
    fn counts_per_bar(&self) -> i64;
    /// Advance to the next bar
    fn next(&mut self);
}

/// Fixed time signature bar cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    pub clock: i64,
    pub ticks_per_count: i64,
    pub counts_per_bar: i64,
}

impl Default for Meter {
    fn default() -> Self {
        Self {
            clock: 0,
            ticks_per_count: 120,
            counts_per_bar: 4,
        }
    }
}

impl Meter {
    pub fn new(clock: i64, ticks_per_count: i64, counts_per_bar: i64) -> Self {
        Self {
            clock,
            ticks_per_count,
            counts_per_bar,
        }
    }
}

impl BarInfo for Meter {
    fn clock(&self) -> i64 {
        self.clock
    }

    fn ticks_per_bar(&self) -> i64 {
        self.ticks_per_count * self.counts_per_bar
    }

    fn counts_per_bar(&self) -> i64 {
        self.counts_per_bar
    }

    fn next(&mut self) {
        self.clock += self.ticks_per_bar();
    }
}

/// A generated note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub clock: i64,
    pub key: u8,
    pub velocity: u8,
    pub length: i64,
}

/// A generated controller change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    pub clock: i64,
    pub controller: u8,
    pub value: u8,
}

/// Receiver of generated events
pub trait Track {
    fn put_note(&mut self, event: NoteEvent);
    fn put_control(&mut self, event: ControlEvent);
}

/// Track that just collects events
#[derive(Debug, Clone, Default)]
pub struct EventList {
    pub notes: Vec<NoteEvent>,
    pub controls: Vec<ControlEvent>,
}

impl EventList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.notes.len() + self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.controls.is_empty()
    }
}

impl Track for EventList {
    fn put_note(&mut self, event: NoteEvent) {
        self.notes.push(event);
    }

    fn put_control(&mut self, event: ControlEvent) {
        self.controls.push(event);
    }
}

/// Ordered set of instruments, persisted as one versioned record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RhythmSet {
    pub instruments: Vec<Rhythm>,
}

impl RhythmSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_to(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "{RHYTHM_VERSION}")?;
        writeln!(out, "{}", self.instruments.len())?;
        for rhythm in &self.instruments {
            rhythm.write_to(out)?;
        }
        Ok(())
    }

    /// Read a whole set; any unsupported version aborts the read
    pub fn read_from(reader: &mut TokenReader) -> Result<Self> {
        let version = reader.next_i32("set version")?;
        if !(1..=RHYTHM_VERSION).contains(&version) {
            return Err(JazzError::UnsupportedVersion(version));
        }
        let count = reader.next_usize("instrument count")?;
        let instruments = (0..count)
            .map(|_| Rhythm::read_from(reader))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { instruments })
    }
}

/// Runs every instrument of a set against a shared bar cursor
#[derive(Debug, Clone, Default)]
pub struct RhythmGenerator {
    pub set: RhythmSet,
}

impl RhythmGenerator {
    pub fn new(set: RhythmSet) -> Self {
        Self { set }
    }

    /// Reset every instrument's cursor and history
    pub fn gen_init<R: RandomSource + ?Sized>(&mut self, start_clock: i64, rng: &mut R) {
        for rhythm in &mut self.set.instruments {
            rhythm.gen_init(start_clock, rng);
        }
    }

    /// Generate one bar for every instrument, in set order. Later
    /// instruments listen to the history already written for this bar.
    pub fn generate_bar<B, T, R>(&mut self, track: &mut T, bar: &B, rng: &mut R)
    where
        B: BarInfo + ?Sized,
        T: Track + ?Sized,
        R: RandomSource + ?Sized,
    {
        for idx in 0..self.set.instruments.len() {
            let combined = self.set.instruments[idx].combined_array(bar, &self.set.instruments, idx);
            self.set.instruments[idx].generate(track, bar, &combined, rng);
        }
    }

    /// Generate `bars` consecutive bars, advancing the cursor after each
    pub fn generate_bars<B, T, R>(&mut self, track: &mut T, bar: &mut B, bars: usize, rng: &mut R)
    where
        B: BarInfo + ?Sized,
        T: Track + ?Sized,
        R: RandomSource + ?Sized,
    {
        for n in 0..bars {
            debug!(bar = n, clock = bar.clock(), "Generating rhythm bar");
            self.generate_bar(track, bar, rng);
            bar.next();
        }
    }
}
