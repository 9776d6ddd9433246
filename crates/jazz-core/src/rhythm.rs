//! Rhythm instrument definitions and their bar-by-bar generation

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{JazzError, Result};
use crate::generator::{BarInfo, ControlEvent, NoteEvent, Track};
use crate::random::RandomSource;
use crate::text::{TokenReader, quote};
use crate::weighted_array::WeightedArray;

/// Version written by [`Rhythm::write_to`]; version 1 lacks the randomize
/// flag and the group block.
pub const RHYTHM_VERSION: i32 = 2;

/// Number of listen/contribute groups per instrument
pub const MAX_GROUPS: usize = 5;

/// Maximum number of target keys per instrument
pub const MAX_KEYS: usize = 20;

/// Coupling of one instrument to a rhythm group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhythmGroup {
    /// -100..100: positive requires agreement with the group, negative
    /// requires disagreement
    pub listen: i32,
    /// -100..100: how strongly this instrument's history feeds the group
    pub contrib: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhythmGroups {
    pub groups: [RhythmGroup; MAX_GROUPS],
}

impl RhythmGroups {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        let pairs: Vec<String> = self
            .groups
            .iter()
            .map(|g| format!("{} {}", g.listen, g.contrib))
            .collect();
        writeln!(out, "{}", pairs.join(" "))
    }

    fn read_from(reader: &mut TokenReader) -> Result<Self> {
        let mut groups = Self::default();
        for g in &mut groups.groups {
            g.listen = reader.next_i32("group listen")?.clamp(-100, 100);
            g.contrib = reader.next_i32("group contrib")?.clamp(-100, 100);
        }
        Ok(groups)
    }
}

/// What an instrument emits when a step fires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RhythmMode {
    /// One note per configured key, simultaneously
    #[default]
    AllOf,
    /// A single key chosen uniformly
    OneOf,
    /// A controller change on controller `parameter - 1`
    Control,
}

impl RhythmMode {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::AllOf => 0,
            Self::OneOf => 1,
            Self::Control => 2,
        }
    }
}

impl TryFrom<i32> for RhythmMode {
    type Error = JazzError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::AllOf),
            1 => Ok(Self::OneOf),
            2 => Ok(Self::Control),
            other => Err(JazzError::InvalidMode(other)),
        }
    }
}

/// One rhythm instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rhythm {
    pub label: String,
    /// Per-step firing weights
    pub rhythm_array: WeightedArray,
    /// Distribution of note lengths, in steps minus one
    pub length_array: WeightedArray,
    /// Distribution of velocities, index scaled onto 1..127
    pub velocity_array: WeightedArray,
    pub steps_per_count: i32,
    pub count_per_bar: i32,
    pub bar_count: i32,
    pub keys: Vec<u8>,
    pub mode: RhythmMode,
    /// Controller number plus one, used in [`RhythmMode::Control`]
    pub parameter: i32,
    pub randomize: bool,
    pub groups: RhythmGroups,
    #[serde(skip)]
    history: WeightedArray,
    #[serde(skip)]
    start_clock: i64,
    #[serde(skip)]
    next_clock: i64,
}

impl Default for Rhythm {
    fn default() -> Self {
        Self::new("")
    }
}

impl PartialEq for Rhythm {
    /// Definitions compare equal regardless of generation state
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && self.rhythm_array == other.rhythm_array
            && self.length_array == other.length_array
            && self.velocity_array == other.velocity_array
            && self.steps_per_count == other.steps_per_count
            && self.count_per_bar == other.count_per_bar
            && self.bar_count == other.bar_count
            && self.keys == other.keys
            && self.mode == other.mode
            && self.parameter == other.parameter
            && self.randomize == other.randomize
            && self.groups == other.groups
    }
}

impl Rhythm {
    /// One bar of sixteenth notes, single-step lengths, loud velocities
    pub fn new(label: &str) -> Self {
        let steps = 16;
        let mut length_array = WeightedArray::new(steps, 0, 100);
        length_array[0] = 100;
        let mut velocity_array = WeightedArray::new(32, 0, 100);
        velocity_array[25] = 100;

        Self {
            label: label.to_string(),
            rhythm_array: WeightedArray::new(steps, 0, 100),
            length_array,
            velocity_array,
            steps_per_count: 4,
            count_per_bar: 4,
            bar_count: 1,
            keys: Vec::new(),
            mode: RhythmMode::AllOf,
            parameter: 0,
            randomize: true,
            groups: RhythmGroups::default(),
            history: WeightedArray::new(steps, 0, 100),
            start_clock: 0,
            next_clock: 0,
        }
    }

    /// Change the step grid; the rhythm array is resized to cover
    /// `bar_count` bars
    pub fn set_grid(&mut self, steps_per_count: i32, count_per_bar: i32, bar_count: i32) {
        self.steps_per_count = steps_per_count.max(1);
        self.count_per_bar = count_per_bar.max(1);
        self.bar_count = bar_count.max(1);
        let size = (self.steps_per_count * self.count_per_bar * self.bar_count) as usize;
        self.rhythm_array.resize(size);
    }

    /// Which steps fired recently
    pub fn history(&self) -> &WeightedArray {
        &self.history
    }

    pub fn start_clock(&self) -> i64 {
        self.start_clock
    }

    pub fn next_clock(&self) -> i64 {
        self.next_clock
    }

    fn steps_per_bar(&self) -> i64 {
        (self.steps_per_count as i64 * self.count_per_bar as i64).max(1)
    }

    /// Ticks covered by one step of this instrument
    pub fn clocks_per_step<B: BarInfo + ?Sized>(&self, bar: &B) -> i64 {
        (bar.ticks_per_bar() / self.steps_per_bar()).max(1)
    }

    /// Map an absolute tick onto this instrument's step index
    pub fn clock2i<B: BarInfo + ?Sized>(&self, clock: i64, bar: &B) -> usize {
        let step = (clock - self.start_clock).div_euclid(self.clocks_per_step(bar));
        step.rem_euclid(self.rhythm_array.len() as i64) as usize
    }

    fn ensure_history(&mut self) {
        if self.history.len() != self.rhythm_array.len() {
            self.history = WeightedArray::new(
                self.rhythm_array.len(),
                self.rhythm_array.min(),
                self.rhythm_array.max(),
            );
        }
    }

    /// Reset cursors and seed the history with a plausible previous pass
    /// so that listeners have data on the first bar.
    pub fn gen_init<R: RandomSource + ?Sized>(&mut self, start_clock: i64, rng: &mut R) {
        self.start_clock = start_clock;
        self.next_clock = start_clock;
        self.history = WeightedArray::new(
            self.rhythm_array.len(),
            self.rhythm_array.min(),
            self.rhythm_array.max(),
        );

        let n = self.history.len();
        let on = self.history.max();
        let mut i = 0;
        while i < n {
            if !self.rhythm_array.gate(i, rng) {
                i += 1;
                continue;
            }
            let run = self.length_array.random(rng) + 1;
            for _ in 0..run {
                if i >= n {
                    break;
                }
                self.history[i] = on;
                i += 1;
            }
        }
    }

    /// Union of the other instruments' histories contributing to `group`,
    /// resampled onto this instrument's step grid for the current bar.
    pub fn gen_group<B: BarInfo + ?Sized>(
        &self,
        group: usize,
        bar: &B,
        all: &[Rhythm],
        me: usize,
    ) -> WeightedArray {
        let n = self.rhythm_array.len();
        let (min, max) = (self.rhythm_array.min(), self.rhythm_array.max());
        let mut out = WeightedArray::new(n, min, max);
        let mut scratch = WeightedArray::new(n, min, max);
        let cps = self.clocks_per_step(bar);

        for (k, other) in all.iter().enumerate() {
            let contrib = other.groups.groups[group].contrib;
            if k == me || contrib == 0 {
                continue;
            }

            scratch.clear();
            for step in 0..self.steps_per_bar() {
                let clock = bar.clock() + step * cps;
                let i = self.clock2i(clock, bar);
                let j = other.clock2i(clock, bar);
                if j < other.history.len() {
                    scratch[i] = other.history[j];
                }
            }
            // a negative contribution feeds the inverse of the history
            if contrib < 0 {
                scratch.set_inverse(scratch.max());
            }
            out.set_union(&scratch, contrib.abs());
        }
        out
    }

    /// This instrument's rhythm array filtered through every group it
    /// listens to
    pub fn combined_array<B: BarInfo + ?Sized>(&self, bar: &B, all: &[Rhythm], me: usize) -> WeightedArray {
        let mut combined = self.rhythm_array.clone();
        for (group, g) in self.groups.groups.iter().enumerate() {
            if g.listen == 0 {
                continue;
            }
            let contribution = self.gen_group(group, bar, all, me);
            if g.listen > 0 {
                combined.set_intersection(&contribution, g.listen);
            } else {
                combined.set_difference(&contribution, -g.listen);
            }
        }
        combined
    }

    /// Walk the steps of the current bar from the persisted cursor and emit
    /// events where `combined` fires.
    pub fn generate<B, T, R>(&mut self, track: &mut T, bar: &B, combined: &WeightedArray, rng: &mut R)
    where
        B: BarInfo + ?Sized,
        T: Track + ?Sized,
        R: RandomSource + ?Sized,
    {
        self.ensure_history();
        let cps = self.clocks_per_step(bar);
        let start = bar.clock();
        let stop = start + bar.ticks_per_bar();

        let off = self.history.min();
        let mut clock = start;
        while clock < stop {
            let i = self.clock2i(clock, bar);
            self.history[i] = off;
            clock += cps;
        }

        let on = self.history.max();
        let mut clock = self.next_clock.max(start);
        while clock < stop {
            let i = self.clock2i(clock, bar);
            let fires = (!self.randomize && combined[i] > 0) || combined.gate(i, rng);
            if !fires {
                clock += cps;
                continue;
            }

            let velocity = if self.randomize {
                let n = self.velocity_array.len();
                (self.velocity_array.random(rng) * 127 / n + 1).min(127) as u8
            } else {
                (combined[i] as i64 * 127 / combined.max().max(1) as i64).clamp(1, 127) as u8
            };
            let length = (self.length_array.random(rng) as i64 + 1) * cps;

            self.generate_event(track, clock, velocity, length, rng);
            self.history[i] = on;
            clock += length;
        }
        self.next_clock = clock;
    }

    /// Emit the event(s) for one firing step
    pub fn generate_event<T, R>(&self, track: &mut T, clock: i64, velocity: u8, length: i64, rng: &mut R)
    where
        T: Track + ?Sized,
        R: RandomSource + ?Sized,
    {
        match self.mode {
            RhythmMode::AllOf => {
                for &key in &self.keys {
                    track.put_note(NoteEvent { clock, key, velocity, length });
                }
            }
            RhythmMode::OneOf => {
                if self.keys.is_empty() {
                    return;
                }
                let key = self.keys[rng.below(self.keys.len())];
                track.put_note(NoteEvent { clock, key, velocity, length });
            }
            RhythmMode::Control => {
                track.put_control(ControlEvent {
                    clock,
                    controller: (self.parameter - 1).clamp(0, 127) as u8,
                    value: velocity,
                });
            }
        }
    }

    /// Write the definition as a version 2 record
    pub fn write_to(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "{RHYTHM_VERSION}")?;
        self.rhythm_array.write_to(out)?;
        self.length_array.write_to(out)?;
        self.velocity_array.write_to(out)?;
        writeln!(out, "{} {} {}", self.steps_per_count, self.count_per_bar, self.bar_count)?;

        let keys: Vec<String> = self.keys.iter().map(u8::to_string).collect();
        write!(out, "{} {}", self.mode.as_i32(), self.keys.len())?;
        if !keys.is_empty() {
            write!(out, " {}", keys.join(" "))?;
        }
        writeln!(out)?;
        writeln!(out, "{}", self.parameter)?;
        writeln!(out, "{}", quote(&self.label))?;
        writeln!(out, "{}", i32::from(self.randomize))?;
        self.groups.write_to(out)?;
        Ok(())
    }

    /// Read a version 1 or 2 record. Version 1 records keep the default
    /// randomize flag and empty groups; other versions abort the read.
    pub fn read_from(reader: &mut TokenReader) -> Result<Self> {
        let version = reader.next_i32("rhythm version")?;
        if !(1..=RHYTHM_VERSION).contains(&version) {
            return Err(JazzError::UnsupportedVersion(version));
        }

        let mut rhythm = Rhythm::new("");
        rhythm.rhythm_array = WeightedArray::read_from(reader)?;
        rhythm.length_array = WeightedArray::read_from(reader)?;
        rhythm.velocity_array = WeightedArray::read_from(reader)?;
        rhythm.steps_per_count = reader.next_i32("steps per count")?;
        rhythm.count_per_bar = reader.next_i32("count per bar")?;
        rhythm.bar_count = reader.next_i32("bar count")?;
        rhythm.mode = RhythmMode::try_from(reader.next_i32("mode")?)?;

        let key_count = reader.next_usize("key count")?;
        if key_count > MAX_KEYS {
            return Err(JazzError::Parse {
                expected: "key count",
                found: key_count.to_string(),
            });
        }
        rhythm.keys = (0..key_count)
            .map(|_| reader.next_i32("key").map(|k| k.clamp(0, 127) as u8))
            .collect::<Result<Vec<_>>>()?;
        rhythm.parameter = reader.next_i32("parameter")?;
        rhythm.label = reader.next_quoted("label")?;

        if version >= 2 {
            rhythm.randomize = reader.next_i32("randomize flag")? != 0;
            rhythm.groups = RhythmGroups::read_from(reader)?;
        }

        rhythm.ensure_history();
        Ok(rhythm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{EventList, Meter};
    use crate::random::ScriptedRandom;

    #[test]
    fn test_clock2i_handles_different_grids() {
        let meter = Meter::new(0, 120, 4);
        let mut eighths = Rhythm::new("a");
        eighths.set_grid(2, 4, 1);
        let sixteenths = Rhythm::new("b");

        assert_eq!(eighths.clocks_per_step(&meter), 60);
        assert_eq!(sixteenths.clocks_per_step(&meter), 30);
        assert_eq!(eighths.clock2i(120, &meter), 2);
        assert_eq!(sixteenths.clock2i(120, &meter), 4);
        // wraps into the next bar
        assert_eq!(eighths.clock2i(480 + 60, &meter), 1);
    }

    #[test]
    fn test_gen_init_marks_runs() {
        let mut r = Rhythm::new("x");
        r.set_grid(2, 4, 1);
        r.rhythm_array = WeightedArray::from_values(vec![100, 0, 0, 0, 100, 0, 0, 0], 0, 100);
        // lengths of two steps
        r.length_array = WeightedArray::from_values(vec![0, 100], 0, 100);

        let mut rng = ScriptedRandom::new(vec![0.5]);
        r.gen_init(960, &mut rng);
        assert_eq!(r.start_clock(), 960);
        assert_eq!(r.next_clock(), 960);
        assert_eq!(r.history().values(), &[100, 100, 0, 0, 100, 100, 0, 0]);
    }

    #[test]
    fn test_history_resized_before_generation() {
        let mut r = Rhythm::new("x");
        r.keys = vec![36];
        r.rhythm_array = WeightedArray::from_values(vec![100; 8], 0, 100);
        r.count_per_bar = 2;
        let meter = Meter::new(0, 120, 4);
        let mut track = EventList::new();
        let mut rng = fastrand::Rng::with_seed(2);
        let combined = r.rhythm_array.clone();
        r.generate(&mut track, &meter, &combined, &mut rng);
        assert_eq!(r.history().len(), 8);
        assert!(!track.is_empty());
    }

    #[test]
    fn test_one_of_picks_single_key() {
        let mut r = Rhythm::new("toms");
        r.mode = RhythmMode::OneOf;
        r.keys = vec![41, 43, 45];
        let mut track = EventList::new();
        let mut rng = ScriptedRandom::new(vec![0.5]);
        r.generate_event(&mut track, 0, 90, 30, &mut rng);
        assert_eq!(track.notes.len(), 1);
        assert_eq!(track.notes[0].key, 43);

        r.mode = RhythmMode::AllOf;
        r.generate_event(&mut track, 30, 90, 30, &mut rng);
        assert_eq!(track.notes.len(), 4);
    }

    #[test]
    fn test_mode_numbers() {
        assert_eq!(RhythmMode::try_from(2).unwrap(), RhythmMode::Control);
        assert!(matches!(RhythmMode::try_from(3), Err(JazzError::InvalidMode(3))));
    }

    #[test]
    fn test_write_read_round_trip() {
        let mut r = Rhythm::new("Open \"Hat\"");
        r.keys = vec![46, 44];
        r.mode = RhythmMode::OneOf;
        r.parameter = 11;
        r.randomize = false;
        r.rhythm_array[3] = 70;
        r.groups.groups[2] = RhythmGroup { listen: -40, contrib: 25 };

        let mut buf = Vec::new();
        r.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("2\n16 0 100\n"));

        let back = Rhythm::read_from(&mut TokenReader::new(text)).unwrap();
        assert_eq!(back, r);
        assert_eq!(back.history().len(), 16);
    }

    #[test]
    fn test_read_version_one_without_groups() {
        let text = "1\n2 0 100\n50 50\n1 0 100\n100\n1 0 100\n100\n1 2 1\n0 1 36\n0\n\"kick\"\n";
        let r = Rhythm::read_from(&mut TokenReader::new(text)).unwrap();
        assert_eq!(r.label, "kick");
        assert_eq!(r.keys, vec![36]);
        assert!(r.randomize);
        assert_eq!(r.groups, RhythmGroups::default());
    }

    #[test]
    fn test_read_fails_closed() {
        let err = Rhythm::read_from(&mut TokenReader::new("3 ...")).unwrap_err();
        assert!(matches!(err, JazzError::UnsupportedVersion(3)));

        let text = "2\n1 0 100\n0\n1 0 100\n0\n1 0 100\n0\n1 1 1\n9 0\n0\n\"x\"\n1\n";
        let err = Rhythm::read_from(&mut TokenReader::new(text)).unwrap_err();
        assert!(matches!(err, JazzError::InvalidMode(9)));
    }
}
