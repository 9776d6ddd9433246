//! Weighted random arrays: a bounded integer array used as a discrete
//! probability distribution, a per-slot gate, and a fuzzy set.

use std::fmt;
use std::io::Write;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{JazzError, Result};
use crate::random::RandomSource;
use crate::text::TokenReader;

/// Keeps `sum * u` strictly below `sum` so the cumulative walk always
/// terminates inside the array.
const DRAW_MARGIN: f64 = 0.99999;

/// Fixed-range integer array.
///
/// Values are usually kept within `[min, max]`, but direct element
/// assignment is not bounds-checked; only [`WeightedArray::set_min_max`]
/// clamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedArray {
    values: Vec<i32>,
    min: i32,
    max: i32,
    null: i32,
}

impl Default for WeightedArray {
    fn default() -> Self {
        Self::new(1, 0, 100)
    }
}

impl WeightedArray {
    /// Create `size` entries (at least one), all set to `min`
    pub fn new(size: usize, min: i32, max: i32) -> Self {
        Self {
            values: vec![min; size.max(1)],
            min,
            max,
            null: min.max(0),
        }
    }

    /// Build from explicit values
    pub fn from_values(values: Vec<i32>, min: i32, max: i32) -> Self {
        let mut array = Self::new(1, min, max);
        if !values.is_empty() {
            array.values = values;
        }
        array
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    /// Reference level, `max(min, 0)`
    pub fn null(&self) -> i32 {
        self.null
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn get(&self, i: usize) -> i32 {
        self.values[i]
    }

    pub fn set(&mut self, i: usize, value: i32) {
        self.values[i] = value;
    }

    /// Change bounds and clamp existing entries into them
    pub fn set_min_max(&mut self, min: i32, max: i32) {
        self.min = min;
        self.max = max;
        self.null = min.max(0);
        for v in &mut self.values {
            *v = (*v).clamp(min, max.max(min));
        }
    }

    /// Resize in place; new slots are 0 and are not clamped
    pub fn resize(&mut self, size: usize) {
        self.values.resize(size.max(1), 0);
    }

    /// Reset every entry to `min`
    pub fn clear(&mut self) {
        self.values.fill(self.min);
    }

    /// Linear interpolation at a fractional index
    pub fn fractional_get(&self, f: f64) -> f64 {
        let n = self.values.len();
        if n == 1 {
            return self.values[0] as f64;
        }
        let f = f.clamp(0.0, (n - 1) as f64);
        let i = (f.floor() as usize).min(n - 2);
        let frac = f - i as f64;
        let v0 = self.values[i] as f64;
        let v1 = self.values[i + 1] as f64;
        v0 + (v1 - v0) * frac
    }

    /// Sum of all weights
    pub fn sum(&self) -> i64 {
        self.values.iter().map(|&v| v as i64).sum()
    }

    /// Draw an index with probability `values[i] / sum`.
    ///
    /// Returns 0 without drawing when the sum is not positive. All weights
    /// must be non-negative.
    pub fn random<R: RandomSource + ?Sized>(&self, rng: &mut R) -> usize {
        debug_assert!(
            self.values.iter().all(|&v| v >= 0),
            "negative weight in random draw"
        );

        let sum = self.sum();
        if sum <= 0 {
            return 0;
        }

        let mut target = sum as f64 * rng.uniform() * DRAW_MARGIN;
        for (i, &v) in self.values.iter().enumerate() {
            target -= v as f64;
            if target < 0.0 {
                return i;
            }
        }
        self.values.len() - 1
    }

    /// Per-slot Bernoulli trial with probability `values[i] / (max - min)`.
    ///
    /// Unlike [`WeightedArray::random`] this is not normalized by the sum.
    pub fn gate<R: RandomSource + ?Sized>(&self, i: usize, rng: &mut R) -> bool {
        let range = self.max - self.min;
        if range <= 0 {
            return false;
        }
        let p = self.values[i] as f64 / range as f64;
        rng.uniform() < p
    }

    /// Random-walk step: a uniform index when `seed < 0`, otherwise `seed`
    /// moved by a weighted step with random sign, wrapped around.
    pub fn interval<R: RandomSource + ?Sized>(&self, seed: i32, rng: &mut R) -> usize {
        let n = self.values.len() as i64;
        if seed < 0 {
            return rng.below(self.values.len());
        }
        let mut step = self.random(rng) as i64;
        if rng.coin() {
            step = -step;
        }
        (seed as i64 + step).rem_euclid(n) as usize
    }

    /// Blend `v1` (at `f == min`) toward `v2` (at `f == max`)
    pub fn fuzz(&self, f: i32, v1: i32, v2: i32) -> i32 {
        let range = self.max - self.min;
        if range == 0 {
            return v2;
        }
        let num = (f - self.min) as i64 * v2 as i64 + (self.max - f) as i64 * v1 as i64;
        (num / range as i64) as i32
    }

    fn combine(&mut self, other: &WeightedArray, fuzz: i32, op: impl Fn(i32, i32) -> i32) {
        let n = self.values.len().min(other.values.len());
        for i in 0..n {
            let v = self.values[i];
            let combined = op(v, other.values[i]);
            self.values[i] = self.fuzz(fuzz, v, combined);
        }
    }

    /// Elementwise maximum, blended by `fuzz`
    pub fn set_union(&mut self, other: &WeightedArray, fuzz: i32) {
        self.combine(other, fuzz, i32::max);
    }

    /// Elementwise minimum, blended by `fuzz`
    pub fn set_intersection(&mut self, other: &WeightedArray, fuzz: i32) {
        self.combine(other, fuzz, i32::min);
    }

    /// Intersection with the bound-inverse of `other`
    pub fn set_difference(&mut self, other: &WeightedArray, fuzz: i32) {
        let reflect = other.min + other.max;
        self.combine(other, fuzz, |a, b| a.min(reflect - b));
    }

    /// Reflect every value about the array's midpoint, blended by `fuzz`
    pub fn set_inverse(&mut self, fuzz: i32) {
        let reflect = self.min + self.max;
        for i in 0..self.values.len() {
            let v = self.values[i];
            self.values[i] = self.fuzz(fuzz, v, reflect - v);
        }
    }

    /// Write the `size min max` header line followed by the values
    pub fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "{} {} {}", self.values.len(), self.min, self.max)?;
        let line: Vec<String> = self.values.iter().map(i32::to_string).collect();
        writeln!(out, "{}", line.join(" "))
    }

    pub fn read_from(reader: &mut TokenReader) -> Result<Self> {
        let size = reader.next_usize("array size")?;
        if size == 0 {
            return Err(JazzError::Parse {
                expected: "array size",
                found: "0".to_string(),
            });
        }
        let min = reader.next_i32("array min")?;
        let max = reader.next_i32("array max")?;
        // the size comes from the file; grow only as values actually arrive
        let mut values = Vec::new();
        for _ in 0..size {
            values.push(reader.next_i32("array value")?);
        }
        Ok(Self::from_values(values, min, max))
    }
}

impl Index<usize> for WeightedArray {
    type Output = i32;

    fn index(&self, i: usize) -> &i32 {
        &self.values[i]
    }
}

impl IndexMut<usize> for WeightedArray {
    fn index_mut(&mut self, i: usize) -> &mut i32 {
        &mut self.values[i]
    }
}

impl fmt::Display for WeightedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.values.len(), self.min, self.max)?;
        for v in &self.values {
            write!(f, " {v}")?;
        }
        Ok(())
    }
}

impl FromStr for WeightedArray {
    type Err = JazzError;

    fn from_str(s: &str) -> Result<Self> {
        Self::read_from(&mut TokenReader::new(s))
    }
}
