//! jazz-core: weighted random arrays and the rhythm generator

mod error;
pub mod generator;
pub mod random;
pub mod rhythm;
pub mod text;
pub mod weighted_array;

pub use error::{JazzError, Result};
pub use generator::{BarInfo, ControlEvent, EventList, Meter, NoteEvent, RhythmGenerator, RhythmSet, Track};
pub use random::{RandomSource, ScriptedRandom};
pub use rhythm::{MAX_GROUPS, MAX_KEYS, RHYTHM_VERSION, Rhythm, RhythmGroup, RhythmGroups, RhythmMode};
pub use text::TokenReader;
pub use weighted_array::WeightedArray;
