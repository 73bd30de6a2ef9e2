//! json-graph-util - leaf utilities for json-graph
//!
//! Nothing in here knows about the value graph. These helpers work on plain
//! strings and label slices so that both the serializer and the interpolator
//! can share them.

pub mod cycles;
pub mod path;
pub mod strings;

pub use cycles::{detect_cycles, DEFAULT_MAX_REPETITIONS, DEFAULT_RUN_LENGTH};
pub use path::{is_addressable, is_blank, is_valid_index, join_path, split_path, ROOT_SEGMENT};
pub use strings::{escape, quote};
