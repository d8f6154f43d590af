//! Input data: the parsed trace, count tables and per-topic stamps.

pub mod counts;
pub mod stamps;
pub mod trace;

pub use counts::CountTables;
pub use stamps::StampLists;
pub use trace::{InitialTopics, InputData, RawEvent, Trace};
