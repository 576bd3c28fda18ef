//! Practice model - the records a memorization session reads and writes
//!
//! Poems, quotes and per-poem practice progress, shared by the local
//! store, the offline sync engine and any remote backend adapter.

mod ids;
mod poem;
mod progress;

pub use ids::{PoemId, QuoteId};
pub use poem::{Poem, Quote};
pub use progress::{Progress, ProgressSnapshot};
