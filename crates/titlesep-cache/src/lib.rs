//! Result cache for the title separation search.
//!
//! Three keyed stores with no size bound and no expiry. Negative results
//! (player not found, empty game list, no path) are stored like any other value
//! so the same lookup is never repeated in the process lifetime.

pub mod result_cache;

pub use result_cache::*;
