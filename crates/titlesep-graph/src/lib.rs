//! Title-separation search.
//!
//! [`GraphExplorer`] walks the beat relation breadth-first from a query player;
//! [`SearchSession`] wraps it with input handling, outcome caching and reporting
//! to a [`ResultSink`].

pub mod explorer;
pub mod session;
pub mod sink;

pub use explorer::{Exploration, ExplorerConfig, GraphExplorer};
pub use session::{SearchRequest, SearchSession};
pub use sink::{MemorySink, NullSink, ResultSink, SearchEvent};
