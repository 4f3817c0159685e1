pub mod config_manager;
pub mod error;
pub mod titles;
pub mod types;

pub use config_manager::*;
pub use error::*;
pub use titles::*;
pub use types::*;
