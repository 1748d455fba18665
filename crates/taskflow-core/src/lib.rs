pub mod aggregate;
pub mod context;
pub mod error;
pub mod graph;
pub mod import;
pub mod io;
pub mod paths;
pub mod selector;
pub mod store;
pub mod sync;
pub mod task;
pub mod transition;
pub mod types;

pub use error::{Result, TaskflowError};
