//! Request routing: path resolution and background execution modes.

pub mod mode;
pub mod path;

pub use mode::{BackgroundMode, UnknownMode, BACKGROUND_MARKER};
pub use path::{Execution, PathResolution, PathResolver};
