//! Pure request-shaping policies
//!
//! These services hold no state and perform no I/O, which keeps the size and
//! format rules testable without a model or a server.

pub mod format;
pub mod size;

pub use format::{OutputFormatHandler, DEFAULT_FORMAT_TOKEN};
pub use size::{SizePolicy, SizeToken};
