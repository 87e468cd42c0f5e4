/*!
 * Pipe Module
 * Unix pipes for streaming bytes between a parent and its child
 */

pub mod pipe;
pub mod types;

// Re-export public API
pub use pipe::Pipe;
pub use types::{PipeError, PipeResult};
