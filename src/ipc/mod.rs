/*!
 * IPC Module
 * Descriptor-backed pipes used to wire a child's standard streams
 */

pub mod pipe;

// Re-export for convenience
pub use pipe::{Pipe, PipeError, PipeResult};
