//! Compilation pipeline: compiler subprocess and its output stream.
//!
//! - [`LogStreamReader`]: blocking line stream turned into a pollable queue
//! - [`CompilationJob`]: one compiler run with merged stdout/stderr and accumulated text

mod job;
mod reader;

pub use job::{CompilationJob, CompileReport};
pub use reader::{
    CompileOutcome, FINISHED_SUCCESSFULLY, FINISHED_WITH_ERRORS, LogLine, LogStreamReader,
    StreamEnd,
};
