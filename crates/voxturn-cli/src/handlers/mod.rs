//! Command handlers.
//!
//! Handlers follow one pattern: `pub async fn execute(args) -> Result<()>`,
//! translating parsed arguments into library calls and formatting output
//! for the terminal.

pub mod serve;
pub mod talk;
