// ABOUTME: Command module aggregator for the reimage CLI.
// ABOUTME: Re-exports update and plan command handlers.

mod plan;
mod runtime_connection;
mod update;

pub use plan::plan;
pub use update::update;
