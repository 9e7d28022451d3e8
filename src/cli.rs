//! CLI domain: parse, route and presentation only.
//! One route table dispatches to the library; no pipeline logic lives here.

mod parse;
mod presentation;
mod route;

pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{
    format_block_summary, format_context_json, format_context_text, format_skipped,
};
pub use route::{command_name, RunContext};
