//! CLI domain: parse, route, help, report and output.
//! Route dispatches to `create_db` / `verify_dir`; no fatal error is turned
//! into an exit status here, that happens in the binary.

mod help;
mod output;
mod parse;
mod report;
mod route;

pub use help::{tool_name, version_text};
pub use output::map_error;
pub use parse::{Cli, ReportFormat, Tool};
pub use report::{render_text, ConsoleReporter};
pub use route::{Invocation, RunContext, RunOutcome};
