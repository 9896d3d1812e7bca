//! CLI help: tool names and version text.

use crate::cli::parse::Tool;

/// Tool name as written on the command line.
pub fn tool_name(tool: Tool) -> &'static str {
    match tool {
        Tool::CreateDb => "create-db",
        Tool::VerifyDir => "verify-dir",
        Tool::MergeDir => "merge-dir",
    }
}

/// Version banner with the copyright and license notice.
pub fn version_text() -> String {
    format!(
        "mirror {}\n\
         Copyright (C) {}.\n\
         License GPLv3+: GNU GPL version 3 or later <https://gnu.org/licenses/gpl.html>.\n\
         This is free software: you are free to change and redistribute it.\n\
         There is NO WARRANTY, to the extent permitted by law.",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_AUTHORS")
    )
}

/// Hint appended to usage errors.
pub fn usage_hint() -> &'static str {
    "Try 'mirror --help' for more information."
}
