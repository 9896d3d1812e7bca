//! CLI route: argument validation and dispatch to the snapshot builder and
//! the verifier.

use crate::cli::help::tool_name;
use crate::cli::parse::{Cli, ReportFormat, Tool};
use crate::cli::report::{write_snapshot_summary, ConsoleReporter};
use crate::config::{ConfigLoader, MirrorConfig};
use crate::error::{MirrorError, StorageError};
use crate::snapshot::{create_db, SnapshotSummary};
use crate::store::{with_store, SledMetadataStore};
use crate::verify::{verify_dir, VerifySummary};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// A validated command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: Tool,
    pub db: PathBuf,
    pub source: PathBuf,
    pub dest: Option<PathBuf>,
    pub report_format: ReportFormat,
}

impl Invocation {
    /// Check tool, store and positional arity before anything is opened.
    pub fn from_cli(cli: &Cli) -> Result<Self, MirrorError> {
        let tool = cli
            .tool
            .ok_or_else(|| MirrorError::Usage("No tool specified.".to_string()))?;
        let db = cli
            .db
            .clone()
            .ok_or_else(|| MirrorError::Usage("No DB specified.".to_string()))?;

        let mut paths = cli.paths.iter().cloned();
        let source = paths
            .next()
            .ok_or_else(|| MirrorError::Usage("No SOURCE file/directory.".to_string()))?;
        let dest = paths.next();
        if paths.next().is_some() {
            return Err(MirrorError::Usage(
                "Only SOURCE and DEST files/directories can be specified.".to_string(),
            ));
        }

        match (tool, &dest) {
            (Tool::MergeDir, None) => {
                return Err(MirrorError::Usage(
                    "SOURCE and DEST files/directories must be specified for merge-dir."
                        .to_string(),
                ))
            }
            (Tool::CreateDb | Tool::VerifyDir, Some(_)) => {
                return Err(MirrorError::Usage(format!(
                    "Only a SOURCE file/directory can be specified for {}.",
                    tool_name(tool)
                )))
            }
            _ => {}
        }

        Ok(Self {
            tool,
            db,
            source,
            dest,
            report_format: cli.report_format,
        })
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Created(SnapshotSummary),
    Verified(VerifySummary),
}

/// Runtime context for CLI execution: the loaded configuration.
pub struct RunContext {
    config: MirrorConfig,
}

impl RunContext {
    /// Load and validate configuration, optionally layering an explicit file.
    pub fn new(config_path: Option<&Path>) -> Result<Self, MirrorError> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        Self::from_config(config)
    }

    pub fn from_config(config: MirrorConfig) -> Result<Self, MirrorError> {
        if let Err(errors) = config.validate() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(MirrorError::Config(messages.join("; ")));
        }
        Ok(Self { config })
    }

    /// Run the invocation, writing reports to `out`.
    pub fn execute<W: Write>(
        &self,
        invocation: &Invocation,
        out: W,
    ) -> Result<RunOutcome, MirrorError> {
        info!(tool = tool_name(invocation.tool), db = %invocation.db.display(), "Running tool");
        let result = self.dispatch(invocation, out);
        if let Err(ref e) = result {
            error!(tool = tool_name(invocation.tool), error = %e, "Tool failed");
        }
        result
    }

    fn dispatch<W: Write>(
        &self,
        invocation: &Invocation,
        mut out: W,
    ) -> Result<RunOutcome, MirrorError> {
        let scanner = self.config.scan.scanner();
        let probe = self.config.scan.probe();

        match invocation.tool {
            Tool::CreateDb => {
                let store = SledMetadataStore::open(&invocation.db)?;
                let summary = with_store(store, |store| {
                    create_db(&invocation.source, store, &scanner, probe)
                })?;
                write_snapshot_summary(&mut out, &summary)?;
                Ok(RunOutcome::Created(summary))
            }
            Tool::VerifyDir => {
                if !invocation.db.exists() {
                    return Err(StorageError::Open {
                        path: invocation.db.clone(),
                        message: "no metadata store at this location".to_string(),
                    }
                    .into());
                }
                let store = SledMetadataStore::open(&invocation.db)?;
                let mut reporter = ConsoleReporter::new(out, invocation.report_format);
                let summary = with_store(store, |store| {
                    verify_dir(&invocation.source, &*store, &mut reporter, &scanner, probe)
                })?;
                reporter.finish(&summary)?;
                Ok(RunOutcome::Verified(summary))
            }
            Tool::MergeDir => Err(MirrorError::Unsupported(
                "the merge-dir tool is not implemented".to_string(),
            )),
        }
    }
}
