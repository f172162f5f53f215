// crates/weft-cli/src/main.rs
// ============================================================================
// Module: Weft CLI Entry Point
// Description: Command dispatcher for engine runs and manifest workflows.
// Purpose: Run flows, list syncs, inspect flows, and revalidate manifests.
// Dependencies: clap, weft-core, weft-config, weft-transport, weft-store-sqlite
// ============================================================================

//! ## Overview
//! The Weft CLI drives a single-process engine from a deployment manifest:
//! `run` dispatches one external action and follows the flow to quiescence,
//! `list-syncs` prints the validated sync set, `inspect-flow` walks a
//! durable log, and `reload` revalidates the manifest. Exit codes: 0 on
//! success, 2 for usage errors, 3 for validation failures.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub(crate) mod concepts;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;
use weft_config::ConfigError;
use weft_config::DeploymentManifest;
use weft_config::LogBackend;
use weft_config::TransportForm;
use weft_core::ActionLog;
use weft_core::ActionRecord;
use weft_core::CompileError;
use weft_core::ConceptRegistry;
use weft_core::ConceptTransport;
use weft_core::ConceptUri;
use weft_core::Engine;
use weft_core::EngineClock;
use weft_core::EngineError;
use weft_core::EngineEvents;
use weft_core::Fields;
use weft_core::FlowId;
use weft_core::InMemoryActionLog;
use weft_core::LogError;
use weft_core::RecordId;
use weft_core::RegistryError;
use weft_core::SyncName;
use weft_store_sqlite::SqliteActionLog;
use weft_store_sqlite::SqliteLogConfig;
use weft_transport::HttpTransport;
use weft_transport::HttpTransportConfig;

// ============================================================================
// SECTION: CLI Errors
// ============================================================================

/// Errors surfaced by CLI commands, mapped onto exit codes.
///
/// # Invariants
/// - `Usage` maps to exit code 2, `Validation` to 3, `Internal` to 1.
#[derive(Debug, Error)]
enum CliError {
    /// The invocation of the CLI itself was malformed.
    #[error("usage error: {0}")]
    Usage(String),
    /// The manifest or sync set failed validation.
    #[error("validation failure: {0}")]
    Validation(String),
    /// The engine or a backend failed at runtime.
    #[error("internal failure: {0}")]
    Internal(String),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CompileError> for CliError {
    fn from(err: CompileError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<RegistryError> for CliError {
    fn from(err: RegistryError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<LogError> for CliError {
    fn from(err: LogError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl CliError {
    /// Maps the error onto its exit code.
    const fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Validation(_) => 3,
            Self::Internal(_) => 1,
        }
    }
}

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Weft command-line interface.
#[derive(Parser, Debug)]
#[command(name = "weft", version, about = "Concept synchronization engine")]
struct Cli {
    /// Deployment manifest path.
    #[arg(long, global = true, default_value = "weft.toml")]
    manifest: PathBuf,
    /// Command to run.
    #[command(subcommand)]
    command: Command,
}

/// CLI commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Dispatch one external action and follow the flow to quiescence.
    Run(RunCommand),
    /// Print the validated sync set.
    ListSyncs,
    /// Print a flow's records from the durable log.
    InspectFlow {
        /// Flow identifier to inspect.
        flow: String,
    },
    /// Revalidate the manifest as a reload would.
    Reload,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Concept URI to invoke.
    #[arg(long)]
    concept: String,
    /// Action name to invoke.
    #[arg(long)]
    action: String,
    /// Action input as a JSON object.
    #[arg(long, default_value = "{}")]
    input: String,
    /// Flow identifier; fresh when omitted.
    #[arg(long)]
    flow: Option<String>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(error) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "weft: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

/// Dispatches the parsed command.
async fn dispatch(cli: Cli) -> Result<ExitCode, CliError> {
    let manifest = weft_config::load(&cli.manifest)?;
    match cli.command {
        Command::Run(command) => command_run(&manifest, command).await,
        Command::ListSyncs => command_list_syncs(&manifest),
        Command::InspectFlow {
            flow,
        } => command_inspect_flow(&manifest, &flow),
        Command::Reload => command_reload(&manifest),
    }
}

// ============================================================================
// SECTION: Engine Wiring
// ============================================================================

/// Event sink printing engine warnings to stderr.
struct StderrEvents;

impl StderrEvents {
    /// Writes one warning line.
    fn warn(&self, message: &str) {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "weft: warn: {message}");
    }
}

impl EngineEvents for StderrEvents {
    fn sync_degraded(&self, sync: &SyncName, concept: &ConceptUri) {
        self.warn(&format!("sync {sync} degraded: concept {concept} unavailable"));
    }

    fn sync_restored(&self, sync: &SyncName) {
        self.warn(&format!("sync {sync} restored"));
    }

    fn degraded_sync_skipped(&self, sync: &SyncName) {
        self.warn(&format!("sync {sync} skipped while degraded"));
    }

    fn firing_suppressed(&self, _sync: &SyncName, _matched: &[RecordId]) {}

    fn query_binding_dropped(&self, sync: &SyncName, concept: &ConceptUri) {
        self.warn(&format!("sync {sync}: query against {concept} dropped a binding"));
    }

    fn template_unresolved(&self, sync: &SyncName, field: &str, _literal: &str) {
        self.warn(&format!("sync {sync}: unresolved template in field {field}"));
    }

    fn sync_fired(&self, _sync: &SyncName, _invocations: usize) {}
}

/// Builds the registry, log, and engine described by the manifest and
/// installs its sync set.
fn build_engine(manifest: &DeploymentManifest) -> Result<Engine, CliError> {
    let registry = Arc::new(ConceptRegistry::new());
    for concept in &manifest.concepts {
        let uri = ConceptUri::new(&concept.uri);
        let transport: Arc<dyn ConceptTransport> = match &concept.transport {
            TransportForm::Local {
                handler,
            } => {
                let relation = uri.relation_hint();
                let transport = concepts::resolve_builtin(handler, &relation).ok_or_else(|| {
                    CliError::Usage(format!("unknown local handler: {handler}"))
                })?;
                Arc::new(transport)
            }
            TransportForm::Http {
                base_url,
                allow_http,
            } => {
                let mut config = HttpTransportConfig::new(base_url);
                config.allow_http = *allow_http;
                Arc::new(
                    HttpTransport::new(config)
                        .map_err(|err| CliError::Validation(err.to_string()))?,
                )
            }
        };
        registry.register(
            uri,
            transport,
            concept.capabilities.iter().cloned().collect(),
            concept.query_mode.into(),
        )?;
    }

    let log: Arc<dyn ActionLog> = match &manifest.engine.log {
        LogBackend::Memory => Arc::new(InMemoryActionLog::new()),
        LogBackend::Sqlite {
            path,
        } => Arc::new(
            SqliteActionLog::open(&SqliteLogConfig::new(path))
                .map_err(|err| CliError::Internal(err.to_string()))?,
        ),
    };

    let engine = Engine::builder()
        .log(log)
        .registry(registry)
        .events(Arc::new(StderrEvents))
        .dispatch_limit(manifest.engine.dispatch_limit)
        .build();
    engine.reload_syncs(manifest.sync_specs()?)?;
    Ok(engine)
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs one external action and prints the flow's records as JSON lines.
async fn command_run(
    manifest: &DeploymentManifest,
    command: RunCommand,
) -> Result<ExitCode, CliError> {
    let input: Fields = serde_json::from_str(&command.input)
        .map_err(|err| CliError::Usage(format!("input must be a JSON object: {err}")))?;
    let engine = build_engine(manifest)?;

    let concept = ConceptUri::new(&command.concept);
    let flow = command.flow.map_or_else(FlowId::fresh, FlowId::new);
    let mut invocation =
        ActionRecord::invocation(RecordId::fresh(), concept.clone(), command.action, input, flow);
    invocation.timestamp = weft_core::SystemClock::new().now();

    let Some(transport) = engine.registry().resolve(&concept) else {
        return Err(CliError::Validation(format!("concept unavailable: {concept}")));
    };
    engine.log().append_invocation(invocation.clone(), None)?;
    let completion = transport
        .invoke(&invocation)
        .await
        .map_err(|err| CliError::Internal(err.to_string()))?;
    engine.drive(completion, Some(invocation.id.clone())).await?;

    let mut stdout = std::io::stdout();
    for record in engine.log().export_flow(&invocation.flow)? {
        writeln!(stdout, "{record}").map_err(|err| CliError::Internal(err.to_string()))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Prints the validated sync set, one sync per line.
fn command_list_syncs(manifest: &DeploymentManifest) -> Result<ExitCode, CliError> {
    let compiled = weft_core::runtime::compile_all(manifest.sync_specs()?)?;
    let mut stdout = std::io::stdout();
    for sync in compiled {
        let annotations: Vec<&str> =
            sync.annotations.iter().map(String::as_str).collect();
        writeln!(
            stdout,
            "{}\twhen={} where={} then={}\t[{}]",
            sync.name,
            sync.when.len(),
            sync.where_entries.len(),
            sync.then.len(),
            annotations.join(",")
        )
        .map_err(|err| CliError::Internal(err.to_string()))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Prints a flow's records from the durable log as JSON lines.
fn command_inspect_flow(
    manifest: &DeploymentManifest,
    flow: &str,
) -> Result<ExitCode, CliError> {
    let LogBackend::Sqlite {
        path,
    } = &manifest.engine.log
    else {
        return Err(CliError::Validation(
            "inspect-flow requires the sqlite log backend".to_string(),
        ));
    };
    let log = SqliteActionLog::open(&SqliteLogConfig::new(path))
        .map_err(|err| CliError::Internal(err.to_string()))?;

    let mut stdout = std::io::stdout();
    for record in log.export_flow(&FlowId::new(flow))? {
        writeln!(stdout, "{record}").map_err(|err| CliError::Internal(err.to_string()))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Revalidates the manifest the way a reload would.
fn command_reload(manifest: &DeploymentManifest) -> Result<ExitCode, CliError> {
    manifest.validate()?;
    let mut stdout = std::io::stdout();
    writeln!(
        stdout,
        "validated {} syncs, {} concepts",
        manifest.syncs.len(),
        manifest.concepts.len()
    )
    .map_err(|err| CliError::Internal(err.to_string()))?;
    Ok(ExitCode::SUCCESS)
}
