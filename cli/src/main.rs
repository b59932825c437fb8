//! Dominion CLI - operator entry point for the governance crank.
//!
//! ```text
//! dominion [--config PATH] [--env NAME] [--log-level LEVEL] <COMMAND>
//!
//!   crank [--dry-run]      run one pass and submit its batch
//!   status <PROPOSAL>      phase of one proposal at the ledger clock
//!   proposals <DOMINION>   every proposal of a dominion (id or url name)
//!   member <MEMBER>        stake and votes of a governance member
//! ```
//!
//! The report goes to stdout and logs go to stderr (plus `[app] log_file`).
//! Exit codes: 0 completed, 1 some dominion or proposal failed, 2 the batch
//! was rejected, 3 the pass could not run at all.

mod report;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use dominion_config::{DominionConfig, NetworkConfig};
use dominion_core::{CommanderRegistry, Contracts, CrankSettings, Mode, ProposalReader, run_pass};
use dominion_ledger::{RpcLedger, RpcSettings};
use dominion_types::{ObjectId, Registry};

use report::{
    EXIT_FATAL, EXIT_OK, EXIT_PARTIAL, describe_member, describe_proposal, pass_exit_code,
    render_pass,
};

#[derive(Debug, Parser)]
#[command(name = "dominion", version, about = "Dominion governance crank")]
struct Cli {
    /// Config file; defaults to $DOMINION_CONFIG or ~/.dominion/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Network from the config's [networks] table.
    #[arg(long = "env", global = true)]
    network: Option<String>,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one crank pass.
    Crank {
        /// Plan the batch without submitting it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Show a proposal's phase at the ledger clock.
    Status { proposal: ObjectId },
    /// List a dominion's proposals with their phases.
    Proposals {
        /// Dominion object id or registered url name.
        dominion: String,
    },
    /// Show a governance member's stake and votes.
    Member { member: ObjectId },
}

fn init_tracing(default_level: &str, log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file, warning) = match log_file.map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(warning)) => (None, Some(warning)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(file.map(|f| fmt::layer().with_ansi(false).with_writer(Mutex::new(f))))
        .with(env_filter)
        .init();

    if let Some(warning) = warning {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(path: &Path) -> Result<File, String> {
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        return Err(format!(
            "Failed to create log dir {}: {e}",
            parent.display()
        ));
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open log file {}: {e}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<&'static DominionConfig> {
    DominionConfig::shared(path).context("loading configuration")
}

fn rpc_settings(config: &DominionConfig, network: &NetworkConfig) -> RpcSettings {
    RpcSettings {
        rpc_url: network.rpc_url.clone(),
        submit_url: network.submit_url.clone(),
        request_timeout: config.ledger.request_timeout(),
        max_retries: config.ledger.max_retries,
        page_size: config.ledger.page_size,
        allow_http: config.ledger.allow_http,
    }
}

fn contracts(network: &NetworkConfig) -> Contracts {
    Contracts {
        governance: network.governance_contract.clone(),
        dominion: network.dominion_contract.clone(),
        framework_commander: network.framework_commander_contract.clone(),
    }
}

/// A registered url name, else a `0x`-prefixed object id.
fn resolve_dominion(registry: &Registry, name: &str) -> Result<ObjectId> {
    if let Some(id) = registry.find_dominion_id(name)? {
        return Ok(id.clone());
    }
    name.strip_prefix("0x")
        .and_then(|_| ObjectId::parse(name).ok())
        .with_context(|| format!("{name:?} is neither a registered url name nor an object id"))
}

async fn run(cli: &Cli, config: &DominionConfig) -> Result<u8> {
    let (name, network) = config.network(cli.network.as_deref())?;
    tracing::debug!(network = name, rpc_url = %network.rpc_url, "Using network");

    let ledger = RpcLedger::new(rpc_settings(config, network))?;
    let contracts = contracts(network);
    let commanders = CommanderRegistry::builtin(&contracts);

    match &cli.command {
        Command::Crank { dry_run } => {
            let mode = if *dry_run {
                Mode::DryRun
            } else {
                let sender = config
                    .crank
                    .sender
                    .clone()
                    .context("no [crank] sender configured; set one or use --dry-run")?;
                Mode::Submit {
                    sender,
                    gas_budget: config.crank.gas_budget,
                }
            };
            let settings = CrankSettings {
                registry: network.registry.clone(),
                contracts,
            };
            let report = run_pass(&ledger, &commanders, &settings, &mode).await?;
            print!("{}", render_pass(&report));
            Ok(pass_exit_code(&report))
        }
        Command::Status { proposal } => {
            let reader = ProposalReader::new(&ledger, &commanders);
            let now = reader.clock().await.context("reading the ledger clock")?;
            let proposal = reader.proposal(proposal).await?;
            println!("{}", describe_proposal(&proposal, now));
            Ok(EXIT_OK)
        }
        Command::Proposals { dominion } => {
            let reader = ProposalReader::new(&ledger, &commanders);
            let now = reader.clock().await.context("reading the ledger clock")?;
            let registry = reader.registry(&network.registry).await?;
            let id = resolve_dominion(&registry, dominion)?;
            let dominion = reader.dominion(&id).await?;
            let governance = reader.governance(dominion.governance_id()).await?;
            let proposals = reader.proposals(&governance.proposal_ids).await?;

            let mut code = EXIT_OK;
            for (id, proposal) in governance.proposal_ids.iter().zip(proposals) {
                match proposal {
                    Ok(proposal) => println!("{}", describe_proposal(&proposal, now)),
                    Err(e) => {
                        println!("{id}: error {e}");
                        code = EXIT_PARTIAL;
                    }
                }
            }
            Ok(code)
        }
        Command::Member { member } => {
            let reader = ProposalReader::new(&ledger, &commanders);
            let member = reader.member(member).await?;
            print!("{}", describe_member(&member));
            Ok(EXIT_OK)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    let log_file = config.as_ref().ok().and_then(|c| c.log_file());
    init_tracing(&cli.log_level, log_file.as_deref());

    let result = match config {
        Ok(config) => run(&cli, config).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
