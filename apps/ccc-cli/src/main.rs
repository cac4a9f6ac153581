use std::path::PathBuf;

use anyhow::{Context, Result};
use ccc_core::{load_config, ClientConfig, Coordinator};
use ccc_events::Bus;
use clap::{Args, Parser, Subcommand};

mod commands;
mod render;

use commands::{ConfigCmd, PlanArgs, SettingsCmd, WatchArgs};

#[derive(Parser)]
#[command(
    name = "ccc",
    version,
    about = "Counterfactual Command Center client: churn analysis from the terminal"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// TOML client configuration
    #[arg(long, env = "CCC_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Backend base URL for this run; persisted settings are left alone
    #[arg(long, env = "CCC_API_BASE", global = true)]
    base: Option<String>,
    /// JSON file holding persisted settings (apiBase, slackEnable)
    #[arg(long, env = "CCC_SETTINGS_PATH", global = true)]
    settings: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn client_config(&self) -> Result<ClientConfig> {
        let config = match self.config.as_deref() {
            Some(path) => load_config(&path.to_string_lossy())
                .with_context(|| format!("loading {}", path.display()))?,
            None => ClientConfig::default(),
        };
        let mut config = config.with_env_overrides();
        if let Some(path) = self.settings.as_deref() {
            config.settings_path = Some(path.to_string_lossy().into_owned());
        }
        Ok(config)
    }

    pub async fn coordinator(&self, config: ClientConfig, bus: Bus) -> Result<Coordinator> {
        let coord = Coordinator::from_config(config, bus).await?;
        if let Some(base) = self.base.as_deref().filter(|b| !b.trim().is_empty()) {
            coord.repoint(base);
        }
        Ok(coord)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Read JSON-lines intents (stdin or --input) and print every view update
    Watch(WatchArgs),
    /// Analyze one customer and print the summary, drivers and live gauge
    Analyze {
        customer_id: u64,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Load the top-regret table for the action plan
    Regret(PlanArgs),
    /// Analyze a customer, then ask for and apply the best action plan
    Recommend {
        customer_id: u64,
        #[arg(long)]
        json: bool,
    },
    /// Load the top-regret table and trigger the action for its first rows
    Trigger(PlanArgs),
    /// Probe backend reachability
    Ping {
        #[arg(long)]
        json: bool,
    },
    /// List customer ids known to the backend
    Customers {
        #[arg(long)]
        json: bool,
    },
    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        cmd: SettingsCmd,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let global = cli.global;
    match cli.command {
        Commands::Watch(args) => commands::watch::run(&global, &args).await,
        Commands::Analyze { customer_id, plan } => {
            commands::oneshot::analyze(&global, customer_id, &plan).await
        }
        Commands::Regret(plan) => commands::oneshot::regret(&global, &plan).await,
        Commands::Recommend { customer_id, json } => {
            commands::oneshot::recommend(&global, customer_id, json).await
        }
        Commands::Trigger(plan) => commands::oneshot::trigger(&global, &plan).await,
        Commands::Ping { json } => commands::oneshot::ping(&global, json).await,
        Commands::Customers { json } => commands::oneshot::customers(&global, json).await,
        Commands::Settings { cmd } => commands::settings::execute(&global, cmd).await,
        Commands::Config { cmd } => commands::config::execute(cmd),
    }
}

fn main() {
    ccc_otel::init("warn");
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = runtime.block_on(run(cli)) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
