use std::path::PathBuf;

use anyhow::{Context, Result};
use ccc_core::{config_schema_json, write_schema_file};
use clap::Subcommand;

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigCmd {
    /// Print (or write) the JSON schema of the client configuration file
    Schema {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

pub fn execute(cmd: ConfigCmd) -> Result<()> {
    match cmd {
        ConfigCmd::Schema { out: Some(path) } => {
            write_schema_file(&path.to_string_lossy())
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        ConfigCmd::Schema { out: None } => {
            println!("{}", serde_json::to_string_pretty(&config_schema_json())?);
        }
    }
    Ok(())
}
