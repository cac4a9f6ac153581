use anyhow::{bail, Result};
use ccc_core::diagnostics::describe;
use ccc_core::{Intent, IntentOutcome};
use ccc_events::Bus;
use clap::{ArgAction, Subcommand};

use crate::GlobalArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum SettingsCmd {
    /// Print persisted settings as JSON
    Show,
    /// Update persisted settings and probe the resulting backend
    Set {
        /// Backend base URL; an empty string falls back to the configured default
        #[arg(long)]
        api_base: Option<String>,
        /// Enable or disable the Slack action trigger
        #[arg(long, action = ArgAction::Set)]
        slack: Option<bool>,
    },
}

pub async fn execute(global: &GlobalArgs, cmd: SettingsCmd) -> Result<()> {
    let config = global.client_config()?;
    if config.settings_path.is_none() {
        eprintln!("[ccc] no --settings path given; settings last for this run only");
    }
    let coord = global.coordinator(config, Bus::default()).await?;
    let mut settings = coord.settings().await;
    match cmd {
        SettingsCmd::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        SettingsCmd::Set { api_base, slack } => {
            if let Some(base) = api_base {
                settings.api_base = Some(base);
            }
            if let Some(enabled) = slack {
                settings.slack_enabled = enabled;
            }
            match coord.handle(Intent::SaveSettings(settings)).await {
                IntentOutcome::SettingsSaved(reach) => {
                    println!("Saved settings.");
                    println!("{}", describe(&reach));
                    Ok(())
                }
                IntentOutcome::SettingsFailed(detail) | IntentOutcome::Rejected(detail) => {
                    bail!("{detail}")
                }
                other => bail!("unexpected outcome {other:?}"),
            }
        }
    }
}
