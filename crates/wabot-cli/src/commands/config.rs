use crate::app::{report_sync, App};
use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use std::path::PathBuf;
use wabot_core::editor::SaveOutcome;
use wabot_ui::term;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the bot configuration
    Show {
        /// Account id (defaults to the selected account)
        id: Option<String>,
    },

    /// Change the bot configuration and push it to the runner
    Set {
        /// Account id (defaults to the selected account)
        id: Option<String>,

        /// New system instruction
        #[arg(long, conflicts_with_all = ["instruction_file", "reset_instruction"])]
        instruction: Option<String>,

        /// Read the system instruction from a file
        #[arg(long, conflicts_with = "reset_instruction")]
        instruction_file: Option<PathBuf>,

        /// Restore the default system instruction
        #[arg(long)]
        reset_instruction: bool,

        /// Creativity, 0.0 to 1.0 in steps of 0.1
        #[arg(long)]
        temperature: Option<f32>,

        /// Whether the bot answers incoming messages (true/false)
        #[arg(long)]
        active: Option<bool>,
    },
}

pub struct ConfigSetParams {
    pub id: Option<String>,
    pub instruction: Option<String>,
    pub instruction_file: Option<PathBuf>,
    pub reset_instruction: bool,
    pub temperature: Option<f32>,
    pub active: Option<bool>,
}

pub async fn show(app: &App, id: Option<String>) -> Result<()> {
    let session = app.session().await?;
    let account = app.account(&session, id).await?;
    let url = session.runner_url(&account.id)?;
    term::print_account(&account, url.as_deref());
    Ok(())
}

pub async fn set(app: &App, params: ConfigSetParams) -> Result<()> {
    let session = app.session().await?;
    let account = app.account(&session, params.id).await?;
    let mut editor = session.editor(&account.id).await?;

    if params.reset_instruction {
        editor.reset_instruction();
    } else if let Some(path) = &params.instruction_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        editor.set_instruction(text.trim_end());
    } else if let Some(text) = params.instruction {
        editor.set_instruction(text);
    }
    if let Some(t) = params.temperature {
        editor.set_temperature(t);
    }
    if let Some(a) = params.active {
        editor.set_active(a);
    }

    if !editor.can_save() {
        println!("Nothing to change. Pass --instruction, --temperature or --active.");
        return Ok(());
    }

    let pb = term::spinner("Saving configuration...");
    let outcome = session.save_config(&mut editor).await;
    pb.finish_and_clear();
    let outcome = outcome?;

    match outcome {
        SaveOutcome::LocalOnly => {
            println!("{} Configuration saved.", style("✔").green());
            println!(
                "  No runner URL is set, so the deployed bot was not updated. Set one with `wabot runner-url {} <url>`.",
                account.id
            );
        }
        SaveOutcome::Remote { message } => {
            println!(
                "{} Configuration saved and pushed to the runner{}.",
                style("✔").green(),
                message.map(|m| format!(" ({m})")).unwrap_or_default()
            );
        }
        SaveOutcome::RemoteFailed { error } => {
            println!("{} Configuration saved locally.", style("✔").green());
            println!(
                "{}",
                style(format!("  The runner could not be updated: {error}")).yellow()
            );
            println!("  Run the same command again to retry.");
        }
    }
    report_sync(&session).await;
    Ok(())
}

pub async fn runner_url(app: &App, id: &str, url: &str) -> Result<()> {
    let session = app.session().await?;
    let account = app.account(&session, Some(id.to_string())).await?;
    session.set_runner_url(&account.id, url)?;
    match session.runner_url(&account.id)? {
        Some(url) => println!("Runner URL for {} set to {url}.", account.name),
        None => println!("Runner URL for {} cleared.", account.name),
    }
    Ok(())
}
