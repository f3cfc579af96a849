mod app;
mod commands;
mod logging;

use app::{App, GlobalArgs};
use clap::{Parser, Subcommand};
use commands::accounts::AccountsCommand;
use commands::config::{ConfigCommand, ConfigSetParams};
use commands::db::DbCommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "wabot",
    version,
    about = "Manage WhatsApp AI bot accounts, their runners and the cloud store"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with the master access token
    Login {
        /// Access token (prompted for when omitted)
        token: Option<String>,
    },

    /// Forget the saved session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List, create, delete or select bot accounts
    Accounts {
        #[command(subcommand)]
        command: AccountsCommand,
    },

    /// Show or change an account's bot configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Set (or clear, with an empty URL) the deployed runner URL of an account
    RunnerUrl {
        /// Account id
        id: String,

        /// e.g. https://pizzeria-bot.onrender.com
        url: String,
    },

    /// Pair an account with WhatsApp through its runner or the simulator
    Connect {
        /// Account id (defaults to the selected account)
        id: Option<String>,

        /// Use the offline simulator instead of the runner
        #[arg(long)]
        simulator: bool,
    },

    /// Log the runner out and mark the account disconnected
    Disconnect {
        /// Account id (defaults to the selected account)
        id: Option<String>,
    },

    /// Chat with an account's bot from the terminal
    Chat {
        /// Account id (defaults to the selected account)
        id: Option<String>,
    },

    /// Write the runner bundle (server.js, package.json, DEPLOY.md) as a .tar.gz
    Export {
        /// Account id (defaults to the selected account)
        id: Option<String>,

        /// Output directory (defaults to ~/.wabot/exports)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Retry the cloud sync and flush queued writes
    Sync,

    /// Show or override the cloud store connection
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// Start the web console
    #[cfg(feature = "web-ui")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "3456")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    #[cfg(feature = "web-ui")]
    let default_level = if matches!(cli.command, Commands::Serve { .. }) {
        "info"
    } else {
        "warn"
    };
    #[cfg(not(feature = "web-ui"))]
    let default_level = "warn";
    logging::init_tracing(default_level);

    let app = App::new(cli.global)?;

    match cli.command {
        Commands::Login { token } => {
            commands::auth::login(&app, token).await?;
        }
        Commands::Logout => {
            commands::auth::logout(&app)?;
        }
        Commands::Whoami => {
            commands::auth::whoami(&app)?;
        }
        Commands::Accounts { command } => {
            commands::accounts::run(&app, command).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommand::Show { id } => commands::config::show(&app, id).await?,
            ConfigCommand::Set {
                id,
                instruction,
                instruction_file,
                reset_instruction,
                temperature,
                active,
            } => {
                let params = ConfigSetParams {
                    id,
                    instruction,
                    instruction_file,
                    reset_instruction,
                    temperature,
                    active,
                };
                commands::config::set(&app, params).await?;
            }
        },
        Commands::RunnerUrl { id, url } => {
            commands::config::runner_url(&app, &id, &url).await?;
        }
        Commands::Connect { id, simulator } => {
            commands::connect::run(&app, id, simulator).await?;
        }
        Commands::Disconnect { id } => {
            commands::connect::disconnect(&app, id).await?;
        }
        Commands::Chat { id } => {
            commands::chat::run(&app, id).await?;
        }
        Commands::Export { id, out } => {
            commands::export::run(&app, id, out).await?;
        }
        Commands::Sync => {
            commands::accounts::sync(&app).await?;
        }
        Commands::Db { command } => {
            commands::db::run(&app, command)?;
        }
        #[cfg(feature = "web-ui")]
        Commands::Serve { port } => {
            commands::serve::run(app, port).await?;
        }
    }

    Ok(())
}
