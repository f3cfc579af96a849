use crate::app::App;
use anyhow::Result;
use clap::Subcommand;
use console::style;
use wabot_cloud::store::BOT_NODES_SCHEMA;
use wabot_core::config::STORE_CONFIG_KEY;
use wabot_core::interfaces::Preferences;
use wabot_core::prefs;
use wabot_core::types::StoreConfig;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Show which cloud store the console talks to
    Show,

    /// Save a store override (URL and access key) on this machine
    Set {
        /// Project URL, e.g. https://xyz.supabase.co
        url: String,

        /// Access key
        key: String,
    },

    /// Drop the override and use the flags or environment again
    Reset,

    /// Print the SQL that creates the accounts table
    Schema,
}

pub fn run(app: &App, command: DbCommand) -> Result<()> {
    match command {
        DbCommand::Show => show(app),
        DbCommand::Set { url, key } => {
            prefs::save_store_config(app.prefs.as_ref(), &StoreConfig { url, key })?;
            println!("{} Store override saved.", style("✔").green());
            show(app)
        }
        DbCommand::Reset => {
            prefs::reset_store_config(app.prefs.as_ref(), &app.settings)?;
            println!("{} Store override removed.", style("✔").green());
            show(app)
        }
        DbCommand::Schema => {
            print!("{BOT_NODES_SCHEMA}");
            Ok(())
        }
    }
}

fn show(app: &App) -> Result<()> {
    let cfg = app.store_config()?;
    let source = if app.prefs.get(STORE_CONFIG_KEY)?.is_some() {
        "local override"
    } else {
        "flags / environment"
    };
    println!("  Store URL:  {}", if cfg.url.is_empty() { "(not set)" } else { cfg.url.as_str() });
    println!("  Access key: {}", mask(&cfg.key));
    println!("  Source:     {source}");
    println!("  Local data: {} key(s) in the preferences file", app.prefs.keys()?.len());
    Ok(())
}

fn mask(key: &str) -> String {
    let n = key.chars().count();
    if n == 0 {
        "(not set)".into()
    } else if n <= 8 {
        "*".repeat(n)
    } else {
        let tail: String = key.chars().skip(n - 4).collect();
        format!("{}{tail}", "*".repeat(8))
    }
}
