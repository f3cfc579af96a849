use crate::app::{report_sync, App};
use anyhow::Result;
use clap::Subcommand;
use console::style;
use wabot_ui::term;

#[derive(Subcommand)]
pub enum AccountsCommand {
    /// List all accounts
    List,

    /// Create a new account
    Create {
        /// Business or bot name
        #[arg(long)]
        name: Option<String>,

        /// WhatsApp phone number
        #[arg(long)]
        phone: Option<String>,
    },

    /// Show one account in detail
    Show {
        /// Account id (defaults to the selected account)
        id: Option<String>,
    },

    /// Delete an account permanently
    Delete {
        /// Account id
        id: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Choose the account other commands default to
    Select {
        /// Account id (prompted for when omitted)
        id: Option<String>,
    },
}

pub async fn run(app: &App, command: AccountsCommand) -> Result<()> {
    match command {
        AccountsCommand::List => list(app).await,
        AccountsCommand::Create { name, phone } => create(app, name, phone).await,
        AccountsCommand::Show { id } => show(app, id).await,
        AccountsCommand::Delete { id, yes } => delete(app, &id, yes).await,
        AccountsCommand::Select { id } => select(app, id).await,
    }
}

async fn list(app: &App) -> Result<()> {
    let session = app.session().await?;
    {
        let registry = session.registry();
        let reg = registry.lock().await;
        term::print_accounts(
            reg.accounts(),
            reg.selected().map(|a| a.id.as_str()),
            reg.max_accounts(),
        );
    }
    report_sync(&session).await;
    Ok(())
}

async fn create(app: &App, name: Option<String>, phone: Option<String>) -> Result<()> {
    let session = app.session().await?;
    {
        let registry = session.registry();
        let reg = registry.lock().await;
        if !reg.can_create() {
            anyhow::bail!(
                "Account limit reached ({} accounts max). Delete one first.",
                reg.max_accounts()
            );
        }
    }

    let name = match name {
        Some(n) => n,
        None => term::prompt_text("Business name", None)?,
    };
    let phone = match phone {
        Some(p) => p,
        None => term::prompt_text("Phone number", None)?,
    };

    let account = session.create_account(&name, &phone).await?;
    app.remember_selection(Some(&account.id))?;
    println!(
        "{} Created {} (id {}, instance {})",
        style("✔").green(),
        style(&account.name).bold(),
        account.id,
        account.instance_id
    );
    println!("  Next: `wabot export {}` to build its runner bundle.", account.id);
    report_sync(&session).await;
    Ok(())
}

async fn show(app: &App, id: Option<String>) -> Result<()> {
    let session = app.session().await?;
    let account = app.account(&session, id).await?;
    let url = session.runner_url(&account.id)?;
    term::print_account(&account, url.as_deref());
    report_sync(&session).await;
    Ok(())
}

async fn delete(app: &App, id: &str, yes: bool) -> Result<()> {
    let session = app.session().await?;
    let account = {
        let registry = session.registry();
        let reg = registry.lock().await;
        reg.require(id)?.clone()
    };

    println!();
    println!("Account to delete:");
    println!("  Name:     {}", account.name);
    println!("  Phone:    {}", account.phone_number);
    println!("  Instance: {}", account.instance_id);

    if !yes && !term::confirm("Permanently delete this account?")? {
        println!("Cancelled.");
        return Ok(());
    }

    session.delete_account(id).await?;
    if wabot_core::prefs::selected_account(app.prefs.as_ref())?.as_deref() == Some(id) {
        app.remember_selection(None)?;
    }
    println!("Account deleted.");
    report_sync(&session).await;
    Ok(())
}

async fn select(app: &App, id: Option<String>) -> Result<()> {
    let session = app.session().await?;
    let id = match id {
        Some(id) => id,
        None => {
            let registry = session.registry();
            let reg = registry.lock().await;
            let current = reg.selected().map(|a| a.id.clone());
            match term::select_account(reg.accounts(), current.as_deref())? {
                Some(id) => id,
                None => anyhow::bail!(wabot_core::AppError::NoAccounts),
            }
        }
    };
    let account = app.account(&session, Some(id)).await?;
    println!("Selected {} ({}).", style(&account.name).bold(), account.id);
    Ok(())
}

/// Reload from the cloud store and retry writes that failed earlier.
pub async fn sync(app: &App) -> Result<()> {
    let session = app.session().await?;
    {
        let registry = session.registry();
        let mut reg = registry.lock().await;
        let flushed = reg.flush_pending().await;
        let count = reg.load().await?;
        println!("{} Synced {count} account(s).", style("✔").green());
        if flushed > 0 {
            println!("  {flushed} queued change(s) saved.");
        }
    }
    report_sync(&session).await;
    Ok(())
}
