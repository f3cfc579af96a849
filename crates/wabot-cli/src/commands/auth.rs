use crate::app::{report_sync, App};
use anyhow::Result;
use console::style;
use wabot_core::session::Session;
use wabot_ui::term;

pub async fn login(app: &App, token: Option<String>) -> Result<()> {
    let token = match token {
        Some(t) => t,
        None => term::prompt_secret("Access token")?,
    };
    let session = Session::login(app.services()?, &app.gate, &app.settings, &token).await?;
    let count = session.registry().lock().await.len();
    println!(
        "{} Logged in as {} ({} account(s))",
        style("✔").green(),
        style(&session.user().username).bold(),
        count
    );
    report_sync(&session).await;
    Ok(())
}

pub fn logout(app: &App) -> Result<()> {
    app.gate.logout(app.prefs.as_ref())?;
    app.remember_selection(None)?;
    println!("Logged out.");
    Ok(())
}

pub fn whoami(app: &App) -> Result<()> {
    match app.gate.current_user(app.prefs.as_ref())? {
        Some(user) => println!("{} ({:?}, id {})", user.username, user.role, user.id),
        None => println!("Not logged in."),
    }
    Ok(())
}
