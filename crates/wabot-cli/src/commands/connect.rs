use crate::app::{report_sync, App};
use anyhow::{Context, Result};
use base64::Engine;
use console::style;
use std::path::{Path, PathBuf};
use wabot_core::config;
use wabot_core::pairing::{PairingFlow, PairingSnapshot, PairingStep, Resolution};
use wabot_core::types::BotAccount;
use wabot_ui::term::{self, PairingMode};

pub async fn run(app: &App, id: Option<String>, simulator: bool) -> Result<()> {
    let session = app.session().await?;
    let account = app.account(&session, id).await?;
    let mut url = session.runner_url(&account.id)?;

    let mode = if simulator {
        PairingMode::Simulator
    } else {
        term::select_pairing_mode(url.is_some())?
    };

    if matches!(mode, PairingMode::Runner) && url.is_none() {
        let entered = term::prompt_text("Runner URL (leave empty to cancel)", Some(""))?;
        session.set_runner_url(&account.id, &entered)?;
        url = session.runner_url(&account.id)?;
    }

    let mut flow = session.pairing();
    flow.open(&account.id, url).await?;

    let result = match mode {
        PairingMode::Simulator => simulate(&mut flow, &account).await,
        PairingMode::Runner => pair_with_runner(&mut flow, &account).await,
    };
    flow.close();
    result?;
    report_sync(&session).await;
    Ok(())
}

async fn simulate(flow: &mut PairingFlow, account: &BotAccount) -> Result<()> {
    let mut rx = flow.subscribe();
    flow.choose_simulator()?;

    let pb = term::pairing_bar();
    loop {
        let snap = rx.borrow_and_update().clone();
        if snap.step == PairingStep::None {
            break;
        }
        pb.set_position(u64::from(snap.progress));
        if rx.changed().await.is_err() {
            break;
        }
    }
    pb.finish_and_clear();
    println!(
        "{} {} is connected (simulated).",
        style("✔").green(),
        style(&account.name).bold()
    );
    Ok(())
}

async fn pair_with_runner(flow: &mut PairingFlow, account: &BotAccount) -> Result<()> {
    let mut rx = flow.subscribe();
    flow.choose_production()?;

    let first = flow.snapshot();
    if let Some(notice) = &first.notice {
        println!("{}", style(notice).yellow());
        return Ok(());
    }
    println!(
        "Polling {} every few seconds. Press Ctrl+C to stop.\n",
        first.runner_url.as_deref().unwrap_or_default()
    );

    let mut last_line = String::new();
    let mut last_logs: Vec<String> = Vec::new();
    let mut last_qr: Option<String> = None;

    loop {
        if rx.changed().await.is_err() {
            return Ok(());
        }
        let snap: PairingSnapshot = rx.borrow_and_update().clone();
        if snap.step != PairingStep::Production {
            return Ok(());
        }

        let line = term::snapshot_line(&snap);
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
        if snap.logs != last_logs {
            let fresh: Vec<String> = snap
                .logs
                .iter()
                .take_while(|l| last_logs.first() != Some(*l))
                .cloned()
                .collect();
            term::print_logs(&fresh);
            last_logs = snap.logs.clone();
        }
        if snap.qr != last_qr {
            if let Some(qr) = &snap.qr {
                let path = qr_path(account)?;
                save_qr(qr, &path)?;
                println!(
                    "  QR code saved to {}. Open it and scan with WhatsApp > Linked devices.",
                    style(path.display()).cyan()
                );
            }
            last_qr = snap.qr.clone();
        }

        let options = snap.resolutions();
        if options.is_empty() {
            continue;
        }
        match term::select_resolution(&options)? {
            Resolution::UseExistingSession => {
                let connected = flow.adopt_existing().await?;
                println!(
                    "{} {} is connected.",
                    style("✔").green(),
                    style(&connected.name).bold()
                );
                return Ok(());
            }
            Resolution::ResetAndNewQr => {
                if let Err(e) = flow.force_reset().await {
                    let notice = flow.snapshot().notice.unwrap_or_default();
                    println!("{}", style(format!("{notice} ({e})")).yellow());
                }
            }
        }
    }
}

fn qr_path(account: &BotAccount) -> Result<PathBuf> {
    Ok(config::exports_dir()?.join(format!("{}_qr.png", account.instance_id)))
}

/// Decode a `data:image/png;base64,...` URL into a PNG file.
fn save_qr(data_url: &str, path: &Path) -> Result<()> {
    let encoded = data_url
        .split_once(";base64,")
        .map(|(_, data)| data)
        .ok_or_else(|| anyhow::anyhow!("Runner sent a QR code that is not a base64 data URL"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .context("Failed to decode QR image")?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub async fn disconnect(app: &App, id: Option<String>) -> Result<()> {
    let session = app.session().await?;
    let account = app.account(&session, id).await?;

    let pb = term::spinner(&format!("Disconnecting {}...", account.name));
    let outcome = session.disconnect(&account.id).await;
    pb.finish_and_clear();
    let outcome = outcome?;

    println!(
        "{} {} is now disconnected.",
        style("✔").green(),
        style(&outcome.account.name).bold()
    );
    if let Some(notice) = outcome.remote_notice {
        println!("{}", style(notice).yellow());
    }
    report_sync(&session).await;
    Ok(())
}
