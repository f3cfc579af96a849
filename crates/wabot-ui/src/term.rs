use console::{pad_str, style, Alignment};
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use wabot_core::pairing::{PairingSnapshot, PairingStep, Resolution};
use wabot_core::types::{BotAccount, ChatMessage, RunnerStatus, Sender};

/// Create a spinner with a message.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(st) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(st);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Bar for the simulated pairing, 0..=100.
pub fn pairing_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    if let Ok(st) = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.green/white}] {pos:>3}%")
    {
        pb.set_style(st.progress_chars("=> "));
    }
    pb.set_message("Simulating pairing");
    pb
}

// --- Prompts ---

pub fn prompt_text(label: &str, default: Option<&str>) -> Result<String, anyhow::Error> {
    let mut input = Input::<String>::new().with_prompt(label);
    if let Some(d) = default {
        input = input.default(d.to_string());
    }
    Ok(input.interact_text()?)
}

pub fn prompt_secret(label: &str) -> Result<String, anyhow::Error> {
    Ok(Password::new().with_prompt(label).interact()?)
}

/// Yes/no question, defaulting to "no".
pub fn confirm(question: &str) -> Result<bool, anyhow::Error> {
    Ok(Confirm::new()
        .with_prompt(question)
        .default(false)
        .interact()?)
}

/// Pick one account; `None` when there are none.
pub fn select_account(accounts: &[BotAccount], current: Option<&str>) -> Result<Option<String>, anyhow::Error> {
    if accounts.is_empty() {
        return Ok(None);
    }
    let labels: Vec<String> = accounts
        .iter()
        .map(|a| format!("{}  {}  [{}]", a.name, a.phone_number, a.badge()))
        .collect();
    let default = current
        .and_then(|id| accounts.iter().position(|a| a.id == id))
        .unwrap_or(0);
    let selection = Select::new()
        .with_prompt("Select account")
        .items(&labels)
        .default(default)
        .interact()?;
    Ok(Some(accounts[selection].id.clone()))
}

pub enum PairingMode {
    Runner,
    Simulator,
}

pub fn select_pairing_mode(has_runner_url: bool) -> Result<PairingMode, anyhow::Error> {
    let runner_label = if has_runner_url {
        "Pair with the deployed runner (scan a real QR code)"
    } else {
        "Pair with the deployed runner (no runner URL set yet)"
    };
    let labels = [runner_label, "Simulator (instant, no network)"];
    let selection = Select::new()
        .with_prompt("Connection mode")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(if selection == 0 {
        PairingMode::Runner
    } else {
        PairingMode::Simulator
    })
}

pub fn select_resolution(options: &[Resolution]) -> Result<Resolution, anyhow::Error> {
    let labels: Vec<&str> = options
        .iter()
        .map(|r| match r {
            Resolution::UseExistingSession => "Use the existing session",
            Resolution::ResetAndNewQr => "Reset the runner and show a new QR code",
        })
        .collect();
    let selection = Select::new()
        .with_prompt("The runner already has an active WhatsApp session")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(options[selection])
}

// --- Rendering ---

fn badge(account: &BotAccount) -> String {
    match account.badge() {
        "CONNECTED" => style("CONNECTED").green().bold().to_string(),
        "PAUSED" => style("PAUSED").yellow().bold().to_string(),
        other => style(other).dim().to_string(),
    }
}

/// Dashboard listing, one row per account.
pub fn print_accounts(accounts: &[BotAccount], selected: Option<&str>, max: usize) {
    let connected = accounts.iter().filter(|a| a.is_connected()).count();
    println!(
        "{}  {} / {} accounts, {} connected",
        style("Accounts").bold(),
        accounts.len(),
        max,
        connected
    );
    if accounts.is_empty() {
        println!("{}", style("  No accounts yet. Create one with `wabot accounts create`.").yellow());
        return;
    }
    println!(
        "  {:<1} {:<15} {:<22} {:<18} {:<10} {:>8}",
        "", "ID", "NAME", "PHONE", "STATUS", "MESSAGES"
    );
    for a in accounts {
        let marker = if Some(a.id.as_str()) == selected { "*" } else { " " };
        println!(
            "  {:<1} {:<15} {:<22} {:<18} {} {:>8}",
            marker,
            a.id,
            truncate(&a.name, 22),
            truncate(&a.phone_number, 18),
            pad_str(&badge(a), 10, Alignment::Left, None),
            a.messages_count
        );
    }
}

pub fn print_account(account: &BotAccount, runner_url: Option<&str>) {
    let divider = "=".repeat(60);
    println!("\n{divider}");
    println!("  {} ({})", style(&account.name).bold(), account.phone_number);
    println!("{divider}");
    println!("  ID:            {}", account.id);
    println!("  Instance:      {}", account.instance_id);
    println!("  Status:        {}", badge(account));
    println!("  Bot active:    {}", if account.is_active { "yes" } else { "no" });
    println!("  Temperature:   {:.1}", account.config.temperature);
    println!("  Runner URL:    {}", runner_url.unwrap_or("(not set)"));
    if let Some(t) = account.last_active {
        println!("  Last active:   {}", t.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("  Messages:      {}", account.messages_count);
    println!("\n  System instruction:");
    for line in account.config.system_instruction.lines() {
        println!("    {line}");
    }
    println!("{divider}\n");
}

pub fn status_label(status: &RunnerStatus) -> String {
    match status {
        RunnerStatus::Connected => style(status.as_str()).green().bold().to_string(),
        RunnerStatus::ScanNeeded => style(status.as_str()).cyan().bold().to_string(),
        RunnerStatus::Error => style(status.as_str()).red().bold().to_string(),
        RunnerStatus::Resetting | RunnerStatus::Initializing => {
            style(status.as_str()).yellow().to_string()
        }
        _ => status.as_str().to_string(),
    }
}

/// One status line for the production pairing step.
pub fn snapshot_line(snap: &PairingSnapshot) -> String {
    match snap.step {
        PairingStep::Production if snap.is_resetting => {
            "Resetting the runner, waiting for a fresh session...".to_string()
        }
        PairingStep::Production => {
            let hint = match (snap.status.awaiting_scan(), snap.qr.is_some()) {
                (true, true) => "  (scan the QR code with WhatsApp)",
                (true, false) => "  (waiting for a QR code)",
                (false, _) => "",
            };
            format!("Runner status: {}{hint}", status_label(&snap.status))
        }
        PairingStep::Simulator => format!("Simulating pairing: {}%", snap.progress),
        PairingStep::Choice => "Choose a connection mode".to_string(),
        PairingStep::None => "Pairing closed".to_string(),
    }
}

pub fn print_logs(logs: &[String]) {
    for line in logs.iter().rev() {
        println!("  {}", style(line).dim());
    }
}

pub fn print_message(msg: &ChatMessage) {
    let time = msg.timestamp.format("%H:%M");
    match msg.sender {
        Sender::User => println!("{} {}", style(format!("[{time}] you:")).cyan(), msg.text),
        Sender::Bot => println!("{} {}", style(format!("[{time}] bot:")).green(), msg.text),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
