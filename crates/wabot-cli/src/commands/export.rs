use crate::app::App;
use anyhow::Result;
use console::style;
use std::path::PathBuf;
use tokio::sync::mpsc;
use wabot_core::config;
use wabot_provision::bundle;

/// Write the runner bundle for one account and print its checksum.
pub async fn run(app: &App, id: Option<String>, out: Option<PathBuf>) -> Result<()> {
    let session = app.session().await?;
    let account = app.account(&session, id).await?;
    let dir = match out {
        Some(dir) => dir,
        None => config::exports_dir()?,
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("  {line}");
        }
    });

    let written = bundle::write(&dir, &account, Some(&tx));
    drop(tx);
    let _ = printer.await;
    let info = written?;

    println!();
    println!(
        "{} {} ({})",
        style("Bundle:").bold(),
        info.path.display(),
        bundle::format_size(info.size)
    );
    for (name, size) in bundle::list_entries(&info.path)? {
        println!("  {:<24} {:>10}", name, bundle::format_size(size));
    }
    println!();
    println!("Upload the three files to a Node.js 20 host, set API_KEY, then run");
    println!("  wabot runner-url {} https://<your-runner-host>", account.id);
    println!("  wabot connect {}", account.id);
    Ok(())
}
