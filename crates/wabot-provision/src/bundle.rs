use crate::{guide, package_json, server_js};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;
use wabot_core::error::AppError;
use wabot_core::progress;
use wabot_core::types::BotAccount;

/// Directory every file sits under inside the archive.
pub const ARCHIVE_ROOT: &str = "runner";

#[derive(Debug, Clone)]
pub struct BundleInfo {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
}

/// Archive file name for an account, e.g. `pizzeria_692C275AE02BB.tar.gz`.
pub fn file_name(account: &BotAccount) -> String {
    let slug: String = account
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "bot" } else { slug };
    format!("{slug}_{}.tar.gz", account.instance_id)
}

/// Build the `.tar.gz` holding `server.js`, `package.json` and `DEPLOY.md`.
pub fn build(account: &BotAccount) -> Result<Vec<u8>, AppError> {
    let files = [
        ("server.js", server_js::generate(account)),
        ("package.json", package_json::generate()),
        ("DEPLOY.md", guide::render(account)),
    ];
    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let enc = GzEncoder::new(Vec::new(), Compression::default());
    let mut tar = tar::Builder::new(enc);
    for (name, contents) in &files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        header.set_cksum();
        tar.append_data(&mut header, format!("{ARCHIVE_ROOT}/{name}"), contents.as_bytes())?;
    }
    let enc = tar.into_inner()?;
    Ok(enc.finish()?)
}

/// Write the bundle for `account` into `dir` and report its checksum.
pub fn write(
    dir: &Path,
    account: &BotAccount,
    tx: Option<&UnboundedSender<String>>,
) -> Result<BundleInfo, AppError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name(account));

    progress::emit(tx, &format!("Generating runner bundle for {}...", account.name));
    let bytes = build(account)?;
    std::fs::write(&path, &bytes)?;

    let sha256 = sha256_hex(&bytes);
    let size = bytes.len() as u64;
    progress::emit(tx, &format!("Bundle written: {}", path.display()));
    progress::emit(tx, &format!("SHA-256: {sha256}"));
    info!(account = %account.id, path = %path.display(), size, "runner bundle written");

    Ok(BundleInfo { path, size, sha256 })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Names and sizes of the files inside a bundle.
pub fn list_entries(path: &Path) -> Result<Vec<(String, u64)>, AppError> {
    let file = File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut out = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        out.push((entry.path()?.display().to_string(), entry.size()));
    }
    Ok(out)
}

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
