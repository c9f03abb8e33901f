//! Index overview for `brain status`.
//!
//! Shows where the index lives, how large it is, and which notes it holds,
//! so a user can confirm that indexing picked up what they expect.

use anyhow::Result;

use brain_assistant_core::models::EMBEDDING_DIMS;

use crate::config::Config;
use crate::sqlite_index::SqliteIndex;

/// Print a summary of the index to stdout.
pub async fn run_status(config: &Config, list_paths: bool) -> Result<()> {
    let index = SqliteIndex::open(&config.index.path, EMBEDDING_DIMS).await?;
    let entries = index.summaries().await?;

    let db_size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let last_write = entries.iter().map(|e| e.updated_at).max();

    println!("Brain Assistant — Index Status");
    println!("==============================");
    println!();
    println!("  Vault:       {}", config.vault.root.display());
    println!("  Index:       {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Notes:       {}", entries.len());
    println!(
        "  Last write:  {}",
        last_write.map(format_ts_relative).unwrap_or_else(|| "never".to_string())
    );

    if list_paths && !entries.is_empty() {
        println!();
        println!("  {:<56} {}", "PATH", "UPDATED");
        println!("  {}", "-".repeat(76));
        for entry in &entries {
            println!("  {:<56} {}", entry.path, format_ts_relative(entry.updated_at));
        }
    }

    println!();
    index.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Unix timestamp as a relative time ("3 hours ago"), or a date once older than a month.
fn format_ts_relative(ts: i64) -> String {
    format_relative_to(ts, chrono::Utc::now().timestamp())
}

fn format_relative_to(ts: i64, now: i64) -> String {
    let delta = now - ts;
    let plural = |n: i64| if n == 1 { "" } else { "s" };

    match delta {
        d if d < 0 => format_ts_iso(ts),
        d if d < 60 => "just now".to_string(),
        d if d < 3600 => format!("{} min{} ago", d / 60, plural(d / 60)),
        d if d < 86400 => format!("{} hour{} ago", d / 3600, plural(d / 3600)),
        d if d < 86400 * 30 => format!("{} day{} ago", d / 86400, plural(d / 86400)),
        _ => format_ts_iso(ts),
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
