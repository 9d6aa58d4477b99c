use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::config::{load_settings, normalize_ledger_url, Settings};
use shared::protocol::{StoredCollection, BIOMETRICS_KEY};
use storage::Storage;

#[derive(Parser, Debug)]
#[command(name = "bioauth-tools", about = "Inspect and edit the local contract ledger")]
struct Cli {
    /// TOML settings file shared with `bioauth` (defaults to ./bioauth.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured ledger; plain paths are accepted.
    #[arg(long)]
    ledger_url: Option<String>,
    #[arg(long)]
    contract: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every stored slot of the contract.
    Dump,
    /// Overwrite a slot with raw text, bypassing validation.
    WriteRaw {
        text: String,
        #[arg(long, default_value = BIOMETRICS_KEY)]
        key: String,
    },
    SetAvailable {
        #[arg(action = clap::ArgAction::Set)]
        available: bool,
    },
    Clear {
        #[arg(long, default_value = BIOMETRICS_KEY)]
        key: String,
    },
}

/// Ledger URL and contract address, flags taking precedence over settings.
fn resolve_target(
    ledger_url: Option<&str>,
    contract: Option<&str>,
    settings: Settings,
) -> (String, String) {
    let ledger_url = ledger_url
        .map(normalize_ledger_url)
        .unwrap_or(settings.ledger_url);
    let contract = contract
        .map(str::to_string)
        .unwrap_or(settings.contract_address);
    (ledger_url, contract)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    let (ledger_url, contract) =
        resolve_target(cli.ledger_url.as_deref(), cli.contract.as_deref(), settings);
    let storage = Storage::new(&ledger_url).await?;

    match cli.command {
        Command::Dump => {
            storage.health_check().await?;
            let available = storage.is_available(&contract).await?;
            println!("ledger={ledger_url}");
            println!("contract={contract} available={available}");
            let entries = storage.list_entries(&contract).await?;
            if entries.is_empty() {
                println!("(no stored data)");
            }
            for entry in entries {
                println!(
                    "key={} bytes={} updated_at={}",
                    entry.key,
                    entry.value.len(),
                    entry.updated_at.to_rfc3339()
                );
                if entry.key == BIOMETRICS_KEY {
                    let collection = StoredCollection::decode(&entry.value);
                    println!(
                        "  decoded_records={} foreign_entries={}",
                        collection.records.len(),
                        collection.foreign.len()
                    );
                }
                println!("  {}", String::from_utf8_lossy(&entry.value));
            }
        }
        Command::WriteRaw { text, key } => {
            storage.set_data(&contract, &key, text.as_bytes()).await?;
            println!("wrote {} bytes to key={key}", text.len());
        }
        Command::SetAvailable { available } => {
            storage.set_available(&contract, available).await?;
            println!("contract={contract} available={available}");
        }
        Command::Clear { key } => {
            let removed = storage.clear_data(&contract, &key).await?;
            println!("cleared key={key} removed={removed}");
        }
    }

    Ok(())
}
