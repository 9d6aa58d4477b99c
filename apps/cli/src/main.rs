use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings,
    view::{self, DashboardStats, MatchGrade, FAQ_ITEMS, PROCESS_STEPS},
    AutoApprove, BioAuthClient, EnrollForm, LocalContractGateway, LocalWallet, RejectAll,
    SignatureApprover, WalletProvider,
};
use shared::domain::{BiometricKind, RecordId};

#[derive(Parser, Debug)]
#[command(name = "bioauth", about = "Enroll and reveal encrypted biometric templates")]
struct Args {
    /// TOML settings file (defaults to ./bioauth.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Refuse every signature and transaction request.
    #[arg(long)]
    reject_signatures: bool,
    /// Run without connecting the wallet.
    #[arg(long)]
    disconnected: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List enrolled templates.
    List {
        #[arg(long)]
        search: Option<String>,
        /// Print the matching records as JSON.
        #[arg(long)]
        json: bool,
    },
    Stats,
    Enroll {
        #[arg(long, default_value = "fingerprint")]
        kind: String,
        #[arg(long, default_value = "75")]
        score: String,
    },
    /// Sign the access request and print a record's score.
    Decrypt {
        #[arg(long)]
        id: String,
    },
    Faq,
    Wallet,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    if let Command::Faq = args.command {
        print_faq();
        return Ok(());
    }

    let settings = load_settings(args.config.as_deref())?;
    tracing::info!(
        ledger = %settings.ledger_url,
        contract = %settings.contract_address,
        "opening contract ledger"
    );
    let approver: Arc<dyn SignatureApprover> = if args.reject_signatures {
        Arc::new(RejectAll)
    } else {
        Arc::new(AutoApprove)
    };
    let wallet = Arc::new(LocalWallet::load_or_create(
        &settings.wallet_key_path,
        settings.chain_id,
        approver,
    )?);
    if settings.auto_connect_wallet && !args.disconnected {
        wallet.connect();
    }

    let gateway = LocalContractGateway::open(
        &settings.ledger_url,
        &settings.contract_address,
        wallet.clone() as Arc<dyn WalletProvider>,
    )
    .await?;
    let client = BioAuthClient::new(Arc::new(gateway), wallet.clone() as Arc<dyn WalletProvider>);
    client.initialize().await;

    match args.command {
        Command::List { search, json } => {
            if let Some(term) = search {
                client
                    .dispatch(client_core::Action::SearchChanged(term))
                    .await;
            }
            let state = client.snapshot().await;
            let records = state.filtered_records();
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No biometric records found");
            } else {
                for record in records {
                    println!(
                        "{:<18} {:<20} {} {} {}",
                        record.id.as_str(),
                        record.kind.display_name(),
                        view::enrolled_date(record),
                        view::abbreviate_owner(&record.owner),
                        view::template_preview(record, 20),
                    );
                }
            }
        }
        Command::Stats => {
            let state = client.snapshot().await;
            let stats = DashboardStats::from_records(&state.records);
            println!("Total enrollments: {} (+{} this month)", stats.total, stats.monthly_trend());
            println!(
                "Fingerprint: {} ({})",
                stats.fingerprint,
                share_label(stats.fingerprint_share())
            );
            println!(
                "Facial Recognition: {} ({})",
                stats.facial,
                share_label(stats.facial_share())
            );
        }
        Command::Enroll { kind, score } => {
            let kind = BiometricKind::parse(&kind)
                .ok_or_else(|| anyhow!("unknown biometric type '{kind}' (fingerprint, facial)"))?;
            let form = EnrollForm::new(kind, score);
            if !form.can_submit() {
                bail!("a match score is required");
            }
            let record = client.enroll_biometric(form).await?;
            println!("Enrolled {} ({})", record.id, record.kind.display_name());
            println!("Template: {}", record.encrypted_template);
        }
        Command::Decrypt { id } => {
            let id = RecordId::from(id.as_str());
            match client.toggle_reveal(&id).await? {
                Some(score) => println!(
                    "{id}: {} ({})",
                    view::format_score(score),
                    MatchGrade::from_score(score).label()
                ),
                None => println!("{id}: score hidden"),
            }
        }
        Command::Wallet => {
            let state = client.snapshot().await;
            println!("Address:   {}", wallet.address());
            println!("Connected: {}", wallet.is_connected());
            println!("Chain id:  {}", settings.chain_id);
            println!("Key file:  {}", settings.wallet_key_path.display());
            println!("Contract:  {}", state.access.contract_address);
            println!(
                "Access:    {} days from {}",
                state.access.duration_days, state.access.start_timestamp
            );
        }
        Command::Faq => print_faq(),
    }

    Ok(())
}

fn share_label(share: Option<usize>) -> String {
    share.map_or_else(|| "n/a".to_string(), |pct| format!("{pct}%"))
}

fn print_faq() {
    println!("How it works");
    for (index, step) in PROCESS_STEPS.iter().enumerate() {
        println!("  {}. {}: {}", index + 1, step.title, step.detail);
    }
    println!();
    for item in FAQ_ITEMS {
        println!("Q: {}", item.question);
        println!("A: {}", item.answer);
        println!();
    }
}
