use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use forecast_advice::{AdviceGenerator, AdviceRequest, HttpAdvisor, Provider, ProviderConfig};
use forecast_backup::{read_backup, write_backup, BackupData};
use forecast_core::{
    default_entry_date, format_amount, history_candidates, local_date, local_month, suggest_from_history, Ledger,
    NewTransaction, TransactionType, UserId, YearMonth,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod prompt;
mod render;
mod state;
mod store;
mod sync;

use config::Config;
use store::FileDocumentStore;
use sync::SyncCoordinator;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("FORECAST_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "forecast", version, long_version = LONG_VERSION, about = "Month-by-month balance forecasting")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start balance, income, expense and projected balance for a month
    Summary {
        /// YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<YearMonth>,
    },

    /// Projected balances for a run of months
    Timeline {
        /// First month (default: current month)
        #[arg(long)]
        from: Option<YearMonth>,

        /// Number of months to show (1-1200)
        #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u16).range(1..=1200))]
        months: u16,
    },

    /// Transactions dated within a month
    List {
        #[arg(long)]
        month: Option<YearMonth>,
    },

    /// Record an income or expense entry
    Add {
        description: String,

        /// Non-negative amount (default: the last entry with this description)
        #[arg(long)]
        amount: Option<i64>,

        /// income|expense (default: the last entry with this description, else expense)
        #[arg(long = "type")]
        kind: Option<TransactionType>,

        /// YYYY-MM-DD (default: today, or the 1st of --month when viewing another month)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Month being viewed, used for the default date
        #[arg(long)]
        month: Option<YearMonth>,
    },

    /// Change fields of an existing entry
    Edit {
        id: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        amount: Option<i64>,
        #[arg(long = "type")]
        kind: Option<TransactionType>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Remove an entry
    Delete { id: String },

    /// Pin (or with --clear, unpin) the start balance of a month
    Balance {
        month: YearMonth,

        #[arg(allow_negative_numbers = true)]
        amount: Option<i64>,

        #[arg(long, conflicts_with = "amount")]
        clear: bool,
    },

    /// Description suggestions for new entries
    Candidates {
        /// Show the amount/type a new entry with this description would default to
        #[arg(long)]
        suggest: Option<String>,
    },

    /// Write a JSON backup (stdout when --out is omitted)
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Replace all data with a JSON backup ("-" reads stdin)
    Import {
        path: PathBuf,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Ask a language model for budgeting advice on a month
    Advise {
        #[arg(long)]
        month: Option<YearMonth>,

        /// openai|anthropic|gemini (default: from config)
        #[arg(long)]
        provider: Option<Provider>,
    },

    /// Sync the ledger with the configured document store
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },

    /// Inspect or create ~/.forecast/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Manage API keys
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SyncCommand {
    /// Last recorded sync outcome
    Status,
    /// Fetch the remote document; adopt it, or seed it from local data
    Connect,
    /// Overwrite the remote ledger with local data
    Push {
        /// Skip the confirmation prompt when the remote document differs
        #[arg(long)]
        yes: bool,
    },
    /// Replace local data with the remote document
    Pull,
    /// Same as connect, after a failure
    Retry,
    /// Keep syncing until Ctrl-C
    Watch,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Init,
    Show,
    Path,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Prompt for and store an API key
    SetKey {
        #[arg(long, default_value = "gemini")]
        provider: Provider,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("forecast=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    let symbol = cfg.profile.currency_symbol.as_str();

    match cli.command {
        Command::Summary { month } => {
            let ledger = load_ledger()?;
            let month = month_or_current(month, &cfg)?;
            render::print_summary(
                month,
                &ledger.summary(month),
                &ledger.month_transactions(month),
                &ledger.expense_breakdown(month),
                symbol,
            );
        }

        Command::Timeline { from, months } => {
            let ledger = load_ledger()?;
            let from = month_or_current(from, &cfg)?;
            let to = from.offset(i32::from(months) - 1);
            for row in ledger.timeline(from, to) {
                println!("{}", render::timeline_line(&row, symbol));
            }
        }

        Command::List { month } => {
            let ledger = load_ledger()?;
            let month = month_or_current(month, &cfg)?;
            let txs = ledger.month_transactions(month);
            if txs.is_empty() {
                println!("No transactions in {month}");
            }
            for t in &txs {
                println!("{}", render::transaction_line(t, symbol));
            }
        }

        Command::Add {
            description,
            amount,
            kind,
            date,
            month,
        } => {
            let (mut ledger, sync) = load_for_edit(&cfg)?;
            let suggested = suggest_from_history(ledger.transactions(), description.trim());
            let amount = amount
                .or(suggested.map(|(a, _)| a))
                .context("--amount is required for a new description")?;
            let kind = kind
                .or(suggested.map(|(_, k)| k))
                .unwrap_or(TransactionType::Expense);
            let date = match date {
                Some(d) => d,
                None => {
                    let today = today(&cfg)?;
                    default_entry_date(month.unwrap_or(YearMonth::of(today)), today)
                }
            };
            let tx = ledger.add_transaction(NewTransaction::new(description.trim(), amount, kind, date))?;
            println!("Added {}", render::transaction_line(&tx, symbol));
            commit(sync, &ledger)?;
        }

        Command::Edit {
            id,
            description,
            amount,
            kind,
            date,
        } => {
            let (mut ledger, sync) = load_for_edit(&cfg)?;
            let mut tx = ledger
                .find(&id)
                .cloned()
                .with_context(|| format!("no transaction with id '{id}'"))?;
            if let Some(d) = description {
                tx.description = d.trim().to_string();
            }
            if let Some(a) = amount {
                tx.amount = a;
            }
            if let Some(k) = kind {
                tx.kind = k;
            }
            if let Some(d) = date {
                tx.date = d;
            }
            ledger.update_transaction(tx.clone())?;
            println!("Updated {}", render::transaction_line(&tx, symbol));
            commit(sync, &ledger)?;
        }

        Command::Delete { id } => {
            let (mut ledger, sync) = load_for_edit(&cfg)?;
            let removed = ledger.delete_transaction(&id)?;
            println!("Deleted {}", render::transaction_line(&removed, symbol));
            commit(sync, &ledger)?;
        }

        Command::Balance { month, amount, clear } => {
            let (mut ledger, sync) = load_for_edit(&cfg)?;
            if !clear && amount.is_none() {
                bail!("pass an amount, or --clear to remove the pinned balance");
            }
            ledger.set_month_start_balance(month, if clear { None } else { amount });
            let summary = ledger.summary(month);
            println!(
                "{month} starts at {}{}",
                format_amount(summary.start_balance, symbol),
                if summary.is_manual_override { " (manual)" } else { "" }
            );
            commit(sync, &ledger)?;
        }

        Command::Candidates { suggest } => {
            let ledger = load_ledger()?;
            match suggest {
                Some(desc) => match suggest_from_history(ledger.transactions(), desc.trim()) {
                    Some((amount, kind)) => {
                        println!("{desc}: {} {}", kind.as_str(), format_amount(amount, symbol))
                    }
                    None => println!("{desc}: no history"),
                },
                None => {
                    for c in history_candidates(ledger.transactions(), &cfg.candidates.extra) {
                        println!("{c}");
                    }
                }
            }
        }

        Command::Export { out } => {
            let ledger = load_ledger()?;
            let backup = BackupData::export(ledger.data(), Utc::now());
            match out {
                Some(path) => {
                    write_backup(&path, &backup)?;
                    eprintln!(
                        "Exported {} transactions to {}",
                        backup.transactions.len(),
                        path.display()
                    );
                }
                None => println!("{}", backup.to_json()),
            }
        }

        Command::Import { path, yes } => {
            let backup = if path.as_os_str() == "-" {
                BackupData::parse(&prompt::read_stdin()?)?
            } else {
                read_backup(&path)?
            };
            let (mut ledger, sync) = load_for_edit(&cfg)?;
            if !yes
                && !prompt::confirm(&format!(
                    "Replace {} local transactions with {} from the backup?",
                    ledger.transactions().len(),
                    backup.transactions.len()
                ))?
            {
                println!("Import cancelled");
                return Ok(());
            }
            ledger.replace_all(backup.into_ledger_data());
            println!("Imported {} transactions", ledger.transactions().len());
            commit(sync, &ledger)?;
        }

        Command::Advise { month, provider } => {
            let ledger = load_ledger()?;
            let month = month_or_current(month, &cfg)?;
            let advisor = HttpAdvisor::new(provider_config(&cfg, provider)?);
            let request = AdviceRequest::for_month(&ledger, month, symbol, &cfg.advice.language);
            info!(provider = %advisor.config().provider, %month, "requesting advice");
            let advice = advisor.advise(&request).await?;
            println!("{advice}");
        }

        Command::Sync { command } => run_sync(&cfg, command).await?,

        Command::Config { command } => match command {
            ConfigCommand::Init => {
                let path = config::config_path()?;
                if config::init_config_at(&path)? {
                    println!("Wrote {}", path.display());
                } else {
                    println!("Config already exists: {}", path.display());
                }
            }
            ConfigCommand::Show => print!("{}", toml::to_string_pretty(&cfg)?),
            ConfigCommand::Path => println!("{}", config::config_path()?.display()),
        },

        Command::Auth { command } => match command {
            AuthCommand::SetKey { provider } => auth::set_key(provider)?,
        },
    }

    Ok(())
}

fn load_ledger() -> Result<Ledger> {
    Ok(Ledger::new(state::read_ledger(&state::ledger_path()?)?))
}

fn today(cfg: &Config) -> Result<NaiveDate> {
    local_date(Utc::now(), &cfg.profile.timezone).map_err(|e| anyhow!(e))
}

fn month_or_current(month: Option<YearMonth>, cfg: &Config) -> Result<YearMonth> {
    match month {
        Some(m) => Ok(m),
        None => local_month(Utc::now(), &cfg.profile.timezone).map_err(|e| anyhow!(e)),
    }
}

fn provider_config(cfg: &Config, provider: Option<Provider>) -> Result<ProviderConfig> {
    let provider = provider.unwrap_or(cfg.advice.provider);
    let mut pc = ProviderConfig::new(provider);
    // The configured model belongs to the configured provider only.
    if provider == cfg.advice.provider && !cfg.advice.model.trim().is_empty() {
        pc.model = cfg.advice.model.clone();
    }
    if provider == cfg.advice.provider && !cfg.advice.base_url.trim().is_empty() {
        pc.base_url = cfg.advice.base_url.trim_end_matches('/').to_string();
    }
    pc.temperature = cfg.advice.temperature;
    pc.api_key = auth::resolve_api_key(provider)?;
    Ok(pc)
}

fn file_store(cfg: &Config) -> Result<FileDocumentStore> {
    let dir = match &cfg.sync.store_dir {
        Some(dir) => dir.clone(),
        None => state::ensure_forecast_home()?.join("store"),
    };
    Ok(FileDocumentStore::new(dir, Duration::from_millis(cfg.sync.poll_ms.max(50))))
}

fn coordinator(cfg: &Config) -> Result<SyncCoordinator<FileDocumentStore>> {
    let identity = cfg.sync.user_id.as_deref().map(UserId::new);
    SyncCoordinator::new(file_store(cfg)?, &identity, cfg.sync.policy())
}

/// Local ledger to edit, plus a connected coordinator when sync is on.
///
/// With sync on, the remote document is fetched first and becomes the base of
/// the edit, so a stale local copy never overwrites entries made elsewhere.
fn load_for_edit(cfg: &Config) -> Result<(Ledger, Option<SyncCoordinator<FileDocumentStore>>)> {
    let local = state::read_ledger(&state::ledger_path()?)?;
    if !cfg.sync.enabled {
        return Ok((Ledger::new(local), None));
    }
    let mut sync = coordinator(cfg)?;
    let base = match sync.base_for_edit(local) {
        Ok(base) => base,
        Err(e) => {
            sync::record_status(&state::sync_record_path()?, &forecast_core::SyncStatus::Error(e.to_string()))?;
            return Err(e).context("fetch remote document before editing (set [sync] enabled = false to edit offline)");
        }
    };
    Ok((Ledger::new(base), Some(sync)))
}

/// Persist locally, then push when sync is on.
fn commit(sync: Option<SyncCoordinator<FileDocumentStore>>, ledger: &Ledger) -> Result<()> {
    state::write_ledger(&state::ledger_path()?, ledger.data())?;
    let Some(mut sync) = sync else {
        return Ok(());
    };
    let status = sync.push(ledger.data(), Utc::now()).clone();
    sync::record_status(&state::sync_record_path()?, &status)?;
    eprintln!("sync: {}", render::status_label(&status));
    Ok(())
}

fn apply_remote(path: &Path, remote: forecast_core::LedgerData) -> Result<()> {
    let mut ledger = Ledger::new(state::read_ledger(path)?);
    ledger.replace_all(remote);
    state::write_ledger(path, ledger.data())
}

async fn run_sync(cfg: &Config, command: SyncCommand) -> Result<()> {
    let ledger_path = state::ledger_path()?;
    let record_path = state::sync_record_path()?;

    match command {
        SyncCommand::Status => {
            println!("enabled: {}", cfg.sync.enabled);
            println!("user:    {}", cfg.sync.user_id.as_deref().unwrap_or("(not set)"));
            match state::read_sync_record(&record_path)? {
                Some(r) => println!("last:    {} at {}", render::status_label(&r.status), r.at_utc.to_rfc3339()),
                None => println!("last:    never synced"),
            }
        }

        SyncCommand::Connect | SyncCommand::Retry => {
            let mut sync = coordinator(cfg)?;
            let local = state::read_ledger(&ledger_path)?;
            let outcome = sync.connect(&local, Utc::now());
            let remote = match outcome {
                Ok(remote) => remote,
                Err(e) => {
                    sync::record_status(&record_path, &forecast_core::SyncStatus::Error(e.to_string()))?;
                    return Err(e).context("connect to document store");
                }
            };
            match remote {
                Some(remote) => {
                    println!("Adopted remote data ({} transactions)", remote.transactions.len());
                    apply_remote(&ledger_path, remote)?;
                }
                None => println!("Seeded remote document for {}", sync.user()),
            }
            sync::record_status(&record_path, sync.status())?;
            println!("sync: {}", render::status_label(sync.status()));
        }

        SyncCommand::Push { yes } => {
            let mut sync = coordinator(cfg)?;
            let local = state::read_ledger(&ledger_path)?;
            let remote = sync.fetch_remote().context("fetch remote document")?;
            if let Some(remote) = remote.filter(|r| *r != local) {
                if !yes
                    && !prompt::confirm(&format!(
                        "Replace {} remote transactions with {} local ones?",
                        remote.transactions.len(),
                        local.transactions.len()
                    ))?
                {
                    println!("Push cancelled");
                    return Ok(());
                }
            }
            let status = sync.push(&local, Utc::now()).clone();
            sync::record_status(&record_path, &status)?;
            println!("sync: {}", render::status_label(&status));
        }

        SyncCommand::Pull => {
            let mut sync = coordinator(cfg)?;
            match sync.pull(Utc::now()).context("fetch remote document")? {
                Some(remote) => {
                    println!("Pulled {} transactions", remote.transactions.len());
                    apply_remote(&ledger_path, remote)?;
                    sync::record_status(&record_path, sync.status())?;
                }
                None => println!("No remote document for {} yet; run: forecast sync push", sync.user()),
            }
        }

        SyncCommand::Watch => {
            let mut sync = coordinator(cfg)?;
            let local = state::read_ledger(&ledger_path)?;
            if let Some(remote) = sync.connect(&local, Utc::now()).context("connect to document store")? {
                apply_remote(&ledger_path, remote)?;
            }
            sync::watch(sync, &ledger_path, &record_path, Duration::from_millis(cfg.sync.poll_ms.max(50))).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline_months(args: &[&str]) -> Result<u16, clap::Error> {
        let cli = Cli::try_parse_from(["forecast", "timeline"].iter().chain(args))?;
        match cli.command {
            Command::Timeline { months, .. } => Ok(months),
            other => panic!("parsed {other:?}"),
        }
    }

    #[test]
    fn test_timeline_months_are_bounded() {
        assert_eq!(timeline_months(&[]).unwrap(), 12);
        assert_eq!(timeline_months(&["--months", "1200"]).unwrap(), 1200);
        assert!(timeline_months(&["--months", "0"]).is_err());
        assert!(timeline_months(&["--months", "1201"]).is_err());
        assert!(timeline_months(&["--months", "4294967297"]).is_err());
    }
}
