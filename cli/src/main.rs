//! Lending CLI - operate the lending core against a snapshot file
//!
//! Usage: lending --store <FILE> <COMMAND>
//!
//! Commands:
//!   init         Create an empty store file
//!   create-loan  Create a loan from approved terms
//!   apply        Apply a payment to a loan week
//!   progress     Show the current week's payment progress
//!   next-week    Show the next week that needs a payment
//!   remaining    Show the remaining balance of a week
//!   stats        Show portfolio statistics
//!   update-loan  Manually update a loan

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use lending_core::{
    InMemoryStore, LedgerEvent, LendingConfig, LendingEngine, LoanStatus, LoanUpdateRequest,
    NewLoan, PaymentCreateRequest, PaymentStatus, StoreSnapshot,
};

/// Lending - micro-lending payment application and loan progression
#[derive(Parser, Debug)]
#[command(name = "lending")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store snapshot file
    #[arg(long, default_value = "lending.json")]
    store: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty store file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Create a loan from approved application terms (amounts in cents)
    CreateLoan {
        #[arg(long)]
        client_id: u64,

        #[arg(long)]
        total_amount: i64,

        /// Amount due per week
        #[arg(long)]
        amortization: i64,

        /// Payment period in weeks
        #[arg(long)]
        weeks: u32,

        /// Installments on the application (defaults to --weeks)
        #[arg(long)]
        terms: Option<u32>,

        /// Generated when omitted
        #[arg(long)]
        control_number: Option<String>,

        #[arg(long)]
        mode: Option<String>,

        /// Amount handed out (defaults to --total-amount)
        #[arg(long)]
        amount_release: Option<i64>,

        #[arg(long)]
        release_date: Option<NaiveDate>,

        #[arg(long)]
        due_date: Option<NaiveDate>,
    },

    /// Apply a payment to a loan week (amounts in cents)
    Apply {
        #[arg(long)]
        loan_id: u64,

        /// Defaults to the loan's next unpaid week
        #[arg(long)]
        week: Option<u32>,

        #[arg(long)]
        amount_due: i64,

        #[arg(long)]
        amount_paid: i64,

        /// pending, partial, paid or overdue
        #[arg(long, default_value = "paid")]
        status: PaymentStatus,

        #[arg(long, default_value = "Cash")]
        method: String,

        /// Record as a partial payment
        #[arg(long)]
        partial: bool,

        /// Mark the week complete regardless of amounts
        #[arg(long)]
        completes_week: bool,

        /// YYYY-MM-DD or RFC 3339
        #[arg(long)]
        date: Option<String>,
    },

    /// Show the current week's payment progress
    Progress {
        #[arg(long)]
        loan_id: u64,
    },

    /// Show the next week that needs a payment
    NextWeek {
        #[arg(long)]
        loan_id: u64,
    },

    /// Show the remaining balance of a week
    Remaining {
        #[arg(long)]
        loan_id: u64,

        #[arg(long)]
        week: u32,
    },

    /// Show portfolio statistics
    Stats,

    /// Manually update a loan
    UpdateLoan {
        #[arg(long)]
        loan_id: u64,

        /// New outstanding balance in cents
        #[arg(long)]
        balance: Option<i64>,

        /// active, paid, overdue or default
        #[arg(long)]
        status: Option<LoanStatus>,

        #[arg(long)]
        weeks: Option<u32>,

        #[arg(long)]
        due_date: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let open = || open_engine(&cli.store, cli.config.as_deref());

    match cli.command {
        Commands::Init { force } => cmd_init(&cli.store, force),

        Commands::CreateLoan {
            client_id,
            total_amount,
            amortization,
            weeks,
            terms,
            control_number,
            mode,
            amount_release,
            release_date,
            due_date,
        } => {
            let mut engine = open()?;
            let loan = engine.create_loan(NewLoan {
                client_id,
                control_number: control_number.unwrap_or_default(),
                total_amount,
                amortization,
                terms: terms.unwrap_or(weeks),
                payment_period_weeks: weeks,
                mode: mode.unwrap_or_default(),
                outstanding_balance: None,
                status: None,
                amount_release: amount_release.unwrap_or(total_amount),
                date_of_release: release_date,
                due_date,
            })?;
            save_store(&cli.store, engine.store())?;
            print_json(&loan)
        }

        Commands::Apply {
            loan_id,
            week,
            amount_due,
            amount_paid,
            status,
            method,
            partial,
            completes_week,
            date,
        } => {
            let mut engine = open()?;
            let payment = engine.submit_payment(&PaymentCreateRequest {
                loan_id,
                week_number: week,
                amount_due,
                amount_paid,
                status,
                payment_method: method,
                is_partial: partial,
                completes_week,
                payment_date: date,
            })?;
            save_store(&cli.store, engine.store())?;
            report_events(&mut engine);
            print_json(&payment)
        }

        Commands::Progress { loan_id } => print_json(&open()?.payment_progress(loan_id)?),

        Commands::NextWeek { loan_id } => {
            println!("{}", open()?.next_payment_week(loan_id)?);
            Ok(())
        }

        Commands::Remaining { loan_id, week } => {
            println!("{}", open()?.remaining_balance_for_week(loan_id, week)?);
            Ok(())
        }

        Commands::Stats => print_json(&open()?.loan_stats()?),

        Commands::UpdateLoan {
            loan_id,
            balance,
            status,
            weeks,
            due_date,
        } => {
            let mut engine = open()?;
            let loan = engine.update_loan(&LoanUpdateRequest {
                id: loan_id,
                outstanding_balance: balance,
                status,
                payment_period_weeks: weeks,
                due_date,
            })?;
            save_store(&cli.store, engine.store())?;
            print_json(&loan)
        }
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    save_store(path, &InMemoryStore::new())?;
    info!(path = %path.display(), "initialized empty store");
    Ok(())
}

fn open_engine(store: &Path, config: Option<&Path>) -> Result<LendingEngine<InMemoryStore>> {
    let config = LendingConfig::load_or_default(config).context("failed to load configuration")?;
    Ok(LendingEngine::new(load_store(store)?, config))
}

fn load_store(path: &Path) -> Result<InMemoryStore> {
    let snapshot = StoreSnapshot::load(path)
        .with_context(|| format!("cannot read store {} (run `lending init`?)", path.display()))?;
    snapshot
        .restore()
        .with_context(|| format!("store {} failed verification", path.display()))
}

fn save_store(path: &Path, store: &InMemoryStore) -> Result<()> {
    StoreSnapshot::capture(store, Utc::now())?
        .save(path)
        .with_context(|| format!("cannot write store {}", path.display()))
}

fn report_events(engine: &mut LendingEngine<InMemoryStore>) {
    for event in engine.take_events() {
        match event {
            LedgerEvent::ProgressUpdateFailed {
                loan_id,
                payment_id,
                ref reason,
                ..
            } => warn!(loan_id, payment_id, reason = %reason, "payment needs reconciliation"),
            other => debug!(event = other.event_type(), loan_id = other.loan_id(), "ledger event"),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
