use std::io::{self, Write};
use std::path::PathBuf;

use abertura_cli::answers::Answers;
use abertura_cli::csv_loader::{self, QuoteRequest};
use abertura_cli::{app, logging, report};
use abertura_core::PostalCodeLookup;
use abertura_core::calculations::QuoteEngine;
use abertura_core::calculations::common::parse_money;
use abertura_core::form::FormStore;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Attualize CNPJ-opening wizard.
///
/// Prices leads, looks up postal codes and drives the opening wizard
/// against the configured lead API.
#[derive(Debug, Parser)]
#[command(name = "abertura", version)]
struct Cli {
    /// Configuration file. Missing means built-in defaults.
    #[arg(long, default_value = "abertura.toml")]
    config: PathBuf,

    /// Log filter, e.g. `debug` or `abertura_core=trace`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Also append logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Price a single lead.
    Quote {
        /// Declared revenue, e.g. `20000` or `R$ 20.000,00`.
        #[arg(long)]
        revenue: String,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        employees: i64,

        /// Use the provider's address as the company's fiscal address.
        #[arg(long)]
        fiscal_address: bool,

        /// Two-letter UF code of the company address.
        #[arg(long, default_value = "")]
        state: String,
    },

    /// Price every lead of a CSV file and print the results as CSV.
    QuoteBatch {
        #[arg(long)]
        file: PathBuf,
    },

    /// Look up a postal code (CEP).
    LookupCep { cep: String },

    /// Run the wizard non-interactively from a TOML answers file.
    Run {
        #[arg(long)]
        answers: PathBuf,

        /// SQLite file keeping the session between runs.
        #[arg(long)]
        session_db: Option<PathBuf>,
    },
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_default_logging();

    let cli = Cli::parse();

    if let Some(level) = &cli.log_level {
        logging::set_log_level(level)?;
    }
    if let Some(path) = &cli.log_file {
        logging::enable_file_logging(path)?;
    }

    let config = app::load_config(&cli.config, std::env::var(app::API_URL_ENV).ok())?;
    debug!(backend = %config.backend.backend, "configuration loaded");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Quote {
            revenue,
            employees,
            fiscal_address,
            state,
        } => {
            let request = QuoteRequest {
                name: String::new(),
                revenue: parse_money(&revenue),
                employee_count: employees,
                use_fiscal_address: fiscal_address,
                state,
            };
            let store = FormStore::new(config.fiscal_address.clone());
            let engine = QuoteEngine::new(config.pricing.clone()).context("Invalid pricing table")?;

            match app::quote_for(&store, &engine, &request) {
                Some(quote) => report::write_quote(&mut out, &quote)?,
                None => bail!("revenue '{revenue}' is not a positive amount"),
            }
        }

        Command::QuoteBatch { file } => {
            let requests = csv_loader::load_from_file(&file)
                .with_context(|| format!("Failed to load '{}'", file.display()))?;
            info!(count = requests.len(), "pricing batch");
            let lines = app::quote_batch(&config, &requests)?;
            report::write_batch_csv(&mut out, &lines)?;
        }

        Command::LookupCep { cep } => {
            let client = app::postal_code_client(&config)?;
            match client.lookup(&cep).await.context("CEP lookup failed")? {
                Some(address) => {
                    writeln!(out, "{}", address.street)?;
                    writeln!(out, "{}", address.district)?;
                    writeln!(out, "{} - {}", address.city, address.state)?;
                    writeln!(out, "CEP {}", address.postal_code)?;
                }
                None => writeln!(out, "CEP {cep} não encontrado")?,
            }
        }

        Command::Run {
            answers,
            session_db,
        } => {
            let answers = Answers::load(&answers)?;
            let parts = app::build_parts(config, session_db.as_deref()).await?;
            let outcome = app::run_wizard(parts, &answers, &mut out).await?;
            debug!(?outcome, "run finished");
        }
    }

    out.flush()?;
    Ok(())
}
