#![forbid(unsafe_code)]

use std::io::Read;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

use oslo_ingest::{Ingestor, Outcome, Warning};
use oslo_model::Catalog;
use oslo_synthetics::SyntheticsCatalog;

#[derive(Parser, Debug)]
#[command(name = "osloctl", version, about = "Decode OpenSLO declarations and resolve cross-references")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a document batch and print the fully resolved model
    Resolve {
        /// Input file ("-" for stdin)
        file: String,
    },
    /// Decode and resolve, reporting diagnostics only
    Lint {
        /// Input file ("-" for stdin)
        file: String,
    },
}

fn init_tracing() {
    let env = std::env::var("OSLO_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {file}"))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Resolved<'a> {
    catalog: &'a Catalog,
    synthetics: &'a SyntheticsCatalog,
    warnings: &'a [Warning],
}

fn load(file: &str) -> Result<(Outcome, SyntheticsCatalog)> {
    let input = read_input(file)?;
    let mut synthetics = SyntheticsCatalog::default();
    let outcome = Ingestor::new()
        .with_extension(&mut synthetics)
        .run(&input)
        .context("resolving document batch")?;
    Ok((outcome, synthetics))
}

fn print_summary(catalog: &Catalog, synthetics: &SyntheticsCatalog, warnings: &[Warning]) {
    let rows = [
        ("DataSource", catalog.data_sources.len()),
        ("Service", catalog.services.len()),
        ("AlertCondition", catalog.alert_conditions.len()),
        ("AlertNotificationTarget", catalog.alert_notification_targets.len()),
        ("AlertPolicy", catalog.alert_policies.len()),
        ("SLI", catalog.slis.len()),
        ("SLO", catalog.slos.len()),
        ("HTTPMonitor", synthetics.http_monitors.len()),
        ("BrowserMonitor", synthetics.browser_monitors.len()),
    ];
    for (kind, count) in rows {
        if count > 0 {
            println!("{kind:<24} {count}");
        }
    }
    for warning in warnings {
        println!("warning: {warning}");
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve { file } => {
            info!(file = %file, "resolve invoked");
            let (outcome, synthetics) = load(&file)?;
            match cli.output {
                Output::Human => print_summary(&outcome.catalog, &synthetics, &outcome.warnings),
                Output::Json => {
                    let resolved = Resolved {
                        catalog: &outcome.catalog,
                        synthetics: &synthetics,
                        warnings: &outcome.warnings,
                    };
                    println!("{}", serde_json::to_string_pretty(&resolved)?);
                }
            }
        }
        Commands::Lint { file } => {
            info!(file = %file, "lint invoked");
            let (outcome, synthetics) = load(&file)?;
            for warning in &outcome.warnings {
                warn!(api_version = %warning.api_version, kind = %warning.kind, "skipped document");
                println!("warning: {warning}");
            }
            println!(
                "ok: {} entities, {} warnings",
                outcome.catalog.len() + synthetics.len(),
                outcome.warnings.len()
            );
        }
    }

    Ok(())
}
