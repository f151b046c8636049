//! CLI entry point for the BODS data extractor.
//!
//! Provides subcommands for downloading the OTC registered bus services
//! database and for pulling a filtered timetable extract from the BODS API
//! together with its data-quality reports.

use anyhow::{Context, Result};
use bods_extractor::bods::{BodsClient, TimetableConfig};
use bods_extractor::fetch::BasicClient;
use bods_extractor::otc::{fetch_otc_db, save_otc_db};
use bods_extractor::{output, reports};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bods_extractor")]
#[command(about = "A tool to extract and analyze UK bus open data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and merge the OTC registered bus services database
    FetchOtc {
        /// Save the merged dataset as CSV in a dated folder
        #[arg(short, long, default_value_t = false)]
        save: bool,

        /// Folder to save into (defaults to the platform downloads folder)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Fetch a timetable extract from the BODS API and report on its quality
    Metadata {
        /// Publication status filter (e.g. "published")
        #[arg(long)]
        status: Option<String>,

        /// Operator NOC code to filter to (repeatable)
        #[arg(long = "noc")]
        nocs: Vec<String>,

        /// Keep only records with this BODS-compliance flag
        #[arg(long)]
        bods_compliant: Option<bool>,

        /// Also save the flattened service-line extract
        #[arg(long, default_value_t = false)]
        service_line_level: bool,

        /// Also save one timetable CSV per dataset
        #[arg(long, default_value_t = false)]
        stop_level: bool,

        /// Report operators with a data-quality score below this percentage
        #[arg(long, default_value_t = 90.0)]
        dq_threshold: f64,

        /// TXC schema version to report adoption of
        #[arg(long, default_value = "2.4")]
        txc_version: String,

        /// Save the extract as CSV in a dated folder
        #[arg(short, long, default_value_t = false)]
        save: bool,

        /// Folder to save into (defaults to the platform downloads folder)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bods_extractor.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bods_extractor.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::FetchOtc { save, output_dir } => {
            let client = BasicClient::new()?;
            // One date labels this whole run's output.
            let date = Utc::now().date_naive();

            let db = if save {
                save_otc_db(&client, date, output_dir.as_deref()).await?
            } else {
                fetch_otc_db(&client).await?
            };

            info!(
                rows = db.row_count(),
                columns = db.headers.len(),
                "OTC database ready"
            );
        }
        Commands::Metadata {
            status,
            nocs,
            bods_compliant,
            service_line_level,
            stop_level,
            dq_threshold,
            txc_version,
            save,
            output_dir,
        } => {
            let api_key = std::env::var("BODS_API_KEY")
                .context("BODS_API_KEY must be set (in the environment or a .env file)")?;
            let client = BodsClient::new(api_key)?;

            let config = TimetableConfig {
                status,
                service_line_level,
                stop_level,
                nocs,
                bods_compliant,
            };
            let extract = client.fetch_extract(&config).await?;

            report(&extract, dq_threshold, &txc_version);

            if save {
                let date = Utc::now().date_naive();
                let folder = output::ensure_dated_folder(output_dir.as_deref(), date)?;

                let metadata_path = folder.join(format!("metadata_{date}.csv"));
                output::write_table(&metadata_path, &extract.metadata_table())?;
                info!(path = %metadata_path.display(), "Metadata saved");

                let timetables = extract.timetables();

                if config.service_line_level {
                    let path = folder.join(format!("service_line_extract_{date}.csv"));
                    output::write_table(&path, &timetables.merged()?)?;
                    info!(path = %path.display(), "Service line extract saved");
                }

                if config.stop_level {
                    for (id, table) in timetables.iter() {
                        let path = folder.join(format!("timetable_{id}_{date}.csv"));
                        output::write_table(&path, table)?;
                    }
                    info!(datasets = timetables.len(), "Timetables saved");
                }
            }
        }
    }

    Ok(())
}

/// Logs the data-quality report for an extract.
fn report(extract: &bods_extractor::bods::TimetableExtract, dq_threshold: f64, txc_version: &str) {
    info!(
        datasets = extract.records.len(),
        operators = reports::count_operators(extract),
        service_codes = reports::count_service_codes(extract),
        "Extract summary"
    );

    let (valid, _, invalid) = reports::valid_service_codes(extract);
    info!(
        valid_service_codes = valid,
        invalid_rows = invalid.len(),
        "Service code validity"
    );

    let (service_pct, _, _) = reports::services_in_txc_schema(extract, txc_version);
    let (dataset_pct, _, _) = reports::datasets_in_txc_schema(extract, txc_version);
    info!(
        txc_version,
        service_pct = format!("{service_pct:.1}%"),
        dataset_pct = format!("{dataset_pct:.1}%"),
        "TXC schema adoption"
    );

    info!(
        red_dq = reports::red_dq_scores(extract),
        "Datasets with red data-quality rating"
    );

    let below = reports::dq_less_than(extract, dq_threshold);
    info!(
        threshold = dq_threshold,
        operators = ?below,
        "Operators below data-quality threshold"
    );

    let missing = reports::no_licence_number(extract);
    info!(
        rows = missing.len(),
        "Service lines without a licence number"
    );
}
