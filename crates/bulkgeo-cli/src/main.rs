//! Command-line interface for `bulkgeo`, bulk forward and reverse geocoding of
//! vector feature tables.
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for structured
//! logging. It parses arguments, configures logging and delegates to the
//! [`bulkgeo_core`] operations.
//!
//! # Available Commands
//!
//! - `geocode` - Resolve an address attribute of every record to points
//! - `reverse` - Resolve the centroid of every feature to a place description
//! - `drivers` - List all available format drivers and their capabilities

mod display;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{Level, debug, info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use bulkgeo_core::common::Crs;
use bulkgeo_core::drivers::{
    CsvReadOptions, Driver, FileSinkFactory, get_available_drivers, get_drivers,
    list_drivers_with_capability, read_records, resolve_driver,
};
use bulkgeo_core::error::{ConfigError, GeocodeError};
use bulkgeo_core::feedback::LogFeedback;
use bulkgeo_core::operations::{
    DEFAULT_PLACE_FIELD, ForwardOptions, ReverseOptions, bulk_geocode, bulk_reverse_geocode,
};
use bulkgeo_core::resolver::{
    DEFAULT_ENDPOINT, GazetteerOptions, GazetteerResolver, NominatimConfig, NominatimResolver,
    Resolver,
};
use bulkgeo_core::types::BulkReport;

#[derive(Parser)]
#[command(
    name = "bulkgeo",
    version,
    about = "Bulk forward and reverse geocoding of vector feature tables",
    long_about = "bulkgeo resolves an address attribute of every record to points, or the \n\
                  centroid of every feature to a place description, using a Nominatim \n\
                  service or an offline gazetteer."
)]
/// Command-line arguments and options for the `bulkgeo` CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `bulkgeo` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Resolves an address attribute of every record to point features.
    Geocode {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Attribute holding the address to resolve.
        #[arg(short, long, value_name = "FIELD")]
        address_field: String,

        /// Name of the appended place attribute (suffixed when taken).
        #[arg(long, value_name = "FIELD", default_value = DEFAULT_PLACE_FIELD)]
        place_field: String,

        /// CRS of the output points (e.g. "EPSG:3857").
        #[arg(long, value_name = "CRS", default_value = "EPSG:4326")]
        target_crs: Crs,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Resolves the centroid of every feature to a place description.
    Reverse {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Name of the appended place attribute (suffixed when taken).
        #[arg(long, value_name = "FIELD", default_value = DEFAULT_PLACE_FIELD)]
        place_field: String,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Lists all available drivers and their capabilities.
    Drivers {
        /// Include drivers whose support is only planned.
        #[arg(long)]
        all: bool,

        /// Only drivers that can read.
        #[arg(long, conflicts_with = "all")]
        read: bool,

        /// Only drivers that can write.
        #[arg(long, conflicts_with = "all")]
        write: bool,
    },
}

/// Where records are read from.
#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// Path to the input dataset.
    #[arg(short, long, value_name = "DATASET")]
    input: PathBuf,

    /// Driver for reading the input (inferred from the extension when omitted).
    #[arg(long, value_name = "DRIVER")]
    input_driver: Option<String>,

    /// CSV column holding WKT geometries.
    #[arg(long, value_name = "COLUMN", conflicts_with_all = ["x_field", "y_field"])]
    wkt_column: Option<String>,

    /// CSV column holding X / longitude values.
    #[arg(long, value_name = "COLUMN", requires = "y_field")]
    x_field: Option<String>,

    /// CSV column holding Y / latitude values.
    #[arg(long, value_name = "COLUMN", requires = "x_field")]
    y_field: Option<String>,

    /// CSV field delimiter (default: tab for .tsv files, comma otherwise).
    #[arg(long, value_name = "CHAR")]
    delimiter: Option<char>,

    /// CRS of the input geometries when the format does not declare one.
    #[arg(long, value_name = "CRS")]
    source_crs: Option<Crs>,
}

/// Where resolved features are written.
#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Path for the output dataset.
    #[arg(short, long, value_name = "DATASET")]
    output: PathBuf,

    /// Driver for writing the output (inferred from the extension when omitted).
    #[arg(long, value_name = "DRIVER")]
    output_driver: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    /// Nominatim HTTP API
    Nominatim,
    /// Offline CSV gazetteer
    Gazetteer,
}

/// Which resolver answers the lookups.
#[derive(Args, Debug, Clone)]
struct ProviderArgs {
    /// Geocoding provider.
    #[arg(long, value_enum, default_value_t = Provider::Nominatim)]
    provider: Provider,

    /// Nominatim base URL.
    #[arg(long, env = "BULKGEO_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// User-Agent sent to Nominatim.
    #[arg(long, env = "BULKGEO_USER_AGENT")]
    user_agent: Option<String>,

    /// Contact email sent to Nominatim.
    #[arg(long, env = "BULKGEO_EMAIL")]
    email: Option<String>,

    /// Preferred language of place descriptions (e.g. "it").
    #[arg(long, value_name = "LANG")]
    language: Option<String>,

    /// Maximum number of results per address.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    limit: Option<u32>,

    /// Gazetteer CSV with name, lon, lat and optional address columns.
    #[arg(long, value_name = "FILE")]
    gazetteer: Option<PathBuf>,

    /// Reverse lookups farther than this many metres find nothing (gazetteer only).
    #[arg(long, value_name = "METRES")]
    max_distance: Option<f64>,
}

/// Entry point for the `bulkgeo` command-line interface.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity flags
    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Err(err) = run(cli.command).await {
        report_failure(&err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Geocode {
            input,
            output,
            address_field,
            place_field,
            target_crs,
            provider,
        } => {
            info!("Geocoding {} to {}", input.input.display(), output.output.display());
            let options = ForwardOptions::new(address_field)
                .with_place_field(place_field)
                .with_target_crs(target_crs);
            let report = handle_geocode(&input, &output, &options, &provider).await?;
            print_summary(&report);
        },
        Commands::Reverse {
            input,
            output,
            place_field,
            provider,
        } => {
            info!(
                "Reverse geocoding {} to {}",
                input.input.display(),
                output.output.display()
            );
            let options = ReverseOptions::new().with_place_field(place_field);
            let report = handle_reverse(&input, &output, &options, &provider).await?;
            print_summary(&report);
        },
        Commands::Drivers { all, read, write } => {
            handle_drivers(all, read, write);
        },
    }
    Ok(())
}

/// Print the error, and a recovery hint when one is known, to stderr.
fn report_failure(err: &anyhow::Error) {
    match err.downcast_ref::<GeocodeError>() {
        Some(geocode_error) => {
            debug!("{geocode_error:?}");
            eprintln!("Error: {}", geocode_error.user_message());
            if let Some(suggestion) = geocode_error.recovery_suggestion() {
                eprintln!("Hint: {suggestion}");
            }
        },
        None => eprintln!("Error: {err:#}"),
    }
}

fn csv_read_options(args: &InputArgs) -> Result<CsvReadOptions> {
    let mut options = CsvReadOptions::new();
    if let Some(delimiter) = args.delimiter {
        let byte = Some(delimiter)
            .filter(char::is_ascii)
            .and_then(|c| u8::try_from(c).ok())
            .ok_or_else(|| {
                GeocodeError::from(ConfigError::InvalidOption {
                    option: "--delimiter".to_string(),
                    message: format!("'{delimiter}' is not a single-byte character"),
                })
            })?;
        options = options.with_delimiter(byte);
    }

    if let Some(column) = &args.wkt_column {
        options = options.with_wkt_column(column.clone());
    } else if let (Some(x), Some(y)) = (&args.x_field, &args.y_field) {
        options = options.with_xy_columns(x.clone(), y.clone());
    }
    if let Some(crs) = args.source_crs {
        options = options.with_crs(crs);
    }
    Ok(options)
}

fn build_resolver(args: &ProviderArgs) -> Result<Box<dyn Resolver>> {
    match args.provider {
        Provider::Nominatim => {
            let mut config = NominatimConfig::new().with_endpoint(args.endpoint.clone());
            if let Some(user_agent) = &args.user_agent {
                config = config.with_user_agent(user_agent.clone());
            }
            if let Some(email) = &args.email {
                config = config.with_email(email.clone());
            }
            if let Some(language) = &args.language {
                config = config.with_accept_language(language.clone());
            }
            if let Some(limit) = args.limit {
                config = config.with_limit(limit);
            }
            if args.max_distance.is_some() {
                warn!("--max-distance only applies to the gazetteer provider");
            }
            debug!("Nominatim endpoint: {}", config.endpoint);
            Ok(Box::new(NominatimResolver::new(config)?))
        },
        Provider::Gazetteer => {
            let path = args.gazetteer.as_ref().ok_or_else(|| {
                GeocodeError::from(ConfigError::MissingRequired {
                    option: "--gazetteer (required by --provider gazetteer)".to_string(),
                })
            })?;
            let mut options = GazetteerOptions::new();
            if let Some(limit) = args.limit {
                options = options.with_limit(limit as usize);
            }
            if let Some(metres) = args.max_distance {
                options = options.with_max_distance(metres);
            }
            let gazetteer = GazetteerResolver::from_path(path, options)?;
            info!("Loaded {} gazetteer entries from {}", gazetteer.len(), path.display());
            Ok(Box::new(gazetteer))
        },
    }
}

/// Exit status after a second Ctrl-C (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancel flag set by the first Ctrl-C; the run stops after the current record.
/// A second Ctrl-C exits immediately.
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupted, finishing the current record (Ctrl-C again to abort)");
        handler_flag.store(true, Ordering::Relaxed);

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Aborted");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
    flag
}

fn output_factory(args: &OutputArgs) -> Result<FileSinkFactory> {
    let driver = resolve_driver(args.output_driver.as_deref(), &args.output)?;
    Ok(FileSinkFactory::new(&args.output, driver)?)
}

fn open_input(args: &InputArgs) -> Result<bulkgeo_core::common::RecordTable> {
    let driver = resolve_driver(args.input_driver.as_deref(), &args.input)?;
    let mut table = read_records(&args.input, &driver, &csv_read_options(args)?)?;
    if table.crs.is_none() {
        table.crs = args.source_crs;
    }
    Ok(table)
}

async fn handle_geocode(
    input: &InputArgs,
    output: &OutputArgs,
    options: &ForwardOptions,
    provider: &ProviderArgs,
) -> Result<BulkReport> {
    let resolver = build_resolver(provider)?;
    let factory = output_factory(output)?;
    let source = open_input(input)?;

    let mut feedback = LogFeedback::new().with_cancel_flag(cancel_on_ctrl_c());
    let report = bulk_geocode(&source, resolver.as_ref(), options, &factory, &mut feedback).await?;
    Ok(report)
}

async fn handle_reverse(
    input: &InputArgs,
    output: &OutputArgs,
    options: &ReverseOptions,
    provider: &ProviderArgs,
) -> Result<BulkReport> {
    let resolver = build_resolver(provider)?;
    let factory = output_factory(output)?;
    let source = open_input(input)?;

    let mut feedback = LogFeedback::new().with_cancel_flag(cancel_on_ctrl_c());
    let report =
        bulk_reverse_geocode(&source, resolver.as_ref(), options, &factory, &mut feedback).await?;
    Ok(report)
}

fn print_summary(report: &BulkReport) {
    println!("{}", display::summary_table(report));
    if report.no_match + report.failed > 0 {
        warn!(
            "{} record(s) without match, {} failed; run with -v for details",
            report.no_match, report.failed
        );
    }
}

fn select_drivers(all: bool, read: bool, write: bool) -> Vec<Driver> {
    if read || write {
        list_drivers_with_capability(read, write)
    } else if all {
        get_drivers()
            .into_iter()
            .filter(|d| d.capabilities.has_any_support())
            .collect()
    } else {
        get_available_drivers()
    }
}

/// Handles the `drivers` subcommand by displaying a table of available drivers.
fn handle_drivers(all: bool, read: bool, write: bool) {
    let drivers = select_drivers(all, read, write);
    println!("\nAvailable Drivers ({} total):\n", drivers.len());
    println!("{}", display::drivers_table(&drivers));
}
