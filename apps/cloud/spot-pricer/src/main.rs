//! Spot Pricer
//!
//! Queries AWS spot instance prices in every matching region concurrently,
//! filters them and prints one report ordered by price.

use clap::{ArgAction, Parser};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_spot_pricing::{rank_by, SortField, SpotError, SpotPriceService};
use eyre::Result;
use observability::RunTimer;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

mod config;
mod providers;
mod report;
mod snapshot;

use config::{Config, RunMode};
use providers::Ec2SpotPriceSource;
use report::{OutputFormat, ReportError};

#[derive(Parser, Debug)]
#[command(name = "spotprice", version)]
#[command(about = "Get AWS spot instance pricing across regions")]
#[command(
    after_help = "Required EC2 IAM permissions: DescribeRegions, DescribeInstanceTypes, DescribeSpotPriceHistory"
)]
struct Cli {
    /// Named AWS profile used for credentials
    #[arg(short, long, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Comma-separated regular expressions matching regions (eg: us-.*,eu-west-1)
    #[arg(short = 'r', long = "reg", env = "SPOTPRICE_REGIONS", default_value = "")]
    regions: String,

    /// Comma-separated regular expressions matching availability zones (eg: [bf]$)
    #[arg(short = 'a', long = "az", default_value = "")]
    azs: String,

    /// Comma-separated exact instance types (eg: t3.micro,c5.large)
    #[arg(short = 'i', long = "inst", default_value = "")]
    instance_types: String,

    /// Comma-separated regular expressions matched against the instance-type catalog
    #[arg(short = 'x', long = "inst-regex", default_value = "")]
    instance_type_patterns: String,

    /// Comma-separated products; shorthands: lin, red, suse, win
    #[arg(short = 'd', long = "desc", default_value = "")]
    products: String,

    /// Only show prices at or below this value
    #[arg(short = 'm', long = "max", env = "SPOTPRICE_MAX_PRICE")]
    max_price: Option<f64>,

    /// Primary sort column: price, az, region, instance, product
    #[arg(short = 's', long, default_value = "price")]
    sort: SortField,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// List resolved regions and instance types without querying prices
    #[arg(short, long)]
    list: bool,

    /// Include regions the account has not opted into
    #[arg(long)]
    all_regions: bool,

    /// Give up on a region after this many seconds
    #[arg(long, value_name = "SECS")]
    region_timeout: Option<u64>,

    /// Save the ranked quotes as a JSON snapshot
    #[arg(long, value_name = "PATH", conflicts_with = "replay")]
    save: Option<PathBuf>,

    /// Render a saved snapshot instead of querying AWS
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Print Prometheus metrics to stderr when done
    #[arg(long)]
    metrics: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    install_color_eyre();

    let config = Config::from_cli(Cli::parse())?;
    init_tracing(&config.environment, config.verbosity);

    if config.show_metrics {
        observability::init_metrics()?;
    }

    let outcome = run(&config).await;

    if config.show_metrics {
        eprint!("{}", observability::render_metrics());
    }

    match outcome {
        Err(e) if is_empty_result(&e) => {
            eprintln!("\nError: {e}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e),
        Ok(()) => Ok(ExitCode::SUCCESS),
    }
}

async fn run(config: &Config) -> Result<()> {
    let mut timer = RunTimer::start(config.mode.label());

    let quotes = match &config.mode {
        RunMode::ListOnly => return list(config).await,
        RunMode::Replay(path) => rank_by(snapshot::load(path)?, config.query.sort),
        RunMode::Query => {
            info!(mode = config.mode.label(), "Starting spot price query");
            service(config).await.query_prices(&config.query).await?
        }
    };

    if let Some(path) = &config.save_snapshot {
        snapshot::save(path, &quotes)?;
    }

    let mut out = std::io::stdout().lock();
    report::render(config.output, &quotes, &mut out)?;
    out.flush()?;

    let elapsed = timer.stop();
    info!(count = quotes.len(), elapsed_ms = elapsed.as_millis() as u64, "Report complete");
    if config.output == OutputFormat::Table {
        eprintln!("\nelapsed time : {elapsed:.2?}");
    }

    Ok(())
}

async fn list(config: &Config) -> Result<()> {
    let service = service(config).await;
    let regions = service.resolve_regions(config.query.regions.as_ref()).await?;

    let instance_types = if config.query.instance_type_patterns.is_some()
        || !config.query.instance_types.is_empty()
    {
        service.build_filter(&config.query).await?.instance_types
    } else {
        service.resolve_instance_types(None).await?
    };

    let mut out = std::io::stdout().lock();
    report::render_listing(&regions, &instance_types, &mut out)?;
    out.flush()?;
    Ok(())
}

async fn service(config: &Config) -> SpotPriceService<Ec2SpotPriceSource> {
    SpotPriceService::new(Ec2SpotPriceSource::from_settings(&config.aws).await)
        .with_region_timeout(config.region_timeout)
}

/// "Nothing found" ends the run with a short message rather than a report
fn is_empty_result(error: &eyre::Report) -> bool {
    error
        .downcast_ref::<SpotError>()
        .is_some_and(SpotError::is_empty_result)
        || matches!(
            error.downcast_ref::<ReportError>(),
            Some(ReportError::NothingToDisplay)
        )
}
