//! Configuration for the spot price tool
//!
//! Built once from the command line and environment, then passed by
//! reference to everything else. Every pattern is compiled here, so a bad
//! expression fails before any remote call.

use core_config::{env_flag, env_optional, env_or_default, ConfigError, Environment, FromEnv};
use domain_spot_pricing::{parse_products, MaxPrice, PatternSet, PriceQuery, SpotError, SpotResult};
use std::path::PathBuf;
use std::time::Duration;

use crate::report::OutputFormat;
use crate::Cli;

/// Region used for account-level calls (region and catalog listing)
const DEFAULT_HOME_REGION: &str = "us-east-1";

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub verbosity: u8,
    pub aws: AwsSettings,
    pub query: PriceQuery,
    pub mode: RunMode,
    pub output: OutputFormat,
    pub region_timeout: Option<Duration>,
    pub save_snapshot: Option<PathBuf>,
    pub show_metrics: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Fetch, filter, rank and render prices
    Query,
    /// Only report resolved regions and instance types
    ListOnly,
    /// Render a saved snapshot without remote calls
    Replay(PathBuf),
}

impl RunMode {
    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Query => "query",
            RunMode::ListOnly => "list",
            RunMode::Replay(_) => "replay",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsSettings {
    /// Named profile; `None` uses the default credential chain
    pub profile: Option<String>,
    /// Region for account-level calls
    pub home_region: String,
    /// Also list regions the account has not opted into
    pub include_opted_out: bool,
}

impl FromEnv for AwsSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(AwsSettings {
            profile: env_optional("AWS_PROFILE"),
            home_region: env_or_default("AWS_REGION", DEFAULT_HOME_REGION),
            include_opted_out: env_flag("SPOTPRICE_ALL_REGIONS", false)?,
        })
    }
}

impl Config {
    pub fn from_cli(cli: Cli) -> SpotResult<Self> {
        let mut aws = <AwsSettings as FromEnv>::from_env()
            .map_err(|e| SpotError::Configuration(e.to_string()))?;
        if cli.profile.is_some() {
            aws.profile = cli.profile;
        }
        aws.include_opted_out |= cli.all_regions;

        let max_price = match cli.max_price {
            Some(price) if !price.is_finite() || price < 0.0 => {
                return Err(SpotError::Configuration(format!(
                    "maximum price must be a non-negative number, got {price}"
                )));
            }
            other => MaxPrice::from(other),
        };

        let region_timeout = match cli.region_timeout {
            Some(0) => {
                return Err(SpotError::Configuration(
                    "region timeout must be at least one second".to_string(),
                ));
            }
            other => other.map(Duration::from_secs),
        };

        let query = PriceQuery {
            regions: PatternSet::parse_optional(Some(cli.regions.to_lowercase().as_str()))?,
            instance_types: split_list(&cli.instance_types),
            instance_type_patterns: PatternSet::parse_optional(Some(cli.instance_type_patterns.as_str()))?,
            products: parse_products(&cli.products),
            az_patterns: PatternSet::parse(&cli.azs)?,
            max_price,
            sort: cli.sort,
        };

        let mode = match (cli.list, cli.replay) {
            (true, Some(_)) => {
                return Err(SpotError::Configuration(
                    "--list and --replay cannot be combined".to_string(),
                ));
            }
            (true, None) => RunMode::ListOnly,
            (false, Some(path)) => RunMode::Replay(path),
            (false, None) => RunMode::Query,
        };

        Ok(Config {
            environment: Environment::from_env(),
            verbosity: cli.verbose,
            aws,
            query,
            mode,
            output: cli.output,
            region_timeout,
            save_snapshot: cli.save,
            show_metrics: cli.metrics,
        })
    }
}

/// Comma list of exact names, trimmed, blanks dropped
fn split_list(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
