//! Report rendering
//!
//! Quotes arrive already ranked; this module only lays them out.

use clap::ValueEnum;
use domain_spot_pricing::{PriceQuote, ResolvedRegions, REPORT_HEADER};
use std::io::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("nothing to display")]
    NothingToDisplay,

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Tabled)]
struct QuoteRow<'a> {
    #[tabled(rename = "Region")]
    region: &'a str,
    #[tabled(rename = "AZ")]
    availability_zone: &'a str,
    #[tabled(rename = "Instance")]
    instance_type: &'a str,
    #[tabled(rename = "Desc")]
    product_description: &'a str,
    #[tabled(rename = "Spot Price")]
    price: &'a str,
}

impl<'a> From<&'a PriceQuote> for QuoteRow<'a> {
    fn from(quote: &'a PriceQuote) -> Self {
        let [region, availability_zone, instance_type, product_description, price] =
            quote.to_row();
        Self {
            region,
            availability_zone,
            instance_type,
            product_description,
            price,
        }
    }
}

/// Render quotes in the requested format.
///
/// Zero quotes is reported back as [`ReportError::NothingToDisplay`]
/// instead of an empty table.
pub fn render<W: Write>(
    format: OutputFormat,
    quotes: &[PriceQuote],
    out: &mut W,
) -> Result<(), ReportError> {
    if quotes.is_empty() {
        return Err(ReportError::NothingToDisplay);
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new(quotes.iter().map(QuoteRow::from));
            table.with(Style::modern());
            writeln!(out, "{table}")?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            writer.write_record(REPORT_HEADER)?;
            for quote in quotes {
                writer.write_record(quote.to_row())?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, quotes)?;
            writeln!(out)?;
        }
    }

    Ok(())
}

/// List-only output: every available region (selected ones starred), then
/// the resolved instance types
pub fn render_listing<W: Write>(
    regions: &ResolvedRegions,
    instance_types: &[String],
    out: &mut W,
) -> Result<(), ReportError> {
    writeln!(
        out,
        "Regions ({} of {} selected):",
        regions.selected.len(),
        regions.available.len()
    )?;
    for region in &regions.available {
        let marker = if regions.selected.contains(region) { '*' } else { ' ' };
        writeln!(out, "{marker} {region}")?;
    }

    writeln!(out)?;
    writeln!(out, "Instance types ({}):", instance_types.len())?;
    for instance_type in instance_types {
        writeln!(out, "  {instance_type}")?;
    }

    Ok(())
}
