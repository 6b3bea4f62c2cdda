//! Final report ordering.
//!
//! Quotes are sorted twice with a stable sort: first by availability zone,
//! then by the primary field. Rows tied on the primary field keep their
//! zone order.

use strum::{Display, EnumString};
use tracing::warn;

use crate::models::PriceQuote;

/// Primary ordering of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortField {
    Region,
    Az,
    Instance,
    Product,
    #[default]
    Price,
}

/// Rank by price ascending, availability zone breaking ties
pub fn rank(quotes: Vec<PriceQuote>) -> Vec<PriceQuote> {
    rank_by(quotes, SortField::Price)
}

pub fn rank_by(mut quotes: Vec<PriceQuote>, primary: SortField) -> Vec<PriceQuote> {
    quotes.sort_by(|a, b| a.availability_zone.cmp(&b.availability_zone));

    match primary {
        SortField::Price => sort_by_price(quotes),
        SortField::Az => quotes,
        SortField::Region => {
            quotes.sort_by(|a, b| a.region.cmp(&b.region));
            quotes
        }
        SortField::Instance => {
            quotes.sort_by(|a, b| a.instance_type.cmp(&b.instance_type));
            quotes
        }
        SortField::Product => {
            quotes.sort_by(|a, b| a.product_description.cmp(&b.product_description));
            quotes
        }
    }
}

/// Numeric price sort; unparsable prices count as zero
fn sort_by_price(quotes: Vec<PriceQuote>) -> Vec<PriceQuote> {
    let mut keyed: Vec<(f64, PriceQuote)> = quotes
        .into_iter()
        .map(|quote| {
            let price = quote.price_value().unwrap_or_else(|| {
                warn!(
                    region = %quote.region,
                    availability_zone = %quote.availability_zone,
                    price = %quote.price,
                    "Unparsable spot price, ranking as zero"
                );
                0.0
            });
            (price, quote)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    keyed.into_iter().map(|(_, quote)| quote).collect()
}
