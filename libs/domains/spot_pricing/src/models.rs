use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matcher::PatternSet;

/// One spot price observation, tagged with the region it was queried in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub region: String,
    pub availability_zone: String,
    pub instance_type: String,
    pub product_description: String,
    /// Price exactly as reported, e.g. `"0.009100"`
    pub price: String,
}

impl PriceQuote {
    pub fn from_record(region: &str, record: SpotPriceRecord) -> Self {
        Self {
            region: region.to_string(),
            availability_zone: record.availability_zone,
            instance_type: record.instance_type,
            product_description: record.product_description,
            price: record.spot_price,
        }
    }

    /// Numeric price, `None` if the reported text is not a number
    pub fn price_value(&self) -> Option<f64> {
        parse_price(&self.price)
    }

    /// Row in report column order
    pub fn to_row(&self) -> [&str; 5] {
        [
            self.region.as_str(),
            self.availability_zone.as_str(),
            self.instance_type.as_str(),
            self.product_description.as_str(),
            self.price.as_str(),
        ]
    }
}

/// Report header matching [`PriceQuote::to_row`]
pub const REPORT_HEADER: [&str; 5] = ["Region", "AZ", "Instance", "Desc", "Spot Price"];

pub fn parse_price(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite())
}

/// A row of the remote price history response
#[derive(Debug, Clone, PartialEq)]
pub struct SpotPriceRecord {
    pub availability_zone: String,
    pub instance_type: String,
    pub product_description: String,
    pub spot_price: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One page of the instance-type catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceTypePage {
    pub items: Vec<String>,
    /// Continuation token; `None` on the last page
    pub next_page_token: Option<String>,
}

/// Server-side constraints of a regional price history query
#[derive(Debug, Clone, PartialEq)]
pub struct SpotPriceHistoryRequest {
    pub region: String,
    /// Empty means every instance type
    pub instance_types: Vec<String>,
    /// Empty means every product
    pub products: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Upper bound on the accepted price
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MaxPrice {
    #[default]
    Unbounded,
    /// Inclusive ceiling
    AtMost(f64),
}

impl MaxPrice {
    pub fn ceiling(&self) -> Option<f64> {
        match self {
            MaxPrice::Unbounded => None,
            MaxPrice::AtMost(limit) => Some(*limit),
        }
    }

    /// Whether a reported price passes the ceiling.
    ///
    /// Unparsable prices only pass when there is no ceiling.
    pub fn admits(&self, price: &str) -> bool {
        match self {
            MaxPrice::Unbounded => true,
            MaxPrice::AtMost(limit) => parse_price(price).is_some_and(|p| p <= *limit),
        }
    }
}

impl From<Option<f64>> for MaxPrice {
    fn from(value: Option<f64>) -> Self {
        value.map_or(MaxPrice::Unbounded, MaxPrice::AtMost)
    }
}

/// Read-only filter shared by every regional fetch
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub instance_types: Vec<String>,
    pub products: Vec<String>,
    pub az_patterns: PatternSet,
    pub max_price: MaxPrice,
}

impl QueryFilter {
    /// Client-side checks applied to every returned row
    pub fn admits(&self, record: &SpotPriceRecord) -> bool {
        self.max_price.admits(&record.spot_price)
            && (self.az_patterns.is_empty() || self.az_patterns.is_match(&record.availability_zone))
    }
}

/// Expand product shorthands (`lin`, `red`, `suse`, `win`); anything else
/// is passed through trimmed
pub fn expand_product(product: &str) -> String {
    let product = product.trim();
    match product.to_ascii_lowercase().as_str() {
        "lin" => "Linux/UNIX".to_string(),
        "red" => "Red Hat Enterprise Linux".to_string(),
        "suse" => "SUSE Linux".to_string(),
        "win" => "Windows".to_string(),
        _ => product.to_string(),
    }
}

/// Split a comma list of products, expanding shorthands and dropping blanks
pub fn parse_products(csv: &str) -> Vec<String> {
    csv.split(',')
        .filter(|p| !p.trim().is_empty())
        .map(expand_product)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(az: &str, price: &str) -> SpotPriceRecord {
        SpotPriceRecord {
            availability_zone: az.to_string(),
            instance_type: "t3.micro".to_string(),
            product_description: "Linux/UNIX".to_string(),
            spot_price: price.to_string(),
            timestamp: None,
        }
    }

    #[test]
    fn test_ceiling_is_inclusive() {
        let filter = QueryFilter {
            max_price: MaxPrice::AtMost(0.01),
            ..Default::default()
        };

        let kept: Vec<_> = ["0.02", "0.009", "0.01"]
            .into_iter()
            .map(|p| record("us-east-1a", p))
            .filter(|r| filter.admits(r))
            .map(|r| r.spot_price)
            .collect();

        assert_eq!(kept, vec!["0.009", "0.01"]);
    }

    #[test]
    fn test_az_patterns_select_zones() {
        let filter = QueryFilter {
            az_patterns: PatternSet::parse("[bf]$").unwrap(),
            ..Default::default()
        };

        let kept: Vec<_> = ["us-east-1a", "us-east-1b", "us-east-1f"]
            .into_iter()
            .map(|az| record(az, "0.01"))
            .filter(|r| filter.admits(r))
            .map(|r| r.availability_zone)
            .collect();

        assert_eq!(kept, vec!["us-east-1b", "us-east-1f"]);
    }

    #[test]
    fn test_unparsable_price_only_passes_without_ceiling() {
        assert!(MaxPrice::Unbounded.admits("n/a"));
        assert!(!MaxPrice::AtMost(1.0).admits("n/a"));
        assert!(!MaxPrice::AtMost(1.0).admits("NaN"));
    }

    #[test]
    fn test_product_shorthands() {
        assert_eq!(
            parse_products("lin, RED,suse,win,Linux/UNIX (Amazon VPC),"),
            vec![
                "Linux/UNIX",
                "Red Hat Enterprise Linux",
                "SUSE Linux",
                "Windows",
                "Linux/UNIX (Amazon VPC)",
            ]
        );
    }

    #[test]
    fn test_quote_row_order_matches_header() {
        let quote = PriceQuote::from_record("us-east-1", record("us-east-1a", "0.0035"));
        assert_eq!(
            quote.to_row(),
            ["us-east-1", "us-east-1a", "t3.micro", "Linux/UNIX", "0.0035"]
        );
        assert_eq!(quote.price_value(), Some(0.0035));
        assert_eq!(REPORT_HEADER.len(), quote.to_row().len());
    }
}
