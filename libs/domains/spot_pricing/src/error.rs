use thiserror::Error;

/// Result type for spot pricing operations
pub type SpotResult<T> = Result<T, SpotError>;

/// Errors that can occur while resolving, fetching and ranking spot prices
#[derive(Debug, Error)]
pub enum SpotError {
    /// A regular expression fragment failed to compile
    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Invalid option or option combination
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The remote pricing service rejected or failed a request
    #[error("{operation} failed{}: {message}", region_suffix(.region))]
    Provider {
        operation: &'static str,
        region: Option<String>,
        message: String,
    },

    /// The account cannot query this region (opted out or not authorized)
    #[error("access denied in region {region}: {message}")]
    AccessDenied { region: String, message: String },

    /// A regional query exceeded its deadline
    #[error("region {region} did not respond within {seconds}s")]
    Timeout { region: String, seconds: u64 },

    #[error("no regions match '{0}'")]
    NoMatchingRegions(String),

    #[error("no instance types match '{0}'")]
    NoMatchingInstanceTypes(String),

    #[error("no spot instances found")]
    NoQuotes,

    #[error("no spot instances found at or below {0}")]
    NoQuotesAtOrBelow(f64),
}

fn region_suffix(region: &Option<String>) -> String {
    region
        .as_ref()
        .map(|r| format!(" in region {r}"))
        .unwrap_or_default()
}

impl SpotError {
    pub fn provider(operation: &'static str, message: impl Into<String>) -> Self {
        SpotError::Provider {
            operation,
            region: None,
            message: message.into(),
        }
    }

    pub fn regional(operation: &'static str, region: &str, message: impl Into<String>) -> Self {
        SpotError::Provider {
            operation,
            region: Some(region.to_string()),
            message: message.into(),
        }
    }

    /// Opted-out or unauthorized regions are an expected steady state
    pub fn is_access_denied(&self) -> bool {
        matches!(self, SpotError::AccessDenied { .. })
    }

    /// Nothing survived filtering
    pub fn is_empty_result(&self) -> bool {
        matches!(self, SpotError::NoQuotes | SpotError::NoQuotesAtOrBelow(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_names_region() {
        let err = SpotError::regional("DescribeSpotPriceHistory", "eu-west-3", "throttled");
        assert_eq!(
            err.to_string(),
            "DescribeSpotPriceHistory failed in region eu-west-3: throttled"
        );

        let err = SpotError::provider("DescribeRegions", "expired token");
        assert_eq!(err.to_string(), "DescribeRegions failed: expired token");
    }

    #[test]
    fn test_empty_result_messages() {
        assert_eq!(SpotError::NoQuotes.to_string(), "no spot instances found");
        assert_eq!(
            SpotError::NoQuotesAtOrBelow(0.01).to_string(),
            "no spot instances found at or below 0.01"
        );
        assert!(SpotError::NoQuotesAtOrBelow(0.5).is_empty_result());
        assert!(!SpotError::NoQuotes.is_access_denied());
    }
}
