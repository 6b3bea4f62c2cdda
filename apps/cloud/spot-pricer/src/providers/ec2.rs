//! EC2 Spot Price Source
//!
//! Spot price history, region and instance-type listings from the EC2 API.
//! https://docs.aws.amazon.com/AWSEC2/latest/APIReference/API_DescribeSpotPriceHistory.html

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::primitives::DateTime as AwsDateTime;
use aws_sdk_ec2::types::{InstanceType, SpotPrice};
use aws_sdk_ec2::Client;
use chrono::{DateTime, Utc};
use domain_spot_pricing::{
    InstanceTypePage, SpotError, SpotPriceHistoryRequest, SpotPriceRecord, SpotPriceSource,
    SpotResult,
};
use tracing::{debug, info};

use crate::config::AwsSettings;

/// Error codes returned for regions the account cannot use
const ACCESS_DENIED_CODES: &[&str] = &["AuthFailure", "UnauthorizedOperation", "OptInRequired"];

const INSTANCE_TYPE_PAGE_SIZE: i32 = 100;

/// EC2 Spot Price Source
pub struct Ec2SpotPriceSource {
    sdk_config: SdkConfig,
    /// Client for the home region
    client: Client,
    include_opted_out: bool,
}

impl Ec2SpotPriceSource {
    /// Resolve credentials for the configured profile and home region
    pub async fn from_settings(settings: &AwsSettings) -> Self {
        // A failed region is reported, not retried
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.home_region.clone()))
            .retry_config(RetryConfig::disabled());
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        info!(
            profile = settings.profile.as_deref().unwrap_or("default"),
            home_region = %settings.home_region,
            "Loaded AWS configuration"
        );

        Self {
            client: Client::new(&sdk_config),
            sdk_config,
            include_opted_out: settings.include_opted_out,
        }
    }

    fn regional_client(&self, region: &str) -> Client {
        let config = aws_sdk_ec2::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()))
            .build();
        Client::from_conf(config)
    }
}

#[async_trait]
impl SpotPriceSource for Ec2SpotPriceSource {
    async fn describe_regions(&self) -> SpotResult<Vec<String>> {
        let output = self
            .client
            .describe_regions()
            .all_regions(self.include_opted_out)
            .send()
            .await
            .map_err(|e| map_sdk_error("DescribeRegions", None, e))?;

        Ok(output
            .regions()
            .iter()
            .filter_map(|r| r.region_name())
            .map(str::to_string)
            .collect())
    }

    async fn describe_instance_types(
        &self,
        page_token: Option<String>,
    ) -> SpotResult<InstanceTypePage> {
        let output = self
            .client
            .describe_instance_types()
            .max_results(INSTANCE_TYPE_PAGE_SIZE)
            .set_next_token(page_token)
            .send()
            .await
            .map_err(|e| map_sdk_error("DescribeInstanceTypes", None, e))?;

        Ok(InstanceTypePage {
            items: output
                .instance_types()
                .iter()
                .filter_map(|info| info.instance_type())
                .map(|t| t.as_str().to_string())
                .collect(),
            next_page_token: output.next_token().map(str::to_string),
        })
    }

    async fn describe_spot_price_history(
        &self,
        request: SpotPriceHistoryRequest,
    ) -> SpotResult<Vec<SpotPriceRecord>> {
        let client = self.regional_client(&request.region);

        let instance_types = (!request.instance_types.is_empty()).then(|| {
            request
                .instance_types
                .iter()
                .map(|t| InstanceType::from(t.as_str()))
                .collect::<Vec<_>>()
        });
        let products = (!request.products.is_empty()).then(|| request.products.clone());
        let start_time = to_aws_time(request.start_time);
        let end_time = to_aws_time(request.end_time);

        let mut records = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let output = client
                .describe_spot_price_history()
                .set_instance_types(instance_types.clone())
                .set_product_descriptions(products.clone())
                .start_time(start_time)
                .end_time(end_time)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| map_sdk_error("DescribeSpotPriceHistory", Some(request.region.as_str()), e))?;

            pages += 1;
            records.extend(output.spot_price_history().iter().map(to_record));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(
            region = %request.region,
            pages,
            count = records.len(),
            "Fetched spot price history"
        );

        Ok(records)
    }
}

fn to_aws_time(time: DateTime<Utc>) -> AwsDateTime {
    AwsDateTime::from_secs(time.timestamp())
}

fn to_record(price: &SpotPrice) -> SpotPriceRecord {
    SpotPriceRecord {
        availability_zone: price.availability_zone().unwrap_or_default().to_string(),
        instance_type: price
            .instance_type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        product_description: price
            .product_description()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default(),
        spot_price: price.spot_price().unwrap_or_default().to_string(),
        timestamp: price
            .timestamp()
            .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
    }
}

fn is_access_denied(code: Option<&str>) -> bool {
    code.is_some_and(|code| ACCESS_DENIED_CODES.contains(&code))
}

/// Regional access failures become `AccessDenied`; everything else is a
/// provider error carrying the full SDK error chain
fn map_sdk_error<E, R>(operation: &'static str, region: Option<&str>, err: SdkError<E, R>) -> SpotError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();

    match region {
        Some(region) if is_access_denied(err.code()) => SpotError::AccessDenied {
            region: region.to_string(),
            message,
        },
        Some(region) => SpotError::regional(operation, region, message),
        None => SpotError::provider(operation, message),
    }
}
