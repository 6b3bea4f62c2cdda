use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{SpotError, SpotResult};
use crate::models::{InstanceTypePage, SpotPriceHistoryRequest, SpotPriceRecord};

/// Remote pricing service
///
/// The three calls the pipeline depends on. Credentials and transport are
/// the implementation's concern.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    /// Identifiers of every region the account can see
    async fn describe_regions(&self) -> SpotResult<Vec<String>>;

    /// One page of instance-type names; pass the previous page's token to continue
    async fn describe_instance_types(
        &self,
        page_token: Option<String>,
    ) -> SpotResult<InstanceTypePage>;

    /// Price history rows for one region, constrained server-side
    async fn describe_spot_price_history(
        &self,
        request: SpotPriceHistoryRequest,
    ) -> SpotResult<Vec<SpotPriceRecord>>;
}

#[derive(Debug, Default)]
struct Fixtures {
    regions: Vec<String>,
    instance_type_pages: Vec<Vec<String>>,
    failing_page: Option<usize>,
    records: HashMap<String, Vec<SpotPriceRecord>>,
    denied_regions: Vec<String>,
    failing_regions: Vec<String>,
    history_requests: Vec<SpotPriceHistoryRequest>,
}

/// In-memory implementation of SpotPriceSource (for development/testing)
///
/// Page tokens are the page index as text.
#[derive(Debug, Default, Clone)]
pub struct InMemorySpotPriceSource {
    fixtures: Arc<RwLock<Fixtures>>,
}

impl InMemorySpotPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_regions<I, S>(&self, regions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixtures.write().await.regions = regions.into_iter().map(Into::into).collect();
    }

    pub async fn push_instance_type_page<I, S>(&self, page: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixtures
            .write()
            .await
            .instance_type_pages
            .push(page.into_iter().map(Into::into).collect());
    }

    /// Make the page at `index` fail
    pub async fn fail_page(&self, index: usize) {
        self.fixtures.write().await.failing_page = Some(index);
    }

    pub async fn add_record(&self, region: &str, record: SpotPriceRecord) {
        self.fixtures
            .write()
            .await
            .records
            .entry(region.to_string())
            .or_default()
            .push(record);
    }

    /// Queries for `region` fail as an opted-out region would
    pub async fn deny_region(&self, region: &str) {
        self.fixtures.write().await.denied_regions.push(region.to_string());
    }

    /// Queries for `region` fail with a provider error
    pub async fn fail_region(&self, region: &str) {
        self.fixtures.write().await.failing_regions.push(region.to_string());
    }

    /// Every price history request received so far
    pub async fn history_requests(&self) -> Vec<SpotPriceHistoryRequest> {
        self.fixtures.read().await.history_requests.clone()
    }
}

#[async_trait]
impl SpotPriceSource for InMemorySpotPriceSource {
    async fn describe_regions(&self) -> SpotResult<Vec<String>> {
        Ok(self.fixtures.read().await.regions.clone())
    }

    async fn describe_instance_types(
        &self,
        page_token: Option<String>,
    ) -> SpotResult<InstanceTypePage> {
        let fixtures = self.fixtures.read().await;

        let index = match page_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                SpotError::provider("DescribeInstanceTypes", format!("invalid page token '{token}'"))
            })?,
            None => 0,
        };

        if fixtures.failing_page == Some(index) {
            return Err(SpotError::provider(
                "DescribeInstanceTypes",
                format!("page {index} unavailable"),
            ));
        }

        let items = fixtures
            .instance_type_pages
            .get(index)
            .cloned()
            .unwrap_or_default();
        let next_page_token =
            (index + 1 < fixtures.instance_type_pages.len()).then(|| (index + 1).to_string());

        Ok(InstanceTypePage {
            items,
            next_page_token,
        })
    }

    async fn describe_spot_price_history(
        &self,
        request: SpotPriceHistoryRequest,
    ) -> SpotResult<Vec<SpotPriceRecord>> {
        let mut fixtures = self.fixtures.write().await;
        fixtures.history_requests.push(request.clone());

        let region = request.region.as_str();
        if fixtures.denied_regions.iter().any(|r| r == region) {
            return Err(SpotError::AccessDenied {
                region: region.to_string(),
                message: "AuthFailure: region is not enabled for this account".to_string(),
            });
        }
        if fixtures.failing_regions.iter().any(|r| r == region) {
            return Err(SpotError::regional(
                "DescribeSpotPriceHistory",
                region,
                "service unavailable",
            ));
        }

        let records = fixtures
            .records
            .get(region)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| {
                        request.instance_types.is_empty()
                            || request.instance_types.contains(&r.instance_type)
                    })
                    .filter(|r| {
                        request.products.is_empty()
                            || request.products.contains(&r.product_description)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(records)
    }
}
