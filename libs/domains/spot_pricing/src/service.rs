use chrono::{DateTime, TimeDelta, Utc};
use observability::SpotMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{SpotError, SpotResult};
use crate::matcher::{dedup_preserving_order, PatternSet};
use crate::models::{MaxPrice, PriceQuote, QueryFilter, SpotPriceHistoryRequest};
use crate::ranker::{rank_by, SortField};
use crate::source::SpotPriceSource;

/// Width of the price history window ending at "now". Spot prices are
/// near real time; older rows are history, not the current price.
const PRICE_WINDOW_SECONDS: i64 = 60;

/// Regions known to the provider and the subset selected for querying
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedRegions {
    /// Sorted, distinct
    pub available: Vec<String>,
    /// Match order, distinct
    pub selected: Vec<String>,
}

/// Everything a price query needs, built once from user input
#[derive(Debug, Clone, Default)]
pub struct PriceQuery {
    pub regions: Option<PatternSet>,
    /// Exact instance type names
    pub instance_types: Vec<String>,
    /// Resolved against the catalog and merged into `instance_types`
    pub instance_type_patterns: Option<PatternSet>,
    pub products: Vec<String>,
    pub az_patterns: PatternSet,
    pub max_price: MaxPrice,
    pub sort: SortField,
}

/// Service layer for the multi-region spot price pipeline
#[derive(Clone)]
pub struct SpotPriceService<S: SpotPriceSource> {
    source: Arc<S>,
    region_timeout: Option<Duration>,
}

impl<S: SpotPriceSource + 'static> SpotPriceService<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            region_timeout: None,
        }
    }

    /// Bound each regional query; a slow region then counts as failed
    pub fn with_region_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.region_timeout = timeout;
        self
    }

    /// Resolve regions, fetch every selected region concurrently, rank.
    ///
    /// Fails on resolution errors and when nothing survives filtering.
    #[instrument(skip(self, query))]
    pub async fn query_prices(&self, query: &PriceQuery) -> SpotResult<Vec<PriceQuote>> {
        let regions = self.resolve_regions(query.regions.as_ref()).await?;
        let filter = self.build_filter(query).await?;
        let max_price = filter.max_price;

        let quotes = self.gather_all(&regions.selected, filter).await;
        if quotes.is_empty() {
            return Err(match max_price.ceiling() {
                Some(ceiling) => SpotError::NoQuotesAtOrBelow(ceiling),
                None => SpotError::NoQuotes,
            });
        }

        let ranked = rank_by(quotes, query.sort);
        SpotMetrics::set_quotes_reported(ranked.len());
        Ok(ranked)
    }

    /// Fetch the provider's regions and apply the region patterns
    #[instrument(skip(self, patterns))]
    pub async fn resolve_regions(
        &self,
        patterns: Option<&PatternSet>,
    ) -> SpotResult<ResolvedRegions> {
        let mut available: Vec<String> = self
            .source
            .describe_regions()
            .await?
            .iter()
            .map(|r| r.trim().to_lowercase())
            .filter(|r| !r.is_empty())
            .collect();
        available.sort();
        available.dedup();

        let selected = match patterns {
            Some(patterns) if !patterns.is_empty() => {
                let selected = dedup_preserving_order(patterns.select(&available));
                if selected.is_empty() {
                    return Err(SpotError::NoMatchingRegions(patterns.as_strs().join(",")));
                }
                selected
            }
            _ => available.clone(),
        };

        info!(
            available = available.len(),
            selected = selected.len(),
            "Resolved regions"
        );

        Ok(ResolvedRegions {
            available,
            selected,
        })
    }

    /// Fetch the whole instance-type catalog, then apply the patterns.
    ///
    /// Every page is consumed before filtering. A failed page fails the
    /// whole catalog.
    #[instrument(skip(self, patterns))]
    pub async fn resolve_instance_types(
        &self,
        patterns: Option<&PatternSet>,
    ) -> SpotResult<Vec<String>> {
        let mut catalog = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .source
                .describe_instance_types(page_token.take())
                .await?;
            pages += 1;
            SpotMetrics::record_catalog_page(page.items.len());
            catalog.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        catalog.sort();
        catalog.dedup();
        debug!(pages, count = catalog.len(), "Fetched instance type catalog");

        Ok(match patterns {
            Some(patterns) if !patterns.is_empty() => {
                dedup_preserving_order(patterns.select(&catalog))
            }
            _ => catalog,
        })
    }

    /// Turn a query into the read-only filter handed to every region.
    ///
    /// Instance-type patterns are resolved first; the result is merged
    /// after the exact names.
    pub async fn build_filter(&self, query: &PriceQuery) -> SpotResult<QueryFilter> {
        let mut instance_types = query.instance_types.clone();

        if let Some(patterns) = query.instance_type_patterns.as_ref().filter(|p| !p.is_empty()) {
            let resolved = self.resolve_instance_types(Some(patterns)).await?;
            if resolved.is_empty() {
                return Err(SpotError::NoMatchingInstanceTypes(
                    patterns.as_strs().join(","),
                ));
            }
            instance_types.extend(resolved);
        }

        Ok(QueryFilter {
            instance_types: dedup_preserving_order(instance_types),
            products: dedup_preserving_order(query.products.clone()),
            az_patterns: query.az_patterns.clone(),
            max_price: query.max_price,
        })
    }

    /// Query one region and apply the client-side filters
    pub async fn fetch_region(
        &self,
        region: &str,
        filter: &QueryFilter,
    ) -> SpotResult<Vec<PriceQuote>> {
        fetch_region(self.source.as_ref(), region, filter, Utc::now()).await
    }

    /// Fetch every region concurrently and merge the results.
    ///
    /// Waits for every task. Failed regions contribute nothing; opted-out
    /// regions are skipped quietly. Order of the result is unspecified.
    #[instrument(skip(self, regions, filter), fields(regions = regions.len()))]
    pub async fn gather_all(&self, regions: &[String], filter: QueryFilter) -> Vec<PriceQuote> {
        let filter = Arc::new(filter);
        let end_time = Utc::now();
        let mut join_set = JoinSet::new();

        for region in regions {
            let source = Arc::clone(&self.source);
            let filter = Arc::clone(&filter);
            let region = region.clone();
            let deadline = self.region_timeout;

            join_set.spawn(async move {
                let started = Instant::now();
                let fetch = fetch_region(source.as_ref(), &region, &filter, end_time);
                let result = match deadline {
                    Some(deadline) => tokio::time::timeout(deadline, fetch)
                        .await
                        .unwrap_or_else(|_| {
                            Err(SpotError::Timeout {
                                region: region.clone(),
                                seconds: deadline.as_secs(),
                            })
                        }),
                    None => fetch.await,
                };
                (region, result, started.elapsed())
            });
        }

        let mut quotes = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((region, Ok(found), elapsed)) => {
                    let status = if found.is_empty() { "empty" } else { "ok" };
                    SpotMetrics::record_region_fetch(&region, status, found.len(), elapsed);
                    debug!(region = %region, count = found.len(), "Region complete");
                    quotes.extend(found);
                }
                Ok((region, Err(e), elapsed)) if e.is_access_denied() => {
                    SpotMetrics::record_region_fetch(&region, "denied", 0, elapsed);
                    debug!(region = %region, error = %e, "Skipping region without access");
                }
                Ok((region, Err(e), elapsed)) => {
                    let status = if matches!(e, SpotError::Timeout { .. }) {
                        "timeout"
                    } else {
                        "failed"
                    };
                    SpotMetrics::record_region_fetch(&region, status, 0, elapsed);
                    error!(region = %region, error = %e, "Failed to fetch spot prices");
                }
                Err(e) => {
                    error!(error = %e, "Regional fetch task did not complete");
                }
            }
        }

        info!(count = quotes.len(), "Gathered spot prices");
        quotes
    }
}

async fn fetch_region<S: SpotPriceSource + ?Sized>(
    source: &S,
    region: &str,
    filter: &QueryFilter,
    end_time: DateTime<Utc>,
) -> SpotResult<Vec<PriceQuote>> {
    let request = SpotPriceHistoryRequest {
        region: region.to_string(),
        instance_types: filter.instance_types.clone(),
        products: filter.products.clone(),
        start_time: end_time - TimeDelta::seconds(PRICE_WINDOW_SECONDS),
        end_time,
    };

    let records = source.describe_spot_price_history(request).await?;
    let received = records.len();

    let quotes: Vec<PriceQuote> = records
        .into_iter()
        .filter(|record| filter.admits(record))
        .map(|record| PriceQuote::from_record(region, record))
        .collect();

    if quotes.len() < received {
        debug!(
            region = region,
            received,
            kept = quotes.len(),
            "Filtered price history rows"
        );
    }
    if filter.max_price.ceiling().is_none() && quotes.iter().any(|q| q.price_value().is_none()) {
        warn!(region = region, "Price history contains unparsable prices");
    }

    Ok(quotes)
}
