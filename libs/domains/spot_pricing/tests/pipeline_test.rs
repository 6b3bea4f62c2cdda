//! Integration tests for the spot pricing pipeline
//!
//! These tests drive the public service API against the in-memory source:
//! - Region and instance-type resolution
//! - Concurrent fan-out and join across regions
//! - Client-side filtering and final ranking

use domain_spot_pricing::*;
use std::collections::{BTreeMap, BTreeSet};

fn record(az: &str, instance: &str, product: &str, price: &str) -> SpotPriceRecord {
    SpotPriceRecord {
        availability_zone: az.to_string(),
        instance_type: instance.to_string(),
        product_description: product.to_string(),
        spot_price: price.to_string(),
        timestamp: None,
    }
}

async fn seeded_source() -> InMemorySpotPriceSource {
    let source = InMemorySpotPriceSource::new();
    source
        .set_regions(["us-east-1", "us-west-2", "eu-west-1", "ap-east-1"])
        .await;

    for (region, az, instance, price) in [
        ("us-east-1", "us-east-1a", "t3.micro", "0.0040"),
        ("us-east-1", "us-east-1b", "t3.micro", "0.0031"),
        ("us-east-1", "us-east-1a", "m5.large", "0.0350"),
        ("us-west-2", "us-west-2c", "t3.micro", "0.0031"),
        ("us-west-2", "us-west-2a", "t3.micro", "0.0052"),
        ("eu-west-1", "eu-west-1a", "t3.micro", "0.0029"),
        ("ap-east-1", "ap-east-1a", "t3.micro", "0.0010"),
    ] {
        source
            .add_record(region, record(az, instance, "Linux/UNIX", price))
            .await;
    }
    source
        .add_record(
            "us-east-1",
            record("us-east-1a", "t3.micro", "Windows", "0.0130"),
        )
        .await;

    source
}

fn prices(quotes: &[PriceQuote]) -> Vec<f64> {
    quotes.iter().filter_map(PriceQuote::price_value).collect()
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn test_two_regions_one_instance_type() {
    let service = SpotPriceService::new(seeded_source().await);
    let query = PriceQuery {
        regions: Some(PatternSet::parse("us-east-1,us-west-2").unwrap()),
        instance_types: vec!["t3.micro".to_string()],
        ..Default::default()
    };

    let quotes = service.query_prices(&query).await.unwrap();

    let regions: BTreeSet<_> = quotes.iter().map(|q| q.region.as_str()).collect();
    assert_eq!(regions, BTreeSet::from(["us-east-1", "us-west-2"]));
    assert!(quotes.iter().all(|q| q.instance_type == "t3.micro"));

    let sorted = prices(&quotes);
    assert!(sorted.windows(2).all(|w| w[0] <= w[1]), "not ascending: {sorted:?}");
    assert_eq!(quotes.len(), 5);
}

#[tokio::test]
async fn test_product_and_az_filters() {
    let service = SpotPriceService::new(seeded_source().await);
    let query = PriceQuery {
        regions: Some(PatternSet::parse("^us-").unwrap()),
        products: parse_products("lin"),
        az_patterns: PatternSet::parse("[ac]$").unwrap(),
        ..Default::default()
    };

    let quotes = service.query_prices(&query).await.unwrap();

    let zones: Vec<_> = quotes.iter().map(|q| q.availability_zone.as_str()).collect();
    assert_eq!(zones, vec!["us-west-2c", "us-east-1a", "us-west-2a", "us-east-1a"]);
    assert!(quotes.iter().all(|q| q.product_description == "Linux/UNIX"));
}

#[tokio::test]
async fn test_price_ceiling_is_inclusive_and_reported_when_empty() {
    let service = SpotPriceService::new(seeded_source().await);
    let query = PriceQuery {
        max_price: MaxPrice::AtMost(0.0031),
        ..Default::default()
    };

    let quotes = service.query_prices(&query).await.unwrap();
    assert_eq!(prices(&quotes), vec![0.0010, 0.0029, 0.0031, 0.0031]);

    let query = PriceQuery {
        max_price: MaxPrice::AtMost(0.0001),
        ..Default::default()
    };
    let err = service.query_prices(&query).await.unwrap_err();
    assert!(err.is_empty_result());
    assert_eq!(err.to_string(), "no spot instances found at or below 0.0001");
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn test_join_keeps_every_region_exactly_once() {
    let source = seeded_source().await;
    source.deny_region("ap-east-1").await;
    source.fail_region("eu-west-1").await;

    let service = SpotPriceService::new(source.clone());
    let regions: Vec<String> = ["us-east-1", "us-west-2", "eu-west-1", "ap-east-1", "sa-east-1"]
        .into_iter()
        .map(String::from)
        .collect();

    let quotes = service.gather_all(&regions, QueryFilter::default()).await;

    let mut per_region: BTreeMap<&str, usize> = BTreeMap::new();
    for quote in &quotes {
        assert!(
            quote.availability_zone.starts_with(&quote.region),
            "{quote:?} attributed to the wrong region"
        );
        *per_region.entry(quote.region.as_str()).or_default() += 1;
    }
    assert_eq!(per_region, BTreeMap::from([("us-east-1", 4), ("us-west-2", 2)]));

    // every region was queried once, including the failing ones
    let queried: BTreeSet<_> = source
        .history_requests()
        .await
        .into_iter()
        .map(|r| r.region)
        .collect();
    assert_eq!(queried.len(), regions.len());
}

#[tokio::test]
async fn test_all_regions_failing_is_an_empty_result() {
    let source = seeded_source().await;
    for region in ["us-east-1", "us-west-2", "eu-west-1", "ap-east-1"] {
        source.fail_region(region).await;
    }

    let service = SpotPriceService::new(source);
    let err = service
        .query_prices(&PriceQuery::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SpotError::NoQuotes));
}

// ============================================================================
// Instance-type catalog
// ============================================================================

#[tokio::test]
async fn test_catalog_size_is_sum_of_pages() {
    let source = InMemorySpotPriceSource::new();
    let pages: Vec<Vec<String>> = (0..4)
        .map(|p| (0..25).map(|i| format!("x{p}.size{i}")).collect())
        .collect();
    for page in &pages {
        source.push_instance_type_page(page.clone()).await;
    }

    let service = SpotPriceService::new(source);
    let catalog = service.resolve_instance_types(None).await.unwrap();

    assert_eq!(catalog.len(), pages.iter().map(Vec::len).sum::<usize>());
}

#[tokio::test]
async fn test_catalog_page_failure_yields_no_types() {
    let source = InMemorySpotPriceSource::new();
    source.push_instance_type_page(["t3.micro", "t3.small"]).await;
    source.push_instance_type_page(["m5.large"]).await;
    source.push_instance_type_page(["c5.large"]).await;
    source.fail_page(2).await;

    let service = SpotPriceService::new(source);
    let result = service
        .resolve_instance_types(Some(&PatternSet::parse("^t3").unwrap()))
        .await;

    assert!(matches!(result, Err(SpotError::Provider { .. })));
}

#[tokio::test]
async fn test_instance_type_patterns_constrain_the_query() {
    let source = seeded_source().await;
    source.push_instance_type_page(["m5.large", "t3.micro"]).await;
    source.push_instance_type_page(["t3.small"]).await;

    let service = SpotPriceService::new(source.clone());
    let query = PriceQuery {
        regions: Some(PatternSet::parse("us-east-1").unwrap()),
        instance_type_patterns: Some(PatternSet::parse("^m5").unwrap()),
        ..Default::default()
    };

    let quotes = service.query_prices(&query).await.unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].instance_type, "m5.large");

    let requests = source.history_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].instance_types, vec!["m5.large"]);
}

// ============================================================================
// Snapshot shape
// ============================================================================

#[test]
fn test_quote_serializes_with_field_names() {
    let quote = PriceQuote {
        region: "us-east-1".to_string(),
        availability_zone: "us-east-1a".to_string(),
        instance_type: "t3.micro".to_string(),
        product_description: "Linux/UNIX".to_string(),
        price: "0.0040".to_string(),
    };

    let json = serde_json::to_value(&quote).unwrap();
    assert_eq!(json["availability_zone"], "us-east-1a");
    assert_eq!(json["price"], "0.0040");

    let back: PriceQuote = serde_json::from_value(json).unwrap();
    assert_eq!(back, quote);
}
