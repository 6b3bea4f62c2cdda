//! Saved query results
//!
//! A snapshot holds the ranked quotes of one run so the report can be
//! rendered again without touching the provider.

use chrono::{DateTime, Utc};
use domain_spot_pricing::PriceQuote;
use eyre::{Result, WrapErr, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    captured_at: DateTime<Utc>,
    quotes: Vec<PriceQuote>,
}

pub fn save(path: &Path, quotes: &[PriceQuote]) -> Result<()> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        captured_at: Utc::now(),
        quotes: quotes.to_vec(),
    };

    let json = serde_json::to_vec_pretty(&snapshot).wrap_err("Failed to encode snapshot")?;
    fs::write(path, json)
        .wrap_err_with(|| format!("Failed to write snapshot {}", path.display()))?;

    info!(path = %path.display(), count = quotes.len(), "Saved snapshot");
    Ok(())
}

pub fn load(path: &Path) -> Result<Vec<PriceQuote>> {
    let bytes =
        fs::read(path).wrap_err_with(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)
        .wrap_err_with(|| format!("Failed to decode snapshot {}", path.display()))?;

    ensure!(
        snapshot.version == SNAPSHOT_VERSION,
        "Unsupported snapshot version {} in {}",
        snapshot.version,
        path.display()
    );

    info!(
        path = %path.display(),
        count = snapshot.quotes.len(),
        captured_at = %snapshot.captured_at,
        "Loaded snapshot"
    );
    Ok(snapshot.quotes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(az: &str, price: &str) -> PriceQuote {
        PriceQuote {
            region: "eu-west-1".to_string(),
            availability_zone: az.to_string(),
            instance_type: "c5.large".to_string(),
            product_description: "Linux/UNIX".to_string(),
            price: price.to_string(),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current.json");
        let quotes = vec![quote("eu-west-1a", "0.0331"), quote("eu-west-1c", "0.0340")];

        save(&path, &quotes).unwrap();
        assert_eq!(load(&path).unwrap(), quotes);
    }

    #[test]
    fn test_load_missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn test_load_rejects_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        fs::write(
            &path,
            r#"{"version": 0, "captured_at": "2020-03-26T00:00:00Z", "quotes": []}"#,
        )
        .unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported snapshot version 0"));
    }
}
