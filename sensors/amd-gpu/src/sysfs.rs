//! Locating `gpu_metrics` files under the DRM class directory.

use crate::amdgpu::reader::MetricsReader;
use crate::amdgpu::throttle::AsicFamily;
use crate::error::CardError;
use crate::report::DecodedReport;
use gpumetrics_rs_core::SensorError;
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Location of the metrics file relative to a `cardN` directory.
pub const GPU_METRICS_REL_PATH: &str = "device/gpu_metrics";

/// Parse the id out of a DRM entry name.
///
/// Only `card` followed by decimal digits is accepted, so connector entries
/// such as `card0-DP-1` and render nodes are rejected. Ids above `i32::MAX`
/// are rejected too.
pub fn parse_card_id(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("card")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let id: u64 = digits.parse().ok()?;
    if id > i32::MAX as u64 {
        return None;
    }
    u32::try_from(id).ok()
}

/// A card that exposes a metrics file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardEntry {
    pub id: u32,
    pub metrics_path: PathBuf,
}

impl CardEntry {
    /// Read, parse and decode this card's current snapshot.
    pub fn read(&self, asic: AsicFamily) -> Result<DecodedReport, CardError> {
        let metrics = MetricsReader::new().read_file(&self.metrics_path, self.id)?;
        Ok(DecodedReport::build(&metrics, asic))
    }
}

/// List every `cardN/device/gpu_metrics` regular file under `root`, sorted
/// by card id.
pub fn discover_cards(root: &Path) -> Result<Vec<CardEntry>, SensorError> {
    if !root.is_dir() {
        return Err(SensorError::unavailable(format!(
            "DRM directory {} not available",
            root.display()
        )));
    }

    let pattern = format!(
        "{}/card*/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        GPU_METRICS_REL_PATH
    );
    let paths = glob::glob(&pattern).map_err(|e| {
        SensorError::config_with_value("Invalid discovery pattern", e.to_string())
    })?;

    let mut cards = Vec::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping {}: {}", e.path().display(), e.error());
                continue;
            }
        };

        let Some(id) = card_dir_name(&path).and_then(parse_card_id) else {
            debug!("Ignoring {}", path.display());
            continue;
        };

        if !path.is_file() {
            debug!("Ignoring non-regular metrics path {}", path.display());
            continue;
        }

        cards.push(CardEntry {
            id,
            metrics_path: path,
        });
    }

    cards.sort_by_key(|card| card.id);
    debug!("Found {} card(s) under {}", cards.len(), root.display());
    Ok(cards)
}

// `<root>/cardN/device/gpu_metrics` -> `cardN`
fn card_dir_name(metrics_path: &Path) -> Option<&str> {
    metrics_path.parent()?.parent()?.file_name()?.to_str()
}

/// Look up a single card by id.
pub fn find_card(root: &Path, id: u32) -> Option<CardEntry> {
    let metrics_path = root.join(format!("card{id}")).join(GPU_METRICS_REL_PATH);
    metrics_path.is_file().then_some(CardEntry { id, metrics_path })
}

/// Read and decode card `id` under `root`.
pub fn read_card(root: &Path, id: u32, asic: AsicFamily) -> Result<DecodedReport, CardError> {
    let entry = CardEntry {
        id,
        metrics_path: root.join(format!("card{id}")).join(GPU_METRICS_REL_PATH),
    };
    entry.read(asic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amdgpu::reader::tests::sample_record;
    use crate::error::MetricsError;
    use std::fs;
    use tempfile::TempDir;

    fn add_card(root: &Path, name: &str, data: &[u8]) {
        let device = root.join(name).join("device");
        fs::create_dir_all(&device).unwrap();
        fs::write(device.join("gpu_metrics"), data).unwrap();
    }

    #[test]
    fn test_parse_card_id() {
        assert_eq!(parse_card_id("card0"), Some(0));
        assert_eq!(parse_card_id("card12"), Some(12));
        assert_eq!(parse_card_id("card2147483647"), Some(2_147_483_647));
        assert_eq!(parse_card_id("card2147483648"), None);
        assert_eq!(parse_card_id("card99999999999999999999"), None);
        assert_eq!(parse_card_id("card"), None);
        assert_eq!(parse_card_id("cardX"), None);
        assert_eq!(parse_card_id("card0-DP-1"), None);
        assert_eq!(parse_card_id("card+1"), None);
        assert_eq!(parse_card_id("renderD128"), None);
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        add_card(root, "card10", &sample_record());
        add_card(root, "card2", &sample_record());
        add_card(root, "card0-DP-1", &sample_record());
        // Metrics path that is a directory.
        fs::create_dir_all(root.join("card3/device/gpu_metrics")).unwrap();
        // Card without metrics.
        fs::create_dir_all(root.join("card4/device")).unwrap();

        let cards = discover_cards(root).unwrap();
        let ids: Vec<u32> = cards.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 10]);
        assert!(cards[0].metrics_path.ends_with("card2/device/gpu_metrics"));
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = discover_cards(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, SensorError::Unavailable { .. }));
    }

    #[test]
    fn test_discover_empty_root() {
        let dir = TempDir::new().unwrap();
        assert!(discover_cards(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_read_card_and_short_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        add_card(root, "card0", &sample_record());
        add_card(root, "card1", &sample_record()[..64]);

        let report = read_card(root, 0, AsicFamily::Aldebaran).unwrap();
        assert_eq!(report.temperatures.edge.to_string(), "45 C");

        let err = read_card(root, 1, AsicFamily::Aldebaran).unwrap_err();
        assert!(matches!(
            err,
            CardError::Metrics {
                card: 1,
                source: MetricsError::ShortRead {
                    expected: 120,
                    actual: 64
                }
            }
        ));

        let err = read_card(root, 7, AsicFamily::Aldebaran).unwrap_err();
        assert!(matches!(err, CardError::Io { .. }));
    }

    #[test]
    fn test_find_card() {
        let dir = TempDir::new().unwrap();
        add_card(dir.path(), "card5", &sample_record());

        let card = find_card(dir.path(), 5).unwrap();
        assert_eq!(card.id, 5);
        assert!(find_card(dir.path(), 6).is_none());
    }
}
