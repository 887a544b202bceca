use std::io::Write;
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::Result;
use crate::labels::SplitStats;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &Path, object: &T) -> Result<()> {
    let j = serde_json::to_string(object)?;
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(j.as_bytes())?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Writes the per-split match-quality report.
pub fn write_match_report(output_path: &Path, split_tag: &str, stats: &SplitStats) -> Result<()> {
    let timestamp = time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let mut s = String::new();
    s += format!("split: {}\n", split_tag).as_str();
    s += format!("generated: {}\n\n", timestamp).as_str();
    s += format!("total combinations: {}\n", stats.total).as_str();
    s += format!(
        "good: {} (ratio {:.5})\n",
        stats.good,
        stats.good_ratio().unwrap_or(0.0)
    )
    .as_str();
    s += format!(
        "bad:  {} (ratio {:.5})\n",
        stats.bad,
        stats.bad_ratio().unwrap_or(0.0)
    )
    .as_str();
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(s.as_bytes())?;
    Ok(())
}
