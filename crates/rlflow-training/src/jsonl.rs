//! Local JSONL tables: one logged step per line.
//!
//! Rows are sampled by episode (`mdp_id`), so every step of an episode lands in the same
//! percentage bucket and disjoint sample ranges select disjoint episodes.

use crate::error::{TrainingError, TrainingResult};
use crate::output::sha256_file;
use crate::table::{Dataset, SampleRange, TableSpec};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub mdp_id: String,
    #[serde(default)]
    pub sequence_number: u64,
    #[serde(default)]
    pub state_features: BTreeMap<String, f64>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub reward: Option<f64>,
    #[serde(default)]
    pub slate_reward: Option<f64>,
}

pub fn write_jsonl_table(path: &Path, rows: &[TableRow]) -> TrainingResult<()> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

pub fn read_jsonl_table(path: &Path) -> TrainingResult<Vec<TableRow>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        TrainingError::Dataset(format!("failed to read table {}: {}", path.display(), e))
    })?;
    let mut rows = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row: TableRow = serde_json::from_str(line).map_err(|e| {
            TrainingError::Dataset(format!(
                "failed to parse {} line {}: {}",
                path.display(),
                idx + 1,
                e
            ))
        })?;
        rows.push(row);
    }

    Ok(rows)
}

/// Reads the rows behind a queried dataset handle.
pub fn read_dataset(dataset: &Dataset) -> TrainingResult<Vec<TableRow>> {
    read_jsonl_table(Path::new(&dataset.uri))
}

/// Percentage bucket of an episode, in `[0, 100)` with two decimals of resolution.
#[must_use]
pub fn mdp_sample_bucket(mdp_id: &str) -> f64 {
    let digest = Sha256::digest(mdp_id.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % 10_000) as f64 / 100.0
}

/// Local file backing `table`.
pub fn table_path(table: &TableSpec) -> TrainingResult<PathBuf> {
    table.path.clone().ok_or_else(|| {
        TrainingError::Configuration(format!(
            "table {} has no local path to read from",
            table.table_name
        ))
    })
}

/// Hex SHA-256 of the table file's contents.
pub fn table_digest(table: &TableSpec) -> TrainingResult<String> {
    sha256_file(&table_path(table)?)
}

/// Writes the rows of `table` whose episode falls in `range` to `out_path`.
pub fn query_jsonl_table(
    table: &TableSpec,
    range: SampleRange,
    out_path: &Path,
) -> TrainingResult<Dataset> {
    let rows = read_jsonl_table(&table_path(table)?)?;
    let selected: Vec<TableRow> = rows
        .into_iter()
        .filter(|r| range.contains(mdp_sample_bucket(&r.mdp_id)))
        .collect();

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_jsonl_table(out_path, &selected)?;

    Ok(Dataset {
        uri: out_path.to_string_lossy().to_string(),
        sample_range: range,
        row_count: Some(selected.len() as u64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(mdp_id: &str, step: u64) -> TableRow {
        TableRow {
            mdp_id: mdp_id.to_string(),
            sequence_number: step,
            state_features: BTreeMap::from([("x".to_string(), step as f64)]),
            action: Some("a".to_string()),
            reward: Some(1.0),
            slate_reward: None,
        }
    }

    #[test]
    fn test_bucket_is_stable_and_in_range() {
        for i in 0..200 {
            let id = format!("episode-{i}");
            let b = mdp_sample_bucket(&id);
            assert!((0.0..100.0).contains(&b));
            assert_eq!(b, mdp_sample_bucket(&id));
        }
    }

    #[test]
    fn test_read_rejects_malformed_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t.jsonl");
        std::fs::write(&path, "{\"mdp_id\": \"a\"}\nnot json\n").unwrap();
        let err = read_jsonl_table(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_disjoint_ranges_select_disjoint_episodes() {
        let temp = TempDir::new().unwrap();
        let table_file = temp.path().join("table.jsonl");
        let rows: Vec<TableRow> = (0..100)
            .flat_map(|i| [row(&format!("m{i}"), 0), row(&format!("m{i}"), 1)])
            .collect();
        write_jsonl_table(&table_file, &rows).unwrap();

        let table = TableSpec::new("events").with_path(&table_file);
        let train_path = temp.path().join("q/train.jsonl");
        let eval_path = temp.path().join("q/eval.jsonl");
        let train = query_jsonl_table(&table, SampleRange::new(0.0, 70.0), &train_path).unwrap();
        let eval = query_jsonl_table(&table, SampleRange::new(70.0, 100.0), &eval_path).unwrap();

        assert_eq!(train.row_count.unwrap() + eval.row_count.unwrap(), 200);

        let train_rows = read_dataset(&train).unwrap();
        let eval_rows = read_dataset(&eval).unwrap();
        assert!(train_rows.iter().all(|t| eval_rows.iter().all(|e| e.mdp_id != t.mdp_id)));
        // both steps of an episode stay together
        assert_eq!(train_rows.len() % 2, 0);
    }

    #[test]
    fn test_query_requires_local_path() {
        let temp = TempDir::new().unwrap();
        let out_path = temp.path().join("x.jsonl");
        let err = query_jsonl_table(&TableSpec::new("remote"), SampleRange::FULL, &out_path);
        assert!(matches!(err, Err(TrainingError::Configuration(_))));
    }

    #[test]
    fn test_table_digest_follows_contents() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.jsonl");
        let b = temp.path().join("b.jsonl");
        write_jsonl_table(&a, &[row("alpha", 0)]).unwrap();
        write_jsonl_table(&b, &[row("beta", 0)]).unwrap();

        let digest_a = table_digest(&TableSpec::new("events").with_path(&a)).unwrap();
        let digest_b = table_digest(&TableSpec::new("events").with_path(&b)).unwrap();
        assert_eq!(digest_a.len(), 64);
        assert_ne!(digest_a, digest_b);
        assert!(table_digest(&TableSpec::new("events")).is_err());
    }
}
