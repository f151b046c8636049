//! Client and data model for the BODS (Bus Open Data Service) timetable API.
//!
//! The API is a black-box collaborator: it serves dataset-level timetable
//! metadata filtered by publication status, operator NOC codes, and
//! compliance. The report operations in [`crate::reports`] query the
//! resulting [`TimetableExtract`] in memory.

mod client;

pub use client::BodsClient;

use crate::table::Table;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Recognized extract options, mirroring the API's filter parameters.
#[derive(Debug, Clone, Default)]
pub struct TimetableConfig {
    /// Publication state filter, e.g. `published` or `inactive`.
    pub status: Option<String>,
    /// Include the flattened service-line extract when saving.
    pub service_line_level: bool,
    /// Include per-dataset stop-level timetables when saving.
    pub stop_level: bool,
    /// Restrict to these operator NOC codes; empty means all operators.
    pub nocs: Vec<String>,
    /// Keep only records with this BODS-compliance flag.
    pub bods_compliant: Option<bool>,
}

/// Data-quality RAG rating reported per dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DqRag {
    Red,
    Amber,
    Green,
}

impl DqRag {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Some(DqRag::Red),
            "amber" => Some(DqRag::Amber),
            "green" => Some(DqRag::Green),
            _ => None,
        }
    }
}

/// One service line published within a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub service_code: String,
    pub line_name: String,
    pub licence_number: Option<String>,
    pub txc_schema_version: String,
}

/// Dataset-level metadata row from the timetable API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: u64,
    pub operator_name: String,
    pub nocs: Vec<String>,
    pub status: String,
    pub url: String,
    /// Data-quality score as a percentage (0–100), when reported.
    pub dq_score: Option<f64>,
    pub dq_rag: Option<DqRag>,
    pub bods_compliance: Option<bool>,
    pub services: Vec<ServiceLine>,
}

/// A service line flattened together with its dataset context. This is the
/// row shape the report operations filter on; its `service_code` is the join
/// key against the OTC database.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRow {
    pub dataset_id: u64,
    pub operator_name: String,
    pub service_code: String,
    pub line_name: String,
    pub licence_number: Option<String>,
    pub txc_schema_version: String,
}

/// The in-memory result of one timetable API extract.
#[derive(Debug, Clone, Default)]
pub struct TimetableExtract {
    pub records: Vec<DatasetRecord>,
}

impl TimetableExtract {
    /// Flattens every dataset's service lines into [`ServiceRow`]s,
    /// preserving dataset order.
    pub fn service_rows(&self) -> Vec<ServiceRow> {
        self.records
            .iter()
            .flat_map(|record| {
                record.services.iter().map(|line| ServiceRow {
                    dataset_id: record.id,
                    operator_name: record.operator_name.clone(),
                    service_code: line.service_code.clone(),
                    line_name: line.line_name.clone(),
                    licence_number: line.licence_number.clone(),
                    txc_schema_version: line.txc_schema_version.clone(),
                })
            })
            .collect()
    }

    /// Dataset-level metadata as a table, ready for CSV export.
    pub fn metadata_table(&self) -> Table {
        let mut table = Table::new(
            [
                "dataset_id",
                "operator_name",
                "nocs",
                "status",
                "url",
                "dq_score",
                "dq_rag",
                "bods_compliance",
            ]
            .map(String::from)
            .to_vec(),
        );
        for record in &self.records {
            table.rows.push(vec![
                record.id.to_string(),
                record.operator_name.clone(),
                record.nocs.join(";"),
                record.status.clone(),
                record.url.clone(),
                record
                    .dq_score
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                record
                    .dq_rag
                    .map(|r| format!("{r:?}").to_lowercase())
                    .unwrap_or_default(),
                record
                    .bods_compliance
                    .map(|b| b.to_string())
                    .unwrap_or_default(),
            ]);
        }
        table
    }

    /// Builds one table per dataset, keyed by dataset ID, in extract order.
    /// Datasets without service lines are skipped.
    pub fn timetables(&self) -> TimetableSet {
        let mut set = TimetableSet::default();
        for record in &self.records {
            if record.services.is_empty() {
                continue;
            }
            let mut table = Table::new(
                [
                    "service_code",
                    "line_name",
                    "licence_number",
                    "txc_schema_version",
                ]
                .map(String::from)
                .to_vec(),
            );
            for line in &record.services {
                table.rows.push(vec![
                    line.service_code.clone(),
                    line.line_name.clone(),
                    line.licence_number.clone().unwrap_or_default(),
                    line.txc_schema_version.clone(),
                ]);
            }
            set.insert(record.id.to_string(), table);
        }
        set
    }
}

/// An explicit ordered mapping from dataset ID to its own table, so a whole
/// extract can be walked or collapsed without manual bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct TimetableSet {
    entries: Vec<(String, Table)>,
}

impl TimetableSet {
    pub fn insert(&mut self, id: String, table: Table) {
        self.entries.push((id, table));
    }

    pub fn get(&self, id: &str) -> Option<&Table> {
        self.entries
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, table)| table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.entries.iter().map(|(id, table)| (id.as_str(), table))
    }

    /// Collapses the set into one table by stamping each row with its
    /// dataset ID and concatenating in insertion order.
    ///
    /// All member tables must share one schema.
    pub fn merged(&self) -> Result<Table> {
        let mut stamped = Vec::with_capacity(self.entries.len());
        for (id, table) in &self.entries {
            let mut table = table.clone();
            let ids = vec![id.clone(); table.row_count()];
            table.add_column("dataset_id", ids)?;
            stamped.push(table);
        }
        Table::concat(stamped)
    }
}

/// Rejects obviously unusable API keys before any request goes out: empty
/// strings, placeholders, or anything not alphanumeric.
pub fn validate_api_key(key: &str) -> Result<()> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("BODS API key must be a non-empty alphanumeric string");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract() -> TimetableExtract {
        TimetableExtract {
            records: vec![
                DatasetRecord {
                    id: 10,
                    operator_name: "Acme Buses".to_string(),
                    nocs: vec!["ACME".to_string()],
                    status: "published".to_string(),
                    url: "https://example.test/10".to_string(),
                    dq_score: Some(94.0),
                    dq_rag: Some(DqRag::Green),
                    bods_compliance: Some(true),
                    services: vec![ServiceLine {
                        service_code: "PB0001234:5".to_string(),
                        line_name: "1A".to_string(),
                        licence_number: Some("PB0001234".to_string()),
                        txc_schema_version: "2.4".to_string(),
                    }],
                },
                DatasetRecord {
                    id: 11,
                    operator_name: "Beta Coaches".to_string(),
                    nocs: vec!["BETA".to_string()],
                    status: "published".to_string(),
                    url: "https://example.test/11".to_string(),
                    dq_score: None,
                    dq_rag: None,
                    bods_compliance: None,
                    services: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_service_rows_flatten_with_dataset_context() {
        let rows = extract().service_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].dataset_id, 10);
        assert_eq!(rows[0].operator_name, "Acme Buses");
        assert_eq!(rows[0].service_code, "PB0001234:5");
    }

    #[test]
    fn test_timetables_skip_empty_datasets() {
        let set = extract().timetables();
        assert_eq!(set.len(), 1);
        assert!(set.get("10").is_some());
        assert!(set.get("11").is_none());
    }

    #[test]
    fn test_merged_stamps_dataset_id() {
        let mut set = TimetableSet::default();
        let mut a = Table::new(vec!["service_code".to_string()]);
        a.rows.push(vec!["PB0001234:5".to_string()]);
        let mut b = Table::new(vec!["service_code".to_string()]);
        b.rows.push(vec!["PB0009999:1".to_string()]);
        set.insert("10".to_string(), a);
        set.insert("11".to_string(), b);

        let merged = set.merged().unwrap();
        assert_eq!(merged.headers, vec!["service_code", "dataset_id"]);
        assert_eq!(merged.rows[0], vec!["PB0001234:5", "10"]);
        assert_eq!(merged.rows[1], vec!["PB0009999:1", "11"]);
    }

    #[test]
    fn test_merged_empty_set() {
        let merged = TimetableSet::default().merged().unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn test_metadata_table_shape() {
        let table = extract().metadata_table();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.headers[0], "dataset_id");
        assert_eq!(table.rows[0][6], "green");
        assert_eq!(table.rows[1][5], ""); // missing dq score stays blank
    }

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("c82016fb18ca").is_ok());
        assert!(validate_api_key("").is_err());
        assert!(validate_api_key("your api key here").is_err());
        assert!(validate_api_key("<api-key>").is_err());
    }

    #[test]
    fn test_dq_rag_parse() {
        assert_eq!(DqRag::parse("Green"), Some(DqRag::Green));
        assert_eq!(DqRag::parse("RED"), Some(DqRag::Red));
        assert_eq!(DqRag::parse("unknown"), None);
    }
}
