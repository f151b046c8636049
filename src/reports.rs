//! Read-only quality reports over a [`TimetableExtract`].
//!
//! Every function here is a pure query: it borrows the extract, mutates
//! nothing, and returns a scalar, a list, or a `(summary, matching, rest)`
//! split.

use crate::bods::{DqRag, ServiceRow, TimetableExtract};
use std::collections::HashSet;

/// Counts distinct operator names across the extract's datasets.
pub fn count_operators(extract: &TimetableExtract) -> usize {
    extract
        .records
        .iter()
        .map(|r| r.operator_name.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Counts distinct service codes across all service lines.
pub fn count_service_codes(extract: &TimetableExtract) -> usize {
    extract
        .service_rows()
        .iter()
        .map(|row| row.service_code.clone())
        .collect::<HashSet<_>>()
        .len()
}

/// Whether a service code has the registered OTC shape
/// `<registration>:<variation>`: a single colon, an alphanumeric
/// registration part, and a numeric variation suffix.
pub fn is_valid_service_code(code: &str) -> bool {
    let mut parts = code.split(':');
    let (Some(reg), Some(variation), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !reg.is_empty()
        && reg.chars().all(|c| c.is_ascii_alphanumeric())
        && !variation.is_empty()
        && variation.chars().all(|c| c.is_ascii_digit())
}

/// Splits service lines by code validity.
///
/// Returns the count of distinct valid codes, the rows carrying a valid
/// code, and the rows that do not.
pub fn valid_service_codes(
    extract: &TimetableExtract,
) -> (usize, Vec<ServiceRow>, Vec<ServiceRow>) {
    let (valid, invalid): (Vec<_>, Vec<_>) = extract
        .service_rows()
        .into_iter()
        .partition(|row| is_valid_service_code(&row.service_code));

    let distinct = valid
        .iter()
        .map(|row| row.service_code.clone())
        .collect::<HashSet<_>>()
        .len();

    (distinct, valid, invalid)
}

/// Splits service lines by TXC schema version.
///
/// Returns the percentage of lines published in `version`, the matching
/// rows, and the rest.
pub fn services_in_txc_schema(
    extract: &TimetableExtract,
    version: &str,
) -> (f64, Vec<ServiceRow>, Vec<ServiceRow>) {
    let (matching, rest): (Vec<_>, Vec<_>) = extract
        .service_rows()
        .into_iter()
        .partition(|row| row.txc_schema_version == version);

    let total = matching.len() + rest.len();
    (pct(matching.len(), total), matching, rest)
}

/// Splits datasets by TXC schema version. A dataset matches when it has
/// service lines and every one of them is published in `version`.
///
/// Returns the percentage of matching datasets, their IDs, and the rest.
pub fn datasets_in_txc_schema(
    extract: &TimetableExtract,
    version: &str,
) -> (f64, Vec<u64>, Vec<u64>) {
    let mut matching = Vec::new();
    let mut rest = Vec::new();

    for record in &extract.records {
        let all_match = !record.services.is_empty()
            && record
                .services
                .iter()
                .all(|line| line.txc_schema_version == version);
        if all_match {
            matching.push(record.id);
        } else {
            rest.push(record.id);
        }
    }

    let total = matching.len() + rest.len();
    (pct(matching.len(), total), matching, rest)
}

/// Counts datasets whose data-quality RAG rating is red.
pub fn red_dq_scores(extract: &TimetableExtract) -> usize {
    extract
        .records
        .iter()
        .filter(|r| r.dq_rag == Some(DqRag::Red))
        .count()
}

/// Lists distinct operators whose data-quality score is below `threshold`
/// (a percentage), in first-seen order. Datasets without a score are
/// excluded.
pub fn dq_less_than(extract: &TimetableExtract, threshold: f64) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut operators = Vec::new();

    for record in &extract.records {
        let Some(score) = record.dq_score else {
            continue;
        };
        if score < threshold && seen.insert(record.operator_name.clone()) {
            operators.push(record.operator_name.clone());
        }
    }

    operators
}

/// Lists service lines published without a licence number.
pub fn no_licence_number(extract: &TimetableExtract) -> Vec<ServiceRow> {
    extract
        .service_rows()
        .into_iter()
        .filter(|row| row.licence_number.is_none())
        .collect()
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bods::{DatasetRecord, ServiceLine};

    fn line(code: &str, licence: Option<&str>, version: &str) -> ServiceLine {
        ServiceLine {
            service_code: code.to_string(),
            line_name: "1".to_string(),
            licence_number: licence.map(str::to_string),
            txc_schema_version: version.to_string(),
        }
    }

    fn dataset(
        id: u64,
        operator: &str,
        dq_score: Option<f64>,
        dq_rag: Option<DqRag>,
        services: Vec<ServiceLine>,
    ) -> DatasetRecord {
        DatasetRecord {
            id,
            operator_name: operator.to_string(),
            nocs: vec![],
            status: "published".to_string(),
            url: String::new(),
            dq_score,
            dq_rag,
            bods_compliance: Some(true),
            services,
        }
    }

    fn extract() -> TimetableExtract {
        TimetableExtract {
            records: vec![
                dataset(
                    1,
                    "Acme Buses",
                    Some(94.0),
                    Some(DqRag::Green),
                    vec![
                        line("PB0001234:5", Some("PB0001234"), "2.4"),
                        line("PB0001234:6", None, "2.4"),
                    ],
                ),
                dataset(
                    2,
                    "Beta Coaches",
                    Some(41.0),
                    Some(DqRag::Red),
                    vec![line("not-a-code", Some("PB0009999"), "2.1")],
                ),
                dataset(
                    3,
                    "Acme Buses",
                    None,
                    None,
                    vec![line("PB0001234:5", Some("PB0001234"), "2.4")],
                ),
            ],
        }
    }

    #[test]
    fn test_count_operators_is_distinct() {
        assert_eq!(count_operators(&extract()), 2);
    }

    #[test]
    fn test_count_service_codes_is_distinct() {
        // PB0001234:5 appears in two datasets
        assert_eq!(count_service_codes(&extract()), 3);
    }

    #[test]
    fn test_is_valid_service_code() {
        assert!(is_valid_service_code("PB0001234:5"));
        assert!(is_valid_service_code("PB0009999:12"));
        assert!(!is_valid_service_code("PB0001234/5"));
        assert!(!is_valid_service_code("PB0001234:"));
        assert!(!is_valid_service_code(":5"));
        assert!(!is_valid_service_code("PB0001234:5:6"));
        assert!(!is_valid_service_code("PB0001234:5a"));
        assert!(!is_valid_service_code(""));
    }

    #[test]
    fn test_valid_service_codes_split() {
        let (distinct, valid, invalid) = valid_service_codes(&extract());
        assert_eq!(distinct, 2);
        assert_eq!(valid.len(), 3);
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].service_code, "not-a-code");
    }

    #[test]
    fn test_services_in_txc_schema() {
        let (percentage, matching, rest) = services_in_txc_schema(&extract(), "2.4");
        assert_eq!(matching.len(), 3);
        assert_eq!(rest.len(), 1);
        assert_eq!(percentage, 75.0);
    }

    #[test]
    fn test_services_in_txc_schema_empty_extract() {
        let empty = TimetableExtract::default();
        let (percentage, matching, rest) = services_in_txc_schema(&empty, "2.4");
        assert_eq!(percentage, 0.0);
        assert!(matching.is_empty());
        assert!(rest.is_empty());
    }

    #[test]
    fn test_datasets_in_txc_schema() {
        let (percentage, matching, rest) = datasets_in_txc_schema(&extract(), "2.4");
        assert_eq!(matching, vec![1, 3]);
        assert_eq!(rest, vec![2]);
        assert!((percentage - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_red_dq_scores() {
        assert_eq!(red_dq_scores(&extract()), 1);
    }

    #[test]
    fn test_dq_less_than_threshold() {
        assert_eq!(dq_less_than(&extract(), 90.0), vec!["Beta Coaches"]);
        assert!(dq_less_than(&extract(), 10.0).is_empty());
        // unscored datasets never match
        assert_eq!(dq_less_than(&extract(), 101.0).len(), 2);
    }

    #[test]
    fn test_no_licence_number() {
        let rows = no_licence_number(&extract());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].service_code, "PB0001234:6");
    }
}
