//! Fetch-merge pipeline for the OTC (Office of the Traffic Commissioner)
//! database of registered bus services. England only.
//!
//! The database is published as six regional CSV exports sharing one schema.
//! [`fetch_otc_db`] downloads them in a fixed order, merges them into a
//! single normalized dataset, and derives the `service_code` join key used
//! to correlate registrations against BODS timetable data.

use crate::fetch::{HttpClient, fetch_csv};
use crate::output;
use crate::table::Table;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use tracing::{debug, info};

/// Base URL of the data.gov.uk OTC exports.
pub const OTC_EXPORT_BASE: &str =
    "https://content.mgmt.dvsacloud.uk/olcs.prod.dvsa.aws/data-gov-uk-export";

/// Registration-number column as published in the exports.
pub const REG_NO_COLUMN: &str = "Reg_No";

/// Derived join-key column: the registration number with `/` swapped
/// for `:`, matching the service codes in BODS timetable extracts.
pub const SERVICE_CODE_COLUMN: &str = "service_code";

/// One fixed regional export source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSource {
    pub region: &'static str,
    file: &'static str,
}

impl RegionSource {
    pub fn url(&self) -> String {
        format!("{OTC_EXPORT_BASE}/{}", self.file)
    }
}

/// The six regions as listed on the OTC database page, in download order.
pub const REGION_SOURCES: [RegionSource; 6] = [
    RegionSource {
        region: "west_england",
        file: "Bus_RegisteredOnly_H.csv",
    },
    RegionSource {
        region: "west_midlands",
        file: "Bus_RegisteredOnly_D.csv",
    },
    RegionSource {
        region: "london_south_east",
        file: "Bus_RegisteredOnly_K.csv",
    },
    RegionSource {
        region: "north_west_england",
        file: "Bus_RegisteredOnly_C.csv",
    },
    RegionSource {
        region: "north_east_england",
        file: "Bus_RegisteredOnly_B.csv",
    },
    RegionSource {
        region: "east_england",
        file: "Bus_RegisteredOnly_F.csv",
    },
];

/// Downloads all six regional exports sequentially and merges them into one
/// normalized dataset.
///
/// Any fetch or parse failure aborts the whole run; there is no retry and no
/// partial result.
#[tracing::instrument(skip(client))]
pub async fn fetch_otc_db<C: HttpClient>(client: &C) -> Result<Table> {
    info!("Downloading OTC database");

    let mut regions = Vec::with_capacity(REGION_SOURCES.len());
    for source in REGION_SOURCES {
        debug!(region = source.region, "Downloading region");
        let table = fetch_csv(client, &source.url())
            .await
            .with_context(|| format!("failed to download region {}", source.region))?;
        debug!(
            region = source.region,
            rows = table.row_count(),
            "Region parsed"
        );
        regions.push(table);
    }

    info!("Merging regional files");
    merge_regions(regions)
}

/// Merges regional record sets into the final dataset: concatenate in input
/// order, derive `service_code`, normalize column names, drop exact
/// duplicate rows.
///
/// Regions with diverging column schemas are rejected rather than merged
/// raggedly. An empty registration number yields an empty service code; the
/// row is kept.
pub fn merge_regions(regions: Vec<Table>) -> Result<Table> {
    let mut db = Table::concat(regions)?;

    let reg_no = db
        .column_index(REG_NO_COLUMN)
        .with_context(|| format!("OTC export is missing the {REG_NO_COLUMN} column"))?;
    let codes: Vec<String> = db
        .rows
        .iter()
        .map(|row| row[reg_no].replace('/', ":"))
        .collect();
    db.add_column(SERVICE_CODE_COLUMN, codes)?;

    // postgres downstream dislikes uppercase and spaces in column names
    db.normalize_headers()?;
    db.dedup_rows();

    Ok(db)
}

/// Runs [`fetch_otc_db`] and writes the result to
/// `<downloads>/<date>/otc_db_<date>.csv`, overwriting a same-day file.
///
/// Returns the in-memory dataset. `downloads` overrides the platform
/// downloads folder; `date` labels one run's output and is threaded through
/// explicitly.
pub async fn save_otc_db<C: HttpClient>(
    client: &C,
    date: NaiveDate,
    downloads: Option<&Path>,
) -> Result<Table> {
    let db = fetch_otc_db(client).await?;

    let folder = output::ensure_dated_folder(downloads, date)?;
    let path = folder.join(format!("otc_db_{date}.csv"));
    output::write_table(&path, &db)?;
    info!(path = %path.display(), rows = db.row_count(), "OTC database saved");

    Ok(db)
}
