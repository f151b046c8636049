use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, info};

use crate::bods::{
    DatasetRecord, DqRag, ServiceLine, TimetableConfig, TimetableExtract, validate_api_key,
};
use crate::fetch::{BasicClient, HttpClient, UrlParam, fetch_bytes};

const BODS_BASE_URL: &str = "https://data.bus-data.dft.gov.uk";

/// Page size for the dataset listing endpoint.
const PAGE_LIMIT: usize = 100;

/// Client for the BODS timetable dataset API.
///
/// Authenticates with a static key sent as the `api_key` query parameter on
/// every request.
pub struct BodsClient {
    base_url: String,
    http: UrlParam<BasicClient>,
}

impl BodsClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, BODS_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self> {
        validate_api_key(&api_key)?;
        Ok(Self {
            base_url,
            http: UrlParam::api_key(BasicClient::new()?, api_key),
        })
    }

    /// Fetches dataset-level timetable metadata matching `config`, walking
    /// the paginated listing until a short page.
    #[tracing::instrument(skip(self, config))]
    pub async fn fetch_extract(&self, config: &TimetableConfig) -> Result<TimetableExtract> {
        info!("Fetching timetable dataset metadata");

        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            let url = self.page_url(config, offset);
            debug!(offset, "Requesting dataset page");

            let bytes = fetch_bytes(&self.http, &url).await?;
            let json: Value =
                serde_json::from_slice(&bytes).context("failed to parse dataset response")?;

            let page = parse_dataset_page(&json)?;
            let fetched = page.len();
            records.extend(page);

            if fetched < PAGE_LIMIT {
                break;
            }
            offset += PAGE_LIMIT;
        }

        // The API has no compliance filter parameter, so apply it here.
        if let Some(compliant) = config.bods_compliant {
            records.retain(|r| r.bods_compliance == Some(compliant));
        }

        info!(datasets = records.len(), "Timetable extract ready");
        Ok(TimetableExtract { records })
    }

    fn page_url(&self, config: &TimetableConfig, offset: usize) -> String {
        let mut url = format!(
            "{}/api/v1/dataset/?limit={PAGE_LIMIT}&offset={offset}",
            self.base_url
        );
        if let Some(status) = &config.status {
            url.push_str(&format!("&status={status}"));
        }
        if !config.nocs.is_empty() {
            url.push_str(&format!("&noc={}", config.nocs.join(",")));
        }
        url
    }
}

/// Extracts the dataset records from one page of the listing response.
///
/// Items missing an `id` are skipped; other fields fall back to empty or
/// `None` so one sparse record cannot sink the whole page.
fn parse_dataset_page(json: &Value) -> Result<Vec<DatasetRecord>> {
    let Some(results) = json["results"].as_array() else {
        bail!("dataset response has no results array");
    };

    let records = results
        .iter()
        .filter_map(|item| {
            let id = item["id"].as_u64()?;
            let operator_name = item["operatorName"].as_str().unwrap_or("").to_string();
            let nocs = string_list(&item["noc"]);
            let status = item["status"].as_str().unwrap_or("").to_string();
            let url = item["url"].as_str().unwrap_or("").to_string();
            let dq_score = item["dqScore"].as_str().and_then(parse_percent);
            let dq_rag = item["dqRag"].as_str().and_then(DqRag::parse);
            let bods_compliance = item["bodsCompliance"].as_bool();
            let services = parse_services(&item["services"]);

            Some(DatasetRecord {
                id,
                operator_name,
                nocs,
                status,
                url,
                dq_score,
                dq_rag,
                bods_compliance,
                services,
            })
        })
        .collect();

    Ok(records)
}

fn parse_services(value: &Value) -> Vec<ServiceLine> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let service_code = item["serviceCode"].as_str()?.to_string();
            let line_name = item["lineName"].as_str().unwrap_or("").to_string();
            let licence_number = item["licenceNumber"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let txc_schema_version = item["txcSchemaVersion"].as_str().unwrap_or("").to_string();

            Some(ServiceLine {
                service_code,
                line_name,
                licence_number,
                txc_schema_version,
            })
        })
        .collect()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Parses a score like `"94%"` (or bare `"94"`) into a percentage.
fn parse_percent(s: &str) -> Option<f64> {
    s.trim().trim_end_matches('%').parse().ok()
}
