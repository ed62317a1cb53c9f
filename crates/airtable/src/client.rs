use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::record::OpportunityRecord;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const TABLE_VIEW: &str = "Grid view";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AirtableError {
    #[error("table endpoint url is not a valid base url: {0}")]
    InvalidEndpoint(String),
    #[error("table request failed: {0}")]
    Http(String),
    #[error("table api returned status {status}")]
    Api { status: u16 },
    #[error("table response could not be decoded: {0}")]
    Decode(String),
}

impl AirtableError {
    /// Transient failures are retried once before surfacing.
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status } => *status >= 500,
            Self::InvalidEndpoint(_) | Self::Decode(_) => false,
        }
    }
}

/// Read access to the opportunities table. Implemented by [`AirtableClient`]
/// for production and by canned fakes in tests.
#[async_trait]
pub trait OpportunitySource: Send + Sync {
    /// Fetches every record matching `filter` (a formula; `None` matches
    /// all), following the API's continuation token until exhausted.
    /// `fields` restricts the returned columns; empty means all columns.
    async fn query(
        &self,
        table: &str,
        filter: Option<&str>,
        fields: &[&str],
    ) -> Result<Vec<OpportunityRecord>, AirtableError>;

    /// Distinct values present in one column, multi-valued cells flattened.
    /// There is no metadata endpoint, so this scans the whole table.
    async fn column_values(
        &self,
        table: &str,
        column: &str,
    ) -> Result<BTreeSet<String>, AirtableError>;
}

pub struct AirtableClient {
    http: reqwest::Client,
    endpoint_url: String,
    base_id: String,
    api_key: SecretString,
}

impl AirtableClient {
    pub fn new(
        endpoint_url: impl Into<String>,
        base_id: impl Into<String>,
        api_key: SecretString,
    ) -> Result<Self, AirtableError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| AirtableError::Http(error.to_string()))?;

        Ok(Self { http, endpoint_url: endpoint_url.into(), base_id: base_id.into(), api_key })
    }

    fn table_url(&self, table: &str) -> Result<Url, AirtableError> {
        let mut url = Url::parse(&self.endpoint_url)
            .map_err(|error| AirtableError::InvalidEndpoint(error.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| AirtableError::InvalidEndpoint(self.endpoint_url.clone()))?
            .extend(["v0", &self.base_id, table]);
        Ok(url)
    }

    async fn fetch_page(
        &self,
        table: &str,
        filter: Option<&str>,
        fields: &[&str],
        offset: Option<&str>,
    ) -> Result<RecordPage, AirtableError> {
        let url = self.table_url(table)?;

        let mut params: Vec<(&str, String)> = vec![("view", TABLE_VIEW.to_owned())];
        if let Some(filter) = filter {
            params.push(("filterByFormula", filter.to_owned()));
        }
        for field in fields {
            params.push(("fields[]", (*field).to_owned()));
        }
        if let Some(offset) = offset {
            params.push(("offset", offset.to_owned()));
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(self.api_key.expose_secret())
            .query(&params)
            .send()
            .await
            .map_err(|error| AirtableError::Http(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AirtableError::Api { status: status.as_u16() });
        }

        response
            .json::<RecordPage>()
            .await
            .map_err(|error| AirtableError::Decode(error.to_string()))
    }

    async fn fetch_page_with_retry(
        &self,
        table: &str,
        filter: Option<&str>,
        fields: &[&str],
        offset: Option<&str>,
    ) -> Result<RecordPage, AirtableError> {
        match self.fetch_page(table, filter, fields, offset).await {
            Ok(page) => Ok(page),
            Err(error) if error.is_transient() => {
                warn!(
                    event_name = "airtable.fetch.retry",
                    table,
                    error = %error,
                    "transient table read failure; retrying once"
                );
                self.fetch_page(table, filter, fields, offset).await
            }
            Err(error) => Err(error),
        }
    }
}

#[async_trait]
impl OpportunitySource for AirtableClient {
    async fn query(
        &self,
        table: &str,
        filter: Option<&str>,
        fields: &[&str],
    ) -> Result<Vec<OpportunityRecord>, AirtableError> {
        debug!(
            event_name = "airtable.query.start",
            table,
            filter = filter.unwrap_or("<none>"),
            "querying opportunities table"
        );

        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page =
                self.fetch_page_with_retry(table, filter, fields, offset.as_deref()).await?;
            records.extend(page.records);

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        info!(
            event_name = "airtable.query.completed",
            table,
            record_count = records.len(),
            "finished fetching matching records"
        );
        Ok(records)
    }

    async fn column_values(
        &self,
        table: &str,
        column: &str,
    ) -> Result<BTreeSet<String>, AirtableError> {
        let records = self.query(table, None, &[column]).await?;
        let values = collect_column_values(&records, column);

        debug!(
            event_name = "airtable.column_values.completed",
            table,
            column,
            value_count = values.len(),
            "enumerated column values by full-table scan"
        );
        Ok(values)
    }
}

/// Flattens and deduplicates one column across a record set.
pub fn collect_column_values(
    records: &[OpportunityRecord],
    column: &str,
) -> BTreeSet<String> {
    records
        .iter()
        .flat_map(|record| record.values(column))
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<OpportunityRecord>,
    offset: Option<String>,
}
