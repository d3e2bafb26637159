//! HTTP client for the upstream ERP feed.
//!
//! The ERP exposes two basic-auth endpoints, both of which take their
//! filter as a JSON body on a GET request (a quirk of the upstream
//! gateway): `pick-requests` returns the pending pick records, and
//! `location-stock` returns stock rows for a product/depot/location range.

use std::collections::HashSet;
use std::time::Duration;

use picksync_core::{AppConfig, ExternalRecord, FieldValue, NormalizedRecord, StockSnapshot};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// Client for the warehouse ERP feed.
///
/// Use [`FeedClient::new`] for production or [`FeedClient::with_base_url`]
/// to point at a mock server in tests.
pub struct FeedClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
    reference_series: Option<String>,
    reference_folio: Option<String>,
    sync_user: String,
}

/// A raw stock row from the `location-stock` endpoint.
///
/// Loosely typed like the pick records: numeric fields may arrive as JSON
/// numbers or strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StockCandidate {
    pub product: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub shelf: Option<String>,
    pub total_qty: Option<FieldValue>,
    pub stock_minimum: Option<FieldValue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PickRequestFilter<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_series: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_folio: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StockRangeFilter<'a> {
    from_product: &'a str,
    to_product: &'a str,
    from_depot: &'a str,
    to_depot: &'a str,
    from_location: &'a str,
    to_location: &'a str,
}

impl FeedClient {
    /// Creates a client pointed at the configured production feed.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`FeedError::InvalidBaseUrl`] if the
    /// configured URL does not parse.
    pub fn new(config: &AppConfig) -> Result<Self, FeedError> {
        Self::with_base_url(config, &config.feed_url)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`FeedError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL.
    pub fn with_base_url(config: &AppConfig, base_url: &str) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.feed_request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("picksync/0.1 (warehouse-sync)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // Url::join appends endpoint segments rather than replacing the last
        // path component.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| FeedError::InvalidBaseUrl {
            base_url: normalized.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            http,
            base_url,
            username: config.feed_username.clone(),
            password: config.feed_password.clone(),
            reference_series: config.feed_reference_series.clone(),
            reference_folio: config.feed_reference_folio.clone(),
            sync_user: config.sync_user.clone(),
        })
    }

    /// Fetches the pending pick-request records.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] on transport failure,
    /// [`FeedError::NotFound`]/[`FeedError::UnexpectedStatus`] on non-2xx
    /// responses, and [`FeedError::Deserialize`] when the payload is not a
    /// JSON list of records.
    pub async fn fetch_pick_records(&self) -> Result<Vec<ExternalRecord>, FeedError> {
        let url = self.endpoint("pick-requests")?;
        let filter = PickRequestFilter {
            reference_series: self.reference_series.as_deref(),
            reference_folio: self.reference_folio.as_deref(),
        };

        let body = self.get_json(url.clone(), &filter).await?;
        let records: Vec<ExternalRecord> =
            serde_json::from_str(&body).map_err(|source| FeedError::Deserialize {
                context: format!("pick records from {url}"),
                source,
            })?;

        tracing::info!(records = records.len(), "fetched pick records");
        Ok(records)
    }

    /// Fetches stock rows for one product/depot/location, using the
    /// degenerate range form the upstream expects (from == to).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`FeedClient::fetch_pick_records`].
    pub async fn fetch_location_stock(
        &self,
        product: &str,
        depot: &str,
        location: &str,
    ) -> Result<Vec<StockCandidate>, FeedError> {
        let url = self.endpoint("location-stock")?;
        let filter = StockRangeFilter {
            from_product: product,
            to_product: product,
            from_depot: depot,
            to_depot: depot,
            from_location: location,
            to_location: location,
        };

        let body = self.get_json(url.clone(), &filter).await?;
        serde_json::from_str(&body).map_err(|source| FeedError::Deserialize {
            context: format!("stock rows from {url}"),
            source,
        })
    }

    /// Cross-references pick records against the stock endpoint and
    /// assembles the snapshot batch for the inventory upserter.
    ///
    /// Queries one degenerate range per distinct
    /// `(product, depot, location)` triple; records repeating a triple do
    /// not trigger another upstream call. Candidates without a location id
    /// are dropped (they cannot be keyed), and a candidate missing its
    /// product id inherits the pick record's.
    ///
    /// # Errors
    ///
    /// Propagates the first feed failure; partially assembled batches are
    /// discarded by the caller.
    pub async fn build_stock_batch(
        &self,
        records: &[NormalizedRecord],
    ) -> Result<Vec<StockSnapshot>, FeedError> {
        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        let mut snapshots = Vec::new();

        for record in records {
            let triple = (
                record.product.clone(),
                record.depot.clone(),
                record.location_text.clone(),
            );
            if !seen.insert(triple) {
                continue;
            }

            let candidates = self
                .fetch_location_stock(&record.product, &record.depot, &record.location_text)
                .await?;

            for candidate in candidates {
                let location_id = trimmed(candidate.location.as_deref());
                let Some(location_id) = location_id else {
                    tracing::warn!(
                        product = %record.product,
                        "dropping stock candidate without a location id"
                    );
                    continue;
                };

                snapshots.push(StockSnapshot {
                    product_id: trimmed(candidate.product.as_deref())
                        .unwrap_or_else(|| record.product.clone()),
                    description: trimmed(candidate.description.as_deref()).unwrap_or_default(),
                    location_id,
                    shelf_id: trimmed(candidate.shelf.as_deref()),
                    stock: to_count(candidate.total_qty.as_ref()),
                    stock_minimum: to_count(candidate.stock_minimum.as_ref()),
                    sync_flag: 0,
                    sync_user: Some(self.sync_user.clone()),
                    swap_tmp: None,
                });
            }
        }

        tracing::info!(snapshots = snapshots.len(), "assembled stock batch");
        Ok(snapshots)
    }

    fn endpoint(&self, segment: &str) -> Result<Url, FeedError> {
        self.base_url
            .join(segment)
            .map_err(|e| FeedError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn get_json<B: Serialize>(&self, url: Url, body: &B) -> Result<String, FeedError> {
        let response = self
            .http
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.text().await?),
            StatusCode::NOT_FOUND => Err(FeedError::NotFound {
                url: url.to_string(),
            }),
            status => Err(FeedError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn to_count(value: Option<&FieldValue>) -> i32 {
    value
        .and_then(FieldValue::to_f64)
        .map_or(0, |n| n as i32)
}
