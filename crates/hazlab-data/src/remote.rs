//! HTTP client for a hazard store service.
//!
//! Endpoints, relative to the base URL:
//! - `GET hazard/{id}/metadata` returns one [`HazardMetadata`] (404 if none)
//! - `GET hazard/{id}/realizations` returns `[RealizationRecord]`
//! - `GET hazard/{id}/aggregates` returns `[AggregateRecord]`
//!
//! Curve endpoints take `locs`, `vs30`, and `imts` query parameters; list
//! values are comma separated.

use crate::metadata::HazardMetadata;
use crate::store::{AggregateRecord, HazardStore, RealizationRecord};
use crate::{HazardError, Result};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Header carrying the API key, when one is configured.
const API_KEY_HEADER: &str = "x-api-key";

/// Blocking HTTP implementation of [`HazardStore`].
pub struct HttpHazardStore {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl std::fmt::Debug for HttpHazardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHazardStore")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpHazardStore {
    /// Create a client with the default timeout and no API key.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(base_url, None, DEFAULT_TIMEOUT)
    }

    /// Create a client with an optional API key and a request timeout.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, hazard_id: &str, resource: &str) -> String {
        format!("{}/hazard/{}/{}", self.base_url, hazard_id, resource)
    }

    fn send(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        let mut request = self.client.get(url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        debug!(url, ?query, "hazard store request");
        Ok(request.send()?)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.send(url, query)?;
        if !response.status().is_success() {
            warn!(url, status = %response.status(), "hazard store request failed");
            return Err(HazardError::Remote {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json()?)
    }

    fn curves<T: DeserializeOwned>(
        &self,
        hazard_id: &str,
        resource: &str,
        vs30: Option<u32>,
        locations: &[String],
        imts: Option<&[String]>,
    ) -> Result<Vec<T>> {
        let url = self.endpoint(hazard_id, resource);
        self.get_json(&url, &curve_query(vs30, locations, imts))
    }
}

/// Query parameters for a curve request.
fn curve_query(
    vs30: Option<u32>,
    locations: &[String],
    imts: Option<&[String]>,
) -> Vec<(&'static str, String)> {
    let mut query = vec![("locs", locations.join(","))];
    if let Some(vs30) = vs30 {
        query.push(("vs30", vs30.to_string()));
    }
    if let Some(imts) = imts {
        query.push(("imts", imts.join(",")));
    }
    query
}

impl HazardStore for HttpHazardStore {
    fn realization_curves(
        &self,
        hazard_id: &str,
        vs30: Option<u32>,
        locations: &[String],
        imts: Option<&[String]>,
    ) -> Result<Vec<RealizationRecord>> {
        self.curves(hazard_id, "realizations", vs30, locations, imts)
    }

    fn aggregate_curves(
        &self,
        hazard_id: &str,
        vs30: Option<u32>,
        locations: &[String],
        imts: Option<&[String]>,
    ) -> Result<Vec<AggregateRecord>> {
        self.curves(hazard_id, "aggregates", vs30, locations, imts)
    }

    fn metadata(&self, hazard_ids: &[String]) -> Result<Vec<HazardMetadata>> {
        let mut records = Vec::with_capacity(hazard_ids.len());
        for hazard_id in hazard_ids {
            let url = self.endpoint(hazard_id, "metadata");
            let response = self.send(&url, &[])?;
            if response.status() == StatusCode::NOT_FOUND {
                debug!(hazard_id, "no metadata record");
                continue;
            }
            if !response.status().is_success() {
                return Err(HazardError::Remote {
                    status: response.status().as_u16(),
                    url,
                });
            }
            records.push(response.json()?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let store = HttpHazardStore::new("https://hazard.example.org/api/").unwrap();
        assert_eq!(store.base_url(), "https://hazard.example.org/api");
        assert_eq!(
            store.endpoint("NSHM_v1.0.4", "aggregates"),
            "https://hazard.example.org/api/hazard/NSHM_v1.0.4/aggregates"
        );
    }

    #[test]
    fn test_curve_query() {
        let locs = vec!["-41.300~174.780".to_string(), "-43.530~172.630".to_string()];
        let imts = vec!["PGA".to_string(), "SA(0.5)".to_string()];

        let query = curve_query(Some(400), &locs, Some(&imts));
        assert_eq!(
            query,
            vec![
                ("locs", "-41.300~174.780,-43.530~172.630".to_string()),
                ("vs30", "400".to_string()),
                ("imts", "PGA,SA(0.5)".to_string()),
            ]
        );

        let query = curve_query(None, &locs[..1], None);
        assert_eq!(query, vec![("locs", "-41.300~174.780".to_string())]);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let api_key = Some("secret".to_string());
        let store =
            HttpHazardStore::with_options("http://localhost", api_key, DEFAULT_TIMEOUT).unwrap();
        let shown = format!("{store:?}");
        assert!(!shown.contains("secret"));
        assert!(shown.contains("<redacted>"));
    }
}
