// COCH Exporter - Search endpoint client
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Aggregation fetch collaborators.
//!
//! [`AggregationSource`] abstracts where raw aggregation responses come
//! from: the live search endpoint ([`SearchClient`]) or a directory of
//! canned responses ([`FileSource`]) for tests and offline runs. No
//! retries live here; a failed fetch is reported once and the poll cycle
//! moves on.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fetch errors.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of raw aggregation responses, one per (index, component).
#[async_trait]
pub trait AggregationSource: Send + Sync {
    /// Fetch the aggregation response for one index/component pair.
    async fn fetch(&self, index: &str, component: &str) -> Result<Vec<u8>, FetchError>;
}

/// Client issuing the nested aggregation query against a search endpoint.
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
}

impl SearchClient {
    /// Create a client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    fn search_url(&self, index: &str) -> String {
        format!("{}/{}/_search?size=0", self.base_url, index)
    }
}

#[async_trait]
impl AggregationSource for SearchClient {
    async fn fetch(&self, index: &str, component: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.search_url(index);
        let body = search_body(component);

        let response = self
            .http
            .get(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Http { url, source })?;
        Ok(bytes.to_vec())
    }
}

/// Directory of canned responses, one `{index}__{component}.json` file
/// per pair. Doubles as the offline test source.
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn response_path(&self, index: &str, component: &str) -> PathBuf {
        self.dir.join(format!("{index}__{component}.json"))
    }
}

#[async_trait]
impl AggregationSource for FileSource {
    async fn fetch(&self, index: &str, component: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.response_path(index, component);
        tokio::fs::read(&path)
            .await
            .map_err(|source| FetchError::File { path, source })
    }
}

/// The aggregation request body: per-config-file terms buckets, the
/// single most recent timestamp bucket per file, key/value/type terms
/// under that, and min/max/cardinality sub-aggregations per leaf. The
/// component name narrows the match and the time range caps staleness.
pub fn search_body(component: &str) -> Value {
    json!({
        "aggs": {
            "CONFIG_FILE_ID": {
                "terms": {
                    "field": "config_file_id.keyword",
                    "order": { "1": "desc" },
                    "size": 10000
                },
                "aggs": {
                    "1": {
                        "cardinality": { "field": "metric" }
                    },
                    "TIMESTAMP": {
                        "terms": {
                            "field": "timestamp",
                            "order": { "_key": "desc" },
                            "size": 1
                        },
                        "aggs": {
                            "KEY_VALUE_TYPE": {
                                "terms": {
                                    "script": {
                                        "source": "doc['key.keyword'] + ' ' + doc['value.keyword'] + ' ' + doc['type.keyword']",
                                        "lang": "painless"
                                    },
                                    "size": 10000
                                },
                                "aggs": {
                                    "1": {
                                        "cardinality": { "field": "metric" }
                                    },
                                    "MAX": {
                                        "max": { "field": "metric" }
                                    },
                                    "MIN": {
                                        "min": { "field": "metric" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        },
        "size": 0,
        "_source": { "excludes": [] },
        "stored_fields": ["*"],
        "script_fields": {},
        "docvalue_fields": [
            { "field": "@timestamp", "format": "date_time" },
            { "field": "timestamp", "format": "date_time" }
        ],
        "query": {
            "bool": {
                "must": [],
                "filter": [
                    {
                        "bool": {
                            "should": [
                                {
                                    "query_string": {
                                        "fields": ["config_file_id.keyword"],
                                        "query": format!("*{component}*")
                                    }
                                }
                            ],
                            "minimum_should_match": 1
                        }
                    },
                    {
                        "range": {
                            "@timestamp": { "gte": "now-8m", "lte": "now" }
                        }
                    }
                ],
                "should": [],
                "must_not": []
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_search_body_shape() {
        let body = search_body("component-1");
        let aggs = &body["aggs"]["CONFIG_FILE_ID"]["aggs"];
        assert_eq!(aggs["TIMESTAMP"]["terms"]["size"], 1);
        assert_eq!(aggs["TIMESTAMP"]["terms"]["order"]["_key"], "desc");

        let leaf = &aggs["TIMESTAMP"]["aggs"]["KEY_VALUE_TYPE"]["aggs"];
        assert!(leaf.get("MIN").is_some());
        assert!(leaf.get("MAX").is_some());
        assert!(leaf.get("1").is_some());

        let body_text = body.to_string();
        assert!(body_text.contains("*component-1*"));
    }

    #[test]
    fn test_search_url() {
        let client = SearchClient::new("http://localhost:9200/", Duration::from_secs(10)).unwrap();
        assert_eq!(
            client.search_url("index-1-*"),
            "http://localhost:9200/index-1-*/_search?size=0"
        );
    }

    #[tokio::test]
    async fn test_file_source_reads_pair_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index-1__component-1.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"aggregations": {{}}}}"#).unwrap();

        let source = FileSource::new(dir.path());
        let raw = source.fetch("index-1", "component-1").await.unwrap();
        assert_eq!(raw, br#"{"aggregations": {}}"#);
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path());
        let err = source.fetch("index-1", "component-1").await.unwrap_err();
        assert!(matches!(err, FetchError::File { .. }));
    }
}
