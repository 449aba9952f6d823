use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{CustomerSource, SourceError};
use crate::record::Record;
use crate::state::PageRequest;

/// Forwards the customer queries to a JSON REST service.
///
/// Endpoints, relative to the base url:
/// - `GET customers?limitSize=&offsetValue=&sortedBy=&sortedDirection=&stageFilter=`
/// - `GET customers/count`
/// - `GET customers/all`
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpSource {
            client: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, SourceError> {
        let url = self.endpoint(path);
        debug!("GET {url} {query:?}");
        let body = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn page_query(request: &PageRequest) -> Vec<(&'static str, String)> {
    vec![
        ("limitSize", request.limit.to_string()),
        ("offsetValue", request.offset.to_string()),
        ("sortedBy", request.sort_field.field_name().to_string()),
        ("sortedDirection", request.sort_direction.as_str().to_string()),
        ("stageFilter", request.filter.value().to_string()),
    ]
}

#[async_trait]
impl CustomerSource for HttpSource {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn get_page(&self, request: &PageRequest) -> Result<Vec<Record>, SourceError> {
        self.get_json("customers", &page_query(request)).await
    }

    async fn get_count(&self) -> Result<usize, SourceError> {
        self.get_json("customers/count", &[]).await
    }

    async fn get_all(&self) -> Result<Vec<Record>, SourceError> {
        self.get_json("customers/all", &[]).await
    }
}
