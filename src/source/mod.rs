//! Backends answering the three customer queries: a page, the unfiltered
//! count and the full dataset.

use async_trait::async_trait;
use polars::error::PolarsError;
use thiserror::Error;

use crate::record::Record;
use crate::state::PageRequest;

mod frame;
mod http;
#[cfg(test)]
pub mod mock;

pub use frame::FrameSource;
pub use http::HttpSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("query failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CustomerSource: Send + Sync {
    /// Short name shown in the title bar.
    fn name(&self) -> &str;

    /// At most `request.limit` records starting at `request.offset`. An offset
    /// past the end yields an empty page.
    async fn get_page(&self, request: &PageRequest) -> Result<Vec<Record>, SourceError>;

    /// Number of records, ignoring any filter.
    async fn get_count(&self) -> Result<usize, SourceError>;

    async fn get_all(&self) -> Result<Vec<Record>, SourceError>;
}
