use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use derive_setters::Setters;

use crate::domain::{CTVError, MAX_PAGE_SIZE, PAGE_SIZE};
use crate::source::{CustomerSource, FrameSource, HttpSource};

#[derive(Parser, Debug, Clone, Setters)]
#[command(version, about = "Browse, sort, filter and export customer records.")]
#[setters(prefix = "with_")]
pub struct CTVConfig {
    /// CSV, parquet or arrow file holding the customer records
    #[arg(required_unless_present = "url", conflicts_with = "url")]
    #[setters(strip_option)]
    pub data: Option<String>,

    /// Base url of a customer REST backend
    #[arg(long)]
    #[setters(strip_option)]
    pub url: Option<String>,

    /// Number of records per page
    #[arg(long, default_value_t = PAGE_SIZE)]
    pub page_size: usize,

    /// Directory the export is written to
    #[arg(long, default_value = ".")]
    pub export_dir: String,

    #[arg(long, default_value = "ctv.log")]
    pub log_file: String,

    /// Milliseconds to wait for terminal events per frame
    #[arg(long, default_value_t = 100)]
    pub event_poll_time: u64,

    /// Artificial delay in milliseconds added to every query on a data file
    #[arg(long, default_value_t = 0)]
    pub latency_ms: u64,
}

fn expand(path: &str) -> Result<PathBuf, CTVError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| CTVError::InvalidConfig(format!("cannot expand \"{path}\": {e}")))
}

impl CTVConfig {
    pub fn validate(&self) -> Result<(), CTVError> {
        if self.page_size == 0 {
            return Err(CTVError::InvalidConfig("page size must be positive".into()));
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(CTVError::InvalidConfig(format!(
                "page size must not exceed {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    pub fn export_path(&self) -> Result<PathBuf, CTVError> {
        expand(&self.export_dir)
    }

    pub fn log_path(&self) -> Result<PathBuf, CTVError> {
        expand(&self.log_file)
    }

    pub fn data_path(&self) -> Result<Option<PathBuf>, CTVError> {
        self.data.as_deref().map(expand).transpose()
    }

    pub fn open_source(&self) -> Result<Arc<dyn CustomerSource>, CTVError> {
        if let Some(url) = &self.url {
            return Ok(Arc::new(HttpSource::new(url.clone())));
        }
        match self.data_path()? {
            Some(path) => Ok(Arc::new(
                FrameSource::load(path)?.with_latency(Duration::from_millis(self.latency_ms)),
            )),
            None => Err(CTVError::InvalidConfig(
                "either a data file or --url is required".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CTVConfig::parse_from(["ctv", "customers.csv"]);
        assert_eq!(config.data.as_deref(), Some("customers.csv"));
        assert_eq!(config.page_size, 500);
        assert_eq!(config.export_dir, ".");
        assert_eq!(config.event_poll_time, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn url_and_file_are_exclusive() {
        assert!(CTVConfig::try_parse_from(["ctv"]).is_err());
        assert!(CTVConfig::try_parse_from(["ctv", "a.csv", "--url", "http://x"]).is_err());
        let config = CTVConfig::try_parse_from(["ctv", "--url", "http://x"]).unwrap();
        assert_eq!(config.url.as_deref(), Some("http://x"));
        assert_eq!(config.open_source().unwrap().name(), "http://x");
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let config = CTVConfig::parse_from(["ctv", "a.csv"]).with_page_size(0);
        assert!(matches!(config.validate(), Err(CTVError::InvalidConfig(_))));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_page_size_is_rejected() {
        let config = CTVConfig::parse_from(["ctv", "a.csv"]).with_page_size(MAX_PAGE_SIZE);
        assert!(config.validate().is_ok());
        let config = config.with_page_size(MAX_PAGE_SIZE + 1);
        assert!(matches!(config.validate(), Err(CTVError::InvalidConfig(_))));
    }

    #[test]
    fn paths_are_expanded() {
        let config = CTVConfig::parse_from(["ctv", "a.csv"])
            .with_export_dir("$CTV_TEST_UNSET_VAR/x".to_string());
        assert!(config.export_path().is_err());

        let home = std::env::var("HOME").unwrap_or_default();
        let config = config.with_export_dir("~/exports".to_string());
        if !home.is_empty() {
            assert_eq!(config.export_path().unwrap(), PathBuf::from(home).join("exports"));
        }
    }

    #[test]
    fn missing_data_file_fails_to_open() {
        let config = CTVConfig::parse_from(["ctv", "/nonexistent/customers.csv"]);
        assert!(matches!(config.open_source(), Err(CTVError::FileNotFound)));
    }
}
