use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{CustomerSource, SourceError};
use crate::record::{Record, SortDirection};
use crate::state::PageRequest;

/// In-memory source with switchable failures, recording every page request.
#[derive(Default)]
pub struct MockSource {
    records: Vec<Record>,
    fail_pages: AtomicBool,
    fail_count: AtomicBool,
    fail_all: AtomicBool,
    requests: Mutex<Vec<PageRequest>>,
}

impl MockSource {
    pub fn new(records: Vec<Record>) -> Self {
        MockSource {
            records,
            ..Default::default()
        }
    }

    pub fn numbered(count: usize) -> Self {
        MockSource::new(
            (0..count)
                .map(|i| {
                    let stage = if i % 2 == 0 { "Booked" } else { "OPS Queue" };
                    Record::new(format!("C{i:05}"), format!("Name {i:05}"), stage, "Loan")
                })
                .collect(),
        )
    }

    pub fn fail_pages(&self, fail: bool) {
        self.fail_pages.store(fail, Ordering::SeqCst);
    }

    pub fn fail_count(&self, fail: bool) {
        self.fail_count.store(fail, Ordering::SeqCst);
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CustomerSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_page(&self, request: &PageRequest) -> Result<Vec<Record>, SourceError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_pages.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("page".into()));
        }
        let mut rows: Vec<Record> = self
            .records
            .iter()
            .filter(|r| request.filter.stage().is_none_or(|s| r.stage == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ord = a.value(request.sort_field).cmp(b.value(request.sort_field));
            match request.sort_direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
        Ok(rows
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect())
    }

    async fn get_count(&self) -> Result<usize, SourceError> {
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("count".into()));
        }
        Ok(self.records.len())
    }

    async fn get_all(&self) -> Result<Vec<Record>, SourceError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("all".into()));
        }
        Ok(self.records.clone())
    }
}
