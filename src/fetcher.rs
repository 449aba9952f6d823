//! Runs backend queries on the tokio runtime and reports their results back to
//! the UI thread through a channel.
//!
//! Every page request is tagged with a [`RequestId`]. Only the response to the
//! latest request is ever applied; older tasks are aborted when a new page is
//! requested, and a response that still slips through is reported as
//! [`FetchOutcome::Superseded`].

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::exporter::{self, ExportOutcome, ExportSink};
use crate::record::Record;
use crate::source::{CustomerSource, SourceError};
use crate::state::PageRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestId(u64);

#[derive(Debug)]
pub enum FetchEvent {
    Page {
        id: RequestId,
        result: Result<Vec<Record>, SourceError>,
    },
    Count(Result<usize, SourceError>),
    Export(ExportOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Page,
    Count,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Rows(Vec<Record>),
    Count(usize),
    Superseded(RequestId),
    Failed(FetchKind, SourceError),
    Exported(ExportOutcome),
}

pub struct DataFetcher {
    source: Arc<dyn CustomerSource>,
    runtime: Handle,
    sender: UnboundedSender<FetchEvent>,
    last_issued: RequestId,
    in_flight: Option<JoinHandle<()>>,
}

impl DataFetcher {
    pub fn new(
        source: Arc<dyn CustomerSource>,
        runtime: Handle,
    ) -> (Self, UnboundedReceiver<FetchEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let fetcher = DataFetcher {
            source,
            runtime,
            sender,
            last_issued: RequestId(0),
            in_flight: None,
        };
        (fetcher, receiver)
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn last_issued(&self) -> RequestId {
        self.last_issued
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn fetch_page(&mut self, request: PageRequest) -> RequestId {
        self.last_issued = RequestId(self.last_issued.0 + 1);
        let id = self.last_issued;
        if let Some(previous) = self.in_flight.take() {
            previous.abort();
        }
        debug!("Fetching page {id:?}: {request:?}");

        let source = self.source.clone();
        let sender = self.sender.clone();
        self.in_flight = Some(self.runtime.spawn(async move {
            let result = source.get_page(&request).await;
            // The receiver is gone once the model was dropped.
            let _ = sender.send(FetchEvent::Page { id, result });
        }));
        id
    }

    pub fn fetch_total_count(&self) {
        debug!("Fetching total count");
        let source = self.source.clone();
        let sender = self.sender.clone();
        self.runtime.spawn(async move {
            let result = source.get_count().await;
            let _ = sender.send(FetchEvent::Count(result));
        });
    }

    pub fn export_all(&self, sink: Arc<dyn ExportSink>) {
        debug!("Exporting all records");
        let source = self.source.clone();
        let sender = self.sender.clone();
        self.runtime.spawn(async move {
            let outcome = exporter::export_all(source.as_ref(), sink.as_ref()).await;
            let _ = sender.send(FetchEvent::Export(outcome));
        });
    }

    pub fn resolve(&mut self, event: FetchEvent) -> FetchOutcome {
        match event {
            FetchEvent::Page { id, .. } if id != self.last_issued => {
                trace!("Dropping response to {id:?}, latest is {:?}", self.last_issued);
                FetchOutcome::Superseded(id)
            }
            FetchEvent::Page { result, .. } => {
                self.in_flight = None;
                match result {
                    Ok(rows) => FetchOutcome::Rows(rows),
                    Err(e) => FetchOutcome::Failed(FetchKind::Page, e),
                }
            }
            FetchEvent::Count(Ok(count)) => FetchOutcome::Count(count),
            FetchEvent::Count(Err(e)) => FetchOutcome::Failed(FetchKind::Count, e),
            FetchEvent::Export(outcome) => FetchOutcome::Exported(outcome),
        }
    }
}
