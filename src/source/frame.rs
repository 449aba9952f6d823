use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, trace};

use super::{CustomerSource, SourceError};
use crate::domain::CTVError;
use crate::record::{
    CUSTOMER_ID_FIELD, NAME_FIELD, PRODUCT_FIELD, RECORD_FIELDS, Record, STAGE_FIELD,
    SortDirection,
};
use crate::state::PageRequest;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// Serves customer queries from a data file held in memory.
pub struct FrameSource {
    name: String,
    frame: DataFrame,
    latency: Duration,
}

impl FrameSource {
    pub fn load(path: PathBuf) -> Result<Self, CTVError> {
        let file_info = FrameSource::get_file_info(path)?;
        let start_time = Instant::now();
        let lazy = match file_info.file_type {
            FileType::CSV => FrameSource::load_csv(&file_info.path)?,
            FileType::PARQUET => FrameSource::load_parquet(&file_info.path)?,
            FileType::ARROW => FrameSource::load_arrow(&file_info.path)?,
        };
        let frame = lazy.collect()?;
        info!(
            "Loaded {} rows ({} bytes) from {:?} in {}ms",
            frame.height(),
            file_info.file_size,
            file_info.path,
            start_time.elapsed().as_millis()
        );

        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        FrameSource::from_frame(name, frame)
    }

    pub fn from_frame(name: impl Into<String>, frame: DataFrame) -> Result<Self, CTVError> {
        for field in RECORD_FIELDS {
            if frame.get_column_index(field).is_none() {
                return Err(CTVError::MissingColumn(field.to_string()));
            }
        }
        Ok(FrameSource {
            name: name.into(),
            frame,
            latency: Duration::ZERO,
        })
    }

    pub fn from_records(name: impl Into<String>, records: &[Record]) -> Result<Self, CTVError> {
        let frame = df!(
            CUSTOMER_ID_FIELD => records.iter().map(|r| r.customer_id.as_str()).collect::<Vec<_>>(),
            NAME_FIELD => records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            STAGE_FIELD => records.iter().map(|r| r.stage.as_str()).collect::<Vec<_>>(),
            PRODUCT_FIELD => records.iter().map(|r| r.product.as_str()).collect::<Vec<_>>(),
        )?;
        FrameSource::from_frame(name, frame)
    }

    /// Delay every query by `latency`, emulating a remote round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, CTVError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CTVError::FileNotFound,
            ErrorKind::PermissionDenied => CTVError::PermissionDenied,
            _ => CTVError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(CTVError::LoadingFailed("Not a file!".into()));
        }

        Ok(FileInfo {
            file_type: FrameSource::detect_file_type(&path)?,
            file_size: metadata.len(),
            path,
        })
    }

    fn detect_file_type(path: &Path) -> Result<FileType, CTVError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(CTVError::UnknownFileType),
        }
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

fn query_page(frame: DataFrame, request: &PageRequest) -> Result<Vec<Record>, PolarsError> {
    let limit = IdxSize::try_from(request.limit).map_err(|_| {
        PolarsError::ComputeError(format!("page size {} is too large", request.limit).into())
    })?;
    let mut lazy = frame.lazy();
    if let Some(stage) = request.filter.stage() {
        lazy = lazy.filter(col(STAGE_FIELD).cast(DataType::String).eq(lit(stage)));
    }
    let page = lazy
        .sort_by_exprs(
            vec![col(request.sort_field.field_name())],
            SortMultipleOptions::default()
                .with_order_descending(request.sort_direction == SortDirection::Desc)
                .with_maintain_order(true),
        )
        .slice(request.offset as i64, limit)
        .collect()?;
    trace!("Query {:?} returned {} rows", request, page.height());
    frame_to_records(&page)
}

// Columns are converted in parallel, each one cast to strings.
fn frame_to_records(frame: &DataFrame) -> Result<Vec<Record>, PolarsError> {
    let columns = RECORD_FIELDS
        .par_iter()
        .map(|name| column_values(frame, name))
        .collect::<Result<Vec<_>, _>>()?;
    let [ids, names, stages, products]: [Vec<String>; 4] = columns
        .try_into()
        .map_err(|_| PolarsError::ComputeError("unexpected number of record columns".into()))?;

    Ok(ids
        .into_iter()
        .zip(names)
        .zip(stages)
        .zip(products)
        .map(|(((customer_id, name), stage), product)| Record {
            customer_id,
            name,
            stage,
            product,
        })
        .collect())
}

fn column_values(frame: &DataFrame, name: &str) -> Result<Vec<String>, PolarsError> {
    let column = frame.column(name)?.cast(&DataType::String)?;
    let values = column
        .str()?
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect();
    Ok(values)
}

async fn run_blocking<T, F>(query: F) -> Result<T, SourceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PolarsError> + Send + 'static,
{
    tokio::task::spawn_blocking(query)
        .await
        .map_err(|e| SourceError::Unavailable(e.to_string()))?
        .map_err(SourceError::from)
}

#[async_trait]
impl CustomerSource for FrameSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_page(&self, request: &PageRequest) -> Result<Vec<Record>, SourceError> {
        self.round_trip().await;
        let frame = self.frame.clone();
        let request = request.clone();
        run_blocking(move || query_page(frame, &request)).await
    }

    async fn get_count(&self) -> Result<usize, SourceError> {
        self.round_trip().await;
        debug!("Counting {} rows", self.frame.height());
        Ok(self.frame.height())
    }

    async fn get_all(&self) -> Result<Vec<Record>, SourceError> {
        self.round_trip().await;
        let frame = self.frame.clone();
        run_blocking(move || frame_to_records(&frame)).await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::record::{SortField, StageFilter};

    fn records() -> Vec<Record> {
        vec![
            Record::new("C3", "Carol", "OPS Queue", "Card"),
            Record::new("C1", "Alice", "Booked", "Loan"),
            Record::new("C4", "Dave", "Booked", "Mortgage"),
            Record::new("C2", "Bob", "Branch Queue", "Loan"),
            Record::new("C5", "Eve", "Booked", "Card"),
        ]
    }

    fn request(offset: usize, limit: usize) -> PageRequest {
        PageRequest {
            limit,
            offset,
            sort_field: SortField::Name,
            sort_direction: SortDirection::Asc,
            filter: StageFilter::All,
        }
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.customer_id.as_str()).collect()
    }

    #[tokio::test]
    async fn pages_are_sorted_and_sliced() {
        let source = FrameSource::from_records("test", &records()).unwrap();
        let first = source.get_page(&request(0, 2)).await.unwrap();
        assert_eq!(ids(&first), ["C1", "C2"]);
        let second = source.get_page(&request(2, 2)).await.unwrap();
        assert_eq!(ids(&second), ["C3", "C4"]);
        let last = source.get_page(&request(4, 2)).await.unwrap();
        assert_eq!(ids(&last), ["C5"]);
    }

    #[tokio::test]
    async fn out_of_range_offset_returns_empty_page() {
        let source = FrameSource::from_records("test", &records()).unwrap();
        let page = source.get_page(&request(100, 10)).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn filter_and_descending_sort() {
        let source = FrameSource::from_records("test", &records()).unwrap();
        let mut req = request(0, 10);
        req.filter = StageFilter::Booked;
        req.sort_field = SortField::CustomerId;
        req.sort_direction = SortDirection::Desc;
        let page = source.get_page(&req).await.unwrap();
        assert_eq!(ids(&page), ["C5", "C4", "C1"]);
    }

    #[tokio::test]
    async fn count_ignores_filter_and_all_returns_everything() {
        let source = FrameSource::from_records("test", &records()).unwrap();
        assert_eq!(source.get_count().await.unwrap(), 5);
        assert_eq!(source.get_all().await.unwrap(), records());
    }

    #[tokio::test]
    async fn loads_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "Customer_ID__c,Name,Stage__c,Product__c,Region").unwrap();
        writeln!(file, "C1,Alice,Booked,Loan,North").unwrap();
        writeln!(file, "C2,Bob,OPS Queue,Card,South").unwrap();
        drop(file);

        let source = FrameSource::load(path).unwrap();
        assert_eq!(source.name(), "customers.csv");
        assert_eq!(source.get_count().await.unwrap(), 2);
        let all = source.get_all().await.unwrap();
        assert_eq!(all[1], Record::new("C2", "Bob", "OPS Queue", "Card"));
    }

    #[tokio::test]
    async fn fixture_keeps_quoted_fields() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/customers.csv");
        let source = FrameSource::load(path).unwrap();
        assert_eq!(source.get_count().await.unwrap(), 7);

        let mut req = request(0, 10);
        req.filter = StageFilter::OpsQueue;
        let page = source.get_page(&req).await.unwrap();
        assert_eq!(ids(&page), ["C1003", "C1006"]);
        assert_eq!(page[1].name, "Frank \"The Tank\" Gil");
    }

    #[cfg(target_pointer_width = "64")]
    #[tokio::test]
    async fn oversized_limit_is_an_error() {
        let source = FrameSource::from_records("test", &records()).unwrap();
        let page = source.get_page(&request(0, u32::MAX as usize + 1)).await;
        assert!(matches!(page, Err(SourceError::Polars(_))));
    }

    #[test]
    fn rejects_frames_without_required_columns() {
        let frame = df!("Name" => ["Alice"]).unwrap();
        let err = FrameSource::from_frame("broken", frame).err().unwrap();
        assert!(matches!(err, CTVError::MissingColumn(c) if c == CUSTOMER_ID_FIELD));
    }

    #[test]
    fn rejects_unknown_file_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.txt");
        fs::write(&path, "x").unwrap();
        assert!(matches!(FrameSource::load(path), Err(CTVError::UnknownFileType)));
        assert!(matches!(
            FrameSource::load(dir.path().join("missing.csv")),
            Err(CTVError::FileNotFound)
        ));
    }
}
