use std::fs;
use std::path::PathBuf;

use tracing::{error, info};

use crate::domain::{CTVError, EXPORT_FILE_NAME, EXPORT_MIME_TYPE};
use crate::record::{RECORD_FIELDS, Record};
use crate::source::CustomerSource;

/// Receives the serialized export. Stands in for the "save as" dialog of a
/// browser.
pub trait ExportSink: Send + Sync {
    fn save(&self, file_name: &str, mime_type: &str, contents: &[u8]) -> Result<PathBuf, CTVError>;
}

/// Writes exports into a directory.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: PathBuf) -> Self {
        DirectorySink { dir }
    }
}

impl ExportSink for DirectorySink {
    fn save(&self, file_name: &str, mime_type: &str, contents: &[u8]) -> Result<PathBuf, CTVError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, contents)?;
        info!("Saved {} bytes of {mime_type} to {:?}", contents.len(), path);
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Downloaded { path: PathBuf, records: usize },
    Empty,
    Failed(String),
}

/// Quote a field if it contains the delimiter, a quote or a line break.
/// Embedded quotes are doubled.
pub fn encode_field(field: &str) -> String {
    let needs_quoting = field.chars().any(|c| matches!(c, ',' | '"' | '\n' | '\r'));
    if needs_quoting {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn encode_line<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields
        .into_iter()
        .map(encode_field)
        .collect::<Vec<String>>()
        .join(",")
}

/// Header line followed by one line per record, joined by `\n` with no
/// trailing line terminator.
pub fn encode_csv(records: &[Record]) -> String {
    std::iter::once(encode_line(RECORD_FIELDS))
        .chain(records.iter().map(|r| encode_line(r.values())))
        .collect::<Vec<String>>()
        .join("\n")
}

/// Fetch the complete unfiltered dataset and hand it to `sink` as
/// `AllCustomerData.csv`.
pub async fn export_all(source: &dyn CustomerSource, sink: &dyn ExportSink) -> ExportOutcome {
    let records = match source.get_all().await {
        Ok(records) => records,
        Err(e) => {
            error!("Error fetching all customer data: {e}");
            return ExportOutcome::Failed(e.to_string());
        }
    };
    if records.is_empty() {
        error!("No data found for download.");
        return ExportOutcome::Empty;
    }

    let csv = encode_csv(&records);
    match sink.save(EXPORT_FILE_NAME, EXPORT_MIME_TYPE, csv.as_bytes()) {
        Ok(path) => ExportOutcome::Downloaded {
            path,
            records: records.len(),
        },
        Err(e) => {
            error!("Error saving {EXPORT_FILE_NAME}: {e}");
            ExportOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
pub mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::source::mock::MockSource;

    /// Keeps every save in memory.
    #[derive(Default)]
    pub struct MemorySink {
        pub saved: Mutex<Vec<(String, String, String)>>,
    }

    impl ExportSink for MemorySink {
        fn save(
            &self,
            file_name: &str,
            mime_type: &str,
            contents: &[u8],
        ) -> Result<PathBuf, CTVError> {
            self.saved.lock().unwrap().push((
                file_name.to_string(),
                mime_type.to_string(),
                String::from_utf8_lossy(contents).to_string(),
            ));
            Ok(PathBuf::from(file_name))
        }
    }

    #[test]
    fn single_record_matches_expected_output() {
        let csv = encode_csv(&[Record::new("C1", "Alice", "Booked", "Loan")]);
        assert_eq!(csv, "Customer_ID__c,Name,Stage__c,Product__c\nC1,Alice,Booked,Loan");
    }

    #[test]
    fn fields_with_delimiters_are_quoted() {
        assert_eq!(encode_field("plain text"), "plain text");
        assert_eq!(encode_field("Smith, John"), "\"Smith, John\"");
        assert_eq!(encode_field("the \"best\" loan"), "\"the \"\"best\"\" loan\"");
        assert_eq!(encode_field("two\nlines"), "\"two\nlines\"");
        assert_eq!(encode_field("cr\rlf"), "\"cr\rlf\"");
        assert_eq!(encode_field(""), "");
    }

    #[test]
    fn rows_follow_column_order() {
        let csv = encode_csv(&[
            Record::new("C1", "Alice", "Booked", "Loan"),
            Record::new("C2", "Bob, Jr.", "OPS Queue", "Card"),
        ]);
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "C2,\"Bob, Jr.\",OPS Queue,Card");
    }

    #[tokio::test]
    async fn export_saves_all_records() {
        let source = MockSource::numbered(3);
        let sink = MemorySink::default();
        let outcome = export_all(&source, &sink).await;
        assert_eq!(
            outcome,
            ExportOutcome::Downloaded {
                path: PathBuf::from("AllCustomerData.csv"),
                records: 3
            }
        );
        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        let (name, mime, contents) = &saved[0];
        assert_eq!(name, "AllCustomerData.csv");
        assert_eq!(mime, "text/plain");
        assert_eq!(contents.lines().count(), 4);
        assert!(contents.starts_with("Customer_ID__c,Name,Stage__c,Product__c\nC00000,"));
    }

    #[tokio::test]
    async fn empty_dataset_saves_nothing() {
        let source = MockSource::new(Vec::new());
        let sink = MemorySink::default();
        assert_eq!(export_all(&source, &sink).await, ExportOutcome::Empty);
        assert!(sink.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_request_saves_nothing() {
        let source = MockSource::numbered(3);
        source.fail_all(true);
        let sink = MemorySink::default();
        assert!(matches!(
            export_all(&source, &sink).await,
            ExportOutcome::Failed(_)
        ));
        assert!(sink.saved.lock().unwrap().is_empty());
    }

    #[test]
    fn directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("exports"));
        let path = sink.save(EXPORT_FILE_NAME, EXPORT_MIME_TYPE, b"a,b").unwrap();
        assert_eq!(path, dir.path().join("exports").join("AllCustomerData.csv"));
        assert_eq!(fs::read_to_string(path).unwrap(), "a,b");
    }
}
