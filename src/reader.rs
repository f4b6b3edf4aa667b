//! Chunked reading of tabular sources into bounded row batches

use duckdb::Connection;

use crate::error::{CompareError, Result};
use crate::handle::{DatasetHandle, DatasetKind};
use crate::schema::{ColumnDescriptor, ColumnType, Schema};
use crate::value::Value;

/// A bounded slice of a dataset: rows in schema column order. Consumed
/// and discarded after processing, never retained.
#[derive(Debug, Clone)]
pub struct RowBatch {
    /// Index of the first row within the dataset.
    pub start_index: u64,
    pub rows: Vec<Vec<Value>>,
}

impl RowBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What to do with rows that cannot be parsed against the declared schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Skip the record, log it, and keep reading.
    Skip,
    /// Abort the whole run on the first malformed record.
    Abort,
}

/// A lazy, finite, non-restartable sequence of row batches. Uniform
/// across storage formats; implementations must preserve column order
/// and declared types.
pub trait BatchSource: Send + std::fmt::Debug {
    fn schema(&self) -> &Schema;

    /// Total row count if cheaply known, for progress estimation.
    fn row_count_hint(&self) -> Option<u64> {
        None
    }

    /// Next batch, or `None` once the source is exhausted.
    fn next_batch(&mut self) -> Result<Option<RowBatch>>;
}

/// Supplies batch sources for dataset kinds the engine cannot open
/// natively (database queries, stored procedures, APIs, archives).
/// Implemented by external collaborators.
pub trait BatchProvider: Send + Sync {
    fn open(&self, handle: &DatasetHandle) -> Result<Box<dyn BatchSource>>;
}

/// Open a batch source for a handle: file kinds natively, everything
/// else through the provider seam.
pub fn open_source(
    handle: &DatasetHandle,
    policy: MalformedPolicy,
    provider: Option<&dyn BatchProvider>,
) -> Result<Box<dyn BatchSource>> {
    if handle.kind.is_file() {
        return Ok(Box::new(FileSource::open(handle, policy)?));
    }

    match provider {
        Some(provider) => provider.open(handle),
        None => Err(CompareError::source_unavailable(format!(
            "No batch provider registered for {} source: {}",
            handle.kind, handle.location
        ))),
    }
}

/// File-backed batch source. The file is scanned through an in-memory
/// DuckDB view; batches are cut with LIMIT/OFFSET against a connection
/// that preserves insertion order, so the sequence is deterministic.
#[derive(Debug)]
pub struct FileSource {
    connection: Connection,
    schema: Schema,
    chunk_size: usize,
    offset: u64,
    row_count: u64,
    exhausted: bool,
}

impl FileSource {
    pub fn open(handle: &DatasetHandle, policy: MalformedPolicy) -> Result<Self> {
        let path = std::path::Path::new(&handle.location);
        if !path.exists() {
            return Err(CompareError::source_unavailable(format!(
                "File not found: {}",
                handle.location
            )));
        }
        if handle.chunk_size == 0 {
            return Err(CompareError::config("Chunk size must be greater than 0"));
        }

        let connection = Connection::open_in_memory()?;
        connection.execute("SET memory_limit='2GB'", [])?;
        connection.execute("SET preserve_insertion_order=true", [])?;

        let escaped = handle.location.replace('\'', "''");
        let scan = match handle.kind {
            DatasetKind::Parquet => format!("read_parquet('{}')", escaped),
            DatasetKind::Csv | DatasetKind::Dat => format!(
                "read_csv('{}', delim='{}', header=true, ignore_errors={})",
                escaped,
                handle.delimiter,
                policy == MalformedPolicy::Skip
            ),
            other => {
                return Err(CompareError::source_unavailable(format!(
                    "{} sources are not file-backed",
                    other
                )))
            }
        };

        connection
            .execute(
                &format!("CREATE OR REPLACE VIEW dataset AS SELECT * FROM {}", scan),
                [],
            )
            .map_err(|e| convert_open_error(e, &handle.location))?;

        let schema = describe_schema(&connection)?;
        if schema.is_empty() {
            return Err(CompareError::source_unavailable(format!(
                "Source has no columns: {}",
                handle.location
            )));
        }

        let row_count: u64 = connection
            .prepare("SELECT COUNT(*) FROM dataset")?
            .query_row([], |row| row.get(0))
            .map_err(|e| convert_open_error(e, &handle.location))?;

        Ok(Self {
            connection,
            schema,
            chunk_size: handle.chunk_size,
            offset: 0,
            row_count,
            exhausted: false,
        })
    }
}

impl BatchSource for FileSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count_hint(&self) -> Option<u64> {
        Some(self.row_count)
    }

    fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        if self.exhausted {
            return Ok(None);
        }

        let column_count = self.schema.len();
        let start_index = self.offset;
        let sql = format!(
            "SELECT * FROM dataset LIMIT {} OFFSET {}",
            self.chunk_size, self.offset
        );

        let mut stmt = self.connection.prepare(&sql)?;
        let mapped = stmt.query_map([], |row| {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(Value::from_duckdb(row.get_ref(i)?));
            }
            Ok(values)
        })?;

        let mut rows = Vec::new();
        for row in mapped {
            let row = row.map_err(|e| {
                CompareError::malformed_record(start_index + rows.len() as u64, e.to_string())
            })?;
            rows.push(row);
        }

        if rows.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.offset += rows.len() as u64;
        if rows.len() < self.chunk_size {
            self.exhausted = true;
        }

        Ok(Some(RowBatch { start_index, rows }))
    }
}

/// In-memory batch source. Reference implementation for `BatchProvider`
/// collaborators; also the test seam for chunk-size experiments.
#[derive(Debug)]
pub struct MemorySource {
    schema: Schema,
    rows: std::collections::VecDeque<Vec<Value>>,
    chunk_size: usize,
    offset: u64,
}

impl MemorySource {
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>, chunk_size: usize) -> Self {
        Self {
            schema,
            rows: rows.into(),
            chunk_size: chunk_size.max(1),
            offset: 0,
        }
    }
}

impl BatchSource for MemorySource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count_hint(&self) -> Option<u64> {
        Some(self.offset + self.rows.len() as u64)
    }

    fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        if self.rows.is_empty() {
            return Ok(None);
        }

        let take = self.chunk_size.min(self.rows.len());
        let rows: Vec<Vec<Value>> = self.rows.drain(..take).collect();
        let batch = RowBatch {
            start_index: self.offset,
            rows,
        };
        self.offset += batch.rows.len() as u64;
        Ok(Some(batch))
    }
}

fn describe_schema(connection: &Connection) -> Result<Schema> {
    let mut stmt = connection.prepare("DESCRIBE dataset")?;
    let rows = stmt.query_map([], |row| {
        let name: String = row.get(0)?;
        let declared: String = row.get(1)?;
        Ok((name, declared))
    })?;

    let mut columns = Vec::new();
    for row in rows {
        let (name, declared) = row?;
        columns.push(ColumnDescriptor {
            name,
            column_type: ColumnType::parse(&declared),
            // DESCRIBE does not report nullability
            nullable: true,
        });
    }

    Ok(Schema::new(columns))
}

/// Map DuckDB scan errors onto the reader's error taxonomy.
fn convert_open_error(error: duckdb::Error, location: &str) -> CompareError {
    let message = error.to_string();

    if message.contains("No files found")
        || message.contains("does not exist")
        || message.contains("Permission denied")
    {
        CompareError::source_unavailable(format!("Cannot open '{}': {}", location, message))
    } else if message.contains("CSV Error")
        || message.contains("Could not convert")
        || message.contains("Invalid Input")
        || message.contains("Unterminated quoted field")
    {
        CompareError::malformed_record(0, format!("Malformed record in '{}': {}", location, message))
    } else {
        CompareError::DuckDb(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> DatasetHandle {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        DatasetHandle::from_path(path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let handle = DatasetHandle::new(DatasetKind::Csv, "/nonexistent/file.csv");
        let err = FileSource::open(&handle, MalformedPolicy::Abort).unwrap_err();
        assert_eq!(err.kind(), "source_unavailable");
    }

    #[test]
    fn test_non_file_kind_needs_provider() {
        let handle = DatasetHandle::new(DatasetKind::SqlServer, "server=db;query=SELECT 1");
        let err = open_source(&handle, MalformedPolicy::Abort, None).unwrap_err();
        assert_eq!(err.kind(), "source_unavailable");
    }

    #[test]
    fn test_csv_schema_and_batches() {
        let dir = TempDir::new().unwrap();
        let handle = write_csv(
            &dir,
            "data.csv",
            "id,name,amount\n1,Alice,10.5\n2,Bob,20.0\n3,Carol,30.25\n",
        )
        .with_chunk_size(2);

        let mut source = FileSource::open(&handle, MalformedPolicy::Abort).unwrap();
        assert_eq!(source.schema().column_names(), vec!["id", "name", "amount"]);
        assert_eq!(source.row_count_hint(), Some(3));

        let first = source.next_batch().unwrap().unwrap();
        assert_eq!(first.start_index, 0);
        assert_eq!(first.len(), 2);
        assert_eq!(first.rows[0][1], Value::Text("Alice".to_string()));

        let second = source.next_batch().unwrap().unwrap();
        assert_eq!(second.start_index, 2);
        assert_eq!(second.len(), 1);

        assert!(source.next_batch().unwrap().is_none());
        // Non-restartable: stays exhausted.
        assert!(source.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_dat_delimiter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.dat");
        fs::write(&path, "id|val\n1|x\n2|y\n").unwrap();

        let handle = DatasetHandle::new(DatasetKind::Dat, path.to_str().unwrap())
            .with_delimiter('|')
            .with_chunk_size(10);
        let mut source = FileSource::open(&handle, MalformedPolicy::Abort).unwrap();
        assert_eq!(source.schema().column_names(), vec!["id", "val"]);
        let batch = source.next_batch().unwrap().unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_memory_source_chunking() {
        let schema = Schema::new(vec![ColumnDescriptor::new(
            "id",
            ColumnType::Integer,
        )]);
        let rows: Vec<Vec<Value>> = (0..5).map(|i| vec![Value::Int(i)]).collect();
        let mut source = MemorySource::new(schema, rows, 2);

        let mut seen = 0;
        while let Some(batch) = source.next_batch().unwrap() {
            seen += batch.len();
            assert!(batch.len() <= 2);
        }
        assert_eq!(seen, 5);
    }
}
