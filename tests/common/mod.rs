//! Common test utilities and helpers

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use tabcompare::handle::DatasetHandle;
use tabcompare::reader::{BatchProvider, BatchSource, MemorySource};
use tabcompare::schema::Schema;
use tabcompare::value::Value;
use tabcompare::Result;

/// Test fixture managing a temporary directory of input files
pub struct TestFixture {
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Create a CSV file from rows of string cells
    pub fn create_csv(&self, name: &str, data: &[Vec<&str>]) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        let mut content = String::new();

        for row in data {
            content.push_str(&row.join(","));
            content.push('\n');
        }

        fs::write(&path, content)?;
        Ok(path)
    }

    /// Create a CSV file from raw string content
    pub fn create_csv_raw(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Build a dataset handle for a file created in this fixture
    pub fn handle(&self, name: &str, chunk_size: usize) -> Result<DatasetHandle> {
        let path = self.temp_dir.path().join(name);
        Ok(DatasetHandle::from_path(path.to_str().expect("utf-8 path"))?
            .with_chunk_size(chunk_size))
    }
}

/// Batch provider backed by in-memory datasets, keyed by handle location.
/// Exercises the collaborator seam for non-file dataset kinds.
pub struct MemoryProvider {
    datasets: Vec<(String, Schema, Vec<Vec<Value>>)>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            datasets: Vec::new(),
        }
    }

    pub fn register(
        mut self,
        location: impl Into<String>,
        schema: Schema,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        self.datasets.push((location.into(), schema, rows));
        self
    }
}

impl BatchProvider for MemoryProvider {
    fn open(&self, handle: &DatasetHandle) -> Result<Box<dyn BatchSource>> {
        for (location, schema, rows) in &self.datasets {
            if location == &handle.location {
                return Ok(Box::new(MemorySource::new(
                    schema.clone(),
                    rows.clone(),
                    handle.chunk_size,
                )));
            }
        }
        Err(tabcompare::CompareError::source_unavailable(format!(
            "No registered dataset for location: {}",
            handle.location
        )))
    }
}
