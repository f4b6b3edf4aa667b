//! Dataset handles identifying where comparison inputs come from

use serde::{Deserialize, Serialize};

use crate::DEFAULT_CHUNK_SIZE;

/// Storage kind of a dataset. File kinds are read natively; the rest are
/// supplied by external collaborators through a `BatchProvider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    Csv,
    Dat,
    Parquet,
    SqlServer,
    StoredProc,
    Teradata,
    Api,
    ZippedFlatfile,
}

impl DatasetKind {
    /// Kinds the chunked reader can open without a collaborator.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::Csv | Self::Dat | Self::Parquet)
    }

    /// Guess the kind from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" | "tsv" => Some(Self::Csv),
            "dat" | "txt" => Some(Self::Dat),
            "parquet" => Some(Self::Parquet),
            "zip" => Some(Self::ZippedFlatfile),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Csv => "csv",
            Self::Dat => "dat",
            Self::Parquet => "parquet",
            Self::SqlServer => "sqlserver",
            Self::StoredProc => "storedproc",
            Self::Teradata => "teradata",
            Self::Api => "api",
            Self::ZippedFlatfile => "zipped-flatfile",
        };
        write!(f, "{}", name)
    }
}

/// Identifies one tabular input of a comparison. Immutable once created;
/// owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetHandle {
    pub kind: DatasetKind,
    /// File path, connection string, query, or URL depending on `kind`.
    pub location: String,
    /// Column separator for delimited file kinds.
    pub delimiter: char,
    /// Rows per batch produced by the chunked reader.
    pub chunk_size: usize,
}

impl DatasetHandle {
    pub fn new(kind: DatasetKind, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            delimiter: ',',
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Build a handle from a path, inferring the kind from its extension.
    pub fn from_path(path: &str) -> crate::Result<Self> {
        let ext = std::path::Path::new(path)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        let kind = DatasetKind::from_extension(ext).ok_or_else(|| {
            crate::CompareError::invalid_input(format!(
                "Cannot infer dataset kind from path: {}",
                path
            ))
        })?;

        Ok(Self::new(kind, path))
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DatasetKind::from_extension("csv"), Some(DatasetKind::Csv));
        assert_eq!(DatasetKind::from_extension("CSV"), Some(DatasetKind::Csv));
        assert_eq!(
            DatasetKind::from_extension("parquet"),
            Some(DatasetKind::Parquet)
        );
        assert_eq!(DatasetKind::from_extension("dat"), Some(DatasetKind::Dat));
        assert_eq!(DatasetKind::from_extension("exe"), None);
    }

    #[test]
    fn test_handle_from_path() {
        let handle = DatasetHandle::from_path("data/source.csv").unwrap();
        assert_eq!(handle.kind, DatasetKind::Csv);
        assert_eq!(handle.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(handle.delimiter, ',');

        assert!(DatasetHandle::from_path("no_extension").is_err());
    }

    #[test]
    fn test_file_kinds() {
        assert!(DatasetKind::Csv.is_file());
        assert!(DatasetKind::Parquet.is_file());
        assert!(!DatasetKind::SqlServer.is_file());
        assert!(!DatasetKind::ZippedFlatfile.is_file());
    }
}
