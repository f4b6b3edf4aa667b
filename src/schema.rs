//! Column descriptors and type-compatibility rules

use serde::{Deserialize, Serialize};

/// Closed set of declared column types the engine reasons about.
/// Storage-specific type names are normalized into this set; anything
/// unrecognized is carried as `Other` and only compatible with itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Integer,
    BigInt,
    Float,
    Decimal,
    Text,
    Date,
    Timestamp,
    Other(String),
}

impl ColumnType {
    /// Normalize a declared storage type name (DuckDB, SQL Server,
    /// Teradata spellings) into the closed set.
    pub fn parse(declared: &str) -> Self {
        let upper = declared.trim().to_uppercase();

        if upper.starts_with("DECIMAL") || upper.starts_with("NUMERIC") {
            return Self::Decimal;
        }
        if upper.starts_with("TIMESTAMP") || upper == "DATETIME" || upper == "DATETIME2" {
            return Self::Timestamp;
        }
        if upper.starts_with("VARCHAR")
            || upper.starts_with("NVARCHAR")
            || upper.starts_with("CHAR")
            || upper.starts_with("NCHAR")
        {
            return Self::Text;
        }

        match upper.as_str() {
            "BOOLEAN" | "BOOL" | "BIT" => Self::Boolean,
            "TINYINT" | "SMALLINT" | "INTEGER" | "INT" | "INT2" | "INT4" | "UTINYINT"
            | "USMALLINT" => Self::Integer,
            "BIGINT" | "INT8" | "HUGEINT" | "UINTEGER" | "UBIGINT" | "LONG" => Self::BigInt,
            "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "REAL" => Self::Float,
            "TEXT" | "STRING" | "NTEXT" | "CLOB" => Self::Text,
            "DATE" => Self::Date,
            _ => Self::Other(declared.trim().to_string()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Integer | Self::BigInt | Self::Float | Self::Decimal
        )
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Decimal => "DECIMAL",
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Compatibility verdict for one mapped column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    /// Declared types are identical.
    Compatible,
    /// A safe widening exists for comparison purposes.
    Coercible,
    /// No lossless conversion; the pair must be excluded or the run fails.
    Incompatible,
}

impl Compatibility {
    pub fn is_comparable(&self) -> bool {
        !matches!(self, Self::Incompatible)
    }
}

/// Check compatibility between two declared types. Widenings are
/// symmetric: either side may be the wider one, since both values are
/// widened before comparison.
pub fn check_compatibility(a: &ColumnType, b: &ColumnType) -> Compatibility {
    use ColumnType::*;

    if a == b {
        return Compatibility::Compatible;
    }

    let coercible = matches!(
        (a, b),
        (Integer, BigInt)
            | (BigInt, Integer)
            | (Integer, Float)
            | (Float, Integer)
            | (Integer, Decimal)
            | (Decimal, Integer)
            | (BigInt, Float)
            | (Float, BigInt)
            | (BigInt, Decimal)
            | (Decimal, BigInt)
            | (Float, Decimal)
            | (Decimal, Float)
            | (Date, Timestamp)
            | (Timestamp, Date)
    );

    if coercible {
        Compatibility::Coercible
    } else {
        Compatibility::Incompatible
    }
}

/// One column of a dataset: name, normalized declared type, nullability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }
}

/// Ordered schema of one dataset; column names are unique within it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnDescriptor>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parse() {
        assert_eq!(ColumnType::parse("INTEGER"), ColumnType::Integer);
        assert_eq!(ColumnType::parse("bigint"), ColumnType::BigInt);
        assert_eq!(ColumnType::parse("VARCHAR(255)"), ColumnType::Text);
        assert_eq!(ColumnType::parse("DECIMAL(18,2)"), ColumnType::Decimal);
        assert_eq!(ColumnType::parse("TIMESTAMP WITH TIME ZONE"), ColumnType::Timestamp);
        assert_eq!(ColumnType::parse("DATE"), ColumnType::Date);
        assert_eq!(
            ColumnType::parse("GEOMETRY"),
            ColumnType::Other("GEOMETRY".to_string())
        );
    }

    #[test]
    fn test_identical_types_compatible() {
        assert_eq!(
            check_compatibility(&ColumnType::Integer, &ColumnType::Integer),
            Compatibility::Compatible
        );
        assert_eq!(
            check_compatibility(&ColumnType::Text, &ColumnType::Text),
            Compatibility::Compatible
        );
    }

    #[test]
    fn test_safe_widenings_coercible() {
        assert_eq!(
            check_compatibility(&ColumnType::Integer, &ColumnType::Decimal),
            Compatibility::Coercible
        );
        assert_eq!(
            check_compatibility(&ColumnType::Date, &ColumnType::Timestamp),
            Compatibility::Coercible
        );
        assert_eq!(
            check_compatibility(&ColumnType::Float, &ColumnType::BigInt),
            Compatibility::Coercible
        );
    }

    #[test]
    fn test_incompatible_pairs() {
        assert_eq!(
            check_compatibility(&ColumnType::Text, &ColumnType::Integer),
            Compatibility::Incompatible
        );
        assert_eq!(
            check_compatibility(&ColumnType::Boolean, &ColumnType::Date),
            Compatibility::Incompatible
        );
        assert_eq!(
            check_compatibility(
                &ColumnType::Other("GEOMETRY".to_string()),
                &ColumnType::Text
            ),
            Compatibility::Incompatible
        );
    }

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::new(vec![
            ColumnDescriptor::new("id", ColumnType::Integer),
            ColumnDescriptor::new("name", ColumnType::Text),
        ]);
        assert_eq!(schema.index_of("name"), Some(1));
        assert!(schema.find("missing").is_none());
    }
}
