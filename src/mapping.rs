//! Schema reconciliation: automatic column mapping, manual overrides,
//! and join-key validation

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{CompareError, Result};
use crate::schema::{check_compatibility, Compatibility, Schema};

/// How a source/target pair was established.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingOrigin {
    /// Case-insensitive exact name match.
    ExactName,
    /// Names matched after stripping whitespace, underscores and hyphens.
    NormalizedName,
    /// Fuzzy similarity above the policy threshold; requires confirmation.
    Fuzzy { score: f64 },
    /// Supplied by the caller.
    Override,
}

/// One source↔target column pair with its compatibility verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source: String,
    pub target: String,
    pub source_type: crate::schema::ColumnType,
    pub target_type: crate::schema::ColumnType,
    pub verdict: Compatibility,
    pub origin: MappingOrigin,
    pub excluded: bool,
}

impl MappingEntry {
    /// Fuzzy pairs are suggestions until confirmed.
    pub fn is_suggested(&self) -> bool {
        matches!(self.origin, MappingOrigin::Fuzzy { .. })
    }
}

/// Tunable knobs for the automatic matching passes. The fuzzy rule is a
/// character-bigram Dice coefficient; callers may tighten the threshold
/// or disable the pass entirely.
#[derive(Debug, Clone)]
pub struct MappingPolicy {
    pub fuzzy_threshold: f64,
    pub enable_fuzzy: bool,
}

impl Default for MappingPolicy {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.8,
            enable_fuzzy: true,
        }
    }
}

/// The reconciled mapping between two schemas. Mutable via overrides and
/// exclusions until `finalize`, frozen afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub entries: Vec<MappingEntry>,
    /// Source columns with no counterpart; excluded from comparison.
    pub unmatched_source: Vec<String>,
    /// Target columns with no counterpart; excluded from comparison.
    pub unmatched_target: Vec<String>,
    frozen: bool,
}

impl ColumnMapping {
    /// Build the automatic mapping between two schemas: exact pass,
    /// normalized pass, then fuzzy suggestions.
    pub fn auto_map(source: &Schema, target: &Schema, policy: &MappingPolicy) -> Self {
        let mut entries = Vec::new();
        let mut used_targets: IndexSet<String> = IndexSet::new();

        // Pass 1: case-insensitive exact names.
        for src in &source.columns {
            if let Some(tgt) = target
                .columns
                .iter()
                .find(|t| !used_targets.contains(&t.name) && t.name.eq_ignore_ascii_case(&src.name))
            {
                used_targets.insert(tgt.name.clone());
                entries.push(MappingEntry {
                    source: src.name.clone(),
                    target: tgt.name.clone(),
                    source_type: src.column_type.clone(),
                    target_type: tgt.column_type.clone(),
                    verdict: check_compatibility(&src.column_type, &tgt.column_type),
                    origin: MappingOrigin::ExactName,
                    excluded: false,
                });
            }
        }

        // Pass 2: normalized names for the remainder.
        for src in &source.columns {
            if entries.iter().any(|e| e.source == src.name) {
                continue;
            }
            let normalized = normalize_name(&src.name);
            if let Some(tgt) = target
                .columns
                .iter()
                .find(|t| !used_targets.contains(&t.name) && normalize_name(&t.name) == normalized)
            {
                used_targets.insert(tgt.name.clone());
                entries.push(MappingEntry {
                    source: src.name.clone(),
                    target: tgt.name.clone(),
                    source_type: src.column_type.clone(),
                    target_type: tgt.column_type.clone(),
                    verdict: check_compatibility(&src.column_type, &tgt.column_type),
                    origin: MappingOrigin::NormalizedName,
                    excluded: false,
                });
            }
        }

        // Pass 3: fuzzy suggestions for whatever is left.
        if policy.enable_fuzzy {
            for src in &source.columns {
                if entries.iter().any(|e| e.source == src.name) {
                    continue;
                }
                let mut best: Option<(&crate::schema::ColumnDescriptor, f64)> = None;
                for tgt in &target.columns {
                    if used_targets.contains(&tgt.name) {
                        continue;
                    }
                    let score = name_similarity(&src.name, &tgt.name);
                    if score >= policy.fuzzy_threshold
                        && best.map_or(true, |(_, s)| score > s)
                    {
                        best = Some((tgt, score));
                    }
                }
                if let Some((tgt, score)) = best {
                    used_targets.insert(tgt.name.clone());
                    entries.push(MappingEntry {
                        source: src.name.clone(),
                        target: tgt.name.clone(),
                        source_type: src.column_type.clone(),
                        target_type: tgt.column_type.clone(),
                        verdict: check_compatibility(&src.column_type, &tgt.column_type),
                        origin: MappingOrigin::Fuzzy { score },
                        excluded: false,
                    });
                }
            }
        }

        let unmatched_source = source
            .columns
            .iter()
            .filter(|c| !entries.iter().any(|e| e.source == c.name))
            .map(|c| c.name.clone())
            .collect();
        let unmatched_target = target
            .columns
            .iter()
            .filter(|c| !used_targets.contains(&c.name))
            .map(|c| c.name.clone())
            .collect();

        Self {
            entries,
            unmatched_source,
            unmatched_target,
            frozen: false,
        }
    }

    /// Apply a caller-supplied override pair. Replaces any automatic pair
    /// involving either column.
    pub fn apply_override(&mut self, source: &Schema, target: &Schema, src_col: &str, tgt_col: &str) -> Result<()> {
        if self.frozen {
            return Err(CompareError::invalid_input(
                "Column mapping is frozen; overrides must be applied before the comparison runs",
            ));
        }

        let src = source.find(src_col).ok_or_else(|| {
            CompareError::invalid_input(format!("Override source column not found: {}", src_col))
        })?;
        let tgt = target.find(tgt_col).ok_or_else(|| {
            CompareError::invalid_input(format!("Override target column not found: {}", tgt_col))
        })?;

        self.entries
            .retain(|e| e.source != src.name && e.target != tgt.name);
        self.unmatched_source.retain(|c| c != src_col);
        self.unmatched_target.retain(|c| c != tgt_col);

        self.entries.push(MappingEntry {
            source: src.name.clone(),
            target: tgt.name.clone(),
            source_type: src.column_type.clone(),
            target_type: tgt.column_type.clone(),
            verdict: check_compatibility(&src.column_type, &tgt.column_type),
            origin: MappingOrigin::Override,
            excluded: false,
        });

        Ok(())
    }

    /// Exclude a mapped pair (by source column name) from comparison.
    pub fn exclude(&mut self, src_col: &str) -> Result<()> {
        if self.frozen {
            return Err(CompareError::invalid_input(
                "Column mapping is frozen; exclusions must be applied before the comparison runs",
            ));
        }
        match self.entries.iter_mut().find(|e| e.source == src_col) {
            Some(entry) => {
                entry.excluded = true;
                Ok(())
            }
            None => Err(CompareError::invalid_input(format!(
                "Cannot exclude unmapped column: {}",
                src_col
            ))),
        }
    }

    /// Freeze the mapping. Unconfirmed fuzzy suggestions become excluded
    /// unless `accept_suggestions` is set; any included incompatible pair
    /// fails validation naming the offending columns.
    pub fn finalize(&mut self, accept_suggestions: bool) -> Result<()> {
        for entry in &mut self.entries {
            if entry.is_suggested() && !accept_suggestions {
                entry.excluded = true;
            }
        }

        let incompatible: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.excluded && e.verdict == Compatibility::Incompatible)
            .map(|e| format!("{} ({}) ↔ {} ({})", e.source, e.source_type, e.target, e.target_type))
            .collect();

        if !incompatible.is_empty() {
            let columns = self
                .entries
                .iter()
                .filter(|e| !e.excluded && e.verdict == Compatibility::Incompatible)
                .map(|e| e.source.clone())
                .collect();
            return Err(CompareError::schema_mismatch(
                format!(
                    "Incompatible column pairs must be excluded or remapped: {}",
                    incompatible.join(", ")
                ),
                columns,
            ));
        }

        self.frozen = true;
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Included pairs, in source-schema order.
    pub fn compared_pairs(&self) -> Vec<&MappingEntry> {
        self.entries.iter().filter(|e| !e.excluded).collect()
    }

    /// Validate the requested join keys against the frozen mapping:
    /// every key must map to an included, compatible or coercible pair.
    pub fn validate_join_keys(&self, join_keys: &[String]) -> Result<Vec<&MappingEntry>> {
        if join_keys.is_empty() {
            return Err(CompareError::schema_mismatch(
                "No join key columns selected",
                Vec::new(),
            ));
        }

        let mut resolved = Vec::with_capacity(join_keys.len());
        let mut offending = Vec::new();
        let mut reasons = Vec::new();

        for key in join_keys {
            match self.entries.iter().find(|e| &e.source == key) {
                None => {
                    offending.push(key.clone());
                    reasons.push(format!("join key '{}' is not mapped to any target column", key));
                }
                Some(entry) if entry.excluded => {
                    offending.push(key.clone());
                    reasons.push(format!("join key '{}' is excluded from comparison", key));
                }
                Some(entry) if !entry.verdict.is_comparable() => {
                    offending.push(key.clone());
                    reasons.push(format!(
                        "join key '{}' has incompatible types: {} vs {}",
                        key, entry.source_type, entry.target_type
                    ));
                }
                Some(entry) => resolved.push(entry),
            }
        }

        if !offending.is_empty() {
            return Err(CompareError::schema_mismatch(reasons.join("; "), offending));
        }

        Ok(resolved)
    }
}

/// Lowercase and strip whitespace, underscores and hyphens.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Sørensen–Dice coefficient over character bigrams of the normalized
/// names. Returns 1.0 for identical normalized names, 0.0 for no overlap.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);

    if a == b {
        return 1.0;
    }
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let bigrams = |s: &str| -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };

    let mut a_grams = bigrams(&a);
    let b_grams = bigrams(&b);
    let total = a_grams.len() + b_grams.len();

    let mut overlap = 0usize;
    for gram in &b_grams {
        if let Some(pos) = a_grams.iter().position(|g| g == gram) {
            a_grams.swap_remove(pos);
            overlap += 1;
        }
    }

    (2.0 * overlap as f64) / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, ColumnType};

    fn schema(cols: &[(&str, ColumnType)]) -> Schema {
        Schema::new(
            cols.iter()
                .map(|(name, ty)| ColumnDescriptor::new(*name, ty.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_exact_case_insensitive_mapping() {
        let src = schema(&[("ID", ColumnType::Integer), ("Name", ColumnType::Text)]);
        let tgt = schema(&[("id", ColumnType::Integer), ("name", ColumnType::Text)]);

        let mapping = ColumnMapping::auto_map(&src, &tgt, &MappingPolicy::default());
        assert_eq!(mapping.entries.len(), 2);
        assert!(mapping
            .entries
            .iter()
            .all(|e| e.origin == MappingOrigin::ExactName));
        assert!(mapping.unmatched_source.is_empty());
    }

    #[test]
    fn test_normalized_mapping() {
        let src = schema(&[("customer_id", ColumnType::Integer)]);
        let tgt = schema(&[("CustomerID", ColumnType::Integer)]);

        let mapping = ColumnMapping::auto_map(&src, &tgt, &MappingPolicy::default());
        assert_eq!(mapping.entries.len(), 1);
        assert_eq!(mapping.entries[0].origin, MappingOrigin::NormalizedName);
    }

    #[test]
    fn test_fuzzy_mapping_is_suggested() {
        let src = schema(&[("customer_name", ColumnType::Text)]);
        let tgt = schema(&[("customer_nam", ColumnType::Text)]);

        let mapping = ColumnMapping::auto_map(&src, &tgt, &MappingPolicy::default());
        assert_eq!(mapping.entries.len(), 1);
        assert!(mapping.entries[0].is_suggested());

        // Unconfirmed suggestions drop out at finalize.
        let mut unconfirmed = mapping.clone();
        unconfirmed.finalize(false).unwrap();
        assert!(unconfirmed.entries[0].excluded);

        let mut confirmed = mapping;
        confirmed.finalize(true).unwrap();
        assert!(!confirmed.entries[0].excluded);
    }

    #[test]
    fn test_unmatched_columns_excluded() {
        let src = schema(&[("id", ColumnType::Integer), ("legacy_flag", ColumnType::Boolean)]);
        let tgt = schema(&[("id", ColumnType::Integer), ("region", ColumnType::Text)]);

        let mapping = ColumnMapping::auto_map(&src, &tgt, &MappingPolicy::default());
        assert_eq!(mapping.unmatched_source, vec!["legacy_flag".to_string()]);
        assert_eq!(mapping.unmatched_target, vec!["region".to_string()]);
    }

    #[test]
    fn test_incompatible_pair_fails_finalize() {
        let src = schema(&[("id", ColumnType::Text)]);
        let tgt = schema(&[("id", ColumnType::Integer)]);

        let mut mapping = ColumnMapping::auto_map(&src, &tgt, &MappingPolicy::default());
        let err = mapping.finalize(false).unwrap_err();
        match err {
            CompareError::SchemaMismatch {
                offending_columns, ..
            } => assert_eq!(offending_columns, vec!["id".to_string()]),
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_excluded_incompatible_pair_passes() {
        let src = schema(&[("id", ColumnType::Integer), ("code", ColumnType::Text)]);
        let tgt = schema(&[("id", ColumnType::Integer), ("code", ColumnType::Integer)]);

        let mut mapping = ColumnMapping::auto_map(&src, &tgt, &MappingPolicy::default());
        mapping.exclude("code").unwrap();
        mapping.finalize(false).unwrap();
        assert_eq!(mapping.compared_pairs().len(), 1);
    }

    #[test]
    fn test_join_key_validation() {
        let src = schema(&[("id", ColumnType::Integer), ("val", ColumnType::Float)]);
        let tgt = schema(&[("id", ColumnType::Decimal), ("val", ColumnType::Float)]);

        let mut mapping = ColumnMapping::auto_map(&src, &tgt, &MappingPolicy::default());
        mapping.finalize(false).unwrap();

        // Coercible key is fine.
        let keys = mapping.validate_join_keys(&["id".to_string()]).unwrap();
        assert_eq!(keys.len(), 1);

        // Unknown key names the offender.
        let err = mapping
            .validate_join_keys(&["missing".to_string()])
            .unwrap_err();
        match err {
            CompareError::SchemaMismatch {
                offending_columns, ..
            } => assert_eq!(offending_columns, vec!["missing".to_string()]),
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_override_replaces_auto_pair() {
        let src = schema(&[("cust", ColumnType::Integer)]);
        let tgt = schema(&[("customer_number", ColumnType::Integer)]);

        let mut mapping = ColumnMapping::auto_map(&src, &tgt, &MappingPolicy::default());
        mapping
            .apply_override(&src, &tgt, "cust", "customer_number")
            .unwrap();
        assert_eq!(mapping.entries.len(), 1);
        assert_eq!(mapping.entries[0].origin, MappingOrigin::Override);
        assert!(mapping.unmatched_source.is_empty());
        assert!(mapping.unmatched_target.is_empty());
    }

    #[test]
    fn test_name_similarity() {
        assert_eq!(name_similarity("amount", "AMOUNT"), 1.0);
        assert!(name_similarity("customer_name", "customer_nam") > 0.9);
        assert!(name_similarity("id", "zz") < 0.1);
    }
}
