use anyhow::Result;
use tracing::info;

use crate::error::ValidationError;
use crate::records::{Category, ExtractedRecord, RecordSet};

/// A category-specific schema check.
pub type Validator = fn(Category, &[ExtractedRecord]) -> Result<(), ValidationError>;

/// Registered checks. Empty: the stage is a pass-through until one is added.
pub const VALIDATORS: &[Validator] = &[];

/// Stage 4.
pub fn validate_types(set: &RecordSet) -> Result<RecordSet> {
    validate_with(set, VALIDATORS)
}

/// Run `validators` over every category; the first rejection fails the stage.
pub fn validate_with(set: &RecordSet, validators: &[Validator]) -> Result<RecordSet> {
    info!("Validating record types");
    for (category, records) in set.iter() {
        for check in validators {
            check(category, records)?;
        }
    }
    Ok(set.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_tables(category: Category, records: &[ExtractedRecord]) -> Result<(), ValidationError> {
        if category == Category::Tables && !records.is_empty() {
            return Err(ValidationError {
                category: category.to_string(),
                reason: "tables not allowed".into(),
            });
        }
        Ok(())
    }

    #[test]
    fn default_stage_passes_through() {
        let mut set = RecordSet::new();
        set.insert(Category::Titles, vec![ExtractedRecord::Text { text: "a".into() }]);
        assert_eq!(validate_types(&set).unwrap(), set);
    }

    #[test]
    fn rejection_fails_the_stage() {
        let mut set = RecordSet::new();
        set.insert(Category::Tables, vec![ExtractedRecord::Table { rows: vec![vec!["x".into()]] }]);
        let err = validate_with(&set, &[no_tables]).unwrap_err();
        assert!(err.to_string().contains("tables not allowed"));
    }
}
