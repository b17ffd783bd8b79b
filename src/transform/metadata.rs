use anyhow::Result;
use tracing::info;

use crate::records::{Metadata, RecordSet};

/// Stage 5. Restamps on every call.
pub fn enrich_with_metadata(set: &RecordSet) -> Result<RecordSet> {
    info!("Adding extraction metadata");
    let mut out = set.clone();
    out.set_metadata(Metadata::now());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Category, ExtractedRecord, PIPELINE_VERSION};

    #[test]
    fn metadata_never_touches_categories() {
        let mut set = RecordSet::new();
        set.insert(Category::Titles, vec![ExtractedRecord::Text { text: "a".into() }]);
        let out = enrich_with_metadata(&set).unwrap();
        assert_eq!(out.categories(), vec![Category::Titles]);
        assert_eq!(out.metadata().unwrap().pipeline_version, PIPELINE_VERSION);
    }
}
