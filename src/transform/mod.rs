//! Ordered, non-fatal normalisation stages over a whole record set.
//!
//! Each stage is a pure function from the current set to a new one. A stage
//! that errors or panics is logged and skipped; the next stage sees the set
//! as it was before the failed stage.

pub mod currency;
pub mod dates;
pub mod metadata;
pub mod text;
pub mod validate;

use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use tracing::{error, info};

use crate::records::RecordSet;

pub type StageFn = fn(&RecordSet) -> Result<RecordSet>;

#[derive(Clone, Copy)]
pub struct Stage {
    pub name: &'static str,
    pub run: StageFn,
}

/// The pipeline, in execution order.
pub const STAGES: [Stage; 5] = [
    Stage {
        name: "clean_text",
        run: text::clean_text_fields,
    },
    Stage {
        name: "normalize_dates",
        run: dates::normalize_dates,
    },
    Stage {
        name: "normalize_currency",
        run: currency::normalize_currency,
    },
    Stage {
        name: "validate_types",
        run: validate::validate_types,
    },
    Stage {
        name: "enrich_metadata",
        run: metadata::enrich_with_metadata,
    },
];

/// Run every stage once. Not idempotent: metadata is restamped on each call.
pub fn transform(set: RecordSet) -> RecordSet {
    info!("Starting transformation pipeline ({} records)", set.total_records());
    run_stages(set, &STAGES)
}

pub fn run_stages(mut set: RecordSet, stages: &[Stage]) -> RecordSet {
    for stage in stages {
        match panic::catch_unwind(AssertUnwindSafe(|| (stage.run)(&set))) {
            Ok(Ok(next)) => set = next,
            Ok(Err(e)) => error!("Transformation step {} failed: {:#}", stage.name, e),
            Err(_) => error!("Transformation step {} panicked", stage.name),
        }
    }
    set
}

/// Copy of `set` with `f` applied to every string field of every record.
pub(crate) fn map_strings(set: &RecordSet, f: impl Fn(&str) -> String) -> RecordSet {
    let mut out = set.clone();
    for (_, records) in out.iter_mut() {
        for record in records.iter_mut() {
            for field in record.text_fields_mut() {
                *field = f(field.as_str());
            }
        }
    }
    out
}

// ── Tests ──
