//! Fuzz target for export status parsing.
//!
//! Tests that `ExportStatus::parse` never panics and that unknown statuses
//! are never treated as pending or successful.

#![no_main]

use libfuzzer_sys::fuzz_target;
use snapshot_archiver::aws::{prefix_to_snapshot_id, strip_automated_prefix};
use snapshot_archiver::ExportStatus;

fuzz_target!(|raw: &str| {
    let status = ExportStatus::parse(raw);
    if let ExportStatus::Other(_) = status {
        assert!(!status.is_pending());
        assert!(!status.is_complete());
    }

    // Should never panic
    let _ = strip_automated_prefix(raw);
    let _ = prefix_to_snapshot_id(raw);
});
