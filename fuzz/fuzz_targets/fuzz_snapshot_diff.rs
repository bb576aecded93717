//! Fuzz target for the snapshot diff.
//!
//! Exporting the diff must always make the next diff empty.

#![no_main]

use libfuzzer_sys::fuzz_target;
use snapshot_archiver::snapshots_to_export;

fuzz_target!(|data: (Vec<String>, Vec<String>)| {
    let (source, archived) = data;

    let pending = snapshots_to_export(&source, &archived);
    assert!(pending.len() <= source.len());
    assert!(pending.iter().all(|id| !archived.contains(id)));

    let mut next_archive = archived;
    next_archive.extend(pending);
    assert!(snapshots_to_export(&source, &next_archive).is_empty());
});
