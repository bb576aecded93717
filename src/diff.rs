// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Snapshot set difference.

use std::collections::HashSet;

/// Identifiers in `source` that are not yet in `archived`, in `source` order.
///
/// Runs in O(|source| + |archived|): archived identifiers go into a hash set
/// once, then each source identifier is a single lookup.
///
/// ```rust
/// use snapshot_archiver::diff::snapshots_to_export;
///
/// let source = vec!["snap-a".to_string(), "snap-b".to_string(), "snap-c".to_string()];
/// let archived = vec!["snap-b".to_string()];
/// assert_eq!(snapshots_to_export(&source, &archived), vec!["snap-a", "snap-c"]);
/// ```
pub fn snapshots_to_export(source: &[String], archived: &[String]) -> Vec<String> {
    let archived: HashSet<&str> = archived.iter().map(String::as_str).collect();
    source
        .iter()
        .filter(|id| !archived.contains(id.as_str()))
        .cloned()
        .collect()
}
