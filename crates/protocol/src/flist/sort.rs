//! File list ordering.
//!
//! Before protocol 29 entries are ordered by a plain byte comparison of
//! their full relative path. Both peers sort after the exchange so file
//! indices agree.

use super::entry::FileEntry;

/// Sorts entries by name and drops later duplicates.
///
/// The sort is stable, so the first occurrence of a duplicated name is the
/// one kept.
pub fn sort_file_list(entries: &mut Vec<FileEntry>) {
    sort_file_list_by(entries, |entry| entry);
}

/// Orders records that carry a [`FileEntry`] the same way
/// [`sort_file_list`] orders bare entries.
pub fn sort_file_list_by<T, F>(items: &mut Vec<T>, entry: F)
where
    F: Fn(&T) -> &FileEntry,
{
    items.sort_by(|a, b| entry(a).name_bytes().cmp(entry(b).name_bytes()));
    items.dedup_by(|later, earlier| entry(later).name_bytes() == entry(earlier).name_bytes());
}
