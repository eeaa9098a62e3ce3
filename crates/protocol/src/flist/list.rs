use std::io::{self, Read, Write};

use crate::varint::{read_int, write_int};

use super::entry::FileEntry;
use super::idlist::{IdName, read_id_list, write_id_list};
use super::options::ListOptions;
use super::read::FileListReader;
use super::sort::sort_file_list;
use super::write::FileListWriter;

/// A complete file list as exchanged at the start of a transfer.
///
/// Entry positions are the file indices used by every later message.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileList {
    /// Entries in transfer order.
    pub entries: Vec<FileEntry>,
    /// Uid to name mapping from the sender.
    pub uid_names: Vec<IdName>,
    /// Gid to name mapping from the sender.
    pub gid_names: Vec<IdName>,
    /// Nonzero if the sender hit errors while building the list.
    pub io_error: i32,
}

impl FileList {
    /// Wraps `entries`, sorting them into transfer order.
    pub fn new(mut entries: Vec<FileEntry>) -> Self {
        sort_file_list(&mut entries);
        Self {
            entries,
            ..Self::default()
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a wire index.
    pub fn get(&self, index: i32) -> Option<&FileEntry> {
        usize::try_from(index).ok().and_then(|i| self.entries.get(i))
    }

    /// Sum of all entry sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(FileEntry::size).sum()
    }

    /// Name the sender gave for `uid`.
    pub fn uid_name(&self, uid: u32) -> Option<&[u8]> {
        lookup(&self.uid_names, uid)
    }

    /// Name the sender gave for `gid`.
    pub fn gid_name(&self, gid: u32) -> Option<&[u8]> {
        lookup(&self.gid_names, gid)
    }
}

fn lookup(ids: &[IdName], id: u32) -> Option<&[u8]> {
    ids.iter()
        .find(|entry| entry.id == id)
        .map(|entry| entry.name.as_slice())
}

/// Sends a whole file list: entries, terminator, id lists and the I/O error
/// flag.
pub fn write_file_list<W: Write + ?Sized>(
    writer: &mut W,
    list: &FileList,
    options: ListOptions,
) -> io::Result<()> {
    let mut encoder = FileListWriter::new(options);
    for entry in &list.entries {
        encoder.write_entry(writer, entry)?;
    }
    encoder.write_end(writer)?;
    if options.sends_uid_names() {
        write_id_list(writer, &list.uid_names)?;
    }
    if options.sends_gid_names() {
        write_id_list(writer, &list.gid_names)?;
    }
    write_int(writer, list.io_error)
}

/// Receives a whole file list and sorts it into transfer order.
pub fn read_file_list<R: Read + ?Sized>(
    reader: &mut R,
    options: ListOptions,
) -> io::Result<FileList> {
    let mut decoder = FileListReader::new(options);
    let mut entries = Vec::new();
    while let Some(entry) = decoder.read_entry(reader)? {
        entries.push(entry);
    }
    let mut list = FileList::new(entries);
    if options.sends_uid_names() {
        list.uid_names = read_id_list(reader)?;
    }
    if options.sends_gid_names() {
        list.gid_names = read_id_list(reader)?;
    }
    list.io_error = read_int(reader)?;
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_list_wire_form() {
        let mut out = Vec::new();
        write_file_list(&mut out, &FileList::default(), ListOptions::default()).expect("write");
        assert_eq!(out, [0, 0, 0, 0, 0]);
    }

    #[test]
    fn id_lists_only_without_numeric_ids() {
        let options = ListOptions {
            preserve_uid: true,
            preserve_gid: true,
            ..ListOptions::default()
        };
        let mut list = FileList::new(vec![
            FileEntry::regular("f", 1, 0o644)
                .with_mtime(1)
                .with_uid(1000)
                .with_gid(100),
        ]);
        list.uid_names = vec![IdName::new(1000, "alice")];
        list.gid_names = vec![IdName::new(100, "users")];
        list.io_error = 1;

        let mut out = Vec::new();
        write_file_list(&mut out, &list, options).expect("write");
        let decoded = read_file_list(&mut Cursor::new(&out), options).expect("read");
        assert_eq!(decoded, list);
        assert_eq!(decoded.uid_name(1000), Some(&b"alice"[..]));

        let numeric = ListOptions {
            numeric_ids: true,
            ..options
        };
        let mut out = Vec::new();
        write_file_list(&mut out, &list, numeric).expect("write");
        let decoded = read_file_list(&mut Cursor::new(&out), numeric).expect("read");
        assert!(decoded.uid_names.is_empty());
        assert_eq!(decoded.io_error, 1);
    }

    #[test]
    fn received_list_is_sorted() {
        let mut out = Vec::new();
        let mut writer = FileListWriter::new(ListOptions::default());
        for name in ["b", "a", "b"] {
            writer
                .write_entry(&mut out, &FileEntry::regular(name, 0, 0o644))
                .expect("write");
        }
        writer.write_end(&mut out).expect("end");
        write_int(&mut out, 0).expect("io error");
        let list = read_file_list(&mut Cursor::new(out), ListOptions::default()).expect("read");
        let names: Vec<_> = list.entries.iter().map(FileEntry::name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn index_lookup() {
        let list = FileList::new(vec![FileEntry::regular("a", 5, 0o644)]);
        assert!(list.get(0).is_some());
        assert!(list.get(1).is_none());
        assert!(list.get(-1).is_none());
        assert_eq!(list.total_size(), 5);
    }
}
