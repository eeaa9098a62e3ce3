//! File list decoding for the receiving side.

use std::io::{self, Read};

use crate::error::ProtocolError;
use crate::varint::{checked_len, read_byte, read_bytes, read_int, read_longint};

use super::MAX_PATH_LEN;
use super::entry::FileEntry;
use super::file_type::FileType;
use super::flags::{
    XMIT_LONG_NAME, XMIT_SAME_GID, XMIT_SAME_MODE, XMIT_SAME_NAME, XMIT_SAME_RDEV_PRE28,
    XMIT_SAME_TIME, XMIT_SAME_UID, XMIT_TOP_DIR,
};
use super::options::ListOptions;

/// State carried between entries while reading a file list.
#[derive(Debug)]
pub struct FileListReader {
    options: ListOptions,
    prev_name: Vec<u8>,
    prev_mode: u32,
    prev_mtime: i64,
    prev_uid: u32,
    prev_gid: u32,
    prev_rdev: u32,
}

impl FileListReader {
    /// Creates a reader for the negotiated options.
    #[must_use]
    pub fn new(options: ListOptions) -> Self {
        Self {
            options,
            prev_name: Vec::new(),
            prev_mode: 0,
            prev_mtime: 0,
            prev_uid: 0,
            prev_gid: 0,
            prev_rdev: 0,
        }
    }

    /// Reads the next entry, or `None` at the end-of-list marker.
    pub fn read_entry<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<Option<FileEntry>> {
        let flags = read_byte(reader)?;
        if flags == 0 {
            return Ok(None);
        }

        let prefix_len = if flags & XMIT_SAME_NAME != 0 {
            usize::from(read_byte(reader)?)
        } else {
            0
        };
        let suffix_len = if flags & XMIT_LONG_NAME != 0 {
            checked_len(read_int(reader)?, "file name", MAX_PATH_LEN)?
        } else {
            usize::from(read_byte(reader)?)
        };
        if prefix_len > self.prev_name.len() {
            return Err(ProtocolError::MalformedEntry(format!(
                "shared prefix {prefix_len} longer than previous name"
            ))
            .into());
        }
        if prefix_len + suffix_len > MAX_PATH_LEN {
            return Err(ProtocolError::TooLong {
                what: "file name",
                len: prefix_len + suffix_len,
                limit: MAX_PATH_LEN,
            }
            .into());
        }
        let mut name = self.prev_name[..prefix_len].to_vec();
        name.extend_from_slice(&read_bytes(reader, suffix_len)?);
        validate_name(&name)?;
        self.prev_name.clone_from(&name);

        let size = read_longint(reader)?;
        let size = u64::try_from(size).map_err(|_| {
            ProtocolError::MalformedEntry(format!("negative size {size}"))
        })?;
        if flags & XMIT_SAME_TIME == 0 {
            self.prev_mtime = i64::from(read_int(reader)?);
        }
        if flags & XMIT_SAME_MODE == 0 {
            self.prev_mode = read_int(reader)? as u32;
        }
        let mode = self.prev_mode;
        let file_type = FileType::from_mode(mode).ok_or_else(|| {
            ProtocolError::MalformedEntry(format!("unknown file type in mode {mode:o}"))
        })?;

        let mut entry = FileEntry::from_mode(name, mode)
            .ok_or_else(|| ProtocolError::MalformedEntry(format!("mode {mode:o}")))?
            .with_size(size)
            .with_mtime(self.prev_mtime)
            .with_top_dir(flags & XMIT_TOP_DIR != 0);

        if self.options.preserve_uid {
            if flags & XMIT_SAME_UID == 0 {
                self.prev_uid = read_int(reader)? as u32;
            }
            entry = entry.with_uid(self.prev_uid);
        }
        if self.options.preserve_gid {
            if flags & XMIT_SAME_GID == 0 {
                self.prev_gid = read_int(reader)? as u32;
            }
            entry = entry.with_gid(self.prev_gid);
        }
        if self.options.preserve_devices {
            if file_type.is_device() {
                if flags & XMIT_SAME_RDEV_PRE28 == 0 {
                    self.prev_rdev = read_int(reader)? as u32;
                }
                entry = entry.with_rdev(self.prev_rdev);
            } else {
                self.prev_rdev = 0;
            }
        }
        if self.options.preserve_links && file_type.is_symlink() {
            let len = checked_len(read_int(reader)?, "symlink target", MAX_PATH_LEN)?;
            entry = entry.with_link_target(read_bytes(reader, len)?);
        }
        Ok(Some(entry))
    }
}

/// Rejects names that are absolute or climb out of the destination.
pub fn validate_name(name: &[u8]) -> Result<(), ProtocolError> {
    let unsafe_path = || ProtocolError::UnsafePath(String::from_utf8_lossy(name).into_owned());
    if name.is_empty() || name.first() == Some(&b'/') || name.contains(&0) {
        return Err(unsafe_path());
    }
    if name.split(|&byte| byte == b'/').any(|component| component == b"..") {
        return Err(unsafe_path());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flist::FileListWriter;
    use std::io::Cursor;

    fn round_trip(options: ListOptions, entries: &[FileEntry]) -> Vec<FileEntry> {
        let mut out = Vec::new();
        let mut writer = FileListWriter::new(options);
        for entry in entries {
            writer.write_entry(&mut out, entry).expect("write");
        }
        writer.write_end(&mut out).expect("end");

        let mut cursor = Cursor::new(out);
        let mut reader = FileListReader::new(options);
        let mut decoded = Vec::new();
        while let Some(entry) = reader.read_entry(&mut cursor).expect("read") {
            decoded.push(entry);
        }
        decoded
    }

    #[test]
    fn preserves_all_fields() {
        let options = ListOptions {
            preserve_uid: true,
            preserve_gid: true,
            preserve_links: true,
            preserve_devices: true,
            numeric_ids: true,
        };
        let entries = vec![
            FileEntry::directory("d", 0o755)
                .with_top_dir(true)
                .with_mtime(100)
                .with_uid(1000)
                .with_gid(1000),
            FileEntry::regular("d/big", 5_000_000_000, 0o600)
                .with_mtime(-5)
                .with_uid(1000)
                .with_gid(50),
            FileEntry::symlink("d/link", "../elsewhere")
                .with_mtime(7)
                .with_uid(0)
                .with_gid(0),
            FileEntry::from_mode("d/tty", 0o020_620)
                .expect("char device")
                .with_rdev(0x0501)
                .with_mtime(7)
                .with_uid(0)
                .with_gid(5),
            FileEntry::from_mode("d/pipe", 0o010_644)
                .expect("fifo")
                .with_rdev(0)
                .with_mtime(7)
                .with_uid(0)
                .with_gid(5),
        ];
        assert_eq!(round_trip(options, &entries), entries);
    }

    #[test]
    fn reads_shared_prefix_and_short_names() {
        let mut data = vec![XMIT_TOP_DIR];
        data.push(3);
        data.extend_from_slice(b"abc");
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&(0o040_755i32).to_le_bytes());
        data.push(XMIT_SAME_NAME | XMIT_SAME_TIME);
        data.push(2);
        data.push(1);
        data.push(b'x');
        data.extend_from_slice(&9i32.to_le_bytes());
        data.extend_from_slice(&(0o100_644i32).to_le_bytes());
        data.push(0);

        let mut cursor = Cursor::new(data);
        let mut reader = FileListReader::new(ListOptions::default());
        let first = reader.read_entry(&mut cursor).expect("read").expect("entry");
        assert_eq!(first.name_bytes(), b"abc");
        assert!(first.is_top_dir());
        let second = reader.read_entry(&mut cursor).expect("read").expect("entry");
        assert_eq!(second.name_bytes(), b"abx");
        assert_eq!(second.mtime(), 1);
        assert_eq!(second.size(), 9);
        assert!(reader.read_entry(&mut cursor).expect("read").is_none());
    }

    #[test]
    fn top_dir_flag_ignored_for_files() {
        let mut data = vec![XMIT_TOP_DIR | XMIT_LONG_NAME];
        data.extend_from_slice(&1i32.to_le_bytes());
        data.push(b'f');
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&(0o100_644i32).to_le_bytes());
        let mut reader = FileListReader::new(ListOptions::default());
        let entry = reader
            .read_entry(&mut Cursor::new(data))
            .expect("read")
            .expect("entry");
        assert!(!entry.is_top_dir());
    }

    #[test]
    fn rejects_unsafe_names() {
        for name in [&b"/etc/passwd"[..], b"a/../../b", b"..", b""] {
            assert!(matches!(
                validate_name(name),
                Err(ProtocolError::UnsafePath(_))
            ));
        }
        assert!(validate_name(b".").is_ok());
        assert!(validate_name(b"a/..b").is_ok());
    }

    #[test]
    fn rejects_overlong_prefix() {
        let data = [XMIT_SAME_NAME, 4, 1, b'a'];
        let mut reader = FileListReader::new(ListOptions::default());
        let err = reader.read_entry(&mut Cursor::new(&data[..])).unwrap_err();
        assert!(matches!(
            ProtocolError::from_io(&err),
            Some(ProtocolError::MalformedEntry(_))
        ));
    }

    #[test]
    fn rejects_overlong_names() {
        let mut data = vec![XMIT_LONG_NAME];
        data.extend_from_slice(&5000i32.to_le_bytes());
        let mut reader = FileListReader::new(ListOptions::default());
        let err = reader.read_entry(&mut Cursor::new(data)).unwrap_err();
        assert!(matches!(
            ProtocolError::from_io(&err),
            Some(ProtocolError::TooLong { .. })
        ));
    }
}
