//! Uid and gid name lists sent after the file entries.

use std::io::{self, Read, Write};

use crate::varint::{read_byte, read_bytes, read_int, write_byte, write_bytes, write_int};

/// A numeric id paired with its user or group name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IdName {
    /// Numeric id on the sending host.
    pub id: u32,
    /// Name on the sending host.
    pub name: Vec<u8>,
}

impl IdName {
    /// Creates a mapping entry.
    pub fn new(id: u32, name: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Writes an id list. Id 0 and unnamed ids are skipped; names are cut to
/// 255 bytes. The list ends with an `i32` zero.
pub fn write_id_list<W: Write + ?Sized>(writer: &mut W, ids: &[IdName]) -> io::Result<()> {
    for entry in ids.iter().filter(|entry| entry.id != 0 && !entry.name.is_empty()) {
        let name = &entry.name[..entry.name.len().min(255)];
        write_int(writer, entry.id as i32)?;
        write_byte(writer, name.len() as u8)?;
        write_bytes(writer, name)?;
    }
    write_int(writer, 0)
}

/// Reads an id list written by [`write_id_list`].
pub fn read_id_list<R: Read + ?Sized>(reader: &mut R) -> io::Result<Vec<IdName>> {
    let mut ids = Vec::new();
    loop {
        let id = read_int(reader)?;
        if id == 0 {
            return Ok(ids);
        }
        let len = usize::from(read_byte(reader)?);
        ids.push(IdName::new(id as u32, read_bytes(reader, len)?));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn skips_root_and_nameless_ids() {
        let ids = [
            IdName::new(0, "root"),
            IdName::new(1000, "alice"),
            IdName::new(1001, ""),
        ];
        let mut out = Vec::new();
        write_id_list(&mut out, &ids).expect("write");
        let decoded = read_id_list(&mut Cursor::new(out)).expect("read");
        assert_eq!(decoded, [IdName::new(1000, "alice")]);
    }

    #[test]
    fn empty_list_is_single_zero() {
        let mut out = Vec::new();
        write_id_list(&mut out, &[]).expect("write");
        assert_eq!(out, [0, 0, 0, 0]);
    }
}
