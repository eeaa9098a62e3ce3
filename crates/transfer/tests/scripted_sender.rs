//! Receiver sessions fed by a pre-recorded sender stream.

use std::fs;
use std::io::Cursor;

use logging::{Logger, Role};
use protocol::flist::{FileEntry, FileList, write_file_list};
use protocol::varint::write_int;
use protocol::wire::{SumHead, write_end, write_literal, write_sum_head};
use tempfile::tempdir;
use transfer::{Connection, Receiver, TransferOptions};

#[test]
fn digest_mismatch_keeps_the_original_and_fails_the_file() {
    let dir = tempdir().expect("tempdir");
    let dest = dir.path().join("dest");
    fs::create_dir(&dest).expect("mkdir");
    fs::write(dest.join("f"), b"old contents").expect("original");

    let options = TransferOptions {
        server: true,
        ..TransferOptions::default()
    };
    let list = FileList::new(vec![FileEntry::regular("f", 4, 0o644).with_mtime(1_600_000_000)]);
    let mut script = Vec::new();
    write_file_list(&mut script, &list, options.list_options()).expect("list");
    write_int(&mut script, 0).expect("index");
    write_sum_head(&mut script, &SumHead::EMPTY).expect("head");
    write_literal(&mut script, b"new!").expect("literal");
    write_end(&mut script).expect("end");
    script.extend_from_slice(&[0xa5; 16]);
    write_int(&mut script, -1).expect("phase");
    write_int(&mut script, -1).expect("phase");

    let mut conn = Connection::new(Cursor::new(script), Vec::new());
    let stats = Receiver::new(options, Logger::quiet(Role::Receiver))
        .run(&mut conn, &dest)
        .expect("session survives a corrupt file");

    assert_eq!(stats.files_failed, 1);
    assert_eq!(stats.files_transferred, 0);
    assert_eq!(stats.exit_code(), 23);
    assert_eq!(fs::read(dest.join("f")).expect("original"), b"old contents");
    let leftovers: Vec<_> = fs::read_dir(&dest)
        .expect("read dest")
        .map(|entry| entry.expect("entry").file_name())
        .filter(|name| name != "f")
        .collect();
    assert!(leftovers.is_empty(), "temporary files left: {leftovers:?}");
}
