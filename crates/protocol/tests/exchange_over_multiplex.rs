//! A server-to-client stream assembled from every codec, pushed through the
//! multiplexer the way a daemon session sends it.

use std::io::{Cursor, Read, Write};

use logging::{Logger, Role, VerbosityConfig};
use protocol::flist::{FileEntry, FileList, ListOptions, read_file_list, write_file_list};
use protocol::varint::{read_int, write_int};
use protocol::wire::{
    SumBuf, SumHead, Token, TokenReader, read_sum_bufs, read_sum_head, write_copy, write_end,
    write_literal, write_sum_bufs, write_sum_head,
};
use protocol::{MessageCode, MuxReader, MuxWriter, ProtocolError, RemoteError};

fn logger() -> Logger {
    Logger::capturing(VerbosityConfig::from_verbose_level(1), Role::Client)
}

#[test]
fn file_list_and_delta_survive_framing() {
    let options = ListOptions {
        preserve_links: true,
        ..ListOptions::default()
    };
    let list = FileList::new(vec![
        FileEntry::directory(".", 0o755).with_mtime(1),
        FileEntry::regular("heyo", 4, 0o644).with_mtime(2),
        FileEntry::symlink("hey", "hello").with_mtime(3),
    ]);
    let head = SumHead {
        count: 2,
        block_length: 700,
        checksum_length: 16,
        remainder: 10,
    };
    let sums: Vec<SumBuf> = (0..2)
        .map(|index| SumBuf {
            index,
            offset: head.offset(index),
            len: head.block_len(index),
            sum1: 0xdead_0000 | index,
            sum2: [index as u8; 16],
        })
        .collect();

    let mut mux = MuxWriter::new(Vec::new());
    write_file_list(&mut mux, &list, options).expect("flist");
    mux.send_message(MessageCode::Info, b"building file list\n")
        .expect("info");
    write_int(&mut mux, 1).expect("index");
    write_sum_head(&mut mux, &head).expect("head");
    write_sum_bufs(&mut mux, &head, &sums).expect("sums");
    write_literal(&mut mux, &vec![7u8; 40_000]).expect("literal");
    write_copy(&mut mux, 1).expect("copy");
    write_end(&mut mux).expect("end");
    mux.flush().expect("flush");
    let bytes = mux.into_inner().expect("inner");

    let log = logger();
    let mut reader = MuxReader::new(Cursor::new(bytes), log.clone());
    let decoded = read_file_list(&mut reader, options).expect("read flist");
    assert_eq!(decoded, list);
    assert_eq!(read_int(&mut reader).expect("index"), 1);
    let decoded_head = read_sum_head(&mut reader).expect("head");
    assert_eq!(decoded_head, head);
    assert_eq!(read_sum_bufs(&mut reader, &decoded_head).expect("sums"), sums);

    let mut tokens = TokenReader::new();
    let mut literal = 0;
    loop {
        match tokens.next_token(&mut reader).expect("token") {
            Token::Literal(data) => literal += data.len(),
            Token::Copy(index) => assert_eq!(index, 1),
            Token::End => break,
        }
    }
    assert_eq!(literal, 40_000);
    assert!(
        log.captured()
            .iter()
            .any(|event| event.message.contains("building file list"))
    );
}

#[test]
fn error_frame_surfaces_as_remote_error() {
    let mut mux = MuxWriter::new(Vec::new());
    mux.write_all(b"ok").expect("data");
    mux.send_message(MessageCode::Error, b"rsync: something broke\n")
        .expect("error");
    let bytes = mux.into_inner().expect("inner");

    let mut reader = MuxReader::new(Cursor::new(bytes), logger());
    let mut ok = [0u8; 2];
    reader.read_exact(&mut ok).expect("data");
    assert_eq!(&ok, b"ok");
    let err = reader.read(&mut [0u8; 1]).unwrap_err();
    let remote = RemoteError::from_io(&err).expect("remote error");
    assert!(remote.message().contains("something broke"));
}

#[test]
fn bad_sum_head_is_rejected_not_clamped() {
    let mut bytes = Vec::new();
    for value in [1, 700, 17, 0] {
        write_int(&mut bytes, value).expect("write");
    }
    let err = read_sum_head(&mut Cursor::new(bytes)).unwrap_err();
    assert!(matches!(
        ProtocolError::from_io(&err),
        Some(ProtocolError::InvalidSumHead(_))
    ));
}
