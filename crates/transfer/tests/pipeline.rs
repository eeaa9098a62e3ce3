//! End-to-end sessions between a sender and a receiver over a socket pair.

use std::fs;
use std::io::{self, Read};
use std::net::Shutdown;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread;

use filetime::{FileTime, set_file_mtime};
use logging::{Logger, Role};
use tempfile::tempdir;
use transfer::{CancelToken, Connection, Receiver, Sender, TransferOptions, TransferStats};

/// Runs a local session: a client sender feeding a server receiver.
fn transfer(options: &TransferOptions, source: &str, dest: &Path) -> (TransferStats, TransferStats) {
    session(options, vec![source.to_owned()], dest, || {})
}

/// Runs `before_requests` on the sender's thread once its file list is out
/// and it first waits for a request.
fn session<F>(
    options: &TransferOptions,
    sources: Vec<String>,
    dest: &Path,
    before_requests: F,
) -> (TransferStats, TransferStats)
where
    F: FnOnce() + Send + 'static,
{
    let (near, far) = UnixStream::pair().expect("socket pair");

    let sender_options = TransferOptions {
        server: false,
        ..options.clone()
    };
    let sending = thread::spawn(move || {
        let logger = Logger::quiet(Role::Sender);
        let reader = HookedReader {
            inner: near.try_clone().expect("clone"),
            hook: Some(before_requests),
        };
        let mut conn = Connection::new(reader, near)
            .multiplex_input(logger.clone())
            .expect("demultiplex");
        Sender::new(sender_options, logger).run(&mut conn, sources.as_slice())
    });

    let cancel = CancelToken::new();
    let handle = far.try_clone().expect("clone");
    cancel.on_cancel(move || {
        let _ = handle.shutdown(Shutdown::Both);
    });
    let mut conn = Connection::new(far.try_clone().expect("clone"), far)
        .multiplex_output()
        .expect("multiplex");
    let receiver_options = TransferOptions {
        server: true,
        ..options.clone()
    };
    let received = Receiver::new(receiver_options, Logger::quiet(Role::Receiver))
        .with_cancel(cancel)
        .run(&mut conn, dest)
        .expect("receiver");
    drop(conn);
    let sent = sending.join().expect("sender thread").expect("sender");
    (sent, received)
}

/// Calls its hook before the first read.
struct HookedReader<R, F> {
    inner: R,
    hook: Option<F>,
}

impl<R: Read, F: FnOnce()> Read for HookedReader<R, F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(hook) = self.hook.take() {
            hook();
        }
        self.inner.read(buf)
    }
}

fn contents_of(root: &Path) -> String {
    format!("{}/", root.display())
}

/// Deterministic filler so the delta tests do not depend on an RNG crate.
fn pseudo_random(len: usize, mut state: u32) -> Vec<u8> {
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}

#[test]
fn recursive_copy_reproduces_the_tree() {
    let temp = tempdir().expect("tempdir");
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("sub/deeper")).expect("mkdir");
    fs::write(src.join("a.txt"), b"alpha").expect("write");
    fs::write(src.join("sub/b.bin"), pseudo_random(100_000, 7)).expect("write");
    fs::write(src.join("sub/deeper/empty"), b"").expect("write");
    let dest = temp.path().join("dest");

    let options = TransferOptions {
        recursive: true,
        times: true,
        ..TransferOptions::default()
    };
    let (sent, received) = transfer(&options, &contents_of(&src), &dest);

    for name in ["a.txt", "sub/b.bin", "sub/deeper/empty"] {
        assert_eq!(
            fs::read(dest.join(name)).expect("dest file"),
            fs::read(src.join(name)).expect("src file"),
            "{name}"
        );
        assert_eq!(
            fs::metadata(dest.join(name)).expect("stat").mtime(),
            fs::metadata(src.join(name)).expect("stat").mtime()
        );
    }
    assert_eq!(received.files_transferred, 3);
    assert_eq!(sent.files_transferred, 3);
    assert!(received.is_complete());
    assert_eq!(sent.bytes_written, received.bytes_read);
    assert_eq!(received.bytes_written, sent.bytes_read);
}

#[test]
fn second_run_with_times_skips_everything() {
    let temp = tempdir().expect("tempdir");
    let src = temp.path().join("src");
    fs::create_dir_all(&src).expect("mkdir");
    fs::write(src.join("one"), pseudo_random(50_000, 1)).expect("write");
    fs::write(src.join("two"), pseudo_random(20_000, 2)).expect("write");
    let dest = temp.path().join("dest");
    let options = TransferOptions {
        recursive: true,
        times: true,
        ..TransferOptions::default()
    };

    let (first, _) = transfer(&options, &contents_of(&src), &dest);
    let (second, received) = transfer(&options, &contents_of(&src), &dest);

    assert_eq!(received.files_transferred, 0);
    assert_eq!(received.files_skipped, 2);
    assert!(second.bytes_written < first.bytes_written / 10);
    assert_eq!(fs::read(dest.join("one")).expect("read"), pseudo_random(50_000, 1));
}

#[test]
fn modified_middle_sends_only_the_difference() {
    const SIZE: usize = 3 * 1024 * 1024;
    let temp = tempdir().expect("tempdir");
    let src = temp.path().join("big");
    let dest = temp.path().join("copy");

    let original = pseudo_random(SIZE, 99);
    let mut changed = original.clone();
    changed[SIZE / 3..2 * SIZE / 3].copy_from_slice(&pseudo_random(SIZE / 3, 4242));
    fs::write(&src, &changed).expect("write src");
    fs::write(&dest, &original).expect("write dest");
    set_file_mtime(&dest, FileTime::from_unix_time(1_000_000, 0)).expect("mtime");

    let (sent, received) = transfer(&TransferOptions::default(), src.to_str().expect("utf-8"), &dest);

    assert_eq!(fs::read(&dest).expect("read"), changed);
    assert_eq!(received.files_transferred, 1);
    assert!(sent.bytes_written < 2 * 1024 * 1024, "sent {}", sent.bytes_written);
    assert!(sent.matched_bytes >= (SIZE as u64) / 2);
    assert_eq!(sent.literal_bytes + sent.matched_bytes, SIZE as u64);
}

#[test]
fn symlinks_are_recreated() {
    let temp = tempdir().expect("tempdir");
    let src = temp.path().join("src");
    fs::create_dir_all(&src).expect("mkdir");
    fs::write(src.join("hello"), b"world").expect("write");
    std::os::unix::fs::symlink("hello", src.join("hey")).expect("symlink");
    let dest = temp.path().join("dest");

    let options = TransferOptions {
        recursive: true,
        links: true,
        ..TransferOptions::default()
    };
    transfer(&options, &contents_of(&src), &dest);

    let link = dest.join("hey");
    assert!(fs::symlink_metadata(&link).expect("lstat").file_type().is_symlink());
    assert_eq!(fs::read_link(&link).expect("readlink"), Path::new("hello"));
    assert_eq!(fs::read(&link).expect("follow"), b"world");
}

#[test]
fn new_files_drop_group_and_other_write_without_perms() {
    let temp = tempdir().expect("tempdir");
    let src = temp.path().join("open");
    fs::write(&src, b"data").expect("write");
    fs::set_permissions(&src, fs::Permissions::from_mode(0o666)).expect("chmod");
    let dest = temp.path().join("out");

    transfer(&TransferOptions::default(), src.to_str().expect("utf-8"), &dest);
    let mode = fs::metadata(&dest).expect("stat").permissions().mode() & 0o777;
    assert_eq!(mode, 0o644);

    let preserved = temp.path().join("preserved");
    let options = TransferOptions {
        perms: true,
        ..TransferOptions::default()
    };
    transfer(&options, src.to_str().expect("utf-8"), &preserved);
    let mode = fs::metadata(&preserved).expect("stat").permissions().mode() & 0o777;
    assert_eq!(mode, 0o666);
}

#[test]
fn missing_source_ends_after_the_file_list() {
    let temp = tempdir().expect("tempdir");
    let src = temp.path().join("absent");
    let dest = temp.path().join("dest");

    let (sent, received) = transfer(&TransferOptions::default(), &contents_of(&src), &dest);

    assert_eq!(sent.files_listed, 0);
    assert_eq!(received.files_listed, 0);
    assert_ne!(received.io_error, 0);
    assert!(!received.is_complete());
    assert!(!dest.exists());
}

#[test]
fn dry_run_writes_nothing() {
    let temp = tempdir().expect("tempdir");
    let src = temp.path().join("src");
    fs::create_dir_all(&src).expect("mkdir");
    fs::write(src.join("file"), b"contents").expect("write");
    let dest = temp.path().join("dest");

    let options = TransferOptions {
        recursive: true,
        dry_run: true,
        ..TransferOptions::default()
    };
    let (_, received) = transfer(&options, &contents_of(&src), &dest);

    assert!(!dest.exists());
    assert_eq!(received.files_transferred, 0);
}

#[test]
fn file_deleted_after_listing_is_skipped_and_reported() {
    let temp = tempdir().expect("tempdir");
    let src = temp.path().join("src");
    fs::create_dir_all(&src).expect("mkdir");
    for name in ["a", "b", "c"] {
        fs::write(src.join(name), name.repeat(100)).expect("write");
    }
    let dest = temp.path().join("dest");
    fs::create_dir_all(&dest).expect("mkdir dest");

    let sources = ["a", "b", "c"]
        .iter()
        .map(|name| src.join(name).to_str().expect("utf-8").to_owned())
        .collect();
    let doomed = src.join("b");
    let (sent, mut received) = session(&TransferOptions::default(), sources, &dest, move || {
        fs::remove_file(doomed).expect("remove");
    });

    assert_eq!(sent.files_listed, 3);
    assert_eq!(sent.files_transferred, 2);
    assert_eq!(sent.files_failed, 1);
    assert_ne!(sent.io_error & flist::IOERR_VANISHED, 0);
    assert_eq!(sent.exit_code(), 23);

    assert_eq!(fs::read(dest.join("a")).expect("a"), "a".repeat(100).as_bytes());
    assert_eq!(fs::read(dest.join("c")).expect("c"), "c".repeat(100).as_bytes());
    assert!(!dest.join("b").exists());
    assert_eq!(received.files_transferred, 2);
    assert_eq!(received.exit_code(), 0);
    received.absorb_sender_failures(&sent);
    assert_eq!(received.exit_code(), 23);
}
