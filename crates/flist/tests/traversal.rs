use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use filters::{FilterRule, FilterSet};
use flist::{FileListBuilder, IOERR_GENERAL};
use logging::{Logger, Role, VerbosityConfig};
use protocol::flist::{FileList, FileType};
use rustix::fs::{CWD, FileType as NodeType, Mode, makedev, mknodat};

fn logger() -> Logger {
    Logger::capturing(VerbosityConfig::from_verbose_level(2), Role::Sender)
}

fn names(list: &FileList) -> Vec<String> {
    list.entries.iter().map(|entry| entry.name()).collect()
}

fn tree(root: &Path) {
    fs::create_dir_all(root.join("sub/deeper")).expect("mkdir");
    fs::write(root.join("b.txt"), b"bbb").expect("write");
    fs::write(root.join("a.txt"), b"a").expect("write");
    fs::write(root.join("sub/c.txt"), b"cc").expect("write");
    fs::write(root.join("sub/deeper/d.txt"), b"d").expect("write");
}

#[test]
fn trailing_slash_lists_contents_under_dot() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    tree(&src);

    let operand = format!("{}/", src.display());
    let built = FileListBuilder::new(logger())
        .recursive(true)
        .build(&[operand])
        .expect("build");
    assert_eq!(
        names(&built.list),
        [".", "a.txt", "b.txt", "sub", "sub/c.txt", "sub/deeper", "sub/deeper/d.txt"]
    );
    assert!(built.list.entries[0].is_top_dir());
    assert_eq!(built.list.total_size(), 3 + 1 + 2 + 1 + dir_sizes(&built.list));
    assert_eq!(built.source(1), Some(src.join("a.txt").as_path()));
}

fn dir_sizes(list: &FileList) -> u64 {
    list.entries
        .iter()
        .filter(|entry| entry.is_dir())
        .map(|entry| entry.size())
        .sum()
}

#[test]
fn non_recursive_skips_directories() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    tree(&src);

    let log = logger();
    let built = FileListBuilder::new(log.clone())
        .build(&[format!("{}/", src.display())])
        .expect("build");
    assert_eq!(names(&built.list), [".", "a.txt", "b.txt"]);

    let built = FileListBuilder::new(log.clone()).build(&[&src]).expect("build");
    assert!(built.list.is_empty());
    assert!(
        log.captured()
            .iter()
            .any(|event| event.message == "skipping directory src")
    );
}

#[test]
fn named_root_keeps_its_name() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    tree(&src);

    let built = FileListBuilder::new(logger())
        .recursive(true)
        .build(&[src.join("sub"), src.join("a.txt")])
        .expect("build");
    assert_eq!(
        names(&built.list),
        ["a.txt", "sub", "sub/c.txt", "sub/deeper", "sub/deeper/d.txt"]
    );
}

#[test]
fn symlinks_need_links_option() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    fs::create_dir(&src).expect("mkdir");
    symlink("hello", src.join("hey")).expect("symlink");

    let operand = [format!("{}/", src.display())];
    let without = FileListBuilder::new(logger()).build(&operand).expect("build");
    assert_eq!(names(&without.list), ["."]);

    let with = FileListBuilder::new(logger())
        .links(true)
        .build(&operand)
        .expect("build");
    let link = &with.list.entries[1];
    assert_eq!(link.file_type(), FileType::Symlink);
    assert_eq!(link.link_target(), Some(&b"hello"[..]));
}

#[test]
fn fifos_need_devices_option() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    fs::create_dir(&src).expect("mkdir");
    mknodat(
        CWD,
        &src.join("pipe"),
        NodeType::Fifo,
        Mode::from_bits_truncate(0o600),
        makedev(0, 0),
    )
    .expect("mkfifo");

    let operand = [format!("{}/", src.display())];
    let without = FileListBuilder::new(logger()).build(&operand).expect("build");
    assert_eq!(names(&without.list), ["."]);

    let with = FileListBuilder::new(logger())
        .devices(true)
        .build(&operand)
        .expect("build");
    assert_eq!(with.list.entries[1].file_type(), FileType::Fifo);
    assert_eq!(with.list.entries[1].rdev(), Some(0));
}

#[test]
fn filters_prune_subtrees() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    tree(&src);

    let filters = FilterSet::from_rules([FilterRule::exclude("deeper/"), FilterRule::exclude("/b.txt")])
        .expect("filters");
    let built = FileListBuilder::new(logger())
        .recursive(true)
        .filters(filters)
        .build(&[format!("{}/", src.display())])
        .expect("build");
    assert_eq!(names(&built.list), [".", "a.txt", "sub", "sub/c.txt"]);
}

#[test]
fn missing_operand_is_a_general_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let built = FileListBuilder::new(logger())
        .build(&[temp.path().join("absent")])
        .expect("build");
    assert!(built.list.is_empty());
    assert_eq!(built.list.io_error, IOERR_GENERAL);
}

#[test]
fn order_matches_receiver_sort() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("a")).expect("mkdir");
    for name in ["a.b", "a-b", "a/x", "B", "_", "a0"] {
        fs::write(src.join(name), b"x").expect("write");
    }
    let built = FileListBuilder::new(logger())
        .recursive(true)
        .build(&[format!("{}/", src.display())])
        .expect("build");
    let resorted = FileList::new(built.list.entries.clone());
    assert_eq!(resorted.entries, built.list.entries);
}

#[test]
fn sources_follow_their_entries_and_first_duplicate_wins() {
    let temp = tempfile::tempdir().expect("tempdir");
    let left = temp.path().join("left");
    let right = temp.path().join("right");
    fs::create_dir_all(&left).expect("mkdir");
    fs::create_dir_all(&right).expect("mkdir");
    fs::write(left.join("z"), b"z").expect("write");
    fs::write(left.join("same"), b"left").expect("write");
    fs::write(right.join("same"), b"right").expect("write");

    let built = FileListBuilder::new(logger())
        .build(&[left.join("z"), left.join("same"), right.join("same")])
        .expect("build");
    assert_eq!(names(&built.list), ["same", "z"]);
    assert_eq!(built.source(0), Some(left.join("same").as_path()));
    assert_eq!(built.source(1), Some(left.join("z").as_path()));
}

#[test]
fn owner_names_are_collected_unless_numeric() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    tree(&src);
    let operand = [format!("{}/", src.display())];

    let numeric = FileListBuilder::new(logger())
        .owner(true)
        .group(true)
        .numeric_ids(true)
        .build(&operand)
        .expect("build");
    assert!(numeric.list.uid_names.is_empty());
    assert!(numeric.list.gid_names.is_empty());
    assert!(numeric.list.entries.iter().all(|entry| entry.uid().is_some()));
}
