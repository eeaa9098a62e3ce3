//! Anchoring, directory-only rules and evaluation order.

use std::path::Path;

use filters::{FilterRule, FilterSet};
use proptest::prelude::*;

#[test]
fn anchored_pattern_matches_only_at_root() {
    let set = FilterSet::from_rules([FilterRule::exclude("/root.txt")]).expect("rules");
    assert!(!set.allows(Path::new("root.txt"), false));
    assert!(set.allows(Path::new("subdir/root.txt"), false));
}

#[test]
fn unanchored_pattern_matches_at_any_depth() {
    let set = FilterSet::from_rules([FilterRule::exclude("test.txt")]).expect("rules");
    assert!(!set.allows(Path::new("test.txt"), false));
    assert!(!set.allows(Path::new("a/b/c/test.txt"), false));
    assert!(set.allows(Path::new("a/test.txt.bak"), false));
}

#[test]
fn multi_component_pattern_matches_tail() {
    let set = FilterSet::from_rules([FilterRule::exclude("cache/tmp")]).expect("rules");
    assert!(!set.allows(Path::new("cache/tmp"), true));
    assert!(!set.allows(Path::new("home/u/cache/tmp/file"), false));
    assert!(set.allows(Path::new("cache"), true));
    assert!(set.allows(Path::new("xcache/tmp"), true));
}

#[test]
fn directory_only_rule_skips_files() {
    let set = FilterSet::from_rules([FilterRule::exclude("logs/")]).expect("rules");
    assert!(!set.allows(Path::new("logs"), true));
    assert!(set.allows(Path::new("logs"), false));
}

#[test]
fn include_before_exclude_rescues_entry() {
    let set = FilterSet::from_rules([
        FilterRule::include("important.o"),
        FilterRule::exclude("important.o"),
        FilterRule::exclude("junk.o"),
    ])
    .expect("rules");
    assert!(set.allows(Path::new("src/important.o"), false));
    assert!(!set.allows(Path::new("src/junk.o"), false));
}

#[test]
fn parsed_rules_from_config_text() {
    let set = FilterSet::from_rules(
        ["+ /keep", "- /keep/secret", "tmp/"]
            .into_iter()
            .map(FilterRule::parse),
    )
    .expect("rules");
    assert!(set.allows(Path::new("keep"), true));
    assert!(!set.allows(Path::new("keep/secret"), false));
    assert!(set.allows(Path::new("keep/public"), false));
    assert!(!set.allows(Path::new("a/tmp/b"), false));
}

proptest! {
    #[test]
    fn excluded_prefix_excludes_every_descendant(
        dir in "[a-z]{1,8}",
        rest in proptest::collection::vec("[a-z]{1,8}", 1..4),
    ) {
        let set = FilterSet::from_rules([FilterRule::exclude(format!("/{dir}"))]).expect("rules");
        let path = format!("{dir}/{}", rest.join("/"));
        prop_assert!(!set.allows(Path::new(&path), false));
    }
}
