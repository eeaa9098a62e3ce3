use std::path::Path;

use crate::FilterError;
use crate::rule::{CompiledRule, FilterAction, FilterRule};

/// An ordered list of rules evaluated first-match-wins.
///
/// A path with no matching rule is included. Exclusion is by path prefix:
/// once a directory is excluded nothing beneath it is allowed, whatever later
/// rules say about the descendants.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    rules: Vec<FilterRule>,
    compiled: Vec<CompiledRule>,
}

impl FilterSet {
    /// Compiles `rules`, keeping their order.
    pub fn from_rules(rules: impl IntoIterator<Item = FilterRule>) -> Result<Self, FilterError> {
        let rules: Vec<FilterRule> = rules.into_iter().collect();
        let compiled = rules
            .iter()
            .map(FilterRule::compile)
            .collect::<Result<_, _>>()?;
        Ok(Self { rules, compiled })
    }

    /// Returns `true` when the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// Returns `true` when `path`, relative to the transfer root, should be
    /// transferred.
    pub fn allows(&self, path: &Path, is_dir: bool) -> bool {
        if self.compiled.is_empty() {
            return true;
        }
        let text = path.to_string_lossy();
        let components: Vec<&str> = text
            .split('/')
            .filter(|component| !component.is_empty() && *component != ".")
            .collect();
        if components.is_empty() {
            return true;
        }
        for depth in 1..components.len() {
            if self.decide(&components[..depth], true) == FilterAction::Exclude {
                return false;
            }
        }
        self.decide(&components, is_dir) == FilterAction::Include
    }

    fn decide(&self, components: &[&str], is_dir: bool) -> FilterAction {
        self.compiled
            .iter()
            .find(|rule| rule.matches(components, is_dir))
            .map_or(FilterAction::Include, |rule| rule.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(rules: &[FilterRule]) -> FilterSet {
        FilterSet::from_rules(rules.iter().cloned()).expect("valid rules")
    }

    #[test]
    fn empty_set_allows_everything() {
        assert!(FilterSet::default().allows(Path::new("a/b"), false));
    }

    #[test]
    fn first_match_wins() {
        let set = set(&[FilterRule::include("keep.o"), FilterRule::exclude("keep.o")]);
        assert!(set.allows(Path::new("keep.o"), false));
    }

    #[test]
    fn excluded_directory_prunes_descendants() {
        let set = set(&[FilterRule::exclude("target/"), FilterRule::include("x")]);
        assert!(!set.allows(Path::new("target"), true));
        assert!(!set.allows(Path::new("target/x"), false));
        assert!(set.allows(Path::new("target"), false));
    }
}
