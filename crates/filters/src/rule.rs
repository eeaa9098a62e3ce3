use std::fmt;

use protocol::filters::{FilterRuleWireFormat, RuleType};

use crate::FilterError;

/// Action taken when a rule matches.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterAction {
    /// Matching paths are transferred.
    Include,
    /// Matching paths are skipped together with everything below them.
    Exclude,
}

/// A literal include or exclude rule.
///
/// Patterns carry no wildcards. A leading `/` anchors the pattern at the
/// transfer root; otherwise it matches the trailing path components of any
/// entry. A trailing `/` restricts the rule to directories.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilterRule {
    action: FilterAction,
    pattern: String,
}

impl FilterRule {
    /// Creates an exclude rule.
    pub fn exclude(pattern: impl Into<String>) -> Self {
        Self {
            action: FilterAction::Exclude,
            pattern: pattern.into(),
        }
    }

    /// Creates an include rule.
    pub fn include(pattern: impl Into<String>) -> Self {
        Self {
            action: FilterAction::Include,
            pattern: pattern.into(),
        }
    }

    /// Parses rule text as written on the command line or in `rsyncd.conf`:
    /// `+ PATTERN` includes, `- PATTERN` or a bare pattern excludes.
    pub fn parse(text: &str) -> Self {
        if let Some(pattern) = text.strip_prefix("+ ") {
            Self::include(pattern)
        } else if let Some(pattern) = text.strip_prefix("- ") {
            Self::exclude(pattern)
        } else {
            Self::exclude(text)
        }
    }

    /// The rule's action.
    pub const fn action(&self) -> FilterAction {
        self.action
    }

    /// The pattern as given.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Converts the rule to its wire form.
    pub fn to_wire(&self) -> FilterRuleWireFormat {
        match self.action {
            FilterAction::Include => FilterRuleWireFormat::include(self.pattern.as_bytes()),
            FilterAction::Exclude => FilterRuleWireFormat::exclude(self.pattern.as_bytes()),
        }
    }

    /// Builds a rule from its wire form. Non-UTF-8 bytes are replaced.
    pub fn from_wire(rule: &FilterRuleWireFormat) -> Self {
        let pattern = String::from_utf8_lossy(&rule.pattern).into_owned();
        match rule.rule_type {
            RuleType::Include => Self::include(pattern),
            RuleType::Exclude => Self::exclude(pattern),
        }
    }

    pub(crate) fn compile(&self) -> Result<CompiledRule, FilterError> {
        let mut pattern = self.pattern.as_str();
        let directory_only = pattern.ends_with('/');
        pattern = pattern.trim_end_matches('/');
        let anchored = pattern.starts_with('/');
        pattern = pattern.trim_start_matches('/');
        if pattern.is_empty() {
            return Err(FilterError::EmptyPattern(self.pattern.clone()));
        }
        let components = pattern
            .split('/')
            .filter(|component| !component.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(CompiledRule {
            action: self.action,
            components,
            anchored,
            directory_only,
        })
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            FilterAction::Include => write!(f, "+ {}", self.pattern),
            FilterAction::Exclude => write!(f, "- {}", self.pattern),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct CompiledRule {
    pub(crate) action: FilterAction,
    components: Vec<String>,
    anchored: bool,
    directory_only: bool,
}

impl CompiledRule {
    pub(crate) fn matches(&self, components: &[&str], is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }
        if self.anchored {
            return components.len() == self.components.len()
                && components.iter().zip(&self.components).all(|(a, b)| a == b);
        }
        components.len() >= self.components.len()
            && components[components.len() - self.components.len()..]
                .iter()
                .zip(&self.components)
                .all(|(a, b)| a == b)
    }
}
