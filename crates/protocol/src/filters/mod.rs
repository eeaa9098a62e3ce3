//! Filter list exchange for protocol 27.
//!
//! Each rule is an `i32` length followed by the rule text; an `i32` zero ends
//! the list. Excludes are sent as the bare pattern and includes carry a
//! `"+ "` prefix. An exclude whose pattern itself starts with `"+ "` or
//! `"- "` is sent with an explicit `"- "` prefix so it decodes unchanged.

use std::io::{self, Read, Write};

use crate::flist::MAX_PATH_LEN;
use crate::varint::{checked_len, read_bytes, read_int, write_bytes, write_int};

/// Whether a rule includes or excludes matching paths.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleType {
    /// Matching paths are transferred.
    Include,
    /// Matching paths are skipped.
    Exclude,
}

/// One filter rule as carried on the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilterRuleWireFormat {
    /// Include or exclude.
    pub rule_type: RuleType,
    /// Pattern text, including any leading `/` anchor or trailing `/`.
    pub pattern: Vec<u8>,
}

impl FilterRuleWireFormat {
    /// An exclude rule.
    pub fn exclude(pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            rule_type: RuleType::Exclude,
            pattern: pattern.into(),
        }
    }

    /// An include rule.
    pub fn include(pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            rule_type: RuleType::Include,
            pattern: pattern.into(),
        }
    }

    fn encode(&self) -> Vec<u8> {
        let needs_prefix = match self.rule_type {
            RuleType::Include => Some(&b"+ "[..]),
            RuleType::Exclude if has_rule_prefix(&self.pattern) => Some(&b"- "[..]),
            RuleType::Exclude => None,
        };
        let mut out = Vec::with_capacity(self.pattern.len() + 2);
        if let Some(prefix) = needs_prefix {
            out.extend_from_slice(prefix);
        }
        out.extend_from_slice(&self.pattern);
        out
    }

    fn decode(text: Vec<u8>) -> Self {
        if let Some(rest) = text.strip_prefix(b"+ ") {
            Self::include(rest)
        } else if let Some(rest) = text.strip_prefix(b"- ") {
            Self::exclude(rest)
        } else {
            Self::exclude(text)
        }
    }
}

fn has_rule_prefix(pattern: &[u8]) -> bool {
    pattern.starts_with(b"+ ") || pattern.starts_with(b"- ")
}

/// Writes `rules` followed by the terminating zero.
pub fn write_filter_list<W: Write + ?Sized>(
    writer: &mut W,
    rules: &[FilterRuleWireFormat],
) -> io::Result<()> {
    for rule in rules {
        let text = rule.encode();
        let len = i32::try_from(text.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "filter rule too long"))?;
        write_int(writer, len)?;
        write_bytes(writer, &text)?;
    }
    write_int(writer, 0)
}

/// Reads a filter list up to its terminating zero.
pub fn read_filter_list<R: Read + ?Sized>(reader: &mut R) -> io::Result<Vec<FilterRuleWireFormat>> {
    let mut rules = Vec::new();
    loop {
        let len = read_int(reader)?;
        if len == 0 {
            return Ok(rules);
        }
        let len = checked_len(len, "filter rule", MAX_PATH_LEN)?;
        rules.push(FilterRuleWireFormat::decode(read_bytes(reader, len)?));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn exclude_is_bare_pattern() {
        let mut out = Vec::new();
        write_filter_list(&mut out, &[FilterRuleWireFormat::exclude("*.o")]).expect("write");
        let mut expected = 3i32.to_le_bytes().to_vec();
        expected.extend_from_slice(b"*.o");
        expected.extend_from_slice(&0i32.to_le_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn include_and_ambiguous_exclude_round_trip() {
        let rules = vec![
            FilterRuleWireFormat::include("keep/"),
            FilterRuleWireFormat::exclude("+ odd"),
            FilterRuleWireFormat::exclude("/tmp"),
        ];
        let mut out = Vec::new();
        write_filter_list(&mut out, &rules).expect("write");
        assert_eq!(&out[4..11], b"+ keep/");
        let decoded = read_filter_list(&mut Cursor::new(out)).expect("read");
        assert_eq!(decoded, rules);
    }

    #[test]
    fn rejects_negative_length() {
        let data = (-3i32).to_le_bytes();
        assert!(read_filter_list(&mut Cursor::new(&data[..])).is_err());
    }
}
