//! Per-module host access rules.
//!
//! A module carries an ordered list of `allow`/`deny` rules, each naming a
//! network in CIDR notation or `all`. The first rule matching the peer
//! decides. A module without rules admits everybody; a module with rules
//! turns away peers that none of them match.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Address pattern of one rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HostPattern {
    /// Any peer.
    Any,
    /// An IPv4 network.
    Ipv4 {
        /// Network address with host bits cleared.
        network: Ipv4Addr,
        /// Prefix length, 0 to 32.
        prefix: u8,
    },
    /// An IPv6 network.
    Ipv6 {
        /// Network address with host bits cleared.
        network: Ipv6Addr,
        /// Prefix length, 0 to 128.
        prefix: u8,
    },
}

impl HostPattern {
    /// Parses `all`, `*`, an address or an address with a `/prefix`.
    pub fn parse(token: &str) -> Result<Self, String> {
        let token = token.trim();
        if token.is_empty() {
            return Err("host pattern must be non-empty".to_string());
        }
        if token == "*" || token.eq_ignore_ascii_case("all") {
            return Ok(Self::Any);
        }

        let (address, prefix) = match token.split_once('/') {
            Some((address, prefix)) => (address, Some(prefix)),
            None => (token, None),
        };
        let prefix = prefix
            .map(|value| {
                value
                    .parse::<u8>()
                    .map_err(|_| format!("invalid prefix length in '{token}'"))
            })
            .transpose()?;

        if let Ok(ipv4) = address.parse::<Ipv4Addr>() {
            let prefix = prefix.unwrap_or(32);
            if prefix > 32 {
                return Err("IPv4 prefix length must be between 0 and 32".to_string());
            }
            let network = u32::from(ipv4) & v4_mask(prefix);
            return Ok(Self::Ipv4 {
                network: Ipv4Addr::from(network),
                prefix,
            });
        }
        if let Ok(ipv6) = address.parse::<Ipv6Addr>() {
            let prefix = prefix.unwrap_or(128);
            if prefix > 128 {
                return Err("IPv6 prefix length must be between 0 and 128".to_string());
            }
            let network = u128::from(ipv6) & v6_mask(prefix);
            return Ok(Self::Ipv6 {
                network: Ipv6Addr::from(network),
                prefix,
            });
        }
        Err(format!("invalid host pattern '{token}'; expected an address, CIDR or 'all'"))
    }

    /// Reports whether `addr` lies inside the pattern. IPv4-mapped IPv6
    /// peers are compared as IPv4.
    pub fn matches(&self, addr: IpAddr) -> bool {
        let addr = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(addr, IpAddr::V4),
            IpAddr::V4(_) => addr,
        };
        match (self, addr) {
            (Self::Any, _) => true,
            (Self::Ipv4 { network, prefix }, IpAddr::V4(candidate)) => {
                u32::from(candidate) & v4_mask(*prefix) == u32::from(*network)
            }
            (Self::Ipv6 { network, prefix }, IpAddr::V6(candidate)) => {
                u128::from(candidate) & v6_mask(*prefix) == u128::from(*network)
            }
            _ => false,
        }
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("all"),
            Self::Ipv4 { network, prefix } => write!(f, "{network}/{prefix}"),
            Self::Ipv6 { network, prefix } => write!(f, "{network}/{prefix}"),
        }
    }
}

fn v4_mask(prefix: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0)
}

fn v6_mask(prefix: u8) -> u128 {
    u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0)
}

/// What a matching rule does.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AclAction {
    /// Admit the peer.
    Allow,
    /// Turn the peer away.
    Deny,
}

/// One `allow <pattern>` or `deny <pattern>` line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AclRule {
    /// Outcome when the pattern matches.
    pub action: AclAction,
    /// Peers the rule applies to.
    pub pattern: HostPattern,
}

impl AclRule {
    /// Parses `allow <pattern>` or `deny <pattern>`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let (verb, pattern) = text
            .split_once(char::is_whitespace)
            .ok_or_else(|| format!("invalid acl rule '{text}'; expected 'allow|deny <pattern>'"))?;
        let action = match verb.to_ascii_lowercase().as_str() {
            "allow" => AclAction::Allow,
            "deny" => AclAction::Deny,
            _ => return Err(format!("invalid acl action '{verb}'; expected allow or deny")),
        };
        Ok(Self {
            action,
            pattern: HostPattern::parse(pattern)?,
        })
    }
}

/// Ordered access rules of a module.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AccessList {
    rules: Vec<AclRule>,
}

impl AccessList {
    /// Appends a rule after the existing ones.
    pub fn push(&mut self, rule: AclRule) {
        self.rules.push(rule);
    }

    /// Returns `true` when no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decides whether `peer` may use the module.
    pub fn permits(&self, peer: IpAddr) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(peer))
            .map_or(self.rules.is_empty(), |rule| rule.action == AclAction::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(text: &str) -> IpAddr {
        text.parse().expect("ip")
    }

    fn list(rules: &[&str]) -> AccessList {
        let mut acl = AccessList::default();
        for rule in rules {
            acl.push(AclRule::parse(rule).expect("rule"));
        }
        acl
    }

    #[test]
    fn cidr_patterns_match_their_network() {
        let pattern = HostPattern::parse("192.168.4.77/16").expect("parse");
        assert_eq!(pattern.to_string(), "192.168.0.0/16");
        assert!(pattern.matches(ip("192.168.200.1")));
        assert!(!pattern.matches(ip("192.169.0.1")));
        assert!(!pattern.matches(ip("::1")));
    }

    #[test]
    fn bare_address_is_a_host_route() {
        let pattern = HostPattern::parse("10.0.0.1").expect("parse");
        assert!(pattern.matches(ip("10.0.0.1")));
        assert!(!pattern.matches(ip("10.0.0.2")));
    }

    #[test]
    fn mapped_ipv6_peers_match_ipv4_rules() {
        let pattern = HostPattern::parse("127.0.0.0/8").expect("parse");
        assert!(pattern.matches(ip("::ffff:127.0.0.1")));
    }

    #[test]
    fn ipv6_networks() {
        let pattern = HostPattern::parse("fd00::/8").expect("parse");
        assert!(pattern.matches(ip("fd12::1")));
        assert!(!pattern.matches(ip("fe80::1")));
        assert!(HostPattern::parse("::/0").expect("parse").matches(ip("2001:db8::1")));
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(HostPattern::parse("").is_err());
        assert!(HostPattern::parse("10.0.0.0/33").is_err());
        assert!(HostPattern::parse("example.com").is_err());
        assert!(AclRule::parse("permit all").is_err());
        assert!(AclRule::parse("allow").is_err());
    }

    #[test]
    fn first_match_wins() {
        let acl = list(&["deny 10.0.0.5", "allow 10.0.0.0/8", "deny all"]);
        assert!(!acl.permits(ip("10.0.0.5")));
        assert!(acl.permits(ip("10.9.9.9")));
        assert!(!acl.permits(ip("172.16.0.1")));
    }

    #[test]
    fn empty_list_admits_everyone_and_unmatched_peers_are_refused() {
        assert!(AccessList::default().permits(ip("203.0.113.9")));
        assert!(!list(&["allow 127.0.0.1"]).permits(ip("203.0.113.9")));
    }
}
