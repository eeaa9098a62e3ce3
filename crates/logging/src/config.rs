//! crates/logging/src/config.rs
//! Verbosity configuration combining info and debug levels.

use super::levels::{DebugFlag, DebugLevels, InfoFlag, InfoLevels};

/// Combined verbosity configuration for info and debug flags.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct VerbosityConfig {
    /// Info flag levels.
    pub info: InfoLevels,
    /// Debug flag levels.
    pub debug: DebugLevels,
}

impl VerbosityConfig {
    /// Create a configuration from a `-v` count, following rsync's mapping
    /// from verbosity to individual info and debug flags.
    pub fn from_verbose_level(level: u8) -> Self {
        let mut config = Self::default();
        config.info.nonreg = 1;
        if level == 0 {
            return config;
        }

        config.info.copy = 1;
        config.info.flist = 1;
        config.info.misc = 1;
        config.info.name = 1;
        config.info.stats = 1;
        if level == 1 {
            return config;
        }

        config.info.misc = 2;
        config.info.name = 2;
        config.info.skip = 2;
        config.debug.connect = 1;
        config.debug.deltasum = 1;
        config.debug.filter = 1;
        config.debug.flist = 1;
        if level == 2 {
            return config;
        }

        config.debug.connect = 2;
        config.debug.deltasum = 2;
        config.debug.filter = 2;
        config.debug.flist = 2;
        config.debug.genr = 1;
        config.debug.own = 1;
        config.debug.recv = 1;
        config.debug.send = 1;
        if level == 3 {
            return config;
        }

        config.debug.deltasum = 3;
        config.debug.flist = 3;
        config.debug.own = 2;
        config.debug.proto = 2;
        if level >= 5 {
            config.debug.deltasum = 4;
            config.debug.flist = 4;
            config.debug.io = 1;
        }
        config
    }

    /// Apply a single info flag token (e.g. `"skip2"`, `"stats"`, `"all"`).
    pub fn apply_info_flag(&mut self, token: &str) -> Result<(), String> {
        let (name, level) = parse_flag_token(token)?;
        if name == "all" {
            self.info.set_all(level);
            return Ok(());
        }
        let flag = InfoFlag::ALL
            .into_iter()
            .find(|flag| flag.name() == name)
            .ok_or_else(|| format!("unknown info flag: {name}"))?;
        self.info.set(flag, level);
        Ok(())
    }

    /// Apply a single debug flag token (e.g. `"recv2"`, `"flist"`, `"none"`).
    pub fn apply_debug_flag(&mut self, token: &str) -> Result<(), String> {
        let (name, level) = parse_flag_token(token)?;
        if name == "all" {
            self.debug.set_all(level);
            return Ok(());
        }
        let flag = DebugFlag::ALL
            .into_iter()
            .find(|flag| flag.name() == name)
            .ok_or_else(|| format!("unknown debug flag: {name}"))?;
        self.debug.set(flag, level);
        Ok(())
    }

    /// Returns `true` if `flag` is enabled at `level` or above.
    pub fn info_gte(&self, flag: InfoFlag, level: u8) -> bool {
        self.info.get(flag) >= level
    }

    /// Returns `true` if `flag` is enabled at `level` or above.
    pub fn debug_gte(&self, flag: DebugFlag, level: u8) -> bool {
        self.debug.get(flag) >= level
    }
}

/// Splits a token like `"flist2"` into its name and level. A bare name means
/// level 1; `"none"` means `("all", 0)`.
fn parse_flag_token(token: &str) -> Result<(&str, u8), String> {
    let token = token.trim();
    if token.is_empty() {
        return Err("empty flag token".to_string());
    }
    if token.eq_ignore_ascii_case("none") {
        return Ok(("all", 0));
    }

    let split = token
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(token.len());
    let (name, digits) = token.split_at(split);
    if name.is_empty() {
        return Err(format!("invalid flag token: {token}"));
    }
    let level = if digits.is_empty() {
        1
    } else {
        digits
            .parse::<u8>()
            .map_err(|_| format!("invalid level in flag token: {token}"))?
    };
    Ok((name, level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_zero_only_reports_nonregular_files() {
        let config = VerbosityConfig::from_verbose_level(0);
        assert_eq!(config.info.nonreg, 1);
        assert_eq!(config.info.name, 0);
        assert!(!config.debug.any_enabled());
    }

    #[test]
    fn levels_are_monotonic() {
        for level in 0..5u8 {
            let lower = VerbosityConfig::from_verbose_level(level);
            let higher = VerbosityConfig::from_verbose_level(level + 1);
            for flag in InfoFlag::ALL {
                assert!(higher.info.get(flag) >= lower.info.get(flag), "{flag:?}");
            }
            for flag in DebugFlag::ALL {
                assert!(higher.debug.get(flag) >= lower.debug.get(flag), "{flag:?}");
            }
        }
    }

    #[test]
    fn flag_tokens_parse_levels() {
        let mut config = VerbosityConfig::default();
        config.apply_info_flag("skip2").expect("skip2");
        config.apply_debug_flag("recv").expect("recv");
        assert_eq!(config.info.skip, 2);
        assert_eq!(config.debug.recv, 1);

        config.apply_debug_flag("none").expect("none");
        assert!(!config.debug.any_enabled());
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let mut config = VerbosityConfig::default();
        assert!(config.apply_info_flag("progress").is_err());
        assert!(config.apply_debug_flag("3").is_err());
        assert!(config.apply_debug_flag("").is_err());
    }
}
