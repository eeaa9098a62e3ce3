//! `rsyncd.conf` loading.
//!
//! The file is INI-like: `key = value` lines before the first `[module]`
//! header are global, later lines belong to the most recent module. Keys are
//! case-insensitive, `#` and `;` start comment lines and unknown keys are
//! skipped so that files written for the reference daemon still load.
//!
//! ```ini
//! port = 873
//! motd file = /etc/rsyncd.motd
//!
//! [pub]
//! path = /srv/pub
//! comment = Public files
//! read only = yes
//! exclude = .cache tmp/
//! acl = allow 10.0.0.0/8
//! acl = deny all
//! ```
//!
//! ```no_run
//! use std::path::Path;
//!
//! let config = daemon::RsyncdConfig::from_file(Path::new("/etc/rsyncd.conf"))?;
//! for module in config.modules() {
//!     println!("{} -> {}", module.name(), module.path().display());
//! }
//! # Ok::<(), daemon::ConfigError>(())
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use filters::FilterRule;
use thiserror::Error;

use crate::acl::{AccessList, AclRule};

/// Port used when the configuration does not name one.
pub const DEFAULT_PORT: u16 = 873;

/// A configuration file that could not be read or understood.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file (or the MOTD file it names) could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A line is malformed or a module is incomplete.
    #[error("{}: line {line}: {message}", path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What is wrong.
        message: String,
    },
}

impl ConfigError {
    fn read(path: &Path, source: io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Line the error refers to, when it came from parsing.
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::Read { .. } => None,
            Self::Parse { line, .. } => Some(*line),
        }
    }
}

/// Settings outside any module section.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GlobalConfig {
    port: Option<u16>,
    address: Option<String>,
    motd_file: Option<PathBuf>,
}

impl GlobalConfig {
    /// Listening port, [`DEFAULT_PORT`] unless configured.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// `address` to bind, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// `motd file` path, if any.
    pub fn motd_file(&self) -> Option<&Path> {
        self.motd_file.as_deref()
    }
}

/// One exported directory tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModuleConfig {
    name: String,
    path: PathBuf,
    comment: Option<String>,
    read_only: bool,
    list: bool,
    numeric_ids: bool,
    timeout: Option<u32>,
    exclude: Vec<String>,
    acl: AccessList,
}

impl ModuleConfig {
    /// A read-only, listed module open to every host.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            comment: None,
            read_only: true,
            list: true,
            numeric_ids: false,
            timeout: None,
            exclude: Vec::new(),
            acl: AccessList::default(),
        }
    }

    /// Sets the text shown next to the name in listings.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// `false` accepts uploads.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// `false` hides the module from `#list` requests.
    pub fn with_list(mut self, list: bool) -> Self {
        self.list = list;
        self
    }

    /// Appends an `acl` rule; earlier rules take precedence.
    pub fn with_acl_rule(mut self, rule: AclRule) -> Self {
        self.acl.push(rule);
        self
    }

    /// Name clients request.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory the module name maps to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Listing comment.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Whether uploads are refused (the default).
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Whether `#list` shows the module (the default).
    pub fn list(&self) -> bool {
        self.list
    }

    /// Forces numeric ownership for sessions on this module.
    pub fn numeric_ids(&self) -> bool {
        self.numeric_ids
    }

    /// Socket timeout for sessions on this module. Zero means none.
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout {
            None | Some(0) => None,
            Some(seconds) => Some(Duration::from_secs(u64::from(seconds))),
        }
    }

    /// Raw `exclude` patterns.
    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// The module's `exclude` patterns as rules for the daemon's sender.
    pub fn exclude_rules(&self) -> Vec<FilterRule> {
        self.exclude.iter().map(FilterRule::exclude).collect()
    }

    /// Host access rules.
    pub fn acl(&self) -> &AccessList {
        &self.acl
    }
}

/// Globals plus the module table, in file order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RsyncdConfig {
    global: GlobalConfig,
    modules: Vec<ModuleConfig>,
}

impl RsyncdConfig {
    /// Default globals serving `modules`.
    pub fn with_modules(modules: Vec<ModuleConfig>) -> Self {
        Self {
            global: GlobalConfig::default(),
            modules,
        }
    }

    /// Reads and parses `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|error| ConfigError::read(path, error))?;
        Self::parse(&text, path)
    }

    /// Parses `text`; `path` only labels errors.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut pending: Option<PendingModule> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let fail = |message: String| ConfigError::Parse {
                path: path.to_path_buf(),
                line,
                message,
            };
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with(['#', ';']) {
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let (name, rest) = header
                    .split_once(']')
                    .ok_or_else(|| fail("unterminated module header".to_owned()))?;
                let name = name.trim();
                let rest = rest.trim();
                if name.is_empty() {
                    return Err(fail("empty module name".to_owned()));
                }
                if !rest.is_empty() && !rest.starts_with(['#', ';']) {
                    return Err(fail(format!("unexpected text after [{name}]")));
                }
                if let Some(first) = seen.insert(name.to_owned(), line) {
                    return Err(fail(format!("module '{name}' already defined at line {first}")));
                }
                if let Some(done) = pending.replace(PendingModule::new(name, line)) {
                    config.modules.push(done.finish(path)?);
                }
                continue;
            }

            let (key, value) = trimmed
                .split_once('=')
                .ok_or_else(|| fail(format!("expected 'key = value', found '{trimmed}'")))?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            match pending.as_mut() {
                Some(module) => module.set(&key, value).map_err(fail)?,
                None => config.global.set(&key, value).map_err(fail)?,
            }
        }

        if let Some(done) = pending {
            config.modules.push(done.finish(path)?);
        }
        Ok(config)
    }

    /// Settings outside module sections.
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    /// Modules in file order.
    pub fn modules(&self) -> &[ModuleConfig] {
        &self.modules
    }

    /// Looks a module up by exact name.
    pub fn get_module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|module| module.name == name)
    }

    /// Lines of the `motd file`, empty when none is configured.
    pub fn motd_lines(&self) -> Result<Vec<String>, ConfigError> {
        let Some(path) = self.global.motd_file() else {
            return Ok(Vec::new());
        };
        let text = fs::read_to_string(path).map_err(|error| ConfigError::read(path, error))?;
        Ok(text.lines().map(str::to_owned).collect())
    }
}

impl GlobalConfig {
    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "port" => {
                let port = value.parse().map_err(|_| format!("invalid port '{value}'"))?;
                self.port = Some(port);
            }
            "address" => self.address = Some(value.to_owned()),
            "motd file" => self.motd_file = Some(PathBuf::from(value)),
            _ => {}
        }
        Ok(())
    }
}

/// A module whose section is still being read.
struct PendingModule {
    header_line: usize,
    path: Option<PathBuf>,
    module: ModuleConfig,
}

impl PendingModule {
    fn new(name: &str, header_line: usize) -> Self {
        Self {
            header_line,
            path: None,
            module: ModuleConfig::new(name, PathBuf::new()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let module = &mut self.module;
        match key {
            "path" if value.is_empty() => return Err("empty path".to_owned()),
            "path" => self.path = Some(PathBuf::from(value)),
            "comment" => module.comment = Some(value.to_owned()),
            "read only" => module.read_only = parse_bool(value)?,
            "list" => module.list = parse_bool(value)?,
            "numeric ids" => module.numeric_ids = parse_bool(value)?,
            "timeout" => {
                let seconds = value.parse().map_err(|_| format!("invalid timeout '{value}'"))?;
                module.timeout = Some(seconds);
            }
            "exclude" => module
                .exclude
                .extend(value.split_ascii_whitespace().map(str::to_owned)),
            "acl" => module.acl.push(AclRule::parse(value)?),
            _ => {}
        }
        Ok(())
    }

    fn finish(self, file: &Path) -> Result<ModuleConfig, ConfigError> {
        let Some(path) = self.path else {
            return Err(ConfigError::Parse {
                path: file.to_path_buf(),
                line: self.header_line,
                message: format!("module '{}' has no path", self.module.name),
            });
        };
        Ok(ModuleConfig { path, ..self.module })
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(format!("expected yes or no, found '{value}'")),
    }
}
