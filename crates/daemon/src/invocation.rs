//! The argument vector a client hands to a server.
//!
//! Both the daemon (after `@RSYNCD: OK`) and a remote shell invocation
//! receive the client's wishes as `--server [--sender] -<flags> . <paths>`.
//! The flags travel as one compact string of short options; the few long
//! options protocol 27 clients send are accepted alongside.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use transfer::TransferOptions;

/// Errors from decoding a server argument vector.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum InvocationError {
    /// The first argument was not `--server`.
    #[error("server arguments must start with --server")]
    NotAServer,

    /// An option this implementation does not provide.
    #[error("{0} is not supported")]
    Unsupported(String),

    /// No path followed the `.` separator.
    #[error("missing path argument")]
    MissingPath,

    /// A path tried to leave the module.
    #[error("path {0} lies outside the module")]
    OutsideModule(String),
}

/// Decoded `--server` arguments.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServerInvocation {
    /// The server sends files (the client pulls).
    pub sender: bool,
    /// Number of `-v` flags.
    pub verbosity: u8,
    /// Transfer options selected by the flags. `server` and `seed` are left
    /// for the session to fill in.
    pub options: TransferOptions,
    /// Path operands after the `.` separator.
    pub paths: Vec<String>,
}

impl ServerInvocation {
    /// Decodes an argument vector as sent by the client.
    pub fn parse<I, S>(args: I) -> Result<Self, InvocationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        if args.next().as_ref().map(AsRef::as_ref) != Some("--server") {
            return Err(InvocationError::NotAServer);
        }

        let mut invocation = Self::default();
        let mut positional = Vec::new();
        for arg in args {
            let arg = arg.as_ref();
            if !positional.is_empty() || arg == "." || !arg.starts_with('-') {
                positional.push(arg.to_owned());
                continue;
            }
            match arg {
                "--sender" => invocation.sender = true,
                "--numeric-ids" => invocation.options.numeric_ids = true,
                "--ignore-times" => invocation.options.ignore_times = true,
                "--recursive" => invocation.options.recursive = true,
                "--dry-run" => invocation.options.dry_run = true,
                long if long.starts_with("--") => {
                    let name = long.split_once('=').map_or(long, |(name, _)| name);
                    return Err(InvocationError::Unsupported(name.to_owned()));
                }
                short => invocation.apply_short_flags(&short[1..])?,
            }
        }

        // The first positional argument is the "." placeholder for the
        // server's working directory.
        if positional.first().map(String::as_str) == Some(".") {
            positional.remove(0);
        }
        if positional.is_empty() {
            return Err(InvocationError::MissingPath);
        }
        invocation.paths = positional;
        Ok(invocation)
    }

    fn apply_short_flags(&mut self, flags: &str) -> Result<(), InvocationError> {
        let options = &mut self.options;
        for flag in flags.chars() {
            match flag {
                'v' => self.verbosity = self.verbosity.saturating_add(1),
                'r' => options.recursive = true,
                'l' => options.links = true,
                'p' => options.perms = true,
                't' => options.times = true,
                'o' => options.owner = true,
                'g' => options.group = true,
                'D' => options.devices = true,
                'I' => options.ignore_times = true,
                'n' => options.dry_run = true,
                'z' => return Err(InvocationError::Unsupported("--compress".to_owned())),
                'c' => return Err(InvocationError::Unsupported("--checksum".to_owned())),
                other => return Err(InvocationError::Unsupported(format!("-{other}"))),
            }
        }
        Ok(())
    }

    /// Builds the argument vector a client sends for this invocation.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--server".to_owned()];
        if self.sender {
            args.push("--sender".to_owned());
        }

        let options = &self.options;
        let mut flags = String::from("-");
        flags.extend(std::iter::repeat_n('v', usize::from(self.verbosity)));
        for (enabled, flag) in [
            (options.ignore_times, 'I'),
            (options.links, 'l'),
            (options.owner, 'o'),
            (options.group, 'g'),
            (options.devices, 'D'),
            (options.times, 't'),
            (options.perms, 'p'),
            (options.recursive, 'r'),
            (options.dry_run, 'n'),
        ] {
            if enabled {
                flags.push(flag);
            }
        }
        if flags.len() > 1 {
            args.push(flags);
        }
        if options.numeric_ids {
            args.push("--numeric-ids".to_owned());
        }
        args.push(".".to_owned());
        args.extend(self.paths.iter().cloned());
        args
    }

    /// Maps the path operands onto a module rooted at `root`.
    ///
    /// Operands are `<module>[/<path>]`. The module itself, with or without
    /// a trailing slash, stands for the contents of the root. A trailing
    /// slash on a deeper path is kept so that the sender lists the
    /// directory's contents. Operands that climb out with `..` or are
    /// absolute are rejected.
    pub fn module_paths(&self, module: &str, root: &Path) -> Result<Vec<PathBuf>, InvocationError> {
        self.paths
            .iter()
            .map(|operand| {
                let rest = operand.strip_prefix(module).unwrap_or(operand);
                let rest = match rest.strip_prefix('/') {
                    Some(rest) => rest,
                    None if rest.is_empty() => rest,
                    // Not under the module name; treat the whole operand as
                    // relative to the module root.
                    None => operand.as_str(),
                };
                let relative = Path::new(rest);
                if relative
                    .components()
                    .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir))
                {
                    return Err(InvocationError::OutsideModule(operand.clone()));
                }
                if rest.is_empty() || rest.ends_with('/') {
                    let joined = root.join(rest);
                    let mut text = joined.into_os_string();
                    if !text.as_encoded_bytes().ends_with(b"/") {
                        text.push("/");
                    }
                    Ok(PathBuf::from(text))
                } else {
                    Ok(root.join(rest))
                }
            })
            .collect()
    }
}
