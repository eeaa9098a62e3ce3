//! Classifies `SRC... DEST` operands into a transfer mode.

use std::ffi::OsString;
use std::path::PathBuf;

use daemon::{DEFAULT_PORT, DaemonAddress};

/// What the operands ask for.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Mode {
    /// Both ends are local paths.
    Local {
        sources: Vec<PathBuf>,
        dest: PathBuf,
    },
    /// Copy from a daemon module into a local directory.
    Pull {
        remote: DaemonAddress,
        dest: PathBuf,
    },
    /// Copy local files into a daemon module.
    Push {
        sources: Vec<PathBuf>,
        remote: DaemonAddress,
    },
    /// List the modules a daemon offers.
    ListModules(DaemonAddress),
}

/// Operands that cannot be combined.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct OperandError(pub String);

impl Mode {
    /// Decides the mode for `operands`. `port` overrides the default daemon
    /// port for operands that do not name one.
    pub fn classify(operands: &[OsString], port: Option<u16>) -> Result<Self, OperandError> {
        let port = port.unwrap_or(DEFAULT_PORT);
        let remote = |operand: &OsString| {
            operand
                .to_str()
                .and_then(|text| DaemonAddress::parse(text, port))
        };

        let Some((last, sources)) = operands.split_last() else {
            return Err(OperandError("missing source and destination operands".to_owned()));
        };
        if sources.is_empty() {
            return match remote(last) {
                Some(address) if address.is_listing() => Ok(Self::ListModules(address)),
                Some(_) => Err(OperandError(
                    "listing module contents is not supported; name a destination".to_owned(),
                )),
                None => Err(OperandError("missing destination operand".to_owned())),
            };
        }

        let remote_sources: Vec<DaemonAddress> = sources.iter().filter_map(remote).collect();
        match (remote_sources.len(), remote(last)) {
            (0, None) => Ok(Self::Local {
                sources: sources.iter().map(PathBuf::from).collect(),
                dest: PathBuf::from(last),
            }),
            (0, Some(address)) if address.is_listing() => {
                Err(OperandError("destination operand must name a module".to_owned()))
            }
            (0, Some(address)) => Ok(Self::Push {
                sources: sources.iter().map(PathBuf::from).collect(),
                remote: address,
            }),
            (_, Some(_)) => Err(OperandError(
                "copying between two remote locations is not supported".to_owned(),
            )),
            (1, None) if sources.len() == 1 => {
                let address = remote_sources.into_iter().next().ok_or_else(|| {
                    OperandError("missing source operand".to_owned())
                })?;
                if address.is_listing() {
                    return Err(OperandError("source operand must name a module".to_owned()));
                }
                Ok(Self::Pull {
                    remote: address,
                    dest: PathBuf::from(last),
                })
            }
            (_, None) => Err(OperandError(
                "only one remote source may be combined with a local destination".to_owned(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(operands: &[&str]) -> Result<Mode, OperandError> {
        let operands: Vec<OsString> = operands.iter().map(OsString::from).collect();
        Mode::classify(&operands, None)
    }

    #[test]
    fn local_operands() {
        assert_eq!(
            classify(&["a", "b/", "dest"]),
            Ok(Mode::Local {
                sources: vec![PathBuf::from("a"), PathBuf::from("b/")],
                dest: PathBuf::from("dest"),
            })
        );
    }

    #[test]
    fn pull_and_push() {
        let Ok(Mode::Pull { remote, dest }) = classify(&["host::mod/dir/", "out"]) else {
            panic!("expected a pull");
        };
        assert_eq!(remote.operand(), "mod/dir/");
        assert_eq!(dest, PathBuf::from("out"));

        let Ok(Mode::Push { sources, remote }) = classify(&["x", "y", "rsync://host:9/mod"]) else {
            panic!("expected a push");
        };
        assert_eq!(sources.len(), 2);
        assert_eq!(remote.port, 9);
    }

    #[test]
    fn port_override_applies_to_bare_hosts() {
        let operands = vec![OsString::from("rsync://host/")];
        let Ok(Mode::ListModules(address)) = Mode::classify(&operands, Some(1873)) else {
            panic!("expected a listing");
        };
        assert_eq!(address.port, 1873);
    }

    #[test]
    fn rejected_combinations() {
        assert!(classify(&[]).is_err());
        assert!(classify(&["only-local"]).is_err());
        assert!(classify(&["host::a", "host::b"]).is_err());
        assert!(classify(&["host::a", "host::b", "dest"]).is_err());
        assert!(classify(&["src", "host::"]).is_err());
        assert!(classify(&["host::mod/file"]).is_err());
    }
}
