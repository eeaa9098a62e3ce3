//! Command-line parsing.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, builder::OsStringValueParser, value_parser};
use filters::FilterRule;
use logging::VerbosityConfig;
use transfer::TransferOptions;

/// Parsed command produced by [`parse_args`].
#[derive(Debug, Default)]
pub(crate) struct ParsedArgs {
    pub show_help: bool,
    pub verbosity: u8,
    pub info: Vec<String>,
    pub debug: Vec<String>,
    pub recursive: bool,
    pub links: bool,
    pub perms: bool,
    pub times: bool,
    pub owner: bool,
    pub group: bool,
    pub devices: bool,
    pub ignore_times: bool,
    pub numeric_ids: bool,
    pub dry_run: bool,
    pub compress: bool,
    pub checksum: bool,
    pub excludes: Vec<String>,
    pub port: Option<u16>,
    pub daemon: bool,
    pub config: Option<PathBuf>,
    pub address: Option<String>,
    pub operands: Vec<OsString>,
}

impl ParsedArgs {
    /// Transfer options selected on the command line. `server` and `seed`
    /// are left for the mode to decide.
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            recursive: self.recursive,
            links: self.links,
            perms: self.perms,
            times: self.times,
            owner: self.owner,
            group: self.group,
            devices: self.devices,
            ignore_times: self.ignore_times,
            numeric_ids: self.numeric_ids,
            dry_run: self.dry_run,
            filters: self.excludes.iter().map(FilterRule::exclude).collect(),
            ..TransferOptions::default()
        }
    }

    /// The `-v` level refined by `--info` and `--debug` flag lists, applied
    /// in command-line order.
    pub fn verbosity_config(&self) -> Result<VerbosityConfig, String> {
        let mut config = VerbosityConfig::from_verbose_level(self.verbosity);
        for token in &self.info {
            config.apply_info_flag(token)?;
        }
        for token in &self.debug {
            config.apply_debug_flag(token)?;
        }
        Ok(config)
    }

    /// The first option this build recognises but cannot honour.
    pub fn unsupported_option(&self) -> Option<&'static str> {
        if self.compress {
            Some("--compress")
        } else if self.checksum {
            Some("--checksum")
        } else {
            None
        }
    }
}

fn flag(name: &'static str, short: char, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .short(short)
        .help(help)
        .action(ArgAction::SetTrue)
}

/// Builds the `clap` command used for parsing.
pub(crate) fn clap_command() -> Command {
    Command::new("rsync27")
        .about("Fast incremental file transfer speaking rsync protocol 27")
        .override_usage(
            "rsync27 [OPTION]... SRC... DEST\n       \
             rsync27 [OPTION]... SRC... rsync://HOST[:PORT]/MODULE[/DEST]\n       \
             rsync27 [OPTION]... rsync://HOST[:PORT]/MODULE[/SRC] DEST\n       \
             rsync27 --daemon [--config FILE] [--port PORT] [--address ADDR]",
        )
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(flag("help", 'h', "Show this help message and exit."))
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Increase verbosity; repeat for more detail.")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("info")
                .long("info")
                .value_name("FLAGS")
                .help("Fine-grained informational output, e.g. --info=name2,stats.")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .value_name("FLAGS")
                .help("Fine-grained debug output, e.g. --debug=recv,proto2.")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(flag("archive", 'a', "Archive mode; equals -rlptgoD."))
        .arg(flag("recursive", 'r', "Recurse into directories."))
        .arg(flag("links", 'l', "Copy symlinks as symlinks."))
        .arg(flag("perms", 'p', "Preserve permissions."))
        .arg(flag("times", 't', "Preserve modification times."))
        .arg(flag("owner", 'o', "Preserve owner (super-user only)."))
        .arg(flag("group", 'g', "Preserve group."))
        .arg(
            Arg::new("devices")
                .short('D')
                .long("devices")
                .help("Preserve device and special files.")
                .action(ArgAction::SetTrue),
        )
        .arg(flag(
            "ignore-times",
            'I',
            "Don't skip files that match in size and mtime.",
        ))
        .arg(flag("dry-run", 'n', "Show what would be transferred."))
        .arg(flag("compress", 'z', "Compress file data (not supported)."))
        .arg(flag("checksum", 'c', "Skip based on checksum (not supported)."))
        .arg(
            Arg::new("numeric-ids")
                .long("numeric-ids")
                .help("Don't map uid/gid values by user/group name.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .value_name("PATTERN")
                .help("Exclude paths whose trailing components equal PATTERN.")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Daemon port to connect to or listen on.")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("daemon")
                .long("daemon")
                .help("Run as an rsync daemon.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Daemon configuration file (default /etc/rsyncd.conf).")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("address")
                .long("address")
                .value_name("ADDRESS")
                .help("Address the daemon binds to."),
        )
        .arg(
            Arg::new("operands")
                .action(ArgAction::Append)
                .num_args(0..)
                .value_parser(OsStringValueParser::new()),
        )
}

/// Parses command-line arguments into a [`ParsedArgs`] structure.
pub(crate) fn parse_args<I, S>(arguments: I) -> Result<ParsedArgs, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut args: Vec<OsString> = arguments.into_iter().map(Into::into).collect();
    if args.is_empty() {
        args.push(OsString::from("rsync27"));
    }

    let mut matches = clap_command().try_get_matches_from(args)?;
    let archive = matches.get_flag("archive");
    Ok(ParsedArgs {
        show_help: matches.get_flag("help"),
        verbosity: matches.get_count("verbose"),
        info: matches
            .remove_many::<String>("info")
            .map(Iterator::collect)
            .unwrap_or_default(),
        debug: matches
            .remove_many::<String>("debug")
            .map(Iterator::collect)
            .unwrap_or_default(),
        recursive: archive || matches.get_flag("recursive"),
        links: archive || matches.get_flag("links"),
        perms: archive || matches.get_flag("perms"),
        times: archive || matches.get_flag("times"),
        owner: archive || matches.get_flag("owner"),
        group: archive || matches.get_flag("group"),
        devices: archive || matches.get_flag("devices"),
        ignore_times: matches.get_flag("ignore-times"),
        numeric_ids: matches.get_flag("numeric-ids"),
        dry_run: matches.get_flag("dry-run"),
        compress: matches.get_flag("compress"),
        checksum: matches.get_flag("checksum"),
        excludes: matches
            .remove_many::<String>("exclude")
            .map(Iterator::collect)
            .unwrap_or_default(),
        port: matches.remove_one::<u16>("port"),
        daemon: matches.get_flag("daemon"),
        config: matches.remove_one::<PathBuf>("config"),
        address: matches.remove_one::<String>("address"),
        operands: matches
            .remove_many::<OsString>("operands")
            .map(Iterator::collect)
            .unwrap_or_default(),
    })
}

/// Help text rendered by clap.
pub(crate) fn render_help() -> String {
    clap_command().render_help().to_string()
}
