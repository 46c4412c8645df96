//! Command-line parsing, generated from the settings registry.
//!
//! Settings are only known at run time, so the parser is assembled with
//! clap's builder API rather than derived. Each setting becomes one option
//! with every alias attached: the first multi-character name is the long
//! option, further names become visible aliases, and single-character names
//! become short options. Boolean settings are flags and additionally get a
//! `--no-NAME` negation.
//!
//! Besides the settings, the parser knows the framework's own options
//! ([`FRAMEWORK_OPTIONS`]) and collects every positional argument under
//! `args`. Parsing produces an [`Invocation`]: the values given on the command
//! line (to be applied at the highest precedence tier), the positional
//! arguments, and the framework option requests.

use std::path::PathBuf;

use clap::builder::PossibleValuesParser;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::error::AppError;
use crate::settings::{RESERVED_NAMES, Setting, Settings};
use crate::subcommand::SubcommandInfo;
use crate::types::{Kind, RawValue, Value};

const ARGS_ID: &str = "args";
const FRAMEWORK_HEADING: &str = "Configuration";

/// A framework option: name, optional metavar, help.
pub struct FrameworkOption {
    pub name: &'static str,
    pub metavar: Option<&'static str>,
    pub help: &'static str,
}

pub const FRAMEWORK_OPTIONS: &[FrameworkOption] = &[
    FrameworkOption {
        name: "config",
        metavar: Some("FILE"),
        help: "read configuration from FILE (may be given more than once)",
    },
    FrameworkOption {
        name: "no-default-configs",
        metavar: None,
        help: "do not read the default configuration files",
    },
    FrameworkOption {
        name: "dump-config",
        metavar: None,
        help: "write the effective configuration to standard output and exit",
    },
    FrameworkOption {
        name: "dump-setting-names",
        metavar: None,
        help: "write the names of all settings to standard output and exit",
    },
    FrameworkOption {
        name: "list-config-files",
        metavar: None,
        help: "list the configuration files that would be read and exit",
    },
    FrameworkOption {
        name: "help-all",
        metavar: None,
        help: "show help for all options, including hidden ones, and exit",
    },
    FrameworkOption {
        name: "generate-manpage",
        metavar: Some("TEMPLATE"),
        help: "fill in the manual page TEMPLATE, write it to standard output and exit",
    },
];

/// Program-level text used for help, usage and manual pages.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub progname: String,
    pub version: String,
    pub description: Option<String>,
    pub epilog: Option<String>,
    /// What follows the options in usage when there are no subcommands.
    pub arg_synopsis: String,
    pub subcommands: Vec<SubcommandInfo>,
}

impl CommandSpec {
    pub fn new(progname: &str) -> Self {
        Self {
            progname: progname.to_string(),
            version: "0.0.0".to_string(),
            description: None,
            epilog: None,
            arg_synopsis: "[FILE]...".to_string(),
            subcommands: Vec::new(),
        }
    }

    /// One usage line per subcommand, or a single generic one.
    pub fn usage_lines(&self) -> Vec<String> {
        if self.subcommands.is_empty() {
            return vec![format!("{} [options] {}", self.progname, self.arg_synopsis)];
        }
        self.subcommands
            .iter()
            .map(|cmd| match &cmd.synopsis {
                Some(syn) => format!("{} [options] {} {syn}", self.progname, cmd.name),
                None => format!("{} [options] {}", self.progname, cmd.name),
            })
            .collect()
    }

    /// The description followed by one `* name: summary` paragraph per
    /// subcommand.
    pub fn about(&self) -> String {
        let mut paragraphs: Vec<String> = self.description.iter().cloned().collect();
        for cmd in &self.subcommands {
            let summary = cmd.summary.as_deref().unwrap_or_default();
            paragraphs.push(format!("* {}: {summary}", cmd.name));
        }
        paragraphs.join("\n\n")
    }
}

/// A request that replaces the normal run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaAction {
    DumpConfig,
    DumpSettingNames,
    ListConfigFiles,
    GenerateManpage(PathBuf),
}

/// The outcome of a successful parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub positionals: Vec<String>,
    /// Settings given on the command line, by canonical name.
    pub values: Vec<(String, RawValue)>,
    pub config_files: Vec<PathBuf>,
    pub no_default_configs: bool,
    pub action: Option<MetaAction>,
}

#[derive(Debug)]
pub enum Parsed {
    Run(Invocation),
    /// Help or version was requested; print the text and exit successfully.
    Exit(String),
}

/// Build the parser for `settings`. Hidden settings are included in help
/// only when `show_hidden` is set.
pub fn build_command(spec: &CommandSpec, settings: &Settings, show_hidden: bool) -> Command {
    let usage = spec.usage_lines().join("\n       ");
    let mut cmd = Command::new(spec.progname.clone())
        .version(spec.version.clone())
        .override_usage(usage);

    let about = spec.about();
    if !about.is_empty() {
        cmd = cmd.about(about);
    }
    if let Some(epilog) = &spec.epilog {
        cmd = cmd.after_help(epilog.clone());
    }

    for setting in settings.iter() {
        cmd = cmd.arg(setting_arg(setting, show_hidden));
        if let Some(negation) = negation_arg(setting, settings, show_hidden) {
            cmd = cmd.arg(negation);
        }
    }

    for opt in FRAMEWORK_OPTIONS {
        let mut arg = Arg::new(opt.name)
            .long(opt.name)
            .help(opt.help)
            .help_heading(FRAMEWORK_HEADING);
        arg = match opt.metavar {
            Some(metavar) => arg.value_name(metavar).action(ArgAction::Append),
            None => arg.action(ArgAction::SetTrue),
        };
        cmd = cmd.arg(arg);
    }

    cmd.arg(
        Arg::new(ARGS_ID)
            .num_args(0..)
            .action(ArgAction::Append)
            .hide(true),
    )
}

fn setting_arg(setting: &Setting, show_hidden: bool) -> Arg {
    let mut arg = Arg::new(setting.name().to_string())
        .help(setting.help().to_string())
        .hide(setting.is_hidden() && !show_hidden);

    let (long, short): (Vec<&String>, Vec<&String>) =
        setting.names().iter().partition(|n| n.chars().count() > 1);
    for (i, name) in long.iter().enumerate() {
        arg = if i == 0 {
            arg.long((*name).clone())
        } else {
            arg.visible_alias((*name).clone())
        };
    }
    for (i, c) in short.iter().filter_map(|n| n.chars().next()).enumerate() {
        arg = if i == 0 {
            arg.short(c)
        } else {
            arg.visible_short_alias(c)
        };
    }

    if let Some(group) = setting.group() {
        arg = arg.help_heading(group.to_string());
    }

    match setting.kind() {
        Kind::Boolean => arg.action(ArgAction::SetTrue),
        Kind::StringList => arg
            .action(ArgAction::Append)
            .value_name(setting.metavar()),
        Kind::Choice(choices) => arg
            .action(ArgAction::Set)
            .value_name(setting.metavar())
            .value_parser(PossibleValuesParser::new(choices.clone())),
        Kind::String | Kind::Integer | Kind::ByteSize => {
            arg.action(ArgAction::Set).value_name(setting.metavar())
        }
    }
}

fn negation_name(setting: &Setting) -> Option<String> {
    let long = setting.names().iter().find(|n| n.chars().count() > 1)?;
    Some(format!("no-{long}"))
}

fn negation_arg(setting: &Setting, settings: &Settings, show_hidden: bool) -> Option<Arg> {
    if *setting.kind() != Kind::Boolean {
        return None;
    }
    let name = negation_name(setting)?;
    if settings.contains(&name) || RESERVED_NAMES.contains(&name.as_str()) {
        return None;
    }
    let mut arg = Arg::new(name.clone())
        .long(name)
        .action(ArgAction::SetTrue)
        .help(format!("negate --{}", setting.name()))
        .hide(!show_hidden);
    if let Some(group) = setting.group() {
        arg = arg.help_heading(group.to_string());
    }
    Some(arg)
}

/// Help text including hidden settings.
pub fn render_full_help(spec: &CommandSpec, settings: &Settings) -> String {
    build_command(spec, settings, true).render_help().to_string()
}

/// Parse `argv` (including the program name) against `settings`.
pub fn parse(spec: &CommandSpec, settings: &Settings, argv: &[String]) -> Result<Parsed, AppError> {
    let matches = match build_command(spec, settings, false).try_get_matches_from(argv) {
        Ok(matches) => matches,
        Err(e) => {
            return match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    Ok(Parsed::Exit(e.to_string()))
                }
                _ => Err(AppError::Usage(usage_message(&e.to_string()))),
            };
        }
    };

    if matches.get_flag("help-all") {
        return Ok(Parsed::Exit(render_full_help(spec, settings)));
    }

    Ok(Parsed::Run(invocation(&matches, settings)))
}

/// First line of a clap error, without the `error: ` prefix.
fn usage_message(rendered: &str) -> String {
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

fn from_command_line(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

fn invocation(matches: &ArgMatches, settings: &Settings) -> Invocation {
    let mut values = Vec::new();
    for setting in settings.iter() {
        let id = setting.name();
        let value = match setting.kind() {
            Kind::Boolean => boolean_value(matches, setting, settings),
            Kind::StringList if from_command_line(matches, id) => {
                let items: Vec<String> = matches
                    .get_many::<String>(id)
                    .map(|vals| vals.cloned().collect())
                    .unwrap_or_default();
                Some(RawValue::Typed(Value::List(items)))
            }
            _ if from_command_line(matches, id) => matches
                .get_one::<String>(id)
                .map(|text| RawValue::Text(text.clone())),
            _ => None,
        };
        if let Some(value) = value {
            values.push((id.to_string(), value));
        }
    }

    let config_files = matches
        .get_many::<String>("config")
        .map(|vals| vals.map(PathBuf::from).collect())
        .unwrap_or_default();

    let action = if let Some(template) = matches
        .get_many::<String>("generate-manpage")
        .and_then(|vals| vals.last())
    {
        Some(MetaAction::GenerateManpage(PathBuf::from(template)))
    } else if matches.get_flag("list-config-files") {
        Some(MetaAction::ListConfigFiles)
    } else if matches.get_flag("dump-config") {
        Some(MetaAction::DumpConfig)
    } else if matches.get_flag("dump-setting-names") {
        Some(MetaAction::DumpSettingNames)
    } else {
        None
    };

    Invocation {
        positionals: matches
            .get_many::<String>(ARGS_ID)
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default(),
        values,
        config_files,
        no_default_configs: matches.get_flag("no-default-configs"),
        action,
    }
}

/// `--NAME` and `--no-NAME` both given: the later one wins.
fn boolean_value(matches: &ArgMatches, setting: &Setting, settings: &Settings) -> Option<RawValue> {
    let id = setting.name();
    let yes = from_command_line(matches, id)
        .then(|| matches.index_of(id))
        .flatten();
    let no = negation_name(setting)
        .filter(|name| !settings.contains(name) && !RESERVED_NAMES.contains(&name.as_str()))
        .filter(|name| from_command_line(matches, name))
        .and_then(|name| matches.index_of(&name));
    let value = match (yes, no) {
        (None, None) => return None,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (Some(y), Some(n)) => y > n,
    };
    Some(RawValue::Typed(Value::Bool(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::sample_settings;

    fn spec() -> CommandSpec {
        CommandSpec {
            version: "1.2.3".into(),
            description: Some("Search for lines.".into()),
            ..CommandSpec::new("grepper")
        }
    }

    fn argv(items: &[&str]) -> Vec<String> {
        std::iter::once("grepper")
            .chain(items.iter().copied())
            .map(String::from)
            .collect()
    }

    fn run(items: &[&str]) -> Invocation {
        match parse(&spec(), &sample_settings(), &argv(items)).unwrap() {
            Parsed::Run(inv) => inv,
            Parsed::Exit(text) => panic!("unexpected exit: {text}"),
        }
    }

    fn value_of<'a>(inv: &'a Invocation, name: &str) -> Option<&'a RawValue> {
        inv.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    #[test]
    fn positionals_collected_in_order() {
        let inv = run(&["b.txt", "-", "a.txt"]);
        assert_eq!(inv.positionals, vec!["b.txt", "-", "a.txt"]);
        assert!(inv.values.is_empty());
    }

    #[test]
    fn long_and_short_aliases_set_the_same_setting() {
        let inv = run(&["--pattern", "x"]);
        assert_eq!(value_of(&inv, "pattern"), Some(&RawValue::Text("x".into())));
        let inv = run(&["-p", "y"]);
        assert_eq!(value_of(&inv, "pattern"), Some(&RawValue::Text("y".into())));
    }

    #[test]
    fn absent_options_produce_no_values() {
        let inv = run(&["file"]);
        assert!(value_of(&inv, "pattern").is_none());
        assert!(value_of(&inv, "ignore-case").is_none());
    }

    #[test]
    fn boolean_flag_and_negation() {
        let inv = run(&["--ignore-case"]);
        assert_eq!(
            value_of(&inv, "ignore-case"),
            Some(&RawValue::Typed(Value::Bool(true)))
        );
        let inv = run(&["--no-ignore-case"]);
        assert_eq!(
            value_of(&inv, "ignore-case"),
            Some(&RawValue::Typed(Value::Bool(false)))
        );
    }

    #[test]
    fn later_of_flag_and_negation_wins() {
        let inv = run(&["--no-ignore-case", "--ignore-case"]);
        assert_eq!(
            value_of(&inv, "ignore-case"),
            Some(&RawValue::Typed(Value::Bool(true)))
        );
        let inv = run(&["--ignore-case", "--no-ignore-case"]);
        assert_eq!(
            value_of(&inv, "ignore-case"),
            Some(&RawValue::Typed(Value::Bool(false)))
        );
    }

    #[test]
    fn repeated_list_option_appends() {
        let inv = run(&["--exclude", "a", "--exclude=b"]);
        assert_eq!(
            value_of(&inv, "exclude"),
            Some(&RawValue::Typed(Value::List(vec!["a".into(), "b".into()])))
        );
    }

    #[test]
    fn choice_rejects_unknown_value() {
        let err = parse(&spec(), &sample_settings(), &argv(&["--log-level", "loud"])).unwrap_err();
        assert!(matches!(err, AppError::Usage(_)));
    }

    #[test]
    fn config_files_repeatable() {
        let inv = run(&["--config", "a.toml", "--config", "b.toml", "--no-default-configs"]);
        assert_eq!(
            inv.config_files,
            vec![PathBuf::from("a.toml"), PathBuf::from("b.toml")]
        );
        assert!(inv.no_default_configs);
    }

    #[test]
    fn meta_actions() {
        assert_eq!(run(&["--dump-config"]).action, Some(MetaAction::DumpConfig));
        assert_eq!(
            run(&["--dump-setting-names"]).action,
            Some(MetaAction::DumpSettingNames)
        );
        assert_eq!(
            run(&["--list-config-files"]).action,
            Some(MetaAction::ListConfigFiles)
        );
        assert_eq!(
            run(&["--generate-manpage", "page.1"]).action,
            Some(MetaAction::GenerateManpage("page.1".into()))
        );
        assert_eq!(run(&[]).action, None);
    }

    #[test]
    fn help_exits_with_text() {
        match parse(&spec(), &sample_settings(), &argv(&["--help"])).unwrap() {
            Parsed::Exit(text) => {
                assert!(text.contains("Search for lines."));
                assert!(text.contains("--pattern"));
                assert!(text.contains("grepper [options] [FILE]..."));
            }
            Parsed::Run(_) => panic!("expected help"),
        }
    }

    #[test]
    fn version_exits_with_text() {
        match parse(&spec(), &sample_settings(), &argv(&["--version"])).unwrap() {
            Parsed::Exit(text) => assert!(text.contains("1.2.3")),
            Parsed::Run(_) => panic!("expected version"),
        }
    }

    #[test]
    fn unknown_option_is_usage_error() {
        let err = parse(&spec(), &sample_settings(), &argv(&["--bogus"])).unwrap_err();
        match err {
            AppError::Usage(msg) => {
                assert!(msg.contains("--bogus"));
                assert!(!msg.starts_with("error:"));
                assert!(!msg.contains('\n'));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn hidden_settings_only_in_help_all() {
        let mut settings = sample_settings();
        settings
            .add_boolean(&["secret-mode"], "undocumented behaviour", false)
            .unwrap()
            .set_hidden(true);

        let help = build_command(&spec(), &settings, false)
            .render_help()
            .to_string();
        assert!(!help.contains("--secret-mode"));

        match parse(&spec(), &settings, &argv(&["--help-all"])).unwrap() {
            Parsed::Exit(text) => assert!(text.contains("--secret-mode")),
            Parsed::Run(_) => panic!("expected help"),
        }
    }

    #[test]
    fn hidden_settings_still_accepted() {
        let mut settings = sample_settings();
        settings
            .add_integer(&["tuning"], "", 1)
            .unwrap()
            .set_hidden(true);
        match parse(&spec(), &settings, &argv(&["--tuning", "4"])).unwrap() {
            Parsed::Run(inv) => {
                assert_eq!(value_of(&inv, "tuning"), Some(&RawValue::Text("4".into())))
            }
            Parsed::Exit(_) => panic!("unexpected exit"),
        }
    }

    #[test]
    fn usage_lists_subcommands() {
        let spec = CommandSpec {
            subcommands: vec![
                SubcommandInfo {
                    name: "count".into(),
                    synopsis: Some("[FILE]...".into()),
                    summary: Some("Count lines.".into()),
                },
                SubcommandInfo {
                    name: "version-info".into(),
                    synopsis: None,
                    summary: None,
                },
            ],
            ..spec()
        };
        assert_eq!(
            spec.usage_lines(),
            vec![
                "grepper [options] count [FILE]...",
                "grepper [options] version-info"
            ]
        );
        let about = spec.about();
        assert!(about.starts_with("Search for lines."));
        assert!(about.contains("* count: Count lines."));
        assert!(about.ends_with("* version-info: "));
    }

    #[test]
    fn group_becomes_help_heading() {
        let help = build_command(&spec(), &sample_settings(), false)
            .render_help()
            .to_string();
        assert!(help.contains("Logging:"));
        assert!(help.contains("Configuration:"));
    }
}
