//! # clifilter demo application
//!
//! A small grep-like filter that shows how a program is put together with
//! clifilter. It exists to exercise the framework by hand, not to replace
//! grep.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example clifilter_demo -- grep --pattern=fn src/lib.rs
//! cat src/lib.rs | cargo run --example clifilter_demo -- grep -p use -i
//! cargo run --example clifilter_demo -- settings
//! ```
//!
//! ## Features demonstrated
//!
//! Below, `demo` stands for `cargo run --example clifilter_demo --`.
//!
//! | Feature              | How to exercise it                                          |
//! |----------------------|-------------------------------------------------------------|
//! | Defaults             | `demo settings`                                             |
//! | Config file          | Put `[config]` with `pattern = "x"` in `~/.clifilter-demo.toml` |
//! | Explicit config file | `demo --config my.toml grep FILE`                           |
//! | Env var override     | `CLIFILTER_DEMO__IGNORE_CASE=yes demo settings`             |
//! | Command-line value   | `demo grep --count=3 -p fn src/app.rs`                      |
//! | Negated boolean      | `demo grep --no-ignore-case ...`                            |
//! | Repeated list option | `demo grep --exclude=test --exclude=mod src/lib.rs`         |
//! | Standard input       | `demo grep -p x < file` or `demo grep -p x -`               |
//! | Output file          | `demo --output=matches.txt grep -p fn src/lib.rs`           |
//! | Logging              | `demo --log=stderr --log-level=debug grep -p fn src/lib.rs` |
//! | Memory profiling     | `demo --log=stderr --log-level=debug grep -p fn src/lib.rs` |
//! | Stage profiling      | `CLIFILTER_DEMO_PROFILE=profile.json demo settings`         |
//! | Config listing       | `demo --list-config-files`                                  |
//! | Config dump          | `demo --dump-config`                                        |
//! | Usage error          | `demo frobnicate`                                           |

use std::io::Write;
use std::process::ExitCode;

use clifilter::{
    AppError, Application, ConfigError, Context, Runner, Settings, Subcommands,
    default_process_inputs,
};

/// Match state for one run.
#[derive(Debug, Default)]
struct Grep {
    pattern: String,
    ignore_case: bool,
    exclude: Vec<String>,
    limit: usize,
    found: usize,
}

impl Grep {
    fn configure(&mut self, settings: &Settings) -> Result<(), AppError> {
        self.ignore_case = settings.boolean("ignore-case")?;
        self.pattern = settings.string("pattern")?.to_string();
        self.exclude = settings.string_list("exclude")?.to_vec();
        if self.ignore_case {
            self.pattern = self.pattern.to_lowercase();
            for word in &mut self.exclude {
                *word = word.to_lowercase();
            }
        }
        self.limit = usize::try_from(settings.integer("count")?)
            .map_err(|_| AppError::usage("--count must not be negative"))?;
        Ok(())
    }

    fn matches(&self, line: &str) -> bool {
        let haystack = if self.ignore_case {
            line.to_lowercase()
        } else {
            line.to_string()
        };
        haystack.contains(&self.pattern) && !self.exclude.iter().any(|w| haystack.contains(w))
    }

    fn cmd_grep(&mut self, ctx: &mut Context, args: &[String]) -> Result<(), AppError> {
        self.configure(ctx.settings())?;
        if self.pattern.is_empty() {
            return Err(AppError::usage("grep needs --pattern"));
        }
        default_process_inputs(self, ctx, args)?;
        if self.found == 0 {
            return Err(AppError::application("no matching lines"));
        }
        Ok(())
    }

    fn cmd_settings(&mut self, ctx: &mut Context, _args: &[String]) -> Result<(), AppError> {
        let settings = ctx.settings();
        let mut lines = Vec::new();
        for setting in settings.iter() {
            lines.push(format!(
                "{:<12} {:<10} {:?}",
                setting.name(),
                setting.source().to_string(),
                setting.value()
            ));
        }
        for line in lines {
            writeln!(ctx.output(), "{line}")?;
        }
        Ok(())
    }
}

impl Application for Grep {
    fn add_settings(&mut self, settings: &mut Settings) -> Result<(), ConfigError> {
        settings
            .add_string(&["pattern", "p"], "print lines containing PATTERN", "")?
            .set_group("Matching");
        settings
            .add_boolean(&["ignore-case", "i"], "ignore case when matching", false)?
            .set_group("Matching");
        settings
            .add_string_list(&["exclude"], "skip lines containing WORD", &[])?
            .set_metavar("WORD")
            .set_group("Matching");
        settings
            .add_integer(&["count"], "stop after N matches (0 means no limit)", 0)?
            .set_metavar("N");
        Ok(())
    }

    fn add_subcommands(&mut self, commands: &mut Subcommands<Self>) -> Result<(), ConfigError> {
        commands
            .register(
                "grep",
                Self::cmd_grep,
                Some("Print matching lines from each FILE, or standard input."),
            )?
            .set_synopsis("[FILE]...");
        commands.register(
            "settings",
            Self::cmd_settings,
            Some("Show every setting with the layer its value came from."),
        )?;
        Ok(())
    }

    fn process_input_line(
        &mut self,
        ctx: &mut Context,
        source: &str,
        line: &str,
        lineno: usize,
    ) -> Result<(), AppError> {
        if self.limit > 0 && self.found >= self.limit {
            return Ok(());
        }
        if self.matches(line) {
            self.found += 1;
            writeln!(ctx.output(), "{source}:{lineno}:{line}")?;
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    Runner::builder()
        .progname("clifilter-demo")
        .version(env!("CARGO_PKG_VERSION"))
        .description("Print lines that contain a pattern.")
        .epilog("Settings can also come from config files and CLIFILTER_DEMO__NAME variables.")
        .run(&mut Grep::default())
}
