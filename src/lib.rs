//! A framework for Unix-style command-line filter programs. Implement one
//! trait method, hand the application to a runner, and go.
//!
//! Clifilter takes care of everything around the interesting part of a
//! filter: layered settings (defaults, config files, environment, command
//! line), `--help` and `--version`, reading each input file or standard
//! input line by line, optional subcommands, logging and error reporting.
//!
//! ```ignore
//! #[derive(Default)]
//! struct Upcase;
//!
//! impl Application for Upcase {
//!     fn process_input_line(
//!         &mut self,
//!         ctx: &mut Context,
//!         _source: &str,
//!         line: &str,
//!         _lineno: usize,
//!     ) -> Result<(), AppError> {
//!         writeln!(ctx.output(), "{}", line.to_uppercase())?;
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> ExitCode {
//!     Runner::builder().progname("upcase").run(&mut Upcase)
//! }
//! ```
//!
//! `upcase a.txt b.txt` prints both files upper-cased, `upcase` with no
//! arguments (or `upcase -`) filters standard input, and
//! `upcase --output=out.txt a.txt` writes to a file instead.
//!
//! # The cascade
//!
//! Every run goes through the same stages:
//!
//! ```text
//! Start           define settings and subcommands, parse the command line,
//!                 read config files and environment
//! SettingsLoaded  set up logging
//! LoggingReady    route positional arguments to a subcommand, or treat them
//!                 as input files
//! Dispatched      flush output
//! Done
//! ```
//!
//! Any error moves the run to `Failed`: the error is reported on standard
//! error and the program exits non-zero. Each stage is a method on
//! [`Application`] with a default implementation. Override the ones you
//! need; the `default_*` functions ([`default_process_input`] and friends)
//! let an override run the default behaviour around its own.
//!
//! # Settings
//!
//! Settings are declared at run time in [`Application::add_settings`]:
//!
//! ```ignore
//! fn add_settings(&mut self, settings: &mut Settings) -> Result<(), ConfigError> {
//!     settings.add_string(&["pattern", "p"], "search for PATTERN", "")?;
//!     settings.add_boolean(&["ignore-case", "i"], "ignore case", false)?;
//!     settings.add_string_list(&["exclude"], "skip lines containing WORD", &[])?;
//!     Ok(())
//! }
//! ```
//!
//! Each setting becomes a command-line option under every alias
//! (`--pattern`, `-p`), booleans also get `--no-NAME`, and repeated list
//! options append. Settings are global: subcommands all see the same set.
//!
//! # Layer precedence
//!
//! ```text
//! Defaults              add_string(..., default)
//!        ↑ overridden by
//! Config files          [config] table, later files win
//!        ↑ overridden by
//! Environment vars      PREFIX__NAME
//!        ↑ overridden by
//! Command line          --name=value
//! ```
//!
//! Each setting remembers which layer its value came from and only accepts a
//! value from the same layer or a higher one. A value set in a config file
//! survives when the command line says nothing about that setting.
//!
//! # Config files
//!
//! TOML, with settings in a `[config]` table:
//!
//! ```toml
//! [config]
//! pattern = "error"
//! exclude = ["debug", "trace"]
//! log = "/var/log/grepper.log"
//!
//! [colors]
//! match = "red"
//! ```
//!
//! Other tables are kept for the application, see [`Settings::section`].
//! The default files are `/etc/{prog}.toml`, `/etc/{prog}/*.toml`,
//! `~/.{prog}.toml` and `*.toml` in the platform config directory, all
//! optional. `--config FILE` adds required files, `--no-default-configs`
//! drops the defaults, `--list-config-files` shows the result and
//! `--dump-config` prints the effective configuration.
//!
//! Unknown keys in `[config]` are an error (with file and line) unless the
//! runner is built with `.strict(false)`.
//!
//! # Environment variables
//!
//! `GREPPER__IGNORE_CASE=yes` sets `ignore-case` for a program named
//! `grepper`: the name after the double underscore is lowercased and its
//! underscores become dashes. The prefix can be changed with
//! [`RunnerBuilder::env_prefix`] or turned off with
//! [`RunnerBuilder::no_env`].
//!
//! # Subcommands
//!
//! ```ignore
//! fn add_subcommands(&mut self, commands: &mut Subcommands<Self>) -> Result<(), ConfigError> {
//!     commands.register("show_config", Self::cmd_show_config, Some("Print the settings."))?;
//!     Ok(())
//! }
//! ```
//!
//! Underscores in names become dashes, so this is `prog show-config`. Once
//! any subcommand is registered the first positional argument must name
//! one; the handler receives the rest.
//!
//! # Errors
//!
//! [`AppError`] separates errors worth a one-line message (bad settings,
//! unreadable input, usage mistakes, [`AppError::Application`] raised by
//! the application itself) from unexpected ones, which are reported with
//! full detail. Usage errors exit with status 2, other errors with 1. A
//! closed output pipe (`prog | head`) ends the run quietly.
//!
//! # Logging and profiling
//!
//! `--log=FILE` (or `stderr`) turns on logging through `tracing`, with
//! `--log-level`, size-based rotation (`--log-max`, `--log-keep`) and file
//! permissions (`--log-mode`). Setting `{PROG}_PROFILE=FILE` in the
//! environment writes per-stage timings to FILE as JSON.
//!
//! With debug logging on, the resident memory size is logged after each
//! input, at most once every `--memory-dump-interval` seconds.
//! `--dump-memory-profile=none` turns this off, and
//! [`Context::dump_memory_profile`] logs it on demand.

pub mod error;
pub mod input;
pub mod lines;
pub mod settings;
pub mod subcommand;
pub mod types;

mod app;
mod builder;
mod cli;
mod command;
mod env;
mod file;
mod logging;
mod manpage;
mod memory;
pub(crate) mod merge;
mod profile;
mod resolve;
mod validate;
mod value;

#[cfg(test)]
mod fixtures;

pub use app::{
    Application, Context, default_load_settings, default_open_input, default_process_args,
    default_process_input, default_process_inputs,
};
pub use builder::{Runner, RunnerBuilder, Streams};
pub use command::{CommandOutput, run_command, run_command_unchecked};
pub use error::{AppError, ConfigError};
pub use input::InputSource;
pub use logging::LogGuard;
pub use resolve::LoadInput;
pub use settings::{Setting, Settings};
pub use subcommand::Subcommands;
pub use types::{Kind, RawValue, Source, Stage, Value};
