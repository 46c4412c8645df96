//! The overridable processing cascade.
//!
//! An application implements [`Application`] and overrides only the stages
//! it cares about. Every stage has a default that forwards to a free
//! `default_*` function, so an override can still run the default behavior
//! around its own:
//!
//! ```ignore
//! fn process_input(&mut self, ctx: &mut Context, name: &str) -> Result<(), AppError> {
//!     match default_process_input(self, ctx, name) {
//!         Err(AppError::Input { name, source }) => {
//!             tracing::warn!(%name, %source, "skipping unreadable input");
//!             Ok(())
//!         }
//!         other => other,
//!     }
//! }
//! ```
//!
//! The stages run in this order, each calling the next by default:
//!
//! ```text
//! process_args        subcommand dispatch, or ...
//!   process_inputs    one call per input name (stdin when there are none)
//!     open_input
//!     process_input   opens, iterates lines, closes
//!       process_input_line
//! ```

use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use crate::error::{AppError, ConfigError};
use crate::input::{self, InputSource, STDIN_NAME};
use crate::lines::{LineCursor, LineReader};
use crate::logging::{self, LogGuard};
use crate::memory::{MemoryDumps, MemoryMethod};
use crate::resolve::{self, LoadInput};
use crate::settings::Settings;
use crate::subcommand::Subcommands;

/// State shared by every stage of one run.
///
/// Owns the loaded settings, the output stream and the standard input
/// handle, and tracks where line processing currently is.
pub struct Context {
    settings: Settings,
    output: Box<dyn Write>,
    stdin: Option<Box<dyn BufRead>>,
    cursor: LineCursor,
    memory: MemoryDumps,
    progname: String,
    version: String,
}

impl Context {
    pub fn new(
        settings: Settings,
        output: Box<dyn Write>,
        stdin: Box<dyn BufRead>,
        progname: &str,
        version: &str,
    ) -> Self {
        Self {
            settings,
            output,
            stdin: Some(stdin),
            cursor: LineCursor::default(),
            memory: MemoryDumps::default(),
            progname: progname.to_string(),
            version: version.to_string(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Where results go: standard output, or the file named by `--output`.
    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    /// Take the standard input stream. Only the first call gets it; later
    /// calls get an empty reader.
    pub fn take_stdin(&mut self) -> Box<dyn BufRead> {
        self.stdin
            .take()
            .unwrap_or_else(|| Box::new(io::empty()) as Box<dyn BufRead>)
    }

    pub fn progname(&self) -> &str {
        &self.progname
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Name of the input currently being read (`-` for standard input).
    pub fn filename(&self) -> &str {
        &self.cursor.name
    }

    /// 1-based index of the current input among all inputs.
    pub fn fileno(&self) -> usize {
        self.cursor.fileno
    }

    /// Line number within the current input.
    pub fn lineno(&self) -> usize {
        self.cursor.lineno
    }

    /// Line number counted across all inputs so far.
    pub fn global_lineno(&self) -> usize {
        self.cursor.global_lineno
    }

    fn memory_method(&self) -> MemoryMethod {
        let name = self.settings.string("dump-memory-profile").unwrap_or("none");
        MemoryMethod::from_setting(name)
    }

    /// Log current memory use at debug level, using the method named by
    /// `dump-memory-profile`. `msg` says where in the program the dump was
    /// taken.
    pub fn dump_memory_profile(&mut self, msg: &str) {
        let method = self.memory_method();
        self.memory.dump(method, msg, Instant::now());
    }

    /// [`dump_memory_profile`](Self::dump_memory_profile), unless the last
    /// dump was less than `memory-dump-interval` seconds ago.
    pub fn dump_memory_profile_if_due(&mut self, msg: &str) {
        let method = self.memory_method();
        let seconds = self.settings.integer("memory-dump-interval").unwrap_or(0);
        let interval = Duration::from_secs(u64::try_from(seconds).unwrap_or(0));
        self.memory.dump_if_due(method, interval, msg, Instant::now());
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}

/// A command-line filter program.
///
/// All methods have defaults; a plain line filter needs only
/// [`add_settings`](Self::add_settings) and
/// [`process_input_line`](Self::process_input_line).
pub trait Application: Sized {
    /// Define the application's own settings on top of the framework ones.
    fn add_settings(&mut self, settings: &mut Settings) -> Result<(), ConfigError> {
        let _ = settings;
        Ok(())
    }

    /// Register subcommands. With none registered, positional arguments are
    /// input names.
    fn add_subcommands(&mut self, commands: &mut Subcommands<Self>) -> Result<(), ConfigError> {
        let _ = commands;
        Ok(())
    }

    /// Fill the registry from config files, environment and command line.
    fn load_settings(&mut self, settings: &mut Settings, input: LoadInput) -> Result<(), AppError> {
        default_load_settings(settings, input)
    }

    /// Install the log destination described by the logging settings.
    fn setup_logging(&mut self, settings: &Settings) -> Result<LogGuard, AppError> {
        logging::setup(settings)
    }

    fn process_args(
        &mut self,
        ctx: &mut Context,
        commands: &Subcommands<Self>,
        args: &[String],
    ) -> Result<(), AppError> {
        default_process_args(self, ctx, commands, args)
    }

    fn process_inputs(&mut self, ctx: &mut Context, args: &[String]) -> Result<(), AppError> {
        default_process_inputs(self, ctx, args)
    }

    fn open_input(&mut self, ctx: &mut Context, name: &str) -> Result<InputSource, AppError> {
        default_open_input(ctx, name)
    }

    fn process_input(&mut self, ctx: &mut Context, name: &str) -> Result<(), AppError> {
        default_process_input(self, ctx, name)
    }

    /// Called once per line, without the line terminator. `lineno` counts
    /// from 1 within `source`. Bytes that are not valid UTF-8 arrive as
    /// U+FFFD.
    fn process_input_line(
        &mut self,
        ctx: &mut Context,
        source: &str,
        line: &str,
        lineno: usize,
    ) -> Result<(), AppError> {
        let _ = (ctx, source, line, lineno);
        Ok(())
    }
}

pub fn default_load_settings(settings: &mut Settings, input: LoadInput) -> Result<(), AppError> {
    resolve::load(settings, input)?;
    Ok(())
}

/// Route to a subcommand when any are registered, otherwise treat `args` as
/// input names.
pub fn default_process_args<A: Application>(
    app: &mut A,
    ctx: &mut Context,
    commands: &Subcommands<A>,
    args: &[String],
) -> Result<(), AppError> {
    if !commands.is_empty() {
        return commands.dispatch(app, ctx, args);
    }
    app.process_inputs(ctx, args)
}

pub fn default_process_inputs<A: Application>(
    app: &mut A,
    ctx: &mut Context,
    args: &[String],
) -> Result<(), AppError> {
    for name in input::resolve(args) {
        app.process_input(ctx, &name)?;
    }
    Ok(())
}

pub fn default_open_input(ctx: &mut Context, name: &str) -> Result<InputSource, AppError> {
    if name == STDIN_NAME {
        return Ok(InputSource::new(name, ctx.take_stdin()));
    }
    input::open_file(name)
}

/// Open `name`, feed each of its lines to
/// [`process_input_line`](Application::process_input_line) and close it.
pub fn default_process_input<A: Application>(
    app: &mut A,
    ctx: &mut Context,
    name: &str,
) -> Result<(), AppError> {
    let source = app.open_input(ctx, name)?;
    let name = source.name().to_string();
    tracing::debug!(source = %name, "processing input");
    ctx.cursor.start(&name);

    for item in LineReader::new(source.into_reader()) {
        let (lineno, line) = item.map_err(|source| AppError::Input {
            name: name.clone(),
            source,
        })?;
        ctx.cursor.advance(lineno);
        app.process_input_line(ctx, &name, &line, lineno)?;
    }
    ctx.dump_memory_profile_if_due(&format!("after reading {name}"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{Recorder, SharedBuffer, test_context, test_context_with};
    use std::fs;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;

    fn write_inputs(dir: &TempDir) -> (String, String) {
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "hello\nworld\n").unwrap();
        fs::write(&b, "hi\n").unwrap();
        (
            a.to_str().unwrap().to_string(),
            b.to_str().unwrap().to_string(),
        )
    }

    /// Counts lines containing `h`.
    #[derive(Default)]
    struct Counter {
        hits: Vec<(String, usize)>,
    }

    impl Application for Counter {
        fn process_input_line(
            &mut self,
            _ctx: &mut Context,
            source: &str,
            line: &str,
            lineno: usize,
        ) -> Result<(), AppError> {
            if line.contains('h') {
                self.hits.push((source.to_string(), lineno));
            }
            Ok(())
        }
    }

    #[test]
    fn lines_counted_per_file() {
        let dir = TempDir::new().unwrap();
        let (a, b) = write_inputs(&dir);
        let mut app = Counter::default();
        let mut ctx = test_context();

        app.process_inputs(&mut ctx, &[a.clone(), b.clone()]).unwrap();

        assert_eq!(app.hits, vec![(a, 1), (b, 1)]);
    }

    #[test]
    fn every_line_seen_in_order() {
        let dir = TempDir::new().unwrap();
        let (a, b) = write_inputs(&dir);
        let mut app = Recorder::default();
        let mut ctx = test_context();

        app.process_inputs(&mut ctx, &[a.clone(), b.clone()]).unwrap();

        assert_eq!(
            app.lines,
            vec![
                (a.clone(), "hello".to_string(), 1),
                (a, "world".to_string(), 2),
                (b, "hi".to_string(), 1),
            ]
        );
    }

    #[test]
    fn cursor_counts_across_inputs() {
        let dir = TempDir::new().unwrap();
        let (a, b) = write_inputs(&dir);
        let mut app = Recorder::default();
        let mut ctx = test_context();

        app.process_inputs(&mut ctx, &[a, b.clone()]).unwrap();

        assert_eq!(ctx.filename(), b);
        assert_eq!(ctx.fileno(), 2);
        assert_eq!(ctx.lineno(), 1);
        assert_eq!(ctx.global_lineno(), 3);
    }

    #[test]
    fn no_args_reads_stdin() {
        let stdin = Box::new(Cursor::new(b"one\ntwo\n".to_vec()));
        let mut ctx = test_context_with(Box::new(io::sink()), stdin);
        let mut app = Recorder::default();

        app.process_inputs(&mut ctx, &[]).unwrap();

        let names: Vec<&str> = app.lines.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["-", "-"]);
        assert_eq!(app.lines[1].1, "two");
    }

    #[test]
    fn missing_input_stops_the_run() {
        let dir = TempDir::new().unwrap();
        let (a, _) = write_inputs(&dir);
        let missing = dir.path().join("missing.txt").to_str().unwrap().to_string();
        let mut app = Recorder::default();
        let mut ctx = test_context();

        let err = app
            .process_inputs(&mut ctx, &[missing.clone(), a])
            .unwrap_err();

        assert!(matches!(err, AppError::Input { name, .. } if name == missing));
        assert!(app.lines.is_empty());
    }

    /// Skips inputs that cannot be opened, delegating everything else.
    #[derive(Default)]
    struct Skipper {
        seen: Vec<String>,
    }

    impl Application for Skipper {
        fn process_input(&mut self, ctx: &mut Context, name: &str) -> Result<(), AppError> {
            match default_process_input(self, ctx, name) {
                Err(AppError::Input { .. }) => Ok(()),
                other => other,
            }
        }

        fn process_input_line(
            &mut self,
            _ctx: &mut Context,
            _source: &str,
            line: &str,
            _lineno: usize,
        ) -> Result<(), AppError> {
            self.seen.push(line.to_string());
            Ok(())
        }
    }

    #[test]
    fn overridden_open_step_can_skip() {
        let dir = TempDir::new().unwrap();
        let (a, b) = write_inputs(&dir);
        let missing = dir.path().join("missing.txt").to_str().unwrap().to_string();
        let mut app = Skipper::default();
        let mut ctx = test_context();

        app.process_inputs(&mut ctx, &[a, missing, b]).unwrap();

        assert_eq!(app.seen, vec!["hello", "world", "hi"]);
    }

    #[test]
    fn line_error_aborts_remaining_lines() {
        struct StopAtWorld(usize);
        impl Application for StopAtWorld {
            fn process_input_line(
                &mut self,
                _ctx: &mut Context,
                _source: &str,
                line: &str,
                _lineno: usize,
            ) -> Result<(), AppError> {
                self.0 += 1;
                if line == "world" {
                    return Err(AppError::application("stop"));
                }
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let (a, b) = write_inputs(&dir);
        let mut app = StopAtWorld(0);
        let mut ctx = test_context();

        let err = app.process_inputs(&mut ctx, &[a, b]).unwrap_err();
        assert!(matches!(err, AppError::Application(_)));
        assert_eq!(app.0, 2);
    }

    #[test]
    fn args_go_to_inputs_without_subcommands() {
        let dir = TempDir::new().unwrap();
        let (a, _) = write_inputs(&dir);
        let mut app = Recorder::default();
        let mut ctx = test_context();
        let commands = Subcommands::new();

        app.process_args(&mut ctx, &commands, &[a]).unwrap();

        assert_eq!(app.lines.len(), 2);
        assert!(app.commands.is_empty());
    }

    #[test]
    fn args_go_to_subcommand_when_registered() {
        let mut app = Recorder::default();
        let mut ctx = test_context();
        let mut commands = Subcommands::new();
        commands
            .register("record", Recorder::cmd_record, None)
            .unwrap();

        let args = vec!["record".to_string(), "x".to_string()];
        app.process_args(&mut ctx, &commands, &args).unwrap();

        assert_eq!(app.commands, vec![vec!["x".to_string()]]);
        assert!(app.lines.is_empty());
    }

    #[test]
    fn output_goes_to_context_writer() {
        let buffer = SharedBuffer::default();
        let mut ctx = test_context_with(Box::new(buffer.clone()), Box::new(io::empty()));
        writeln!(ctx.output(), "result").unwrap();
        ctx.flush().unwrap();
        assert_eq!(buffer.contents(), "result\n");
    }

    #[test]
    fn inputs_opened_only_when_reached() {
        let dir = TempDir::new().unwrap();
        let (a, _) = write_inputs(&dir);
        let missing = dir.path().join("missing.txt").to_str().unwrap().to_string();
        let mut app = Recorder::default();
        let mut ctx = test_context();

        let err = app
            .process_inputs(&mut ctx, &[a.clone(), missing.clone()])
            .unwrap_err();

        assert!(matches!(err, AppError::Input { name, .. } if name == missing));
        let names: Vec<&str> = app.lines.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec![a.as_str(), a.as_str()]);
    }

    #[test]
    fn dash_twice_reads_stdin_once() {
        let stdin = Box::new(Cursor::new(b"only\n".to_vec()));
        let mut ctx = test_context_with(Box::new(io::sink()), stdin);
        let mut app = Recorder::default();

        app.process_inputs(&mut ctx, &["-".to_string(), "-".to_string()]).unwrap();

        assert_eq!(app.lines, vec![("-".to_string(), "only".to_string(), 1)]);
        assert_eq!(ctx.fileno(), 2);
    }

    #[test]
    fn stdin_taken_once() {
        let stdin = Box::new(Cursor::new(b"x".to_vec()));
        let mut ctx = test_context_with(Box::new(io::sink()), stdin);
        let mut first = String::new();
        ctx.take_stdin().read_to_string(&mut first).unwrap();
        let mut second = String::new();
        ctx.take_stdin().read_to_string(&mut second).unwrap();
        assert_eq!(first, "x");
        assert_eq!(second, "");
    }
}
