use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use crate::app::{Application, Context};
use crate::cli::{self, CommandSpec, Invocation, MetaAction, Parsed};
use crate::env::env_name;
use crate::error::{AppError, ConfigError};
use crate::file;
use crate::manpage;
use crate::profile::Profiler;
use crate::resolve::LoadInput;
use crate::settings::Settings;
use crate::subcommand::Subcommands;
use crate::types::Stage;

/// Entry point for running a filter program.
pub struct Runner;

impl Runner {
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }
}

/// The streams a run reads from and writes to.
pub struct Streams {
    pub stdin: Box<dyn BufRead>,
    pub stdout: Box<dyn Write>,
    pub stderr: Box<dyn Write>,
}

impl Streams {
    /// The process's standard streams. Standard output is buffered and
    /// flushed when the run ends.
    pub fn std() -> Self {
        Self {
            stdin: Box::new(io::stdin().lock()),
            stdout: Box::new(BufWriter::new(io::stdout())),
            stderr: Box::new(io::stderr()),
        }
    }
}

/// Builder for a program run.
///
/// Everything here is program metadata or config-file discovery; the
/// behaviour lives in the [`Application`] passed to [`run`](Self::run).
///
/// ```ignore
/// fn main() -> ExitCode {
///     Runner::builder()
///         .progname("grepper")
///         .version(env!("CARGO_PKG_VERSION"))
///         .description("Print lines matching a pattern.")
///         .run(&mut Grepper::default())
/// }
/// ```
pub struct RunnerBuilder {
    progname: Option<String>,
    version: String,
    description: Option<String>,
    epilog: Option<String>,
    arg_synopsis: Option<String>,
    config_files: Option<Vec<PathBuf>>,
    extra_config_files: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_enabled: bool,
    strict: bool,
    vars: Option<Vec<(String, String)>>,
}

impl RunnerBuilder {
    fn new() -> Self {
        Self {
            progname: None,
            version: "0.0.0".to_string(),
            description: None,
            epilog: None,
            arg_synopsis: None,
            config_files: None,
            extra_config_files: Vec::new(),
            env_prefix: None,
            env_enabled: true,
            strict: true,
            vars: None,
        }
    }

    /// Set the program name. Defaults to the basename of `argv[0]`. The
    /// name derives the default config files and the environment prefix.
    pub fn progname(mut self, name: &str) -> Self {
        self.progname = Some(name.to_string());
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Text shown at the top of `--help`.
    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// Text shown at the end of `--help`.
    pub fn epilog(mut self, text: &str) -> Self {
        self.epilog = Some(text.to_string());
        self
    }

    /// What follows the options in usage (default: `[FILE]...`).
    pub fn arg_synopsis(mut self, synopsis: &str) -> Self {
        self.arg_synopsis = Some(synopsis.to_string());
        self
    }

    /// Replace the default config file list entirely.
    ///
    /// Files are listed in **priority-ascending** order: the last entry has
    /// the highest priority.
    pub fn config_files(mut self, files: Vec<PathBuf>) -> Self {
        self.config_files = Some(files);
        self
    }

    /// Append a config file to the default list.
    pub fn add_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_config_files.push(path.into());
        self
    }

    /// Override the environment variable prefix (default: derived from the
    /// program name, e.g. `GREPPER`).
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Disable environment variable loading entirely.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    /// Enable or disable strict mode (default: `true`).
    /// In strict mode, unknown keys in config files produce errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Use `vars` instead of the process environment.
    pub fn vars(mut self, vars: Vec<(String, String)>) -> Self {
        self.vars = Some(vars);
        self
    }

    fn effective_progname(&self, argv: &[String]) -> String {
        if let Some(name) = &self.progname {
            return name.clone();
        }
        argv.first()
            .and_then(|arg0| std::path::Path::new(arg0).file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "program".to_string())
    }

    fn effective_env_prefix(&self, progname: &str) -> Option<String> {
        if !self.env_enabled {
            return None;
        }
        Some(
            self.env_prefix
                .clone()
                .unwrap_or_else(|| env_name(progname)),
        )
    }

    fn effective_vars(&self) -> Vec<(String, String)> {
        match &self.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars_os()
                .map(|(k, v)| {
                    (
                        k.to_string_lossy().into_owned(),
                        v.to_string_lossy().into_owned(),
                    )
                })
                .collect(),
        }
    }

    /// Default files (unless `--no-default-configs`) followed by every
    /// `--config` file.
    fn effective_config_files(&self, progname: &str, invocation: &Invocation) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if !invocation.no_default_configs {
            match &self.config_files {
                Some(list) => files.extend(list.iter().cloned()),
                None => files.extend(file::default_config_files(progname)),
            }
            files.extend(self.extra_config_files.iter().cloned());
        }
        files.extend(invocation.config_files.iter().cloned());
        files
    }

    fn command_spec<A>(&self, progname: &str, commands: &Subcommands<A>) -> CommandSpec {
        let mut spec = CommandSpec::new(progname);
        spec.version = self.version.clone();
        spec.description = self.description.clone();
        spec.epilog = self.epilog.clone();
        if let Some(syn) = &self.arg_synopsis {
            spec.arg_synopsis = syn.clone();
        }
        spec.subcommands = commands.infos();
        spec
    }

    /// Run `app` with the process arguments and standard streams.
    pub fn run<A: Application>(&self, app: &mut A) -> ExitCode {
        let argv: Vec<String> = std::env::args_os()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let code = self.run_with(app, &argv, Streams::std());
        ExitCode::from(u8::try_from(code).unwrap_or(1))
    }

    /// Run `app` with explicit arguments (`argv[0]` is the program path)
    /// and streams. Returns the exit status.
    pub fn run_with<A: Application>(&self, app: &mut A, argv: &[String], streams: Streams) -> i32 {
        let Streams {
            stdin,
            stdout,
            mut stderr,
        } = streams;
        let progname = self.effective_progname(argv);
        let vars = self.effective_vars();
        let mut tracker = Tracker::new(Profiler::from_vars(&progname, &vars));

        let result = self.cascade(app, argv, &progname, vars, stdin, stdout, &mut tracker);
        let code = match &result {
            Ok(()) => {
                tracker.enter(Stage::Done);
                0
            }
            Err(e) => {
                tracker.enter(Stage::Failed);
                report(stderr.as_mut(), &progname, e);
                e.exit_code()
            }
        };
        let _ = stderr.flush();
        code
    }

    #[allow(clippy::too_many_arguments)]
    fn cascade<A: Application>(
        &self,
        app: &mut A,
        argv: &[String],
        progname: &str,
        vars: Vec<(String, String)>,
        stdin: Box<dyn BufRead>,
        mut stdout: Box<dyn Write>,
        tracker: &mut Tracker,
    ) -> Result<(), AppError> {
        let mut settings = Settings::with_defaults()?;
        app.add_settings(&mut settings)?;
        let mut commands = Subcommands::new();
        app.add_subcommands(&mut commands)?;
        let spec = self.command_spec(progname, &commands);

        let invocation = match cli::parse(&spec, &settings, argv)? {
            Parsed::Run(invocation) => invocation,
            Parsed::Exit(text) => {
                write_text(stdout.as_mut(), &text)?;
                return Ok(());
            }
        };
        let files = self.effective_config_files(progname, &invocation);

        match &invocation.action {
            Some(MetaAction::GenerateManpage(path)) => {
                let template =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
                        path: path.clone(),
                        source,
                    })?;
                let page = manpage::fill_template(&template, &spec, &settings);
                return write_text(stdout.as_mut(), &page);
            }
            Some(MetaAction::ListConfigFiles) => {
                let listing: String = files
                    .iter()
                    .map(|f| format!("{}\n", f.display()))
                    .collect();
                return write_text(stdout.as_mut(), &listing);
            }
            _ => {}
        }

        let input = LoadInput {
            files: file::load_config_files(&files, &invocation.config_files)?,
            env_vars: vars,
            env_prefix: self.effective_env_prefix(progname),
            cli_values: invocation.values.clone(),
            strict: self.strict,
        };
        app.load_settings(&mut settings, input)?;
        tracker.enter(Stage::SettingsLoaded);

        match &invocation.action {
            Some(MetaAction::DumpConfig) => return write_text(stdout.as_mut(), &settings.dump()?),
            Some(MetaAction::DumpSettingNames) => {
                let names: String = settings.keys().iter().map(|k| format!("{k}\n")).collect();
                return write_text(stdout.as_mut(), &names);
            }
            _ => {}
        }

        let _log = app.setup_logging(&settings)?;
        tracker.enter(Stage::LoggingReady);
        tracing::info!("{progname} version {} starts", self.version);

        let result = self.dispatch(
            app,
            settings,
            &commands,
            &invocation.positionals,
            stdin,
            stdout,
            progname,
        );
        tracker.enter(Stage::Dispatched);

        match &result {
            Ok(()) => tracing::info!("{progname} version {} ends normally", self.version),
            Err(e) if e.is_broken_pipe() => tracing::debug!("output closed early"),
            Err(e) => tracing::error!("{e}"),
        }
        result
    }

    /// Set up the output and the run context, then hand the positional
    /// arguments to the application.
    #[allow(clippy::too_many_arguments)]
    fn dispatch<A: Application>(
        &self,
        app: &mut A,
        settings: Settings,
        commands: &Subcommands<A>,
        positionals: &[String],
        stdin: Box<dyn BufRead>,
        stdout: Box<dyn Write>,
        progname: &str,
    ) -> Result<(), AppError> {
        let output: Box<dyn Write> = match settings.string("output")? {
            "" => stdout,
            path => {
                let file = File::create(path).map_err(|e| {
                    AppError::application(format!("Cannot write output to {path}: {e}"))
                })?;
                Box::new(BufWriter::new(file))
            }
        };
        let mut ctx = Context::new(settings, output, stdin, progname, &self.version);
        app.process_args(&mut ctx, commands, positionals)?;
        ctx.flush()?;
        Ok(())
    }
}

fn write_text(out: &mut dyn Write, text: &str) -> Result<(), AppError> {
    out.write_all(text.as_bytes())?;
    if !text.is_empty() && !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Print `err` the way its kind asks for: nothing for a closed pipe, one
/// line for user-facing errors, full detail otherwise.
fn report(stderr: &mut dyn Write, progname: &str, err: &AppError) {
    if err.is_broken_pipe() {
        return;
    }
    if err.is_user_facing() {
        let _ = writeln!(stderr, "ERROR: {err}");
        return;
    }
    let _ = writeln!(stderr, "{progname}: unexpected error: {err:?}");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  caused by: {cause}");
        source = cause.source();
    }
}

/// Follows the run through its stages, timing each one.
struct Tracker {
    stage: Stage,
    mark: Instant,
    profiler: Profiler,
}

impl Tracker {
    fn new(profiler: Profiler) -> Self {
        if profiler.is_enabled() {
            tracing::debug!("stage profiling enabled");
        }
        Self {
            stage: Stage::Start,
            mark: Instant::now(),
            profiler,
        }
    }

    fn enter(&mut self, next: Stage) {
        tracing::debug!(from = %self.stage, to = %next, "stage transition");
        self.profiler.record(next, self.mark.elapsed());
        self.profiler.finish(next);
        self.stage = next;
        self.mark = Instant::now();
    }
}
