//! Stage timing, enabled by the `{PROGNAME}_PROFILE` environment variable.
//!
//! When the variable names a file, the runner records how long each stage
//! of the cascade took and writes the timings there as JSON when the
//! profiler is dropped, which happens on every exit path.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::env::env_name;
use crate::types::Stage;

/// Name of the variable that enables profiling for `progname`.
pub fn profile_var(progname: &str) -> String {
    format!("{}_PROFILE", env_name(progname))
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub millis: f64,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    program: &'a str,
    outcome: String,
    total_millis: f64,
    stages: &'a [StageTiming],
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_micros() as f64 / 1000.0
}

pub struct Profiler {
    path: Option<PathBuf>,
    program: String,
    started: Instant,
    outcome: Stage,
    stages: Vec<StageTiming>,
}

impl Profiler {
    /// A profiler that writes to the file named by `{PROGNAME}_PROFILE` in
    /// `vars`, or does nothing if the variable is unset or empty.
    pub fn from_vars(progname: &str, vars: &[(String, String)]) -> Self {
        let var = profile_var(progname);
        let path = vars
            .iter()
            .find(|(key, value)| *key == var && !value.is_empty())
            .map(|(_, value)| PathBuf::from(value));
        Self {
            path,
            program: progname.to_string(),
            started: Instant::now(),
            outcome: Stage::Start,
            stages: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.stages.push(StageTiming {
            stage: stage.to_string(),
            millis: millis(elapsed),
        });
    }

    /// The state the run ended in.
    pub fn finish(&mut self, outcome: Stage) {
        self.outcome = outcome;
    }

    fn write(&self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let report = Report {
            program: &self.program,
            outcome: self.outcome.to_string(),
            total_millis: millis(self.started.elapsed()),
            stages: &self.stages,
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Drop for Profiler {
    fn drop(&mut self) {
        // Logging has been torn down by the time the runner drops us.
        if let Err(e) = self.write()
            && let Some(path) = &self.path
        {
            eprintln!(
                "{}: cannot write profile {}: {e}",
                self.program,
                path.display()
            );
        }
    }
}
