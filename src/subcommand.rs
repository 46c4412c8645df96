//! Subcommand registration and routing.
//!
//! Subcommands are registered explicitly during setup, usually from
//! [`Application::add_subcommands`](crate::Application::add_subcommands).
//! Names are normalized by turning underscores into dashes, so a handler
//! registered as `show_config` is invoked as `prog show-config`.

use std::collections::BTreeMap;

use crate::app::Context;
use crate::error::{AppError, ConfigError};

/// A subcommand handler: receives the application, the run context and the
/// positional arguments that follow the subcommand name.
pub type Handler<A> = Box<dyn Fn(&mut A, &mut Context, &[String]) -> Result<(), AppError>>;

/// One registered subcommand.
pub struct Subcommand<A> {
    handler: Handler<A>,
    description: Option<String>,
    synopsis: Option<String>,
}

impl<A> Subcommand<A> {
    /// First non-blank line of the description.
    pub fn summary(&self) -> Option<&str> {
        self.description
            .as_deref()?
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Argument synopsis shown in usage, e.g. `FILE...`.
    pub fn synopsis(&self) -> Option<&str> {
        self.synopsis.as_deref()
    }

    pub fn set_synopsis(&mut self, synopsis: &str) -> &mut Self {
        self.synopsis = Some(synopsis.to_string());
        self
    }
}

/// Display data about a subcommand, independent of the application type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubcommandInfo {
    pub name: String,
    pub synopsis: Option<String>,
    /// First non-blank line of the description.
    pub summary: Option<String>,
}

/// The subcommand table, sorted by name.
pub struct Subcommands<A> {
    table: BTreeMap<String, Subcommand<A>>,
}

impl<A> Default for Subcommands<A> {
    fn default() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }
}

impl<A> Subcommands<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a handler name into its command-line form.
    pub fn normalize(name: &str) -> String {
        name.replace('_', "-")
    }

    /// Register `handler` under the normalized form of `name`.
    ///
    /// Fails without touching the table if the normalized name is taken.
    pub fn register<F>(
        &mut self,
        name: &str,
        handler: F,
        description: Option<&str>,
    ) -> Result<&mut Subcommand<A>, ConfigError>
    where
        F: Fn(&mut A, &mut Context, &[String]) -> Result<(), AppError> + 'static,
    {
        let name = Self::normalize(name);
        if name.is_empty() || name.starts_with('-') {
            return Err(ConfigError::InvalidValue {
                name,
                reason: "subcommand names must be non-empty and not start with '-'".into(),
            });
        }
        if self.table.contains_key(&name) {
            return Err(ConfigError::DuplicateSubcommand(name));
        }
        let entry = self.table.entry(name).or_insert(Subcommand {
            handler: Box::new(handler),
            description: description.map(str::to_string),
            synopsis: None,
        });
        Ok(entry)
    }

    pub fn get(&self, name: &str) -> Option<&Subcommand<A>> {
        self.table.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.table.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn infos(&self) -> Vec<SubcommandInfo> {
        self.table
            .iter()
            .map(|(name, cmd)| SubcommandInfo {
                name: name.clone(),
                synopsis: cmd.synopsis.clone(),
                summary: cmd.summary().map(str::to_string),
            })
            .collect()
    }

    /// Run the subcommand named by `args[0]` with the remaining arguments.
    pub fn dispatch(
        &self,
        app: &mut A,
        ctx: &mut Context,
        args: &[String],
    ) -> Result<(), AppError> {
        let Some((name, rest)) = args.split_first() else {
            return Err(AppError::Usage(format!(
                "must give subcommand (available: {})",
                self.names().join(", ")
            )));
        };
        let Some(cmd) = self.table.get(name) else {
            return Err(AppError::Usage(format!(
                "unknown subcommand {name} (available: {})",
                self.names().join(", ")
            )));
        };
        tracing::debug!(subcommand = %name, args = rest.len(), "dispatching subcommand");
        (cmd.handler)(app, ctx, rest)
    }
}
