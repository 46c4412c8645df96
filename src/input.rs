//! Input sources: named files or standard input.
//!
//! An empty argument list means standard input, as does the name `-`.
//! Sources are opened one at a time, when processing reaches them, and each
//! is dropped (closed) before the next is opened.

use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::error::AppError;

/// Name used for standard input.
pub const STDIN_NAME: &str = "-";

/// A named, open input stream.
pub struct InputSource {
    name: String,
    reader: Box<dyn BufRead>,
}

impl InputSource {
    pub fn new(name: impl Into<String>, reader: Box<dyn BufRead>) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_reader(self) -> Box<dyn BufRead> {
        self.reader
    }
}

impl std::fmt::Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The source names to process for `args`, in order.
pub fn resolve(args: &[String]) -> Vec<String> {
    if args.is_empty() {
        vec![STDIN_NAME.to_string()]
    } else {
        args.to_vec()
    }
}

/// Open a file for reading, wrapping failures as [`AppError::Input`].
///
/// `-` is not special here; callers handle standard input themselves.
pub fn open_file(name: &str) -> Result<InputSource, AppError> {
    let file = File::open(name).map_err(|source| AppError::Input {
        name: name.to_string(),
        source,
    })?;
    Ok(InputSource::new(name, Box::new(BufReader::new(file))))
}
