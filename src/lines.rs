//! Line iteration with per-source and global counters.

use std::io::{self, BufRead};

/// Numbered lines of one stream.
///
/// Yields `(line_number, line)` with 1-based numbers and the line terminator
/// (`\n` or `\r\n`) removed. Bytes that are not valid UTF-8 are replaced
/// with U+FFFD rather than ending the stream. The iterator is forward-only;
/// once the stream is exhausted it keeps returning `None`.
pub struct LineReader<R> {
    reader: R,
    lineno: usize,
    done: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            lineno: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = io::Result<(usize, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut bytes = Vec::new();
        match self.reader.read_until(b'\n', &mut bytes) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                if bytes.ends_with(b"\n") {
                    bytes.pop();
                    if bytes.ends_with(b"\r") {
                        bytes.pop();
                    }
                }
                self.lineno += 1;
                let line = match String::from_utf8(bytes) {
                    Ok(line) => line,
                    Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
                };
                Some(Ok((self.lineno, line)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Where processing currently is.
///
/// `fileno` counts sources from 1, `lineno` counts lines within the current
/// source and `global_lineno` counts lines as if all sources were one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineCursor {
    pub name: String,
    pub fileno: usize,
    pub lineno: usize,
    pub global_lineno: usize,
}

impl LineCursor {
    /// Reset the per-source counter for a new source.
    pub fn start(&mut self, name: &str) {
        self.name = name.to_string();
        self.fileno += 1;
        self.lineno = 0;
    }

    pub fn advance(&mut self, lineno: usize) {
        self.lineno = lineno;
        self.global_lineno += 1;
    }
}
