//! COPY streaming over a `psql` subprocess
//!
//! A [`CopySession`] owns one `psql` child process. The loader writes a
//! `COPY ... FROM STDIN` statement to its stdin, then the rows in PostgreSQL
//! text format, then the `\.` terminator, and finally checks the exit status.

use std::ffi::OsString;
use std::io::{self, BufWriter, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DatabaseError, DatabaseResult};
use crate::models::{ColumnSpec, DataTable, Value};
use crate::schema::quote_qualified_name;

/// Delimiters tried, in order, when none is requested
pub const AUTO_DELIMITERS: [u8; 6] = [b'#', b'|', b'~', b'^', b';', b'\t'];

/// Marker for a null cell in text format
const NULL_MARKER: &str = "\\N";

/// Program and arguments used to start a COPY session
#[derive(Debug, Clone, PartialEq)]
pub struct CopyCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl CopyCommand {
    /// Any program that reads a COPY script on stdin
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// `psql <url> -X -q -v ON_ERROR_STOP=1`
    pub fn psql(url: &str) -> Self {
        Self::new("psql").args([url, "-X", "-q", "-v", "ON_ERROR_STOP=1"])
    }

    /// Use a different executable, keeping the arguments
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }
}

/// Outcome of one COPY
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyReport {
    pub table: String,
    /// Delimiter character used
    pub delimiter: char,
    /// Data rows written to the subprocess
    pub rows_written: usize,
    /// Row count from the server's `COPY n` tag, when psql printed one
    pub rows_reported: Option<u64>,
}

/// One `psql` subprocess with piped stdin, stdout and stderr
///
/// Stdout and stderr are drained on background threads so a chatty child
/// cannot block while rows are still being written.
pub struct CopySession {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: Option<JoinHandle<Vec<u8>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

/// What the subprocess printed once it exited successfully
#[derive(Debug, Clone, Default)]
pub struct CopyOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CopyOutput {
    /// Row count from a `COPY n` line on stdout
    pub fn rows_reported(&self) -> Option<u64> {
        self.stdout
            .lines()
            .filter_map(|line| line.trim().strip_prefix("COPY "))
            .filter_map(|n| n.trim().parse().ok())
            .last()
    }
}

impl CopySession {
    /// Start the subprocess
    pub fn open(command: &CopyCommand) -> DatabaseResult<Self> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DatabaseError::IoError(format!(
                    "Failed to start {}: {}",
                    command.program.to_string_lossy(),
                    e
                ))
            })?;

        let stdin = child.stdin.take().map(BufWriter::new);
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        debug!(program = %command.program.to_string_lossy(), "Started COPY session");

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
        })
    }

    fn writer(&mut self) -> DatabaseResult<&mut BufWriter<ChildStdin>> {
        self.stdin
            .as_mut()
            .ok_or_else(|| transfer_error(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    /// Write the COPY statement
    pub fn write_statement(&mut self, statement: &str) -> DatabaseResult<()> {
        let writer = self.writer()?;
        writer
            .write_all(statement.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(transfer_error)
    }

    /// Write every row of `table` and the `\.` terminator
    pub fn write_rows(
        &mut self,
        table: &DataTable,
        specs: &[ColumnSpec],
        delimiter: u8,
    ) -> DatabaseResult<usize> {
        let writer = self.writer()?;
        write_copy_stream(writer, table, specs, delimiter).map_err(transfer_error)
    }

    /// Close stdin, wait for the subprocess and check how it exited
    pub fn finish(mut self) -> DatabaseResult<CopyOutput> {
        let flushed = match self.stdin.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        };

        let status = self
            .child
            .wait()
            .map_err(|e| {
                DatabaseError::IoError(format!("Failed to wait for COPY process: {}", e))
            })?;
        let stdout = join(self.stdout.take());
        let stderr = join(self.stderr.take());

        if !status.success() {
            return Err(DatabaseError::BulkTransferFailed {
                status: status.code(),
                stderr,
            });
        }
        if let Err(e) = flushed {
            return Err(DatabaseError::BulkTransferFailed {
                status: status.code(),
                stderr: if stderr.is_empty() { e.to_string() } else { stderr },
            });
        }

        Ok(CopyOutput { stdout, stderr })
    }
}

impl Drop for CopySession {
    fn drop(&mut self) {
        // Reap the child when the session is abandoned without finish().
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default()
}

fn transfer_error(e: io::Error) -> DatabaseError {
    DatabaseError::BulkTransferFailed {
        status: None,
        stderr: format!("writing to COPY process failed: {}", e),
    }
}

/// `COPY "<table>" FROM STDIN DELIMITER '<d>';`
///
/// A tab delimiter is written as the escape string `E'\t'`.
pub fn copy_statement(table: &str, delimiter: u8) -> String {
    let delimiter = if delimiter == b'\t' {
        "E'\\t'".to_string()
    } else {
        format!("'{}'", delimiter as char)
    };
    format!(
        "COPY {} FROM STDIN DELIMITER {};",
        quote_qualified_name(table),
        delimiter
    )
}

/// Parse a delimiter setting: one ASCII character, or `tab` / `\t`
pub fn parse_delimiter(raw: &str) -> DatabaseResult<u8> {
    let delimiter = match raw {
        "tab" | "TAB" | "\\t" | "\t" => b'\t',
        _ => match raw.as_bytes() {
            [byte] if byte.is_ascii() => *byte,
            _ => {
                return Err(DatabaseError::InvalidDelimiter(format!(
                    "'{}' is not a single ASCII character",
                    raw.escape_debug()
                )));
            }
        },
    };
    validate_delimiter(delimiter)?;
    Ok(delimiter)
}

/// Reject characters the PostgreSQL text format cannot use as a delimiter
pub fn validate_delimiter(delimiter: u8) -> DatabaseResult<()> {
    let forbidden = !delimiter.is_ascii()
        || matches!(delimiter, b'\n' | b'\r' | b'\\' | b'\'' | b'"' | b'.')
        || delimiter.is_ascii_lowercase()
        || delimiter.is_ascii_digit();
    if forbidden {
        return Err(DatabaseError::InvalidDelimiter(format!(
            "{:?} cannot be used as a COPY delimiter",
            delimiter as char
        )));
    }
    Ok(())
}

/// Pick the delimiter for a table
///
/// An explicit delimiter must be valid and must not occur in any serialized
/// non-text cell, since only text cells have the delimiter replaced. Without
/// one, the first of [`AUTO_DELIMITERS`] that occurs in no non-text cell wins.
pub fn choose_delimiter(
    table: &DataTable,
    specs: &[ColumnSpec],
    requested: Option<u8>,
) -> DatabaseResult<u8> {
    let non_text: Vec<usize> = specs
        .iter()
        .enumerate()
        .filter(|(_, spec)| !spec.sql_type.is_text())
        .map(|(i, _)| i)
        .collect();
    let collides = |delimiter: u8| {
        table.rows().iter().any(|row| {
            non_text.iter().any(|&i| {
                row.get(i)
                    .filter(|v| !v.is_null())
                    .is_some_and(|v| serialize_value(v).as_bytes().contains(&delimiter))
            })
        })
    };

    match requested {
        Some(delimiter) => {
            validate_delimiter(delimiter)?;
            if collides(delimiter) {
                return Err(DatabaseError::InvalidDelimiter(format!(
                    "{:?} occurs in a non-text column value",
                    delimiter as char
                )));
            }
            Ok(delimiter)
        }
        None => AUTO_DELIMITERS
            .into_iter()
            .find(|&d| !collides(d))
            .ok_or_else(|| {
                DatabaseError::InvalidDelimiter(
                    "every candidate delimiter occurs in a non-text column value".to_string(),
                )
            }),
    }
}

/// Write rows in PostgreSQL text format followed by the `\.` terminator
///
/// Nulls are written as `\N`. In text-class columns the delimiter is replaced
/// by a single space; every cell has backslash, newline and carriage return
/// escaped. Returns the number of rows written.
pub fn write_copy_stream<W: Write>(
    writer: &mut W,
    table: &DataTable,
    specs: &[ColumnSpec],
    delimiter: u8,
) -> io::Result<usize> {
    let text_columns: Vec<bool> = (0..table.column_count())
        .map(|i| specs.get(i).is_none_or(|s| s.sql_type.is_text()))
        .collect();
    let delimiter_char = delimiter as char;

    let mut line = String::new();
    for row in table.rows() {
        line.clear();
        for (index, value) in row.iter().enumerate() {
            if index > 0 {
                line.push(delimiter_char);
            }
            if value.is_null() {
                line.push_str(NULL_MARKER);
                continue;
            }
            let raw = serialize_value(value);
            let raw = if text_columns[index] {
                raw.replace(delimiter_char, " ")
            } else {
                raw
            };
            escape_into(&mut line, &raw);
        }
        line.push('\n');
        writer.write_all(line.as_bytes())?;
    }
    writer.write_all(b"\\.\n")?;
    writer.flush()?;
    Ok(table.row_count())
}

/// Text form of a non-null cell before escaping
fn serialize_value(value: &Value) -> String {
    match value {
        Value::Float(f) if f.is_infinite() => {
            if *f > 0.0 {
                "Infinity".to_string()
            } else {
                "-Infinity".to_string()
            }
        }
        other => other.to_string(),
    }
}

fn escape_into(out: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}
