//! In-memory file buffers for `OPENFILE`, `READFILE`, `WRITEFILE`, `CLOSEFILE`
//! and `EOF`
//!
//! Files are line buffers keyed by name. Content for `FOR READ` comes from the
//! host (or from an earlier write in the same run); lines written `FOR WRITE`
//! or `FOR APPEND` stay in the buffer for the host to persist after the run.

use crate::interpreter::engine::{Flow, Interpreter};
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::host::Effects;
use crate::interpreter::statements::convert_input;
use crate::memory::value::Value;
use crate::parser::ast::{Expr, FileMode};
use crate::snapshot::{OutputKind, OutputLine};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// File-level failures; the interpreter attaches the line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("file '{0}' not found")]
    NotFound(String),

    #[error("file '{0}' is already open")]
    AlreadyOpen(String),

    #[error("file '{0}' is not open")]
    NotOpen(String),

    #[error("file '{name}' is open for {actual}, not {expected}")]
    WrongMode {
        name: String,
        expected: FileMode,
        actual: FileMode,
    },

    #[error("no more lines to read in '{0}'")]
    PastEnd(String),
}

/// One named file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileBuffer {
    pub lines: Vec<String>,
    /// `None` while closed
    pub mode: Option<FileMode>,
    /// Next line index for READFILE
    pub cursor: usize,
    /// Whether the file was ever opened for WRITE or APPEND
    pub modified: bool,
}

impl FileBuffer {
    pub fn contents(&self) -> String {
        let mut text = self.lines.join("\n");
        if !self.lines.is_empty() {
            text.push('\n');
        }
        text
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileSystem {
    files: FxHashMap<String, FileBuffer>,
}

impl FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FileBuffer> {
        self.files.get(name)
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.files.get(name).is_some_and(|f| f.mode.is_some())
    }

    /// Files opened for WRITE or APPEND during the run, sorted by name
    pub fn modified(&self) -> Vec<(&str, &FileBuffer)> {
        let mut out: Vec<(&str, &FileBuffer)> = self
            .files
            .iter()
            .filter(|(_, f)| f.modified)
            .map(|(name, f)| (name.as_str(), f))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Open `name`. `content` is what the host supplied for a READ.
    pub fn open(&mut self, name: &str, mode: FileMode, content: Option<String>) -> Result<(), FileError> {
        if self.is_open(name) {
            return Err(FileError::AlreadyOpen(name.to_string()));
        }

        match mode {
            FileMode::Read => {
                let lines = match content {
                    Some(text) => text.lines().map(str::to_string).collect(),
                    None => match self.files.get(name) {
                        Some(existing) => existing.lines.clone(),
                        None => return Err(FileError::NotFound(name.to_string())),
                    },
                };
                let buffer = self.files.entry(name.to_string()).or_default();
                buffer.lines = lines;
                buffer.cursor = 0;
                buffer.mode = Some(FileMode::Read);
            }
            FileMode::Write | FileMode::Append => {
                let buffer = self.files.entry(name.to_string()).or_default();
                if mode == FileMode::Write {
                    buffer.lines.clear();
                }
                buffer.cursor = 0;
                buffer.mode = Some(mode);
                buffer.modified = true;
            }
        }
        Ok(())
    }

    pub fn close(&mut self, name: &str) -> Result<(), FileError> {
        match self.files.get_mut(name) {
            Some(buffer) if buffer.mode.is_some() => {
                buffer.mode = None;
                Ok(())
            }
            _ => Err(FileError::NotOpen(name.to_string())),
        }
    }

    pub fn read_line(&mut self, name: &str) -> Result<String, FileError> {
        let buffer = self.open_buffer(name, &[FileMode::Read])?;
        let line = buffer
            .lines
            .get(buffer.cursor)
            .cloned()
            .ok_or_else(|| FileError::PastEnd(name.to_string()))?;
        buffer.cursor += 1;
        Ok(line)
    }

    pub fn write_line(&mut self, name: &str, text: String) -> Result<(), FileError> {
        let buffer = self.open_buffer(name, &[FileMode::Write, FileMode::Append])?;
        buffer.lines.push(text);
        Ok(())
    }

    pub fn eof(&self, name: &str) -> Result<bool, FileError> {
        let buffer = self
            .files
            .get(name)
            .filter(|f| f.mode.is_some())
            .ok_or_else(|| FileError::NotOpen(name.to_string()))?;
        match buffer.mode {
            Some(FileMode::Read) => Ok(buffer.cursor >= buffer.lines.len()),
            Some(actual) => Err(FileError::WrongMode {
                name: name.to_string(),
                expected: FileMode::Read,
                actual,
            }),
            None => Err(FileError::NotOpen(name.to_string())),
        }
    }

    fn open_buffer(&mut self, name: &str, allowed: &[FileMode]) -> Result<&mut FileBuffer, FileError> {
        let buffer = self
            .files
            .get_mut(name)
            .ok_or_else(|| FileError::NotOpen(name.to_string()))?;
        match buffer.mode {
            None => Err(FileError::NotOpen(name.to_string())),
            Some(mode) if allowed.contains(&mode) => Ok(buffer),
            Some(actual) => Err(FileError::WrongMode {
                name: name.to_string(),
                expected: allowed[0],
                actual,
            }),
        }
    }
}

impl Interpreter {
    pub(crate) fn execute_openfile<E: Effects>(
        &mut self,
        file: &Expr,
        mode: FileMode,
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        let host = fx.require_host("OPENFILE", line)?;
        let name = self.evaluate_file_name(file, line)?;

        let content = match mode {
            FileMode::Read => host.request_file(&name),
            FileMode::Write | FileMode::Append => None,
        };
        self.files
            .open(&name, mode, content)
            .map_err(|e| file_error(e, line))?;
        log::debug!("opened '{}' for {}", name, mode);
        Ok(Flow::Normal)
    }

    pub(crate) fn execute_readfile<E: Effects>(
        &mut self,
        file: &Expr,
        target: &Expr,
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        fx.require_host("READFILE", line)?;
        let name = self.evaluate_file_name(file, line)?;
        let data_type = self.target_type(target, line)?;

        let raw = self.files.read_line(&name).map_err(|e| file_error(e, line))?;
        let value = convert_input(&raw, &data_type).ok_or_else(|| RuntimeError::InvalidInput {
            name: super::statements::target_name(target),
            input: raw.clone(),
            expected: data_type.clone(),
            line,
        })?;
        self.assign(target, value, line)?;
        Ok(Flow::Normal)
    }

    pub(crate) fn execute_writefile<E: Effects>(
        &mut self,
        file: &Expr,
        value: &Expr,
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        let host = fx.require_host("WRITEFILE", line)?;
        let name = self.evaluate_file_name(file, line)?;
        let text = self.evaluate(value)?.to_string();

        self.files
            .write_line(&name, text.clone())
            .map_err(|e| file_error(e, line))?;

        if self.config.echo_file_writes {
            self.emit_line(
                host,
                OutputLine {
                    kind: OutputKind::FileWrite,
                    text,
                    line,
                },
            );
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn execute_closefile<E: Effects>(
        &mut self,
        file: &Expr,
        line: usize,
        fx: &mut E,
    ) -> Result<Flow, RuntimeError> {
        fx.require_host("CLOSEFILE", line)?;
        let name = self.evaluate_file_name(file, line)?;
        self.files.close(&name).map_err(|e| file_error(e, line))?;
        Ok(Flow::Normal)
    }

    /// `EOF(f)`: a pure query, usable anywhere
    pub(crate) fn evaluate_eof(&mut self, file: &Expr, line: usize) -> Result<Value, RuntimeError> {
        let name = self.evaluate_file_name(file, line)?;
        self.files
            .eof(&name)
            .map(Value::Boolean)
            .map_err(|e| file_error(e, line))
    }

    fn evaluate_file_name(&mut self, file: &Expr, line: usize) -> Result<String, RuntimeError> {
        match self.evaluate(file)? {
            Value::Text(name) => Ok(name),
            other => Err(RuntimeError::type_mismatch(
                format!("file name must be a STRING, got a {}", other.type_name()),
                line,
            )),
        }
    }
}

fn file_error(error: FileError, line: usize) -> RuntimeError {
    RuntimeError::File {
        message: error.to_string(),
        line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_requires_content() {
        let mut fs = FileSystem::new();
        assert_eq!(
            fs.open("in.txt", FileMode::Read, None),
            Err(FileError::NotFound("in.txt".into()))
        );
        fs.open("in.txt", FileMode::Read, Some("a\nb".into())).unwrap();
        assert_eq!(fs.read_line("in.txt"), Ok("a".to_string()));
        assert_eq!(fs.eof("in.txt"), Ok(false));
        assert_eq!(fs.read_line("in.txt"), Ok("b".to_string()));
        assert_eq!(fs.eof("in.txt"), Ok(true));
        assert_eq!(fs.read_line("in.txt"), Err(FileError::PastEnd("in.txt".into())));
    }

    #[test]
    fn test_write_truncates_and_append_keeps() {
        let mut fs = FileSystem::new();
        fs.open("log", FileMode::Write, None).unwrap();
        fs.write_line("log", "one".into()).unwrap();
        fs.close("log").unwrap();

        fs.open("log", FileMode::Append, None).unwrap();
        fs.write_line("log", "two".into()).unwrap();
        fs.close("log").unwrap();
        assert_eq!(fs.get("log").map(|f| f.contents()), Some("one\ntwo\n".to_string()));

        fs.open("log", FileMode::Write, None).unwrap();
        fs.close("log").unwrap();
        assert_eq!(fs.get("log").map(|f| f.lines.len()), Some(0));
    }

    #[test]
    fn test_written_file_can_be_read_back() {
        let mut fs = FileSystem::new();
        fs.open("data", FileMode::Write, None).unwrap();
        fs.write_line("data", "42".into()).unwrap();
        fs.close("data").unwrap();

        fs.open("data", FileMode::Read, None).unwrap();
        assert_eq!(fs.read_line("data"), Ok("42".to_string()));
        assert_eq!(fs.modified().len(), 1);
    }

    #[test]
    fn test_mode_is_enforced() {
        let mut fs = FileSystem::new();
        fs.open("out", FileMode::Write, None).unwrap();
        assert!(matches!(fs.read_line("out"), Err(FileError::WrongMode { .. })));
        assert!(matches!(fs.eof("out"), Err(FileError::WrongMode { .. })));
        assert_eq!(
            fs.open("out", FileMode::Append, None),
            Err(FileError::AlreadyOpen("out".into()))
        );
        assert_eq!(fs.close("missing"), Err(FileError::NotOpen("missing".into())));
    }
}
