//! Result persistence.
//!
//! The whole corpus is rewritten after every executed prompt so an
//! interrupted run can be resumed; prompts that were finished before the
//! interruption are skipped on the next run.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use crate::corpus::Corpus;
use crate::error::{HarnessError, Result};

/// Where results go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Rewritten after every prompt and at the end.
    File(PathBuf),
    /// Printed once, at the end.
    Stdout,
}

impl Destination {
    /// Interprets an `--output` value; absent or `-` means stdout.
    pub fn from_arg(output: Option<&str>) -> Self {
        match output {
            None | Some("-") => Destination::Stdout,
            Some(path) => Destination::File(PathBuf::from(path)),
        }
    }
}

/// Writes the corpus to its destination.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    destination: Destination,
}

impl ResultWriter {
    /// Creates a writer for a destination.
    pub fn new(destination: Destination) -> Self {
        Self { destination }
    }

    /// Saves intermediate progress. A no-op when writing to stdout.
    pub fn flush(&self, corpus: &Corpus) -> Result<()> {
        if let Destination::File(path) = &self.destination {
            write_file(path, corpus)?;
            debug!("Wrote intermediate results to {}", path.display());
        }
        Ok(())
    }

    /// Writes the final document.
    pub fn finish<W: Write>(&self, corpus: &Corpus, stdout: &mut W) -> Result<()> {
        match &self.destination {
            Destination::File(path) => {
                write_file(path, corpus)?;
                info!("Wrote results to {}", path.display());
            }
            Destination::Stdout => {
                stdout.write_all(to_json(corpus)?.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

/// Serializes the corpus with sorted keys and four-space indentation.
pub fn to_json(corpus: &Corpus) -> Result<String> {
    // Round-tripping through `Value` sorts object keys at every level.
    let value = serde_json::to_value(corpus)?;
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| {
        HarnessError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

fn write_file(path: &Path, corpus: &Corpus) -> Result<()> {
    let json = to_json(corpus)?;
    atomic_write(path, json.as_bytes()).map_err(|source| HarnessError::Persist {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes to a sibling temp file, syncs it, then renames it over `path`.
fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".results-")
        .suffix(".tmp")
        .tempfile_in(&parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
