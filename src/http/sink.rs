//! Append-only response byte sinks.
//!
//! The transport delivers chunks through the dispatch callbacks; each chunk is
//! appended in delivery order. Finalizing consumes the sink, so it can only
//! happen once.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use bytes::{Bytes, BytesMut};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum StreamSink {
    /// Accumulates into memory; finalizes into a buffer.
    Memory(BytesMut),
    /// Writes through to a file created (or truncated) when the sink was opened.
    File {
        path: PathBuf,
        writer: BufWriter<File>,
        written: u64,
    },
}

impl StreamSink {
    pub fn memory() -> Self {
        StreamSink::Memory(BytesMut::new())
    }

    /// Open a file-backed sink, creating missing parent directories.
    pub fn file(path: &Path) -> Result<Self, NetError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).sink_context(path)?;
        }
        let file = File::create(path).sink_context(path)?;
        Ok(StreamSink::File {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Memory sink when `path` is `None`, file sink otherwise.
    pub fn for_output(path: Option<&Path>) -> Result<Self, NetError> {
        match path {
            Some(path) => Self::file(path),
            None => Ok(Self::memory()),
        }
    }

    /// Append one chunk. Returns the number of bytes accepted.
    pub fn append(&mut self, chunk: &[u8]) -> Result<usize, NetError> {
        match self {
            StreamSink::Memory(buf) => {
                buf.extend_from_slice(chunk);
            }
            StreamSink::File {
                path,
                writer,
                written,
            } => {
                writer.write_all(chunk).map_err(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "file sink write failed");
                    NetError::SinkWriteFailed
                })?;
                *written += chunk.len() as u64;
            }
        }
        Ok(chunk.len())
    }

    /// Total bytes appended so far.
    pub fn len(&self) -> u64 {
        match self {
            StreamSink::Memory(buf) => buf.len() as u64,
            StreamSink::File { written, .. } => *written,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_file(&self) -> bool {
        matches!(self, StreamSink::File { .. })
    }

    /// Close the backing resource.
    ///
    /// Memory sinks yield their content; file sinks flush and yield `None`.
    pub fn finalize(self) -> Result<Option<Bytes>, NetError> {
        match self {
            StreamSink::Memory(buf) => Ok(Some(buf.freeze())),
            StreamSink::File {
                path, mut writer, ..
            } => {
                writer.flush().map_err(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "file sink flush failed");
                    NetError::SinkWriteFailed
                })?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_sink_preserves_order() {
        let mut sink = StreamSink::memory();
        for chunk in ["ab", "cd", "ef"] {
            assert_eq!(sink.append(chunk.as_bytes()).unwrap(), 2);
        }
        assert_eq!(sink.len(), 6);
        let content = sink.finalize().unwrap().unwrap();
        assert_eq!(&content[..], b"abcdef");
    }

    #[test]
    fn test_memory_sink_empty_finalize() {
        let sink = StreamSink::memory();
        assert!(sink.is_empty());
        assert_eq!(sink.finalize().unwrap().unwrap().len(), 0);
    }

    #[test]
    fn test_file_sink_creates_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.bin");

        let mut sink = StreamSink::file(&path).unwrap();
        assert!(sink.is_file());
        for chunk in ["ab", "cd", "ef"] {
            sink.append(chunk.as_bytes()).unwrap();
        }
        assert_eq!(sink.len(), 6);
        assert!(sink.finalize().unwrap().is_none());

        assert_eq!(fs::read(&path).unwrap(), b"abcdef");
    }

    #[test]
    fn test_file_sink_truncates_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, b"a much longer previous content").unwrap();

        let mut sink = StreamSink::file(&path).unwrap();
        sink.append(b"new").unwrap();
        sink.finalize().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_file_sink_open_failure() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened as the output file.
        let err = StreamSink::file(dir.path()).unwrap_err();
        assert_eq!(err, NetError::FileSinkOpenFailed);
    }

    #[test]
    fn test_for_output() {
        assert!(!StreamSink::for_output(None).unwrap().is_file());
    }
}
