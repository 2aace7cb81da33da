//! Per-session capture files.
//!
//! Each session writes `output<DD-MM-YYYY_HHMMSSffffff>.raw` under the capture
//! directory: the raw payload of every data frame followed by `\n`, in arrival
//! order, flushed record by record.  The format is meant for eyeballing, not
//! for replay.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;
use uuid::Uuid;

use crate::application::ports::{CaptureError, FrameSink, SinkOpener};
use crate::domain::Frame;

/// Gives up on finding a free file name after this many suffixes.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Opens capture files inside one directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct CaptureDirectory {
    dir: PathBuf,
}

impl CaptureDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File name stem for a session opened at `opened_at`.
    pub fn file_stem(opened_at: &DateTime<Local>) -> String {
        format!("output{}", opened_at.format("%d-%m-%Y_%H%M%S%6f"))
    }
}

#[async_trait]
impl SinkOpener for CaptureDirectory {
    type Sink = CaptureFile;

    async fn open(
        &self,
        session_id: Uuid,
        opened_at: DateTime<Local>,
    ) -> Result<CaptureFile, CaptureError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CaptureError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let stem = Self::file_stem(&opened_at);
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = match attempt {
                0 => format!("{stem}.raw"),
                n => format!("{stem}-{n}.raw"),
            };
            let path = self.dir.join(name);

            // create_new so two sessions opened in the same microsecond never
            // share a file.
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    debug!(%session_id, "opened capture file {}", path.display());
                    return Ok(CaptureFile::new(path, file));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(CaptureError::Open { path, source }),
            }
        }

        Err(CaptureError::Open {
            path: self.dir.join(format!("{stem}.raw")),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "no free capture file name"),
        })
    }
}

/// An open capture file.
#[derive(Debug)]
pub struct CaptureFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl CaptureFile {
    fn new(path: PathBuf, file: File) -> Self {
        Self {
            path,
            writer: Some(BufWriter::new(file)),
        }
    }
}

#[async_trait]
impl FrameSink for CaptureFile {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn record(&mut self, frame: &Frame) -> Result<(), CaptureError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(CaptureError::Write {
                path: self.path.clone(),
                source: io::Error::new(io::ErrorKind::Other, "capture file already closed"),
            });
        };

        let result = async {
            writer.write_all(frame.payload()).await?;
            writer.write_all(b"\n").await
        }
        .await;

        result.map_err(|source| CaptureError::Write {
            path: self.path.clone(),
            source,
        })?;

        // Each record reaches the file as it arrives, so a capture can be
        // tailed while the session is still open.
        writer.flush().await.map_err(|source| CaptureError::Flush {
            path: self.path.clone(),
            source,
        })
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush().await.map_err(|source| CaptureError::Flush {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Opcode;
    use chrono::TimeZone;

    fn opened_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2018, 9, 12, 14, 3, 7).unwrap()
    }

    fn text(s: &str) -> Frame {
        Frame::new(s.as_bytes().to_vec(), Opcode::Text, true)
    }

    #[test]
    fn test_file_stem_uses_session_timestamp() {
        assert_eq!(
            CaptureDirectory::file_stem(&opened_at()),
            "output12-09-2018_140307000000"
        );
    }

    #[tokio::test]
    async fn test_open_creates_missing_directory() {
        // Arrange
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("output");
        let opener = CaptureDirectory::new(&dir);

        // Act
        let sink = opener.open(Uuid::new_v4(), opened_at()).await.unwrap();

        // Assert
        assert!(dir.is_dir());
        assert_eq!(sink.path(), dir.join("output12-09-2018_140307000000.raw"));
        assert!(sink.path().is_file());
    }

    #[tokio::test]
    async fn test_same_timestamp_gets_distinct_files() {
        let tmp = tempfile::tempdir().unwrap();
        let opener = CaptureDirectory::new(tmp.path());

        let first = opener.open(Uuid::new_v4(), opened_at()).await.unwrap();
        let second = opener.open(Uuid::new_v4(), opened_at()).await.unwrap();

        assert_ne!(first.path(), second.path());
        assert!(second
            .path()
            .to_string_lossy()
            .ends_with("output12-09-2018_140307000000-1.raw"));
    }

    #[tokio::test]
    async fn test_records_are_newline_delimited_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = CaptureDirectory::new(tmp.path())
            .open(Uuid::new_v4(), opened_at())
            .await
            .unwrap();

        sink.record(&text("Hello, world!")).await.unwrap();
        sink.record(&Frame::new(vec![0x00, 0xFF], Opcode::Binary, true))
            .await
            .unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read(sink.path()).unwrap();
        assert_eq!(contents, b"Hello, world!\n\x00\xff\n".to_vec());
    }

    #[tokio::test]
    async fn test_record_is_on_disk_before_close() {
        // Arrange
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = CaptureDirectory::new(tmp.path())
            .open(Uuid::new_v4(), opened_at())
            .await
            .unwrap();

        // Act
        sink.record(&text("Hello, world!")).await.unwrap();

        // Assert: visible to a reader while the session is still open
        assert_eq!(
            std::fs::read(sink.path()).unwrap(),
            b"Hello, world!\n".to_vec()
        );

        sink.record(&text("second")).await.unwrap();
        assert_eq!(
            std::fs::read(sink.path()).unwrap(),
            b"Hello, world!\nsecond\n".to_vec()
        );
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = CaptureDirectory::new(tmp.path())
            .open(Uuid::new_v4(), opened_at())
            .await
            .unwrap();
        sink.record(&text("x")).await.unwrap();

        sink.close().await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(std::fs::read(sink.path()).unwrap(), b"x\n".to_vec());
    }

    #[tokio::test]
    async fn test_record_after_close_fails_with_path() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = CaptureDirectory::new(tmp.path())
            .open(Uuid::new_v4(), opened_at())
            .await
            .unwrap();
        sink.close().await.unwrap();

        let err = sink.record(&text("late")).await.unwrap_err();

        assert!(err.to_string().contains(&sink.path().display().to_string()));
    }

    #[tokio::test]
    async fn test_directory_blocked_by_file_is_create_dir_error() {
        // Arrange: a regular file where the directory should go
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("output");
        std::fs::write(&blocker, b"not a directory").unwrap();

        // Act
        let err = CaptureDirectory::new(&blocker)
            .open(Uuid::new_v4(), opened_at())
            .await
            .unwrap_err();

        // Assert
        assert!(matches!(err, CaptureError::CreateDir { .. }));
    }
}
