//! Writes export payloads to disk under collision-free, time-stamped names.

use crate::error::{ExportError, Result};
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use tierboard_render::data_uri::DataUri;
use tierboard_render::{ExportPayload, ImageFormat};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilenameStamp {
    /// `game-ranking-1718000000000.png`
    #[default]
    EpochMillis,
    /// `game-ranking-2024-06-10.png`
    Date,
}

impl FilenameStamp {
    pub fn format(self, now: DateTime<Utc>) -> String {
        match self {
            Self::EpochMillis => now.timestamp_millis().to_string(),
            Self::Date => now.with_timezone(&Local).format("%Y-%m-%d").to_string(),
        }
    }
}

/// Keeps a base name to one path component of safe characters.
pub fn sanitize_basename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        "export".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn payload_bytes(payload: &ExportPayload) -> Result<Vec<u8>> {
    let bytes = match payload {
        ExportPayload::Blob { bytes, .. } => bytes.clone(),
        ExportPayload::Text { markup, .. } if markup.trim_start().starts_with("data:") => {
            DataUri::parse(markup)
                .map(|d| d.bytes)
                .ok_or(ExportError::EmptyPayload)?
        }
        ExportPayload::Text { markup, .. } => markup.as_bytes().to_vec(),
    };
    if bytes.is_empty() {
        return Err(ExportError::EmptyPayload);
    }
    Ok(bytes)
}

/// `<basename>-<stamp>.<ext>` for the current time.
pub fn file_name(basename: &str, stamp: FilenameStamp, format: ImageFormat) -> String {
    format!(
        "{}-{}.{}",
        sanitize_basename(basename),
        stamp.format(Utc::now()),
        format.extension()
    )
}

#[derive(Debug, Clone)]
pub struct DownloadEmitter {
    dir: PathBuf,
    stamp: FilenameStamp,
}

impl DownloadEmitter {
    pub fn new(dir: impl Into<PathBuf>, stamp: FilenameStamp) -> Self {
        Self {
            dir: dir.into(),
            stamp,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the payload and returns the path. An existing file is never overwritten: a
    /// `-<n>` suffix is added until the name is free. A file that could not be written in full
    /// is removed again.
    pub async fn emit(&self, payload: &ExportPayload, basename: &str, format: ImageFormat) -> Result<PathBuf> {
        let bytes = payload_bytes(payload)?;
        let stem = format!(
            "{}-{}",
            sanitize_basename(basename),
            self.stamp.format(Utc::now())
        );
        let ext = format.extension();
        let mut n = 0u32;
        loop {
            let name = if n == 0 {
                format!("{stem}.{ext}")
            } else {
                format!("{stem}-{n}.{ext}")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    if let Err(source) = write_fully(file, &bytes).await {
                        if let Err(err) = fs::remove_file(&path).await {
                            tracing::warn!(path = %path.display(), error = %err, "could not remove partial download");
                        }
                        return Err(ExportError::Download { path, source });
                    }
                    tracing::info!(path = %path.display(), bytes = bytes.len(), "saved export");
                    return Ok(path);
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
                Err(source) => return Err(ExportError::Download { path, source }),
            }
        }
    }
}

async fn write_fully(mut file: File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_payload() -> ExportPayload {
        ExportPayload::Blob {
            bytes: b"\x89PNG\r\n\x1a\n".to_vec(),
            mime: "image/png",
        }
    }

    #[test]
    fn basenames_are_single_components() {
        assert_eq!(sanitize_basename("../my board"), "-my board");
        assert_eq!(sanitize_basename("  "), "export");
        assert_eq!(sanitize_basename("tier:list?"), "tier-list-");
    }

    #[test]
    fn stamps() {
        let now = DateTime::parse_from_rfc3339("2024-06-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(FilenameStamp::EpochMillis.format(now), "1718020800000");
        assert_eq!(FilenameStamp::Date.format(now).len(), "2024-06-10".len());
    }

    #[tokio::test]
    async fn repeated_emits_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = DownloadEmitter::new(dir.path(), FilenameStamp::Date);
        let first = emitter
            .emit(&png_payload(), "game-ranking", ImageFormat::Png)
            .await
            .unwrap();
        let second = emitter
            .emit(&png_payload(), "game-ranking", ImageFormat::Png)
            .await
            .unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("-1.png"));
        assert_eq!(std::fs::read(&first).unwrap(), b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn failed_emits_leave_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-there");
        let emitter = DownloadEmitter::new(&missing, FilenameStamp::EpochMillis);
        let err = emitter
            .emit(&png_payload(), "game-ranking", ImageFormat::Png)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Download { .. }));
        assert!(!missing.exists());

        let empty = ExportPayload::Blob {
            bytes: Vec::new(),
            mime: "image/png",
        };
        let emitter = DownloadEmitter::new(dir.path(), FilenameStamp::EpochMillis);
        assert!(matches!(
            emitter.emit(&empty, "game-ranking", ImageFormat::Png).await,
            Err(ExportError::EmptyPayload)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn data_uri_payloads_are_decoded_and_empty_ones_rejected() {
        let uri = ExportPayload::Text {
            markup: "data:image/svg+xml;base64,PHN2Zy8+".to_string(),
            mime: "image/svg+xml",
        };
        assert_eq!(payload_bytes(&uri).unwrap(), b"<svg/>");

        let empty = ExportPayload::Blob {
            bytes: Vec::new(),
            mime: "image/png",
        };
        assert!(matches!(payload_bytes(&empty), Err(ExportError::EmptyPayload)));
    }
}
