//! Single-entry zip archives of vetted content

use std::io::{Cursor, Write};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::{ArchiveError, ArchiveResult};

/// Builds the downloadable archive for a piece of content
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Archive `content` as a single entry called `entry_name`
    async fn archive(&self, content: Bytes, entry_name: &str) -> ArchiveResult<Bytes>;
}

/// Deflate-compressed zip archiver; compression runs on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl ZipArchiver {
    pub fn new() -> Self {
        Self
    }

    fn build(content: &[u8], entry_name: &str) -> ArchiveResult<Vec<u8>> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file(entry_name, options)?;
        writer.write_all(content)?;
        Ok(writer.finish()?.into_inner())
    }
}

#[async_trait]
impl Archiver for ZipArchiver {
    async fn archive(&self, content: Bytes, entry_name: &str) -> ArchiveResult<Bytes> {
        let entry_name = sanitize_entry_name(entry_name);
        let size = content.len();

        let archive = tokio::task::spawn_blocking(move || Self::build(&content, &entry_name))
            .await
            .map_err(|e| ArchiveError::Task(e.to_string()))??;

        debug!("Archived {} bytes into {} byte zip", size, archive.len());
        Ok(Bytes::from(archive))
    }
}

/// Reduce a name to its final path component
///
/// Returns `"file"` when nothing usable is left; callers pass the digest hex
/// when the request had no name, so this only triggers for names like `"/"`.
pub fn sanitize_entry_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .find(|part| !part.trim().is_empty() && *part != "." && *part != "..")
        .unwrap_or("")
        .trim();

    if base.is_empty() {
        "file".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_single_entry(archive: &[u8]) -> (String, Vec<u8>) {
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        assert_eq!(zip.len(), 1);
        let mut entry = zip.by_index(0).unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        (entry.name().to_string(), content)
    }

    #[test]
    fn test_sanitize_entry_name() {
        let cases = [
            ("setup.exe", "setup.exe"),
            ("../../etc/passwd", "passwd"),
            ("C:\\Users\\me\\tool.msi", "tool.msi"),
            ("dir/sub/", "sub"),
            ("/", "file"),
            ("", "file"),
        ];
        for (input, expected) in cases {
            assert_eq!(sanitize_entry_name(input), expected, "input: {input:?}");
        }
    }

    #[tokio::test]
    async fn test_archive_round_trip() {
        let content = Bytes::from(b"some binary \x00\x01 content".repeat(100));
        let archive = ZipArchiver::new()
            .archive(content.clone(), "payload.bin")
            .await
            .unwrap();

        let (name, unpacked) = read_single_entry(&archive);
        assert_eq!(name, "payload.bin");
        assert_eq!(unpacked, content.to_vec());
        assert!(archive.len() < content.len());
    }

    #[tokio::test]
    async fn test_archive_strips_directories_from_entry_name() {
        let archive = ZipArchiver::new()
            .archive(Bytes::from_static(b"x"), "../evil/name.txt")
            .await
            .unwrap();

        let (name, _) = read_single_entry(&archive);
        assert_eq!(name, "name.txt");
    }

    #[tokio::test]
    async fn test_archive_empty_content() {
        let archive = ZipArchiver::new()
            .archive(Bytes::new(), "empty.txt")
            .await
            .unwrap();

        let (_, unpacked) = read_single_entry(&archive);
        assert!(unpacked.is_empty());
    }
}
