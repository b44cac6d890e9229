//! Upload content handle.
//!
//! Small uploads live in memory; large ones are spooled to a temp file so that
//! processors can rewrite them in place and adapters can stream them out.

use std::io;
use std::pin::Pin;

use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Boxed reader handed to streaming adapter writes.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send + Sync + Unpin>>;

/// The bytes of one upload, owned by a single request.
#[derive(Debug)]
pub enum UploadContent {
    Memory(Vec<u8>),
    TempFile(NamedTempFile),
}

impl UploadContent {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        UploadContent::Memory(data.into())
    }

    pub fn from_temp_file(file: NamedTempFile) -> Self {
        UploadContent::TempFile(file)
    }

    /// Copy a reader to a fresh temp file until EOF.
    pub async fn spool<R>(mut reader: R) -> io::Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let temp = NamedTempFile::new()?;
        let mut file = tokio::fs::File::from_std(temp.reopen()?);
        tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(UploadContent::TempFile(temp))
    }

    /// Whether the content is backed by a file that can be streamed without buffering.
    pub fn is_file_backed(&self) -> bool {
        matches!(self, UploadContent::TempFile(_))
    }

    pub async fn len(&self) -> io::Result<u64> {
        match self {
            UploadContent::Memory(data) => Ok(data.len() as u64),
            UploadContent::TempFile(file) => Ok(tokio::fs::metadata(file.path()).await?.len()),
        }
    }

    pub async fn read_all(&self) -> io::Result<Vec<u8>> {
        match self {
            UploadContent::Memory(data) => Ok(data.clone()),
            UploadContent::TempFile(file) => tokio::fs::read(file.path()).await,
        }
    }

    /// Overwrite the content in place. A temp file keeps its path.
    pub async fn replace(&mut self, data: Vec<u8>) -> io::Result<()> {
        match self {
            UploadContent::Memory(current) => {
                *current = data;
                Ok(())
            }
            UploadContent::TempFile(file) => tokio::fs::write(file.path(), data).await,
        }
    }

    pub async fn reader(&self) -> io::Result<ContentReader> {
        match self {
            UploadContent::Memory(data) => Ok(Box::pin(io::Cursor::new(data.clone()))),
            UploadContent::TempFile(file) => {
                let handle = tokio::fs::File::open(file.path()).await?;
                Ok(Box::pin(handle))
            }
        }
    }

    /// Consume the handle and return its bytes.
    pub async fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            UploadContent::Memory(data) => Ok(data),
            UploadContent::TempFile(file) => tokio::fs::read(file.path()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_memory_replace() {
        let mut content = UploadContent::from_bytes(b"original".to_vec());
        content.replace(b"rewritten".to_vec()).await.unwrap();
        assert_eq!(content.read_all().await.unwrap(), b"rewritten");
        assert_eq!(content.len().await.unwrap(), 9);
        assert!(!content.is_file_backed());
    }

    #[tokio::test]
    async fn test_temp_file_replace_keeps_path() {
        let content_reader = io::Cursor::new(b"spooled bytes".to_vec());
        let mut content = UploadContent::spool(content_reader).await.unwrap();
        assert!(content.is_file_backed());

        let path_before = match &content {
            UploadContent::TempFile(f) => f.path().to_path_buf(),
            _ => unreachable!(),
        };

        content.replace(b"new".to_vec()).await.unwrap();

        let path_after = match &content {
            UploadContent::TempFile(f) => f.path().to_path_buf(),
            _ => unreachable!(),
        };
        assert_eq!(path_before, path_after);
        assert_eq!(content.read_all().await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_reader_yields_content() {
        let content = UploadContent::spool(io::Cursor::new(b"stream me".to_vec()))
            .await
            .unwrap();
        let mut reader = content.reader().await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"stream me");
    }
}
