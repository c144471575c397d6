use crate::range::ByteRange;
use crate::{Error, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Relative paths are taken from `data_dir`; absolute ones are used as is.
pub fn resolve_path(data_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

pub async fn file_len(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path).await?.len())
}

/// Read `range` from the file at `path`, refusing spans over `max_len` bytes.
pub async fn read_range(path: &Path, range: ByteRange, max_len: u64) -> Result<Bytes> {
    if range.len() > max_len {
        return Err(Error::InvalidQuery(format!(
            "requested {} bytes, at most {} are served per request",
            range.len(),
            max_len
        )));
    }

    let mut file = fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(range.start)).await?;

    let mut buf = Vec::with_capacity(range.len() as usize);
    file.take(range.len()).read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_path() {
        let data_dir = Path::new("/srv/data");
        assert_eq!(
            resolve_path(data_dir, Path::new("a/b.bam")),
            PathBuf::from("/srv/data/a/b.bam")
        );
        assert_eq!(
            resolve_path(data_dir, Path::new("/elsewhere/b.bam")),
            PathBuf::from("/elsewhere/b.bam")
        );
    }

    #[tokio::test]
    async fn test_read_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        assert_eq!(file_len(&path).await.unwrap(), 10);
        let bytes = read_range(&path, ByteRange::new(2, 5), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"234");

        // short read at end of file
        let bytes = read_range(&path, ByteRange::new(8, 20), 1024).await.unwrap();
        assert_eq!(&bytes[..], b"89");
    }

    #[tokio::test]
    async fn test_read_range_over_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let err = read_range(&path, ByteRange::new(0, 10), 4).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }
}
