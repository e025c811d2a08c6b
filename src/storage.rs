// SPDX-License-Identifier: MPL-2.0

//! Output file naming and photo persistence
//!
//! Every capture gets a fresh random file name, so concurrent captures never
//! collide and nothing is overwritten.

use crate::backends::PhotoCodec;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// `<dir>/<uuid>.<ext>`
fn unique_path(dir: &Path, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", Uuid::new_v4(), extension))
}

/// Fresh path for a still encoded with `codec`
pub fn photo_output_path(dir: &Path, codec: PhotoCodec) -> PathBuf {
    unique_path(dir, codec.extension())
}

/// Fresh path for a recording in the given container
pub fn video_output_path(dir: &Path, extension: &str) -> PathBuf {
    unique_path(dir, extension)
}

/// Write encoded photo bytes to a new file under `dir`
pub async fn write_photo(dir: &Path, codec: PhotoCodec, data: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = photo_output_path(dir, codec);
    tokio::fs::write(&path, data).await?;
    debug!(path = %path.display(), bytes = data.len(), "Photo written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_unique() {
        let dir = Path::new("/tmp");
        let a = photo_output_path(dir, PhotoCodec::Jpeg);
        let b = photo_output_path(dir, PhotoCodec::Jpeg);
        assert_ne!(a, b);
        assert_eq!(a.extension().unwrap(), "jpg");
        assert_eq!(video_output_path(dir, "mp4").extension().unwrap(), "mp4");
    }

    #[tokio::test]
    async fn test_write_photo_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested");
        let path = write_photo(&dir, PhotoCodec::Hevc, b"data").await.unwrap();
        assert_eq!(path.parent().unwrap(), dir);
        assert_eq!(path.extension().unwrap(), "heic");
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }
}
