use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, instrument, Instrument};

use crate::{
    core::storage::{Storage, StorageProvider, StorageReadError},
    model::AssetId,
};

/// What a staged copy is used for. Part of the staged file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum StagePurpose {
    Thumb,
    Gif,
}

#[derive(thiserror::Error, Debug)]
pub enum StagingError {
    #[error("error opening object '{key}' for reading")]
    OpenSource {
        key: String,
        #[source]
        source: StorageReadError,
    },
    #[error("error creating staged file {path}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error copying object '{key}' to {path}")]
    Copy {
        key: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Local copy of an object, deleted when dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    temp_path: TempPath,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file now instead of on drop, reporting failure.
    pub fn close(self) -> std::io::Result<()> {
        self.temp_path.close()
    }
}

pub fn staged_file_path(
    dir: &Path,
    prefix: &str,
    purpose: StagePurpose,
    asset_id: AssetId,
) -> PathBuf {
    dir.join(format!(
        "{}_{}_{}_{}.tmp",
        prefix, purpose, asset_id.0, asset_id.0
    ))
}

/// Copies the object `key` into a local file ffmpeg and ffprobe can open by path.
/// Returns once the whole object has been written.
#[instrument(skip(storage), level = "debug")]
pub async fn stage_object(
    storage: &Storage,
    key: &str,
    dir: &Path,
    prefix: &str,
    purpose: StagePurpose,
    asset_id: AssetId,
) -> Result<StagedFile, StagingError> {
    let path = staged_file_path(dir, prefix, purpose, asset_id);
    let mut reader = storage
        .open_read_stream(key)
        .in_current_span()
        .await
        .map_err(|source| StagingError::OpenSource {
            key: key.to_owned(),
            source,
        })?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| StagingError::CreateFile {
            path: path.clone(),
            source,
        })?;
    copy_to_staged_file(&mut reader, key, path).await
}

/// Writes everything `reader` yields to a new file at `path`.
/// The file is removed again if the copy does not complete.
async fn copy_to_staged_file<R>(
    reader: &mut R,
    key: &str,
    path: PathBuf,
) -> Result<StagedFile, StagingError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|source| StagingError::CreateFile {
            path: path.clone(),
            source,
        })?;
    // from here on the file is removed again if anything goes wrong
    let staged = StagedFile {
        temp_path: TempPath::from_path(path.as_std_path()),
        path,
    };
    let copy_err = |source| StagingError::Copy {
        key: key.to_owned(),
        path: staged.path.clone(),
        source,
    };
    let bytes = tokio::io::copy(reader, &mut file).await.map_err(copy_err)?;
    file.flush().await.map_err(copy_err)?;
    file.sync_all().await.map_err(copy_err)?;
    debug!(path = %staged.path, bytes, "staged object");
    Ok(staged)
}

#[cfg(test)]
mod test {
    use claims::{assert_err, assert_ok};
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    use std::{
        pin::Pin,
        task::{Context, Poll},
    };

    use tokio::io::{AsyncReadExt, ReadBuf};

    use crate::core::storage::LocalFileStorage;

    use super::*;

    /// Fails every read, like a dropped connection to the object store.
    struct BrokenStream;

    impl AsyncRead for BrokenStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )))
        }
    }

    struct Dirs {
        _storage_dir: tempfile::TempDir,
        _staging_dir: tempfile::TempDir,
        storage: Storage,
        staging: PathBuf,
    }

    fn utf8(dir: &tempfile::TempDir) -> PathBuf {
        dir.path()
            .to_path_buf()
            .try_into()
            .expect("tempdir paths should be UTF8")
    }

    fn dirs() -> Dirs {
        let storage_dir = tempfile::tempdir().expect("could not create temp dir");
        let staging_dir = tempfile::tempdir().expect("could not create temp dir");
        Dirs {
            storage: LocalFileStorage::new(utf8(&storage_dir)).into(),
            staging: utf8(&staging_dir),
            _storage_dir: storage_dir,
            _staging_dir: staging_dir,
        }
    }

    #[test]
    fn staged_file_name_contains_purpose_and_asset_id() {
        let dir = Path::new("/tmp/staging");
        assert_eq!(
            staged_file_path(dir, "preview", StagePurpose::Thumb, AssetId(12)),
            PathBuf::from("/tmp/staging/preview_thumb_12_12.tmp")
        );
        assert_eq!(
            staged_file_path(dir, "preview", StagePurpose::Gif, AssetId(12)),
            PathBuf::from("/tmp/staging/preview_gif_12_12.tmp")
        );
    }

    #[test]
    fn purposes_get_distinct_paths() {
        let dir = Path::new("/tmp");
        let paths: std::collections::HashSet<PathBuf> = StagePurpose::iter()
            .map(|purpose| staged_file_path(dir, "p", purpose, AssetId(1)))
            .collect();
        assert_eq!(paths.len(), 2);
    }

    #[tokio::test]
    async fn stage_copies_full_object_and_drop_removes_it() {
        let dirs = dirs();
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        assert_ok!(dirs.storage.save("uploads/video.mp4", &content).await);
        let staged = assert_ok!(
            stage_object(
                &dirs.storage,
                "uploads/video.mp4",
                &dirs.staging,
                "preview",
                StagePurpose::Gif,
                AssetId(3),
            )
            .await
        );
        let path = staged.path().to_owned();
        assert_eq!(path, dirs.staging.join("preview_gif_3_3.tmp"));
        assert_eq!(assert_ok!(std::fs::read(&path)), content);
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn close_removes_file() {
        let dirs = dirs();
        assert_ok!(dirs.storage.save("uploads/v.mp4", b"data").await);
        let staged = assert_ok!(
            stage_object(
                &dirs.storage,
                "uploads/v.mp4",
                &dirs.staging,
                "preview",
                StagePurpose::Thumb,
                AssetId(4),
            )
            .await
        );
        let path = staged.path().to_owned();
        assert!(path.exists());
        assert_ok!(staged.close());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_object_fails_without_leaving_a_file() {
        let dirs = dirs();
        let err = assert_err!(
            stage_object(
                &dirs.storage,
                "uploads/missing.mp4",
                &dirs.staging,
                "preview",
                StagePurpose::Thumb,
                AssetId(5),
            )
            .await
        );
        assert!(matches!(err, StagingError::OpenSource { .. }), "{err:?}");
        assert_eq!(assert_ok!(std::fs::read_dir(&dirs.staging)).count(), 0);
    }

    #[tokio::test]
    async fn broken_stream_removes_partial_file() {
        let dirs = dirs();
        let path = staged_file_path(&dirs.staging, "preview", StagePurpose::Gif, AssetId(6));
        let partial = vec![7u8; 64 * 1024];
        let mut reader = (&partial[..]).chain(BrokenStream);
        let err = assert_err!(copy_to_staged_file(&mut reader, "uploads/v.mp4", path.clone()).await);
        assert!(matches!(err, StagingError::Copy { .. }), "{err:?}");
        assert!(!path.exists());
        assert_eq!(assert_ok!(std::fs::read_dir(&dirs.staging)).count(), 0);
    }

    #[tokio::test]
    async fn unreadable_object_is_a_copy_error() {
        let dirs = dirs();
        // a directory opens fine but fails on the first read
        assert_ok!(dirs.storage.save("uploads/dir/placeholder", b"").await);
        let err = assert_err!(
            stage_object(
                &dirs.storage,
                "uploads/dir",
                &dirs.staging,
                "preview",
                StagePurpose::Thumb,
                AssetId(8),
            )
            .await
        );
        assert!(matches!(err, StagingError::Copy { .. }), "{err:?}");
        assert_eq!(assert_ok!(std::fs::read_dir(&dirs.staging)).count(), 0);
    }
}
