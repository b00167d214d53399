use async_trait::async_trait;
use camino::Utf8PathBuf as PathBuf;
use enum_dispatch::enum_dispatch;
use eyre::{Context, Result};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{instrument, Instrument};

/// Abstraction for storing data files in any backing store.
/// This interface is basically a blob store, where every object has
/// a `key` used to store and retrieve it.
#[async_trait]
#[enum_dispatch(Storage)]
pub trait StorageProvider: Clone {
    async fn open_read_stream(
        &self,
        key: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, StorageReadError>;
    /// Writes `data` as the full content of `key`, replacing any existing object.
    async fn save(&self, key: &str, data: &[u8]) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
    /// Removes `key`. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(thiserror::Error, Debug)]
pub enum StorageReadError {
    #[error("File with key '{0}' does not exist")]
    FileNotFound(String),
    #[error(transparent)]
    IOError {
        #[from]
        source: tokio::io::Error,
    },
    #[error(transparent)]
    Unknown {
        #[from]
        source: eyre::Report,
    },
}

#[enum_dispatch]
pub enum Storage {
    LocalFileStorage,
}

impl Clone for Storage {
    fn clone(&self) -> Self {
        match self {
            Self::LocalFileStorage(a) => Self::LocalFileStorage(a.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: PathBuf) -> LocalFileStorage {
        LocalFileStorage { root }
    }
}

#[async_trait]
impl StorageProvider for LocalFileStorage {
    #[instrument(skip(self), level = "debug")]
    async fn open_read_stream(
        &self,
        key: &str,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, StorageReadError> {
        use tokio::io::ErrorKind;
        let open = tokio::fs::OpenOptions::new()
            .read(true)
            .open(self.root.join(key))
            .in_current_span()
            .await;
        match open {
            Ok(f) => Ok(Box::new(f)),
            Err(err) => Err(match err.kind() {
                ErrorKind::NotFound => StorageReadError::FileNotFound(key.to_owned()),
                _ => StorageReadError::IOError { source: err },
            }),
        }
    }

    #[instrument(skip(self, data), fields(len = data.len()), level = "debug")]
    async fn save(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.root.join(key);
        if let Some(parent) = &path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .wrap_err("could not create directory")?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
            .await
            .wrap_err("error opening file for writing")?;
        file.write_all(data)
            .await
            .wrap_err_with(|| format!("error writing to {}", path))?;
        file.flush().await.wrap_err("error flushing file")?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, key: &str) -> Result<bool> {
        tokio::fs::try_exists(self.root.join(key))
            .await
            .wrap_err("error checking if path exists")
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.root.join(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == tokio::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).wrap_err_with(|| format!("error deleting {}", key)),
        }
    }
}
