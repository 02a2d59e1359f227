use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use futures::{Stream, StreamExt as _, pin_mut};
use tokio::{fs, io::AsyncWriteExt as _, task::spawn_blocking};
use tokio_util::io::ReaderStream;
use tracing::error;

use super::{
    StoreInfo, ValidatedPath,
    error::{StoreError, StoreResult},
};

const MAX_SAME_FILES: usize = 10;

/// Repeated uploads of the same file name get a "name(1).ext" style suffix.
fn find_unique_path(path: &Path) -> StoreResult<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or(StoreError::InvalidPath)?;
    let ext = path.extension().and_then(|s| s.to_str());
    let parent = path.parent().ok_or(StoreError::InvalidPath)?;
    for i in 1..=MAX_SAME_FILES {
        let name = match ext {
            Some(ext) => format!("{stem}({i}).{ext}"),
            None => format!("{stem}({i})"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(StoreError::PathConflict)
}

fn unique_path_sync(final_path: PathBuf) -> StoreResult<(PathBuf, PathBuf)> {
    if final_path.is_dir() {
        return Err(StoreError::InvalidPath);
    }
    let res_path = if final_path.exists() {
        find_unique_path(&final_path)?
    } else {
        if let Some(parent_dir) = final_path.parent() {
            if !parent_dir.exists() {
                std::fs::create_dir_all(parent_dir)?;
            }
        }
        final_path
    };
    let temp_path = res_path.with_extension("tmp");
    Ok((res_path, temp_path))
}

async fn unique_path(root: &Path, path: &ValidatedPath) -> StoreResult<(PathBuf, PathBuf)> {
    let path = root.join(path.as_ref());
    spawn_blocking(|| unique_path_sync(path)).await?
}

async fn cleanup(path: &Path, error: StoreError) -> StoreResult<StoreInfo> {
    error!("Failed to store file to tmp path {path:?}: {error}");
    fs::remove_file(path)
        .await
        .map_err(|e| error!("Failed to remove file {path:?}: {e}"))
        .ok();
    Err(error)
}

struct FileStoreInner {
    root: PathBuf,
}

/// Media files on local disk under a single root, relative paths only.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<FileStoreInner>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore {
            inner: Arc::new(FileStoreInner { root: root.into() }),
        }
    }

    fn full_path(&self, path: &ValidatedPath) -> PathBuf {
        self.inner.root.join(path.as_ref())
    }

    pub async fn store_stream<S, E>(&self, path: &ValidatedPath, stream: S) -> StoreResult<StoreInfo>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<StoreError>,
    {
        let (final_path, temp_path) = unique_path(&self.inner.root, path).await?;
        let mut file = fs::File::create(&temp_path).await?;
        let mut size: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(data) => {
                    size += data.len() as u64;
                    if let Err(e) = file.write_all(&data).await {
                        return cleanup(&temp_path, e.into()).await;
                    }
                }
                Err(e) => return cleanup(&temp_path, e.into()).await,
            }
        }
        if let Err(e) = file.flush().await {
            return cleanup(&temp_path, e.into()).await;
        }
        drop(file);
        fs::rename(&temp_path, &final_path).await?;

        let relative = final_path
            .strip_prefix(&self.inner.root)
            .map_err(|_| StoreError::InvalidPath)?;
        Ok(StoreInfo {
            final_path: relative.to_string_lossy().replace('\\', "/"),
            size,
        })
    }

    pub async fn load_data(
        &self,
        path: &ValidatedPath,
    ) -> StoreResult<impl Stream<Item = std::io::Result<Bytes>> + 'static> {
        let full_path = self.full_path(path);
        if !fs::try_exists(&full_path).await? {
            return Err(StoreError::NotFound(path.as_ref().to_string()));
        }
        let file = fs::File::open(full_path).await?;
        Ok(ReaderStream::new(file))
    }

    pub async fn size(&self, path: &ValidatedPath) -> StoreResult<u64> {
        let full_path = self.full_path(path);
        match fs::metadata(&full_path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.as_ref().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove(&self, path: &ValidatedPath) -> StoreResult<()> {
        let full_path = self.full_path(path);
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drops the whole per film attachment directory, missing one is fine.
    pub async fn remove_film_dir(&self, film_id: i64) -> StoreResult<()> {
        let dir = self.inner.root.join(format!("films/{film_id}"));
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn data_stream(chunks: &[&str]) -> impl Stream<Item = Result<Bytes, StoreError>> {
        let owned: Vec<Result<Bytes, StoreError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from(c.as_bytes().to_vec())))
            .collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn test_store_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = ValidatedPath::new("films/1/trailer.mp4").unwrap();

        let info = store
            .store_stream(&path, data_stream(&["hello ", "world"]))
            .await
            .unwrap();
        assert_eq!(info.final_path, "films/1/trailer.mp4");
        assert_eq!(info.size, 11);
        assert_eq!(store.size(&path).await.unwrap(), 11);

        let stream = store.load_data(&path).await.unwrap();
        let chunks: Vec<_> = stream.collect::<Vec<_>>().await;
        let data: Vec<u8> = chunks.into_iter().flat_map(|c| c.unwrap()).collect();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn test_second_upload_gets_unique_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = ValidatedPath::new("films/1/poster.jpg").unwrap();

        store.store_stream(&path, data_stream(&["a"])).await.unwrap();
        let info = store.store_stream(&path, data_stream(&["b"])).await.unwrap();
        assert_eq!(info.final_path, "films/1/poster(1).jpg");
    }

    #[tokio::test]
    async fn test_remove_film_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = ValidatedPath::new("films/7/a.txt").unwrap();
        store.store_stream(&path, data_stream(&["x"])).await.unwrap();

        store.remove_film_dir(7).await.unwrap();
        assert!(matches!(
            store.size(&path).await,
            Err(StoreError::NotFound(_))
        ));
        // idempotent
        store.remove_film_dir(7).await.unwrap();
    }
}
