//! Local content storage layout.
//!
//! Content lives at `{root}/{identifier}/{name}`, so the identifier of any
//! file handed back by the host can be read from its parent directory name.
//! In-progress downloads are written next to the target as `{name}.partial`.

use std::{
    fs,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use nimbus_core::domain::{ItemId, ItemIdentifier};

use crate::error::ProviderError;

/// Manages item content on local disk.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a storage rooted at `root`, creating the directory if needed.
    pub fn new(root: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the content of one item.
    pub fn item_dir(&self, id: &ItemId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Where the content of an item lives.
    pub fn content_path(&self, id: &ItemId, name: &str) -> PathBuf {
        self.item_dir(id).join(name)
    }

    /// Get the path for a partial (in-progress) download.
    pub fn partial_path(&self, id: &ItemId, name: &str) -> PathBuf {
        self.item_dir(id).join(format!("{name}.partial"))
    }

    /// Maps a content path back to the identifier of its item.
    ///
    /// The path must lie under the storage root; the identifier is its
    /// second-to-last component.
    pub fn identifier_from_path(&self, path: &Path) -> Option<ItemIdentifier> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let components: Vec<&str> = relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()?;

        if components.len() < 2 {
            return None;
        }
        let id = components[components.len() - 2];
        id.parse().ok()
    }

    /// Moves the content directory of a promoted item to its new identifier.
    ///
    /// Missing source content is not an error: an upload may run from a
    /// record whose directory was already cleaned up.
    pub fn move_item_dir(&self, old: &ItemId, new: &ItemId) -> Result<(), ProviderError> {
        let from = self.item_dir(old);
        let to = self.item_dir(new);
        if !from.exists() {
            return Ok(());
        }
        if to.exists() {
            fs::remove_dir_all(&to)?;
        }
        fs::rename(&from, &to)?;
        Ok(())
    }

    /// Remove stored content. Absent content is a no-op.
    pub fn remove_content(&self, id: &ItemId, name: &str) -> Result<(), ProviderError> {
        remove_if_exists(&self.content_path(id, name))
    }

    /// Remove a partial download. Absent partial files are a no-op.
    pub fn remove_partial(&self, id: &ItemId, name: &str) -> Result<(), ProviderError> {
        remove_if_exists(&self.partial_path(id, name))
    }

    /// Leave an empty placeholder at the content path of an evicted item.
    pub fn write_placeholder(&self, id: &ItemId, name: &str) -> Result<PathBuf, ProviderError> {
        let path = self.content_path(id, name);
        self.ensure_dir(id)?;
        fs::File::create(&path)?;
        Ok(path)
    }

    /// Copy an external file into the storage of a new item.
    ///
    /// Returns the content path and the number of bytes copied.
    pub async fn import_file(
        &self,
        source: &Path,
        id: &ItemId,
        name: &str,
    ) -> Result<(PathBuf, u64), ProviderError> {
        let path = self.content_path(id, name);
        tokio::fs::create_dir_all(self.item_dir(id)).await?;
        let copied = tokio::fs::copy(source, &path).await?;
        Ok((path, copied))
    }

    pub fn ensure_dir(&self, id: &ItemId) -> Result<PathBuf, ProviderError> {
        let dir = self.item_dir(id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

fn remove_if_exists(path: &Path) -> Result<(), ProviderError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> ItemId {
        ItemId::new(s.to_string()).unwrap()
    }

    fn storage() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("storage")).unwrap();
        (dir, storage)
    }

    mod layout_tests {
        use super::*;

        #[test]
        fn test_content_path_layout() {
            let (_dir, storage) = storage();
            let path = storage.content_path(&id("R1"), "photo.jpg");
            assert_eq!(path, storage.root().join("R1").join("photo.jpg"));
        }

        #[test]
        fn test_partial_path_has_partial_suffix() {
            let (_dir, storage) = storage();
            let path = storage.partial_path(&id("R1"), "photo.jpg");
            assert_eq!(path, storage.root().join("R1").join("photo.jpg.partial"));
        }

        #[test]
        fn test_identifier_from_path_roundtrip() {
            let (_dir, storage) = storage();
            let path = storage.content_path(&id("R1"), "photo.jpg");
            assert_eq!(
                storage.identifier_from_path(&path),
                Some(ItemIdentifier::Item(id("R1")))
            );
        }

        #[test]
        fn test_identifier_from_path_outside_root() {
            let (_dir, storage) = storage();
            assert_eq!(
                storage.identifier_from_path(Path::new("/elsewhere/R1/photo.jpg")),
                None
            );
        }

        #[test]
        fn test_identifier_from_path_too_short() {
            let (_dir, storage) = storage();
            assert_eq!(storage.identifier_from_path(&storage.root().join("R1")), None);
            assert_eq!(storage.identifier_from_path(storage.root()), None);
        }

        #[test]
        fn test_identifier_from_path_rejects_parent_components() {
            let (_dir, storage) = storage();
            let path = storage.root().join("..").join("R1").join("x");
            assert_eq!(storage.identifier_from_path(&path), None);
        }
    }

    mod content_tests {
        use super::*;

        #[tokio::test]
        async fn test_import_copies_content() {
            let (dir, storage) = storage();
            let source = dir.path().join("source.txt");
            fs::write(&source, b"hello").unwrap();

            let (path, copied) = storage
                .import_file(&source, &id("T1"), "a.txt")
                .await
                .unwrap();
            assert_eq!(copied, 5);
            assert_eq!(fs::read(&path).unwrap(), b"hello");
        }

        #[tokio::test]
        async fn test_move_item_dir() {
            let (dir, storage) = storage();
            let source = dir.path().join("source.txt");
            fs::write(&source, b"data").unwrap();
            storage
                .import_file(&source, &id("T1"), "a.txt")
                .await
                .unwrap();

            storage.move_item_dir(&id("T1"), &id("R1")).unwrap();

            assert!(!storage.item_dir(&id("T1")).exists());
            assert_eq!(
                fs::read(storage.content_path(&id("R1"), "a.txt")).unwrap(),
                b"data"
            );
        }

        #[test]
        fn test_move_missing_dir_is_noop() {
            let (_dir, storage) = storage();
            storage.move_item_dir(&id("T1"), &id("R1")).unwrap();
            assert!(!storage.item_dir(&id("R1")).exists());
        }

        #[test]
        fn test_placeholder_is_empty() {
            let (_dir, storage) = storage();
            let path = storage.write_placeholder(&id("R1"), "a.txt").unwrap();
            assert_eq!(fs::metadata(path).unwrap().len(), 0);
        }

        #[test]
        fn test_remove_is_idempotent() {
            let (_dir, storage) = storage();
            storage.write_placeholder(&id("R1"), "a.txt").unwrap();
            storage.remove_content(&id("R1"), "a.txt").unwrap();
            storage.remove_content(&id("R1"), "a.txt").unwrap();
            storage.remove_partial(&id("R1"), "a.txt").unwrap();
            assert!(!storage.content_path(&id("R1"), "a.txt").exists());
        }
    }
}
