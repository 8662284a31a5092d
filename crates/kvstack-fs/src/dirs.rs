use std::fmt::{self, Debug};
use std::fs;

use kvstack_core::traits::{describe_wrapper, KeyIter};
use kvstack_core::{Collection, Describe, Persister, Reader, StoreError, StoreResult, Transform};
use tracing::debug;

use crate::local::FolderKeyed;

/// Creates the parent folders of a key before writing it.
///
/// Keys the inner store refuses fail before any folder is created.
pub struct MakeMissingDirs<S> {
    store: S,
}

impl<S> MakeMissingDirs<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: Collection> Collection for MakeMissingDirs<S> {
    type Key = S::Key;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, S::Key>> {
        self.store.iter_keys()
    }

    fn contains(&self, key: &S::Key) -> StoreResult<bool> {
        self.store.contains(key)
    }

    fn len(&self) -> StoreResult<usize> {
        self.store.len()
    }
}

impl<S: Reader> Reader for MakeMissingDirs<S> {
    type Value = S::Value;

    fn get(&self, key: &S::Key) -> StoreResult<S::Value> {
        self.store.get(key)
    }
}

impl<S: Persister + FolderKeyed> Persister for MakeMissingDirs<S> {
    fn set(&self, key: S::Key, value: S::Value) -> StoreResult<()> {
        if let Some(folder) = self.store.folder_of(&key)? {
            if !folder.is_dir() {
                fs::create_dir_all(&folder).map_err(|e| {
                    StoreError::backend(format!("creating {}", folder.display()), e)
                })?;
                debug!(folder = %folder.display(), "created missing folders");
            }
        }
        self.store.set(key, value)
    }

    fn delete(&self, key: &S::Key) -> StoreResult<()> {
        self.store.delete(key)
    }
}

impl<S: Describe> Describe for MakeMissingDirs<S> {
    fn layer_name(&self) -> &'static str {
        "MakeMissingDirs"
    }

    fn describe(&self) -> String {
        describe_wrapper(self.layer_name(), &self.store)
    }
}

impl<S: Debug> Debug for MakeMissingDirs<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MakeMissingDirs").field("store", &self.store).finish()
    }
}

/// Reusable form of [`MakeMissingDirs`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeMissingDirsLayer;

impl<S: FolderKeyed> Transform<S> for MakeMissingDirsLayer {
    type Output = MakeMissingDirs<S>;

    fn apply(&self, store: S) -> MakeMissingDirs<S> {
        MakeMissingDirs::new(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{relative_files, LocalFiles, TextMode};
    use kvstack_core::{Chain, NoOverwriteLayer, StoreExt};
    use tempfile::tempdir;

    #[test]
    fn creates_parents_then_writes() {
        let dir = tempdir().unwrap();
        let files = MakeMissingDirs::new(LocalFiles::<TextMode>::new(dir.path()).unwrap());
        let key = format!("{}x/y/z.txt", files.inner().rootdir());

        files.set(key.clone(), "deep".into()).unwrap();
        assert!(dir.path().join("x/y").is_dir());
        assert_eq!(files.get(&key).unwrap(), "deep");

        // Existing folders are fine too.
        files.set(format!("{}x/w.txt", files.inner().rootdir()), "w".into()).unwrap();
        assert_eq!(files.len().unwrap(), 2);
    }

    #[test]
    fn works_through_relative_keys() {
        let dir = tempdir().unwrap();
        let files = relative_files::<TextMode>(dir.path())
            .unwrap()
            .layer(&MakeMissingDirsLayer);
        files.set("a/b/c".into(), "v".into()).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a/b/c")).unwrap(), "v");
        assert_eq!(files.keys().unwrap(), vec!["a/b/c"]);
        assert_eq!(files.describe(), "MakeMissingDirs<RelativePaths<LocalFiles>>");
    }

    #[test]
    fn invalid_keys_create_nothing() {
        let dir = tempdir().unwrap();
        let files = MakeMissingDirs::new(
            LocalFiles::<TextMode>::new(dir.path())
                .unwrap()
                .with_template("{name}.json")
                .unwrap(),
        );
        let key = format!("{}sub/deeper/x.txt", files.inner().rootdir());
        assert!(matches!(
            files.set(key, "v".into()),
            Err(StoreError::KeyNotValid { .. })
        ));
        assert!(!dir.path().join("sub").exists());

        let relative = relative_files::<TextMode>(dir.path())
            .unwrap()
            .layer(&MakeMissingDirsLayer);
        assert!(matches!(
            relative.set("new/../../up".into(), "v".into()),
            Err(StoreError::KeyNotValid { .. })
        ));
        assert!(!dir.path().join("new").exists());
    }

    #[test]
    fn stacks_with_core_layers() {
        let dir = tempdir().unwrap();
        let stack = Chain::new(MakeMissingDirsLayer, NoOverwriteLayer);
        let files = stack.apply(relative_files::<TextMode>(dir.path()).unwrap());
        files.set("n/1".into(), "first".into()).unwrap();
        assert!(matches!(
            files.set("n/1".into(), "second".into()),
            Err(StoreError::OverwriteForbidden { .. })
        ));
        assert_eq!(files.get(&"n/1".to_string()).unwrap(), "first");
    }
}
