use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use kvstack_core::traits::KeyIter;
use kvstack_core::{
    Collection, Describe, PathTemplate, Persister, Reader, RelativePaths, StoreError, StoreResult,
    TemplateError,
};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{ConfigError, FileModeKind, LocalFilesConfig};

/// Conversion between file contents and store values.
pub trait FileMode {
    type Value;
    const KIND: FileModeKind;

    fn decode(key: &str, bytes: Vec<u8>) -> StoreResult<Self::Value>;
    fn encode(value: &Self::Value) -> &[u8];
}

/// Files as UTF-8 strings.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextMode;

/// Files as raw bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryMode;

impl FileMode for TextMode {
    type Value = String;
    const KIND: FileModeKind = FileModeKind::Text;

    fn decode(key: &str, bytes: Vec<u8>) -> StoreResult<String> {
        String::from_utf8(bytes).map_err(|e| StoreError::Codec(format!("{key}: {e}")))
    }

    fn encode(value: &String) -> &[u8] {
        value.as_bytes()
    }
}

impl FileMode for BinaryMode {
    type Value = Vec<u8>;
    const KIND: FileModeKind = FileModeKind::Binary;

    fn decode(_key: &str, bytes: Vec<u8>) -> StoreResult<Vec<u8>> {
        Ok(bytes)
    }

    fn encode(value: &Vec<u8>) -> &[u8] {
        value
    }
}

/// Name of the catch-all field used when no template is given.
const ANY_PATH_FIELD: &str = "path";

/// Files under a root directory as a key-value store.
///
/// Keys are absolute paths (`rootdir` followed by a relative path) that
/// match the store's path template; values are file contents. Iteration
/// walks `rootdir` in file-name order, down to `max_levels` levels of
/// subdirectories, and yields regular files whose path matches.
///
/// `set` requires the parent directory to exist and fails with
/// `FolderNotFound` otherwise; see [`MakeMissingDirs`](crate::MakeMissingDirs).
pub struct LocalFiles<M = TextMode> {
    rootdir: String,
    template: PathTemplate,
    max_levels: Option<usize>,
    buffering: usize,
    mode: PhantomData<fn() -> M>,
}

impl<M: FileMode> LocalFiles<M> {
    /// Every file under the existing directory `rootdir`.
    pub fn new(rootdir: impl AsRef<Path>) -> StoreResult<Self> {
        let root = rootdir.as_ref();
        if !root.is_dir() {
            return Err(StoreError::FolderNotFound {
                key: format!("{root:?}"),
                folder: root.to_path_buf(),
            });
        }
        let mut rootdir = root
            .to_str()
            .ok_or_else(|| StoreError::key_not_valid(&root, "root directory is not UTF-8"))?
            .trim_end_matches('/')
            .to_string();
        rootdir.push('/');

        let template = rooted_template(&rootdir, &format!("{{{ANY_PATH_FIELD}}}"))
            .and_then(|t| t.with_field_pattern(ANY_PATH_FIELD, ".+"))
            .map_err(|e| StoreError::key_not_valid(&rootdir, e.to_string()))?;

        Ok(Self {
            rootdir,
            template,
            max_levels: None,
            buffering: LocalFilesConfig::default().buffering,
            mode: PhantomData,
        })
    }

    /// Build from settings. The configured mode must be `M`'s.
    pub fn from_config(config: &LocalFilesConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.mode != M::KIND {
            return Err(ConfigError::ModeMismatch {
                configured: config.mode,
                requested: M::KIND,
            });
        }
        let mut files = Self::new(&config.rootdir)?;
        if let Some(template) = &config.template {
            files = files.with_template(template)?;
        }
        Ok(files
            .with_max_levels(config.max_levels)
            .with_buffering(config.buffering))
    }

    /// Only accept paths matching `template`, given relative to `rootdir`.
    pub fn with_template(mut self, template: &str) -> Result<Self, TemplateError> {
        self.template = rooted_template(&self.rootdir, template)?;
        Ok(self)
    }

    pub fn with_max_levels(mut self, max_levels: Option<usize>) -> Self {
        self.max_levels = max_levels;
        self
    }

    /// Write buffer capacity in bytes.
    pub fn with_buffering(mut self, capacity: usize) -> Self {
        self.buffering = capacity;
        self
    }
}

impl<M> LocalFiles<M> {
    /// The root directory, always ending with `/`.
    pub fn rootdir(&self) -> &str {
        &self.rootdir
    }

    /// The absolute-path template keys must match.
    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// The key must match the template and name a path strictly below
    /// `rootdir`, without `.`, `..` or empty segments.
    fn check_key(&self, key: &str) -> StoreResult<()> {
        if !self.template.is_valid(key) {
            return Err(StoreError::key_not_valid(
                &key,
                format!("does not match {:?}", self.template.as_str()),
            ));
        }
        let below_root = key
            .strip_prefix(self.rootdir.as_str())
            .is_some_and(|rel| !rel.split('/').any(|seg| matches!(seg, "" | "." | "..")));
        if below_root {
            Ok(())
        } else {
            Err(StoreError::key_not_valid(
                &key,
                format!("not a plain path below {:?}", self.rootdir),
            ))
        }
    }
}

fn rooted_template(rootdir: &str, relative: &str) -> Result<PathTemplate, TemplateError> {
    let root = rootdir.replace('{', "{{").replace('}', "}}");
    PathTemplate::new(&format!("{root}{relative}"))
}

fn read_error(key: &str, err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::key_not_found(&key),
        _ => StoreError::backend(format!("reading {key}"), err),
    }
}

fn folder_not_found(key: &str, folder: &Path) -> StoreError {
    StoreError::FolderNotFound {
        key: format!("{key:?}"),
        folder: folder.to_path_buf(),
    }
}

impl<M> Collection for LocalFiles<M> {
    type Key = String;

    fn iter_keys(&self) -> StoreResult<KeyIter<'_, String>> {
        let mut walker = WalkDir::new(&self.rootdir).min_depth(1).sort_by_file_name();
        if let Some(levels) = self.max_levels {
            walker = walker.max_depth(levels + 1);
        }
        let template = &self.template;
        Ok(Box::new(walker.into_iter().filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(StoreError::backend("walking root directory", e))),
            };
            // Follows symlinks, like `contains`.
            if !entry.path().is_file() {
                return None;
            }
            // Non-UTF-8 names cannot be keys.
            let path = entry.path().to_str()?;
            template.is_valid(path).then(|| Ok(path.to_string()))
        })))
    }

    fn contains(&self, key: &String) -> StoreResult<bool> {
        Ok(self.check_key(key).is_ok() && Path::new(key).is_file())
    }
}

impl<M: FileMode> Reader for LocalFiles<M> {
    type Value = M::Value;

    fn get(&self, key: &String) -> StoreResult<M::Value> {
        self.check_key(key)?;
        if Path::new(key).is_dir() {
            return Err(StoreError::key_not_found(key));
        }
        let bytes = fs::read(key).map_err(|e| read_error(key, e))?;
        M::decode(key, bytes)
    }
}

impl<M: FileMode> Persister for LocalFiles<M> {
    fn set(&self, key: String, value: M::Value) -> StoreResult<()> {
        self.check_key(&key)?;
        let path = Path::new(&key);
        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        if !parent.is_dir() {
            return Err(folder_not_found(&key, parent));
        }

        let file = File::create(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => folder_not_found(&key, parent),
            _ => StoreError::backend(format!("creating {key}"), e),
        })?;
        let bytes = M::encode(&value);
        let mut writer = BufWriter::with_capacity(self.buffering, file);
        writer
            .write_all(bytes)
            .and_then(|()| writer.flush())
            .map_err(|e| StoreError::backend(format!("writing {key}"), e))?;

        debug!(path = %key, bytes = bytes.len(), "wrote file");
        Ok(())
    }

    fn delete(&self, key: &String) -> StoreResult<()> {
        self.check_key(key)?;
        fs::remove_file(key).map_err(|e| read_error(key, e))?;
        debug!(path = %key, "deleted file");
        Ok(())
    }
}

impl<M> Describe for LocalFiles<M> {
    fn layer_name(&self) -> &'static str {
        "LocalFiles"
    }
}

impl<M> Clone for LocalFiles<M> {
    fn clone(&self) -> Self {
        Self {
            rootdir: self.rootdir.clone(),
            template: self.template.clone(),
            max_levels: self.max_levels,
            buffering: self.buffering,
            mode: PhantomData,
        }
    }
}

impl<M> fmt::Debug for LocalFiles<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFiles")
            .field("rootdir", &self.rootdir)
            .field("template", &self.template.as_str())
            .field("max_levels", &self.max_levels)
            .finish()
    }
}

/// Files under `rootdir`, keyed by their path relative to it.
pub fn relative_files<M: FileMode>(
    rootdir: impl AsRef<Path>,
) -> StoreResult<RelativePaths<LocalFiles<M>>> {
    let files = LocalFiles::new(rootdir)?;
    let prefix = files.rootdir().to_string();
    Ok(RelativePaths::new(files, prefix))
}

/// Stores whose keys live in filesystem folders.
pub trait FolderKeyed: Collection {
    /// The folder that must exist before `key` can be written.
    ///
    /// Fails with `KeyNotValid` if the store would refuse `key`, so nothing
    /// is created for a write that cannot happen.
    fn folder_of(&self, key: &Self::Key) -> StoreResult<Option<PathBuf>>;
}

impl<M> FolderKeyed for LocalFiles<M> {
    fn folder_of(&self, key: &String) -> StoreResult<Option<PathBuf>> {
        self.check_key(key)?;
        Ok(Path::new(key).parent().map(Path::to_path_buf))
    }
}

impl<S> FolderKeyed for RelativePaths<S>
where
    S: FolderKeyed + Collection<Key = String>,
{
    fn folder_of(&self, key: &String) -> StoreResult<Option<PathBuf>> {
        self.inner().folder_of(&self.id_of_key(key))
    }
}

impl<S: FolderKeyed + ?Sized> FolderKeyed for std::sync::Arc<S> {
    fn folder_of(&self, key: &S::Key) -> StoreResult<Option<PathBuf>> {
        (**self).folder_of(key)
    }
}
