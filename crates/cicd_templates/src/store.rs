//! Template storage access.
//!
//! A [`TemplateStore`] hands out raw template documents by key. Templates of
//! each kind live in their own directory (`workflows/`, `frameworks/`,
//! `languages/`) under a configurable root and are named `<name>.<ext>`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{TemplateError, TemplateResult};
use crate::template::{Template, TemplateFormat, TemplateKey, TemplateKind};

/// Default template root, relative to the working directory.
pub const DEFAULT_TEMPLATES_DIR: &str = "templates";

/// An undecoded template document.
#[derive(Debug, Clone)]
pub struct RawTemplate {
    pub key: TemplateKey,
    pub format: TemplateFormat,
    pub bytes: Vec<u8>,
    /// Where the document came from, for diagnostics
    pub source: String,
}

impl RawTemplate {
    pub fn decode(&self) -> TemplateResult<Template> {
        Template::decode(self.key.kind, self.format, &self.bytes)
    }
}

/// Read access to stored templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Read the document stored under `key`.
    async fn read(&self, key: &TemplateKey) -> TemplateResult<RawTemplate>;

    /// Names of all templates of `kind`.
    async fn list(&self, kind: TemplateKind) -> TemplateResult<Vec<String>>;

    /// Human-readable location of the store.
    fn location(&self) -> String;
}

fn check_name(name: &str) -> TemplateResult<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
    {
        return Err(TemplateError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Filesystem-backed template store.
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    root: PathBuf,
}

impl FsTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: TemplateKind) -> PathBuf {
        self.root.join(kind.directory())
    }
}

impl Default for FsTemplateStore {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATES_DIR)
    }
}

#[async_trait]
impl TemplateStore for FsTemplateStore {
    async fn read(&self, key: &TemplateKey) -> TemplateResult<RawTemplate> {
        check_name(&key.name)?;
        let dir = self.kind_dir(key.kind);

        for format in [TemplateFormat::Yaml, TemplateFormat::Json] {
            for ext in format.extensions() {
                let path = dir.join(format!("{}.{}", key.name, ext));
                match tokio::fs::read(&path).await {
                    Ok(bytes) => {
                        debug!("Read template {} from {:?}", key, path);
                        return Ok(RawTemplate {
                            key: key.clone(),
                            format,
                            bytes,
                            source: path.display().to_string(),
                        });
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(TemplateError::Io { path, source: e }),
                }
            }
        }

        Err(TemplateError::NotFound(key.clone()))
    }

    async fn list(&self, kind: TemplateKind) -> TemplateResult<Vec<String>> {
        let dir = self.kind_dir(kind);
        if !dir.exists() {
            warn!("Template directory does not exist: {:?}", dir);
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if TemplateFormat::from_extension(ext).is_none() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !names.iter().any(|n| n == stem) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-memory template store that counts reads per key.
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    documents: RwLock<HashMap<TemplateKey, (TemplateFormat, Vec<u8>)>>,
    reads: RwLock<HashMap<TemplateKey, usize>>,
    total_reads: AtomicUsize,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a YAML document under `kind`/`name`.
    pub fn insert_yaml(&self, kind: TemplateKind, name: impl Into<String>, yaml: impl Into<String>) {
        let key = TemplateKey::new(kind, name);
        self.documents
            .write()
            .insert(key, (TemplateFormat::Yaml, yaml.into().into_bytes()));
    }

    /// Store a JSON document under `kind`/`name`.
    pub fn insert_json(&self, kind: TemplateKind, name: impl Into<String>, json: impl Into<String>) {
        let key = TemplateKey::new(kind, name);
        self.documents
            .write()
            .insert(key, (TemplateFormat::Json, json.into().into_bytes()));
    }

    /// Serialize and store a template under `name`.
    pub fn insert_template(&self, name: impl Into<String>, template: &Template) -> TemplateResult<()> {
        let yaml = template.to_yaml()?;
        self.insert_yaml(template.kind(), name, yaml);
        Ok(())
    }

    pub fn with_yaml(self, kind: TemplateKind, name: impl Into<String>, yaml: impl Into<String>) -> Self {
        self.insert_yaml(kind, name, yaml);
        self
    }

    /// Number of `read` calls made for `kind`/`name`, found or not.
    pub fn read_count(&self, kind: TemplateKind, name: &str) -> usize {
        self.reads
            .read()
            .get(&TemplateKey::new(kind, name))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.total_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn read(&self, key: &TemplateKey) -> TemplateResult<RawTemplate> {
        self.total_reads.fetch_add(1, Ordering::SeqCst);
        *self.reads.write().entry(key.clone()).or_insert(0) += 1;

        check_name(&key.name)?;
        let documents = self.documents.read();
        let (format, bytes) = documents
            .get(key)
            .ok_or_else(|| TemplateError::NotFound(key.clone()))?;

        Ok(RawTemplate {
            key: key.clone(),
            format: *format,
            bytes: bytes.clone(),
            source: format!("memory://{}", key),
        })
    }

    async fn list(&self, kind: TemplateKind) -> TemplateResult<Vec<String>> {
        let mut names: Vec<String> = self
            .documents
            .read()
            .keys()
            .filter(|k| k.kind == kind)
            .map(|k| k.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
