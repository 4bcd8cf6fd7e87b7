use crate::adapters::external::ExternalModule;
use crate::adapters::native::NativeModule;
use crate::adapters::registry::ModuleRegistry;
use crate::domain::model::ModulePath;
use crate::domain::ports::{Module, ModuleSource};
use crate::utils::error::{InvokeError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a candidate file on disk gets loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Native,
    External,
}

/// Resolves module paths against the registry and then a search root.
pub struct ModuleResolver {
    root: PathBuf,
    registry: ModuleRegistry,
}

impl ModuleResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registry: ModuleRegistry::new(),
        }
    }

    pub fn with_registry(mut self, registry: ModuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files that could hold `path`, in the order they are tried.
    pub fn candidates(&self, path: &ModulePath) -> Vec<(ModuleKind, PathBuf)> {
        let dir = self.root.join(path.parent_dir());
        let stem = path.stem();
        let ext = library_extension();

        let mut candidates = vec![
            (ModuleKind::Native, dir.join(format!("{}.{}", stem, ext))),
            (ModuleKind::Native, dir.join(format!("lib{}.{}", stem, ext))),
        ];
        if cfg!(target_os = "windows") {
            candidates.push((ModuleKind::External, dir.join(format!("{}.exe", stem))));
        } else {
            candidates.push((ModuleKind::External, dir.join(stem)));
        }
        candidates
    }

    fn load_from_disk(&self, path: &ModulePath) -> Result<Arc<dyn Module>> {
        let name = path.dotted();
        let mut last_error = None;

        for (kind, candidate) in self.candidates(path) {
            if !candidate.is_file() {
                continue;
            }

            let loaded: Result<Arc<dyn Module>> = match kind {
                ModuleKind::Native => {
                    NativeModule::load(&name, &candidate).map(|m| Arc::new(m) as Arc<dyn Module>)
                }
                ModuleKind::External => {
                    if !is_executable(&candidate) {
                        tracing::debug!("Skipping non-executable {}", candidate.display());
                        continue;
                    }
                    ExternalModule::load(&name, &candidate).map(|m| Arc::new(m) as Arc<dyn Module>)
                }
            };

            match loaded {
                Ok(module) => {
                    tracing::info!("📦 Loaded module {} from {}", name, candidate.display());
                    return Ok(module);
                }
                Err(e) => {
                    // 繼續嘗試下一個候選檔案
                    tracing::warn!("Load failed for {}: {}", candidate.display(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| InvokeError::ModuleNotFound {
            module: name,
            root: self.root.display().to_string(),
        }))
    }
}

impl ModuleSource for ModuleResolver {
    fn resolve(&self, path: &ModulePath) -> Result<Arc<dyn Module>> {
        if let Some(module) = self.registry.get(path) {
            tracing::debug!("Resolved {} from the module registry", path);
            return Ok(module);
        }
        self.load_from_disk(path)
    }
}

fn library_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
