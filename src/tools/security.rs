//! Security layer: path confinement and command filtering
//!
//! Both guards are decision functions over read-only startup configuration.
//! They never perform the guarded operation themselves; the executor calls
//! them first and only touches disk or spawns a process on success.
//!
//! - `PathGuard`: confinement root, writable zones, forbidden extensions
//! - `CommandGuard`: deny-fragment list (checked first) plus allow-prefix list

use crate::config::CommandConfig;
use crate::errors::{AgentError, GuardError, Result};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// What the caller intends to do with a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathIntent {
    Read,
    /// Write, append, or delete
    Write,
}

/// Path confinement manager
#[derive(Debug, Clone)]
pub struct PathGuard {
    /// Canonicalized confinement root
    root: PathBuf,

    /// Resolved writable subtrees, all under `root`
    writable_zones: Vec<PathBuf>,

    /// Lowercase extensions with a leading dot
    forbidden_extensions: HashSet<String>,
}

impl PathGuard {
    /// Create a guard confined to `root` with no writable zones
    ///
    /// The root must exist; it is canonicalized once here so that every later
    /// comparison is against a symlink-free absolute path.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();

        if !root.exists() {
            return Err(AgentError::ConfigError(format!(
                "Confinement root does not exist: {}",
                root.display()
            )));
        }

        let root = root.canonicalize().map_err(|e| {
            AgentError::ConfigError(format!("Failed to canonicalize confinement root: {}", e))
        })?;

        Ok(Self {
            root,
            writable_zones: Vec::new(),
            forbidden_extensions: HashSet::new(),
        })
    }

    /// Add writable zones; relative entries are taken relative to the root
    ///
    /// Zones need not exist yet, but each must resolve under the root.
    pub fn with_writable_zones<I, P>(mut self, zones: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for zone in zones {
            let zone = zone.as_ref();
            let resolved = self
                .resolve(zone)
                .filter(|p| p.starts_with(&self.root))
                .ok_or_else(|| {
                    AgentError::ConfigError(format!(
                        "Writable zone is outside the confinement root: {}",
                        zone.display()
                    ))
                })?;
            if !self.writable_zones.contains(&resolved) {
                self.writable_zones.push(resolved);
            }
        }
        Ok(self)
    }

    /// Set extensions that may never be written (case-insensitive, dot optional)
    pub fn with_forbidden_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.forbidden_extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| ext.len() > 1)
            .collect();
        self
    }

    /// Authorize `path` for `intent` and return its resolved form
    ///
    /// Checks, in order:
    /// 1. resolved path under the root, else `OutsideRoot`
    /// 2. (write) under a writable zone, else `ZoneDenied`
    /// 3. (write) extension not forbidden, else `ExtensionDenied`
    pub fn authorize(
        &self,
        path: impl AsRef<Path>,
        intent: PathIntent,
    ) -> std::result::Result<PathBuf, GuardError> {
        let path = path.as_ref();

        let resolved = match self.resolve(path) {
            Some(p) if p.starts_with(&self.root) => p,
            Some(p) => return Err(GuardError::OutsideRoot { path: p }),
            None => {
                return Err(GuardError::OutsideRoot {
                    path: path.to_path_buf(),
                })
            }
        };

        if intent == PathIntent::Read {
            return Ok(resolved);
        }

        if !self
            .writable_zones
            .iter()
            .any(|zone| resolved.starts_with(zone))
        {
            return Err(GuardError::ZoneDenied { path: resolved });
        }

        if let Some(extension) = resolved.extension() {
            let extension = normalize_extension(&extension.to_string_lossy());
            if self.forbidden_extensions.contains(&extension) {
                return Err(GuardError::ExtensionDenied {
                    path: resolved,
                    extension,
                });
            }
        }

        Ok(resolved)
    }

    /// Resolve to an absolute, symlink-free path
    ///
    /// Walks the path one component at a time. Every component that exists is
    /// canonicalized before the next one is applied, so a `..` can never step
    /// over a symlink that has not been resolved. Missing components are kept
    /// lexically. Returns `None` when an existing entry cannot be resolved,
    /// such as a dangling symlink, since its target is unknown.
    fn resolve(&self, path: &Path) -> Option<PathBuf> {
        let full_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let mut resolved = PathBuf::new();
        for component in full_path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::Normal(name) => {
                    let candidate = resolved.join(name);
                    match std::fs::symlink_metadata(&candidate) {
                        Ok(_) => resolved = candidate.canonicalize().ok()?,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                            resolved = candidate
                        }
                        Err(_) => return None,
                    }
                }
            }
        }

        Some(resolved)
    }

    /// Get confinement root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get resolved writable zones
    pub fn writable_zones(&self) -> &[PathBuf] {
        &self.writable_zones
    }

    /// Path relative to the root, for display in tool payloads
    pub fn relative_to_root<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().to_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{}", trimmed)
    }
}

/// Allow-list plus deny-list command filter
///
/// This is a coarse substring filter, not a shell parser. It cannot stop
/// every form of chaining or injection that fits inside an allowed prefix;
/// treat it as one layer of defense alongside the path guard and timeouts.
#[derive(Debug, Clone)]
pub struct CommandGuard {
    allow_prefixes: Vec<String>,

    /// Stored lowercase
    deny_fragments: Vec<String>,
}

impl CommandGuard {
    pub fn new<A, D>(allow_prefixes: A, deny_fragments: D) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            allow_prefixes: allow_prefixes.into_iter().map(Into::into).collect(),
            deny_fragments: deny_fragments
                .into_iter()
                .map(|f| f.as_ref().to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &CommandConfig) -> Self {
        Self::new(
            config.allow_prefixes.iter().cloned(),
            config.deny_fragments.iter(),
        )
    }

    /// Authorize a command string
    ///
    /// Deny takes precedence: a command containing a denied fragment fails
    /// with `ForbiddenFragment` even when it starts with an allowed prefix.
    pub fn authorize(&self, command: &str) -> std::result::Result<(), GuardError> {
        let lowered = command.to_lowercase();

        if let Some(fragment) = self
            .deny_fragments
            .iter()
            .find(|fragment| lowered.contains(fragment.as_str()))
        {
            return Err(GuardError::ForbiddenFragment {
                fragment: fragment.clone(),
            });
        }

        if !self
            .allow_prefixes
            .iter()
            .any(|prefix| command.starts_with(prefix.as_str()))
        {
            return Err(GuardError::NotWhitelisted {
                allowed: self.allow_prefixes.clone(),
            });
        }

        Ok(())
    }

    pub fn allow_prefixes(&self) -> &[String] {
        &self.allow_prefixes
    }

    pub fn deny_fragments(&self) -> &[String] {
        &self.deny_fragments
    }
}

impl Default for CommandGuard {
    fn default() -> Self {
        Self::from_config(&CommandConfig::default())
    }
}
