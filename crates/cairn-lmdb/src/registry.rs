use cairn_core::{
    config::EnvironmentConfig,
    error::{CairnError, Result},
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::env::LmdbEnvironment;

/// One open environment per canonical directory
///
/// LMDB must not be opened twice on the same directory within a process,
/// so all opens should go through a single registry owned by the
/// application.
#[derive(Default)]
pub struct EnvironmentRegistry {
    envs: RefCell<HashMap<PathBuf, LmdbEnvironment>>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the open environment for `config.path`, opening it if needed
    ///
    /// Relative paths are resolved against the working directory and the
    /// directory is created when missing. When an environment is already
    /// open for the path, `config` is ignored and the live handle returned.
    pub fn open(&self, config: EnvironmentConfig) -> Result<LmdbEnvironment> {
        config.validate()?;
        let path = canonical_path(&config.path)?;

        let mut envs = self.envs.borrow_mut();
        if let Some(env) = envs.get(&path) {
            if !env.is_closed() {
                tracing::debug!("Registry hit for {}", path.display());
                return Ok(env.clone());
            }
            if env.engine_pinned() {
                return Err(CairnError::InvalidState(format!(
                    "environment at {} is closed but still held by an open snapshot",
                    path.display()
                )));
            }
        }

        let env = LmdbEnvironment::open(path.clone(), config)?;
        envs.insert(path, env.clone());
        Ok(env)
    }

    /// Live environment for `path`, if one is open
    pub fn get(&self, path: impl AsRef<Path>) -> Option<LmdbEnvironment> {
        let path = path.as_ref().canonicalize().ok()?;
        self.envs
            .borrow()
            .get(&path)
            .filter(|env| !env.is_closed())
            .cloned()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.get(path).is_some()
    }

    /// Number of live environments
    pub fn len(&self) -> usize {
        self.envs
            .borrow()
            .values()
            .filter(|env| !env.is_closed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical paths of live environments, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self
            .envs
            .borrow()
            .iter()
            .filter(|(_, env)| !env.is_closed())
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Close the environment at `path` and forget it
    ///
    /// Returns false when no environment was registered for the path.
    pub fn close(&self, path: impl AsRef<Path>) -> Result<bool> {
        let Ok(path) = path.as_ref().canonicalize() else {
            return Ok(false);
        };
        let removed = self.envs.borrow_mut().remove(&path);
        match removed {
            Some(env) => {
                env.close()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close every registered environment
    ///
    /// Every environment is closed even if one fails; the first error is
    /// returned.
    pub fn close_all(&self) -> Result<()> {
        let envs: Vec<_> = self.envs.borrow_mut().drain().map(|(_, env)| env).collect();
        let mut first_err = None;
        for env in envs {
            if let Err(e) = env.close() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

fn canonical_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    std::fs::create_dir_all(&absolute)?;
    Ok(absolute.canonicalize()?)
}
