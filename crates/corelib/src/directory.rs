//! Membership directory.
//!
//! The directory is a flat set of node tokens (`host#port#id`). It knows
//! nothing about ownership; the ring parses and orders what it lists.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Append/remove/list store of node tokens.
pub trait MembershipDirectory: Send + Sync + 'static {
    /// All tokens currently registered.
    fn list(&self) -> Result<Vec<String>>;

    /// Registers a token. Fails if it is already present.
    fn add(&self, token: &str) -> Result<()>;

    /// Deregisters a token. Fails if it is not present.
    fn remove(&self, token: &str) -> Result<()>;
}

impl<D: MembershipDirectory + ?Sized> MembershipDirectory for Arc<D> {
    fn list(&self) -> Result<Vec<String>> {
        (**self).list()
    }

    fn add(&self, token: &str) -> Result<()> {
        (**self).add(token)
    }

    fn remove(&self, token: &str) -> Result<()> {
        (**self).remove(token)
    }
}

/// Directory backed by one empty file per token inside a shared folder.
#[derive(Debug, Clone)]
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    /// Opens (creating if necessary) the folder at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            Error::directory(format!("unable to create {}", root.display()), Some(e.into()))
        })?;

        let metadata = fs::metadata(&root).map_err(|e| {
            Error::directory(format!("unable to stat {}", root.display()), Some(e.into()))
        })?;
        if !metadata.is_dir() {
            return Err(Error::directory(
                format!("{} is not a directory", root.display()),
                None,
            ));
        }
        if metadata.permissions().readonly() {
            return Err(Error::directory(
                format!("{} is not writable", root.display()),
                None,
            ));
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MembershipDirectory for FsDirectory {
    fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::directory(format!("unable to list {}", self.root.display()), Some(e.into()))
        })?;

        let mut tokens = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::directory("unable to read directory entry", Some(e.into())))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                tokens.push(name.to_string());
            }
        }
        Ok(tokens)
    }

    fn add(&self, token: &str) -> Result<()> {
        let path = self.root.join(token);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!("Registered {} in {}", token, self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(Error::directory(
                format!("token {} is already registered", token),
                Some(e.into()),
            )),
            Err(e) => Err(Error::directory(
                format!("unable to create {}", path.display()),
                Some(e.into()),
            )),
        }
    }

    fn remove(&self, token: &str) -> Result<()> {
        let path = self.root.join(token);
        fs::remove_file(&path).map_err(|e| {
            Error::directory(format!("unable to delete {}", path.display()), Some(e.into()))
        })?;
        debug!("Deregistered {} from {}", token, self.root.display());
        Ok(())
    }
}

/// In-process directory, shared by cloning.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    tokens: Arc<Mutex<BTreeSet<String>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MembershipDirectory for MemoryDirectory {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self.tokens.lock().iter().cloned().collect())
    }

    fn add(&self, token: &str) -> Result<()> {
        if !self.tokens.lock().insert(token.to_string()) {
            return Err(Error::directory(
                format!("token {} is already registered", token),
                None,
            ));
        }
        Ok(())
    }

    fn remove(&self, token: &str) -> Result<()> {
        if !self.tokens.lock().remove(token) {
            return Err(Error::directory(
                format!("token {} is not registered", token),
                None,
            ));
        }
        Ok(())
    }
}
