//! Fetching of external entities and external DTD subsets.
//!
//! A resolver is only invoked after the [`ExternalResolutionPolicy`] permitted
//! the fetch. Its errors abort the parse.
//!
//! [`ExternalResolutionPolicy`]: crate::ExternalResolutionPolicy

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::dtd::ExternalId;

/// Loads the raw bytes an external identifier refers to.
pub trait EntityResolver {
    fn fetch(&mut self, external_id: &ExternalId) -> io::Result<Vec<u8>>;
}

impl<F> EntityResolver for F
where
    F: FnMut(&ExternalId) -> io::Result<Vec<u8>>,
{
    fn fetch(&mut self, external_id: &ExternalId) -> io::Result<Vec<u8>> {
        (self)(external_id)
    }
}

/// Resolver that fails every fetch.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoResolver;

impl EntityResolver for NoResolver {
    fn fetch(&mut self, external_id: &ExternalId) -> io::Result<Vec<u8>> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no entity resolver configured for {}", external_id),
        ))
    }
}

/// Resolves system identifiers as relative paths or `file:` URLs below a
/// base directory.
///
/// Identifiers with another URL scheme, absolute paths and paths escaping
/// the base directory are rejected.
#[derive(Clone, Debug)]
pub struct FileResolver {
    base: PathBuf,
}

impl FileResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn locate(&self, system_id: &str) -> io::Result<PathBuf> {
        let relative = match system_id.strip_prefix("file:") {
            Some(rest) => rest.trim_start_matches("//"),
            None if system_id.contains("://") => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported system identifier {}", system_id),
                ))
            }
            None => system_id,
        };

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("system identifier {} leaves {}", system_id, self.base.display()),
            ));
        }
        Ok(self.base.join(relative))
    }
}

impl EntityResolver for FileResolver {
    fn fetch(&mut self, external_id: &ExternalId) -> io::Result<Vec<u8>> {
        let path = self.locate(external_id.system_id())?;
        debug!("reading {} for {}", path.display(), external_id);
        fs::read(path)
    }
}
