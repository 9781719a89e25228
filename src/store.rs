use std::fs;
use std::io::Write;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::Connection;
use tempfile::Builder;

use crate::domain::{ArtifactKind, CompoundId};
use crate::error::SpiceError;
use crate::schema;

/// Location of the SQLite database and of the static root holding structure
/// files. Cheap to clone; every operation opens its own connection.
#[derive(Debug, Clone)]
pub struct Store {
    database: Utf8PathBuf,
    static_root: Utf8PathBuf,
}

impl Store {
    pub fn new(database: Utf8PathBuf, static_root: Utf8PathBuf) -> Self {
        Self {
            database,
            static_root,
        }
    }

    pub fn database(&self) -> &Utf8Path {
        &self.database
    }

    pub fn static_root(&self) -> &Utf8Path {
        &self.static_root
    }

    /// Opens the existing database. A missing file is an error; only
    /// [`Store::create`] may bring a new database into existence.
    pub fn connect(&self) -> Result<Connection, SpiceError> {
        if !self.database.as_std_path().is_file() {
            return Err(SpiceError::StoreNotFound(
                self.database.as_std_path().to_path_buf(),
            ));
        }
        let conn = Connection::open(self.database.as_std_path())?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(conn)
    }

    /// Opens the database, creating the file, its directory and the schema if needed.
    pub fn create(&self) -> Result<Connection, SpiceError> {
        if let Some(parent) = self.database.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| SpiceError::Filesystem(err.to_string()))?;
            }
        }
        let conn = Connection::open(self.database.as_std_path())?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::apply(&conn)?;
        Ok(conn)
    }

    pub fn artifact_dir(&self, kind: ArtifactKind) -> Utf8PathBuf {
        self.static_root.join("structures").join(kind.dir_name())
    }

    pub fn artifact_path(&self, kind: ArtifactKind, cid: CompoundId) -> Utf8PathBuf {
        self.artifact_dir(kind).join(kind.file_name(cid))
    }

    /// Path as stored in the database: relative to the static root, `/`-separated.
    pub fn artifact_relative(kind: ArtifactKind, cid: CompoundId) -> String {
        format!("structures/{}/{}", kind.dir_name(), kind.file_name(cid))
    }

    pub fn resolve_relative(&self, relative: &str) -> Utf8PathBuf {
        self.static_root.join(relative)
    }

    pub fn ensure_artifact_dirs(&self) -> Result<(), SpiceError> {
        for kind in ArtifactKind::ALL {
            fs::create_dir_all(self.artifact_dir(kind).as_std_path())
                .map_err(|err| SpiceError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }

    /// Writes `content` through a temporary file in the target directory so a
    /// reader never observes a half-written file.
    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), SpiceError> {
        let parent = path
            .parent()
            .ok_or_else(|| SpiceError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| SpiceError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".spicebase-download")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| SpiceError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| SpiceError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| SpiceError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// True when `path` exists and holds at least one byte.
    pub fn has_content(path: &Path) -> bool {
        fs::metadata(path)
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }
}
