//! File-backed [`StatePort`].

use std::path::{Path, PathBuf};

use crate::app::ports::StatePort;
use crate::error::PersistError;
use crate::persistence::{self, PersistedState};

pub struct FileStateStore {
    path: PathBuf,
    fsync: bool,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>, fsync: bool) -> Self {
        Self {
            path: path.into(),
            fsync,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatePort for FileStateStore {
    fn save(&mut self, state: &PersistedState) -> Result<(), PersistError> {
        persistence::save(state, &self.path, self.fsync)
    }

    fn load(&self) -> Option<PersistedState> {
        persistence::load(&self.path)
    }
}
