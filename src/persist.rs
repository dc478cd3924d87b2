//! Durable snapshot record. A partial snapshot is rewritten synchronously
//! after every committed mutation so a returning user keeps their session
//! while it is still valid at the provider.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AuthError;
use crate::model::{Identity, Profile, Session, Snapshot};

/// The subset of the snapshot that survives process restarts. `loading` is
/// deliberately absent; it is transient by definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    pub identity: Option<Identity>,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub initialized: bool,
}

impl PersistedState {
    pub fn from_snapshot(snap: &Snapshot) -> Self {
        Self {
            identity: snap.identity.clone(),
            session: snap.session.clone(),
            profile: snap.profile.clone(),
            test_mode: snap.test_mode,
            initialized: snap.initialized,
        }
    }
}

/// File-backed store for [`PersistedState`]. Writes go through a temp file
/// and rename so a crash mid-write never leaves a torn record.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record; a missing file is a normal empty state, a
    /// corrupt one is discarded with a warning rather than failing startup.
    pub fn load(&self) -> PersistedState {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(_) => return PersistedState::default(),
        };
        match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    "auth.persist discarding unreadable snapshot file {}: {}",
                    self.path.display(),
                    e
                );
                PersistedState::default()
            }
        }
    }

    pub fn save(&self, state: &PersistedState) -> Result<(), AuthError> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| AuthError::persist(format!("encode snapshot: {}", e)))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AuthError::persist(format!("create {}: {}", parent.display(), e)))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json)
            .map_err(|e| AuthError::persist(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| AuthError::persist(format!("commit {}: {}", self.path.display(), e)))?;
        Ok(())
    }
}
