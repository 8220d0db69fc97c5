// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk credential material, one directory per session.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use palaver_core::PalaverError;

/// File holding the opaque credential blob inside a session directory.
pub const CREDENTIALS_FILE: &str = "creds.json";

fn io_err(e: std::io::Error) -> PalaverError {
    PalaverError::Storage {
        source: Box::new(e),
    }
}

/// `<auth_dir>/<session_id>`.
pub fn session_dir(auth_dir: &Path, session_id: &str) -> PathBuf {
    auth_dir.join(session_id)
}

/// Overwrites the stored credentials, creating the directory if needed.
pub async fn store(dir: &Path, data: &[u8]) -> Result<(), PalaverError> {
    tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    let tmp = dir.join(format!("{CREDENTIALS_FILE}.tmp"));
    tokio::fs::write(&tmp, data).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, dir.join(CREDENTIALS_FILE))
        .await
        .map_err(io_err)
}

/// Stored credentials, or `None` for a session that never paired.
pub async fn load(dir: &Path) -> Result<Option<Vec<u8>>, PalaverError> {
    match tokio::fs::read(dir.join(CREDENTIALS_FILE)).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(e)),
    }
}

/// Removes the whole session directory. A missing directory is not an error.
pub async fn remove(dir: &Path) -> Result<(), PalaverError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(e)),
    }
}
