//! Persisted model state.
//!
//! The isolation forest itself is not serialized; its training rows are,
//! and loading refits the forest from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::features::TrustRow;
use crate::standardize::Standardizer;

/// File name of the snapshot inside the model directory.
pub const SNAPSHOT_FILE: &str = "models.json";

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized model state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Format version.
    pub version: u32,
    /// When training finished.
    pub trained_at: DateTime<Utc>,
    /// Whether training fell back to random baseline rows.
    pub baseline: bool,
    /// Scaler for behavior vectors.
    pub trust_scaler: Standardizer,
    /// Scaler for delivery vectors.
    pub fraud_scaler: Standardizer,
    /// Standardized rows the forest was fitted on.
    pub trust_rows: Vec<TrustRow>,
}

impl ModelSnapshot {
    /// Path of the snapshot file under `dir`.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(SNAPSHOT_FILE)
    }

    /// Write to `<dir>/models.json`, creating `dir` if needed.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = Self::path_in(dir);
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    /// Read `<dir>/models.json`.
    pub fn load(dir: &Path) -> Result<Self> {
        let bytes = fs::read(Self::path_in(dir))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
