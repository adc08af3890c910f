use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::types::{SpectralFrame, CHANNELS};

/// Label -> reference vector library, persisted as one JSON object.
///
/// Iteration is in label order, which is also the tie-break order used by the
/// classifier.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    path: PathBuf,
    entries: BTreeMap<String, SpectralFrame>,
}

impl FingerprintStore {
    /// Empty store bound to `path`. Nothing is read or written.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Loads the store, degrading to an empty one when the file is missing or corrupt.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(store) => {
                info!("Loaded {} fingerprints from {}", store.len(), path.display());
                store
            }
            Err(StoreError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                info!("No fingerprint file at {}. Starting with an empty library.", path.display());
                Self::empty(path)
            }
            Err(e) => {
                warn!("Could not load fingerprints: {}. Starting with an empty library.", e);
                Self::empty(path)
            }
        }
    }

    /// Strict load. Entries that are not 18 finite numbers are skipped with a warning.
    pub fn try_load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: BTreeMap<String, Vec<f64>> =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut entries = BTreeMap::new();
        for (label, values) in raw {
            match to_frame(&label, &values) {
                Ok(frame) => {
                    entries.insert(label, frame);
                }
                Err(e) => warn!("Skipping stored fingerprint: {}", e),
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Inserts or overwrites `label`, then rewrites the whole file.
    ///
    /// A failed write leaves the in-memory entry in place.
    pub fn save(&mut self, label: &str, frame: SpectralFrame) -> StoreResult<()> {
        let label = label.trim();
        if label.is_empty() {
            return Err(StoreError::EmptyLabel);
        }
        self.entries.insert(label.to_string(), frame);
        self.persist()?;
        info!("Saved fingerprint: {}", label);
        Ok(())
    }

    fn persist(&self) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            StoreError::Persistence {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        fs::write(&self.path, content).map_err(|e| StoreError::Persistence {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    pub fn lookup_all(&self) -> impl Iterator<Item = (&str, &SpectralFrame)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, label: &str) -> Option<&SpectralFrame> {
        self.entries.get(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn to_frame(label: &str, values: &[f64]) -> StoreResult<SpectralFrame> {
    if label.trim().is_empty() {
        return Err(StoreError::EmptyLabel);
    }
    let values: [f64; CHANNELS] = values.try_into().map_err(|_| StoreError::InvalidReference {
        label: label.to_string(),
        reason: format!("expected {} values, got {}", CHANNELS, values.len()),
    })?;
    if values.iter().any(|v| !v.is_finite()) {
        return Err(StoreError::InvalidReference {
            label: label.to_string(),
            reason: "non-finite value".to_string(),
        });
    }
    Ok(SpectralFrame::new(values))
}

/// One record of a reference measurement set.
#[derive(Debug, Deserialize)]
pub struct ReferenceRecord {
    #[serde(rename = "type")]
    pub label: String,
    /// Keyed by wavelength, e.g. `"410nm"` or `"410"`.
    pub spectral_values: BTreeMap<String, f64>,
}

impl ReferenceRecord {
    /// Orders values by the numeric wavelength in each key.
    pub fn to_frame(&self) -> StoreResult<SpectralFrame> {
        let mut channels = Vec::with_capacity(self.spectral_values.len());
        for (key, value) in &self.spectral_values {
            let digits: String = key.chars().take_while(|c| c.is_ascii_digit()).collect();
            let nm: u32 = digits.parse().map_err(|_| StoreError::InvalidReference {
                label: self.label.clone(),
                reason: format!("unrecognised wavelength key {:?}", key),
            })?;
            channels.push((nm, *value));
        }
        channels.sort_by_key(|(nm, _)| *nm);
        let values: Vec<f64> = channels.into_iter().map(|(_, v)| v).collect();
        to_frame(&self.label, &values)
    }
}

/// Reads a reference set (`[{"type": .., "spectral_values": {..}}, ..]`) and
/// saves every record into `store`. Returns how many were imported.
pub fn import_reference_set(path: impl AsRef<Path>, store: &mut FingerprintStore) -> StoreResult<usize> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<ReferenceRecord> =
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut imported = 0;
    for record in &records {
        let frame = record.to_frame()?;
        store.save(&record.label, frame)?;
        imported += 1;
    }
    Ok(imported)
}
