//! File-backed snapshot store.
//!
//! Layout inside the store directory:
//! ```text
//! snapshots/
//!   000001.level.cbor.zst   - CBOR+zstd compressed level snapshots
//! manifest.json             - hash chain over the snapshot files
//! ```

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SnapshotError;
use crate::snapshot::LevelSnapshot;

const ZSTD_LEVEL: i32 = 3;

/// A single file in the integrity manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

/// Hash chain over every snapshot file, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

/// Directory of numbered level snapshots with a hash-chained manifest.
pub struct SnapshotStore {
    root: PathBuf,
    manifest: IntegrityManifest,
}

impl SnapshotStore {
    /// Open or create a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("snapshots"))?;

        let manifest_path = root.join("manifest.json");
        let manifest = if manifest_path.exists() {
            serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
        } else {
            let manifest = IntegrityManifest::default();
            serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;
            manifest
        };
        Ok(Self { root, manifest })
    }

    /// Write a snapshot as the next numbered file. Returns its file name.
    pub fn save(&mut self, snapshot: &LevelSnapshot) -> Result<String, SnapshotError> {
        let filename = format!("{:06}.level.cbor.zst", self.manifest.entries.len() + 1);
        let compressed = encode(snapshot)?;
        let sha256 = sha256_hex(&compressed);
        let prev_hash = self.manifest.entries.last().map(|e| e.sha256.clone());

        std::fs::write(self.root.join("snapshots").join(&filename), &compressed)?;
        self.manifest.entries.push(ManifestEntry {
            filename: filename.clone(),
            sha256,
            prev_hash,
        });
        self.save_manifest()?;

        tracing::info!(%filename, bytes = compressed.len(), "level snapshot saved");
        Ok(filename)
    }

    /// Load and verify the newest snapshot.
    pub fn load_latest(&self) -> Result<LevelSnapshot, SnapshotError> {
        let entry = self.manifest.entries.last().ok_or(SnapshotError::NoSnapshots)?;
        let data = std::fs::read(self.root.join("snapshots").join(&entry.filename))?;
        let actual = sha256_hex(&data);
        if actual != entry.sha256 {
            return Err(SnapshotError::IntegrityMismatch {
                expected: entry.sha256.clone(),
                actual,
            });
        }
        let snapshot = decode(&data)?;
        snapshot.verify()?;
        Ok(snapshot)
    }

    /// Check the manifest chain and the hash of every snapshot file.
    pub fn verify_integrity(&self) -> Result<(), SnapshotError> {
        let mut prev_hash: Option<String> = None;
        for entry in &self.manifest.entries {
            if entry.prev_hash != prev_hash {
                return Err(SnapshotError::IntegrityMismatch {
                    expected: prev_hash.unwrap_or_else(|| "None".into()),
                    actual: entry.prev_hash.clone().unwrap_or_else(|| "None".into()),
                });
            }
            let data = std::fs::read(self.root.join("snapshots").join(&entry.filename))?;
            let actual = sha256_hex(&data);
            if actual != entry.sha256 {
                return Err(SnapshotError::IntegrityMismatch {
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
            prev_hash = Some(entry.sha256.clone());
        }
        Ok(())
    }

    pub fn snapshot_count(&self) -> usize {
        self.manifest.entries.len()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &IntegrityManifest {
        &self.manifest
    }

    fn save_manifest(&self) -> Result<(), SnapshotError> {
        let path = self.root.join("manifest.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.manifest)?;
        Ok(())
    }
}

/// CBOR-encode and zstd-compress a snapshot.
pub fn encode(snapshot: &LevelSnapshot) -> Result<Vec<u8>, SnapshotError> {
    zstd_compress(&cbor_serialize(snapshot)?)
}

/// Inverse of [`encode`]. The content hash is not checked here.
pub fn decode(data: &[u8]) -> Result<LevelSnapshot, SnapshotError> {
    cbor_deserialize(&zstd_decompress(data)?)
}

pub(crate) fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SnapshotError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| SnapshotError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, SnapshotError> {
    ciborium::from_reader(data).map_err(|e| SnapshotError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), ZSTD_LEVEL)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_common::{TAG_ENTITY, Vec2};
    use trellis_kernel::{TypeCatalog, TypeDescriptor};
    use trellis_level::{ActivationConfig, EntityManager};

    fn snapshot(count: usize) -> LevelSnapshot {
        let mut catalog = TypeCatalog::new();
        catalog.register(TypeDescriptor::new("Barrel").tagged(&[TAG_ENTITY]));
        let config = ActivationConfig {
            id_seed: Some(77),
            ..ActivationConfig::default()
        };
        let mut m = EntityManager::with_config(config, catalog).unwrap();
        for i in 0..count {
            m.spawn_entity("Barrel", Vec2::new(i as f32 * 100.0, 50.0)).unwrap();
        }
        LevelSnapshot::capture(&m).unwrap()
    }

    #[test]
    fn encode_decode_preserves_snapshot() {
        let snap = snapshot(5);
        let bytes = encode(&snap).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(back, snap);
        assert!(back.verify().is_ok());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(b"definitely not zstd").is_err());
    }

    #[test]
    fn store_save_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::open(tmp.path().join("saves")).unwrap();
        assert!(matches!(store.load_latest(), Err(SnapshotError::NoSnapshots)));

        store.save(&snapshot(2)).unwrap();
        let name = store.save(&snapshot(3)).unwrap();
        assert_eq!(name, "000002.level.cbor.zst");

        let reopened = SnapshotStore::open(tmp.path().join("saves")).unwrap();
        assert_eq!(reopened.snapshot_count(), 2);
        assert_eq!(reopened.load_latest().unwrap().len(), 3);
        assert!(reopened.verify_integrity().is_ok());
    }

    #[test]
    fn corrupted_file_is_detected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::open(tmp.path()).unwrap();
        let name = store.save(&snapshot(4)).unwrap();

        let path = tmp.path().join("snapshots").join(name);
        let mut data = std::fs::read(&path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        std::fs::write(&path, data).unwrap();

        assert!(matches!(
            store.verify_integrity(),
            Err(SnapshotError::IntegrityMismatch { .. })
        ));
        assert!(matches!(
            store.load_latest(),
            Err(SnapshotError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn broken_chain_is_detected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::open(tmp.path()).unwrap();
        store.save(&snapshot(1)).unwrap();
        store.save(&snapshot(1)).unwrap();
        store.manifest.entries[1].prev_hash = Some("bogus".into());
        assert!(store.verify_integrity().is_err());
    }
}
