//! Experiment metadata and reproducibility tracking.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

/// Compute SHA256 checksum of a file.
pub fn compute_file_checksum(path: impl AsRef<Path>) -> std::io::Result<String> {
    let data = std::fs::read(path.as_ref())?;
    Ok(compute_hash(&data))
}

/// Compute SHA256 hash of arbitrary bytes.
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute configuration hash from JSON serialization.
pub fn compute_config_hash<T: Serialize>(config: &T) -> String {
    match serde_json::to_vec(config) {
        Ok(bytes) => compute_hash(&bytes),
        Err(e) => {
            warn!("Failed to serialize config for hashing: {}", e);
            String::new()
        }
    }
}

/// Generate a unique experiment ID.
pub fn generate_experiment_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_compute_hash_is_deterministic() {
        let hash1 = compute_hash(b"hello");
        let hash2 = compute_hash(b"hello");
        let hash3 = compute_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_compute_file_checksum() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "test data").unwrap();
        temp_file.flush().unwrap();

        let checksum = compute_file_checksum(temp_file.path()).unwrap();
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_config_hash_tracks_changes() {
        #[derive(Serialize)]
        struct TestConfig {
            threshold: f64,
        }

        let hash1 = compute_config_hash(&TestConfig { threshold: 0.5 });
        let hash2 = compute_config_hash(&TestConfig { threshold: 0.5 });
        let hash3 = compute_config_hash(&TestConfig { threshold: 0.6 });

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
    }

    #[test]
    fn test_experiment_ids_are_unique() {
        assert_ne!(generate_experiment_id(), generate_experiment_id());
    }
}
