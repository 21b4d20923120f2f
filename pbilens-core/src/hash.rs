//! Content hashing for change detection between analysis runs.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::HashError;

/// Read size for streaming a file through the hasher.
const CHUNK_SIZE: usize = 64 * 1024;

/// Hex-encoded SHA-256 digest of a file's full content.
pub fn hash_file(path: &Path) -> Result<String, HashError> {
    let io_err = |source| HashError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex-encoded SHA-256 digest of an in-memory buffer.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn hashing_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            prop_assert_eq!(hash_bytes(&data), hash_bytes(&data));
        }

        #[test]
        fn flipping_one_byte_changes_digest(
            data in proptest::collection::vec(any::<u8>(), 1..4096),
            idx in any::<prop::sample::Index>(),
        ) {
            let mut changed = data.clone();
            let i = idx.index(changed.len());
            changed[i] ^= 0x01;
            prop_assert_ne!(hash_bytes(&data), hash_bytes(&changed));
        }
    }
}
