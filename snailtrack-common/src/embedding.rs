//! Embedding vectors stored as little-endian f32 bytes

use crate::{Error, Result};

/// Encode a vector for a BLOB column
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB column back into a vector
///
/// A length that is not a multiple of 4 means the row is corrupt.
pub fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::InvalidInput(format!(
            "Embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_conversion() {
        let original = vec![1.5, -2.3, 0.0, 100.0];
        let bytes = embedding_to_bytes(&original);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), original);
    }

    #[test]
    fn test_truncated_blob_rejected() {
        assert!(bytes_to_embedding(&[0, 0, 128]).is_err());
    }

    #[test]
    fn test_empty_blob_is_empty_vector() {
        assert!(bytes_to_embedding(&[]).unwrap().is_empty());
    }
}
