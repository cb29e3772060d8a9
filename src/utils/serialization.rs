// Deterministic byte encodings shared by blocks, transactions and the store
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};

/// Encodes a value with bincode's standard configuration.
///
/// The standard configuration is fixed, so equal values always produce equal
/// bytes; transaction ids and Merkle leaves depend on that.
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

/// Decodes a value written by [`serialize`]. Trailing bytes are rejected.
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, read) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))?;
    if read != bytes.len() {
        return Err(BlockchainError::Serialization(format!(
            "Deserialization left {} trailing bytes",
            bytes.len() - read
        )));
    }
    Ok(data)
}

/// Big-endian two's complement encoding of a signed 64-bit integer.
pub fn int_to_be_bytes(value: i64) -> [u8; 8] {
    value.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
    struct Entry {
        txid: Vec<u8>,
        vout: i64,
        value: u64,
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let entry = Entry {
            txid: vec![7; 32],
            vout: -1,
            value: 100,
        };
        assert_eq!(serialize(&entry).unwrap(), serialize(&entry.clone()).unwrap());

        let decoded: Entry = deserialize(&serialize(&entry).unwrap()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_deserialize_rejects_garbage_and_trailing_bytes() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<Entry> = deserialize(&invalid_bytes);
        assert!(result.is_err());

        let mut bytes = serialize(&42u64).unwrap();
        bytes.push(0);
        let result: Result<u64> = deserialize(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_int_to_be_bytes() {
        assert_eq!(int_to_be_bytes(1), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(int_to_be_bytes(18)[7], 18);
        assert_eq!(int_to_be_bytes(-1), [0xFF; 8]);
    }
}
