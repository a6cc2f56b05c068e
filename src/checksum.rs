/// SHA-256 hashing and canonical-JSON fingerprinting helpers
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Fingerprint a request's relevant fields for idempotency-key reuse
/// detection. Serializes as canonical JSON (serde_json's map keys sort
/// is not guaranteed, so callers pass a `Vec<(&str, Value)>`-backed
/// struct or, for simple cases, a tuple-like value with a stable field
/// order) and hashes the UTF-8 bytes.
pub fn fingerprint<T: Serialize>(value: &T) -> String {
    let canonical = serde_json::to_vec(value).expect("fingerprint input must serialize");
    hex_digest(&canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn hex_digest_matches_known_vector() {
        assert_eq!(
            hex_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn fingerprint_is_stable_for_equal_values() {
        #[derive(Serialize)]
        struct Payload<'a> {
            file_name: &'a str,
            file_size: i64,
        }

        let a = fingerprint(&Payload {
            file_name: "x.bin",
            file_size: 10,
        });
        let b = fingerprint(&Payload {
            file_name: "x.bin",
            file_size: 10,
        });
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_for_different_values() {
        #[derive(Serialize)]
        struct Payload<'a> {
            file_name: &'a str,
            file_size: i64,
        }

        let a = fingerprint(&Payload {
            file_name: "x.bin",
            file_size: 10,
        });
        let b = fingerprint(&Payload {
            file_name: "x.bin",
            file_size: 11,
        });
        assert_ne!(a, b);
    }
}
