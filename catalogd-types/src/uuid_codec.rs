//! UUID ↔ wire/storage form conversions (spec.md §4.1, C1).
//!
//! Storage keeps UUIDs split as two signed 64-bit columns rather than a
//! native `uuid` column so the schema stays dialect-portable (spec.md §6
//! "Persisted schema" names `object_id_hi`/`object_id_lo` explicitly).

use uuid::Uuid;

/// Splits a UUID into the `(hi, lo)` pair stored in `object.object_id_hi` /
/// `object.object_id_lo`.
pub fn to_hi_lo(id: Uuid) -> (i64, i64) {
    let bytes = id.into_bytes();
    let mut hi = [0u8; 8];
    let mut lo = [0u8; 8];
    hi.copy_from_slice(&bytes[0..8]);
    lo.copy_from_slice(&bytes[8..16]);
    (i64::from_be_bytes(hi), i64::from_be_bytes(lo))
}

/// Reassembles a UUID from its stored `(hi, lo)` pair.
pub fn from_hi_lo(hi: i64, lo: i64) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes[0..8].copy_from_slice(&hi.to_be_bytes());
    bytes[8..16].copy_from_slice(&lo.to_be_bytes());
    Uuid::from_bytes(bytes)
}

/// Canonical lower-case hyphenated string form used on the wire.
pub fn to_canonical_string(id: Uuid) -> String {
    id.hyphenated().to_string()
}

pub fn parse_canonical_string(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hi_lo_round_trips() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let (hi, lo) = to_hi_lo(id);
        assert_eq!(from_hi_lo(hi, lo), id);
    }

    #[test]
    fn string_round_trips() {
        let id = Uuid::new_v4();
        let s = to_canonical_string(id);
        assert_eq!(parse_canonical_string(&s).unwrap(), id);
    }

    #[test]
    fn rejects_malformed_string() {
        assert!(parse_canonical_string("not-a-uuid").is_err());
    }
}
