// src/codegen/ident.rs
//! Short identifiers for generated code

// First characters avoid anything that could spell a reserved word.
const ID_START_CHARS: &[u8] = b"hjkmoquxzABCDEFGHIJKLNPQRTUVWXYZ$_";
const ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$_";

/// Unique short JavaScript identifier for an index
///
/// The first character encodes `index % 34`, the rest encode the remaining
/// quotient in base 64, least significant digit first.
pub fn index_to_id(index: usize) -> String {
    let start_len = ID_START_CHARS.len();
    let mut id = String::new();
    id.push(ID_START_CHARS[index % start_len] as char);

    let mut rest = index / start_len;
    while rest > 0 {
        id.push(ID_CHARS[rest % ID_CHARS.len()] as char);
        rest /= ID_CHARS.len();
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_first_ids() {
        assert_eq!(index_to_id(0), "h");
        assert_eq!(index_to_id(1), "j");
        assert_eq!(index_to_id(33), "_");
        assert_eq!(index_to_id(34), "hb");
        assert_eq!(index_to_id(35), "jb");
        assert_eq!(index_to_id(34 * 64), "hab");
    }

    #[test]
    fn test_ids_unique() {
        let ids: HashSet<String> = (0..10_000).map(index_to_id).collect();
        assert_eq!(ids.len(), 10_000);
    }
}
