/// DJB2 hash, matching the original `HashTable::djb2_hash`/`djb2_string_hash`.
/// For text keys the original hashes only up to the first NUL; binary keys hash
/// all `key_len` bytes.
pub fn djb2(key: &[u8], is_text_key: bool) -> u32 {
    let effective: &[u8] = if is_text_key {
        let end = key.iter().position(|&b| b == 0).unwrap_or(key.len());
        &key[..end]
    } else {
        key
    };
    let mut hash: u32 = 5381;
    for &b in effective {
        hash = hash.wrapping_mul(33).wrapping_add(b as u32);
    }
    hash
}

pub fn key_eq(a: &[u8], b: &[u8], is_text_key: bool) -> bool {
    if is_text_key {
        let a_end = a.iter().position(|&b| b == 0).unwrap_or(a.len());
        let b_end = b.iter().position(|&b| b == 0).unwrap_or(b.len());
        a[..a_end] == b[..b_end]
    } else {
        a == b
    }
}
