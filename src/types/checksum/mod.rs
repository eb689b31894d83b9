#![forbid(unsafe_code)]

/// Computes the CRC32 stored in a graph header.
///
/// The checksum covers the header bytes preceding the CRC field, salted with
/// the file length recorded in the header so a truncated image is rejected
/// even when the header itself is intact.
pub fn header_crc32(data_end: u64, header: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&data_end.to_le_bytes());
    hasher.update(header);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_crc32_changes_with_components() {
        let payload = vec![0u8; 16];
        let crc_a = header_crc32(64, &payload);
        let crc_b = header_crc32(64, &payload);
        assert_eq!(crc_a, crc_b);

        let mut different = payload.clone();
        different[0] = 1;
        assert_ne!(crc_a, header_crc32(64, &different));
        assert_ne!(crc_a, header_crc32(128, &payload));
    }
}
