//! Fox Engine path hashing
//!
//! Archive entries are keyed by a 64-bit identifier derived from the
//! asset path. The low 50 bits hold the hash of the path without its
//! extension, bit 50 is the meta flag and the top 13 bits hold the hash of
//! the extension.

use super::city::hash64;

/// Root prefix stripped from asset paths before hashing
pub const ASSETS_PREFIX: &str = "/Assets/";

/// Asset sub-tree whose paths keep the meta flag
pub const TEST_ASSETS_PREFIX: &str = "/Assets/tpptest";

/// First CityHash seed used for every path
pub const PATH_SEED: u64 = 0x9ae1_6a3b_2f90_404f;

/// Mask applied to every text hash
pub const TEXT_HASH_MASK: u64 = 0x3_FFFF_FFFF_FFFF;

/// Meta flag (bit 50)
pub const META_FLAG: u64 = 0x4_0000_0000_0000;

/// Mask selecting the name part of a stored entry hash
pub const FILE_NAME_MASK: u64 = 0x3_FFFF_FFFF_FFFF;

/// Mask selecting the extension part after shifting by [`EXTENSION_SHIFT`]
pub const EXTENSION_MASK: u64 = 0x1FFF;

/// Bit position of the extension part of a stored entry hash
pub const EXTENSION_SHIFT: u32 = 51;

/// Second CityHash seed derived from the text itself
///
/// The last (up to) eight characters are taken in reverse order, each
/// truncated to a byte, and read as a little-endian integer. Shorter
/// strings are zero-padded.
pub fn string_seed(value: &str) -> u64 {
    let mut bytes = [0u8; 8];
    for (slot, ch) in bytes.iter_mut().zip(value.chars().rev()) {
        *slot = ch as u32 as u8;
    }
    u64::from_le_bytes(bytes)
}

/// Hash arbitrary text with its own string seed
pub fn hash_text(value: &str) -> u64 {
    hash64(value.as_bytes(), PATH_SEED, string_seed(value)) & TEXT_HASH_MASK
}

/// Strip the asset root and any leading separators
pub fn normalize_path(path: &str) -> &str {
    path.strip_prefix(ASSETS_PREFIX)
        .unwrap_or(path)
        .trim_start_matches('/')
}

/// Whether a path hashes into the meta namespace
///
/// Paths outside the asset root are always meta. Inside the root, only the
/// test asset tree is.
pub fn is_meta_path(path: &str) -> bool {
    if path.starts_with(ASSETS_PREFIX) {
        path.starts_with(TEST_ASSETS_PREFIX)
    } else {
        true
    }
}

fn strip_extension(path: &str) -> &str {
    match path.find('.') {
        Some(index) => &path[..index],
        None => path,
    }
}

fn with_meta_flag(path: &str, hash: u64) -> u64 {
    if is_meta_path(path) {
        hash | META_FLAG
    } else {
        hash
    }
}

/// Hash an asset path, extension included
pub fn hash_path(path: &str) -> u64 {
    with_meta_flag(path, hash_text(normalize_path(path)))
}

/// Hash an asset path after removing everything from its first `.`
pub fn hash_path_without_extension(path: &str) -> u64 {
    with_meta_flag(path, hash_text(strip_extension(normalize_path(path))))
}

/// Name part of a stored entry hash
#[inline]
pub fn file_name_key(hash: u64) -> u64 {
    hash & FILE_NAME_MASK
}

/// Extension part of a stored entry hash
#[inline]
pub fn extension_key(hash: u64) -> u64 {
    (hash >> EXTENSION_SHIFT) & EXTENSION_MASK
}

/// Build the stored entry identifier for a full asset path
///
/// Combines the name hash of the extension-less path with the hash of the
/// extension, the way archive entries are keyed on disk.
pub fn entry_hash(path: &str) -> u64 {
    let name = file_name_key(hash_path_without_extension(path));
    let normalized = normalize_path(path);
    match normalized.find('.') {
        Some(index) => {
            let extension = hash_path(&normalized[index + 1..]) & EXTENSION_MASK;
            name | (extension << EXTENSION_SHIFT)
        }
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOTION: &str = "/Assets/tpp/pack/player/motion/player2_resident_motion";

    #[test]
    fn test_string_seed() {
        // "k/player" reversed
        assert_eq!(string_seed("Assets/tpp/pack/player"), 0x6b2f_706c_6179_6572);
        assert_eq!(string_seed("fpk"), 0x0066_706b);
        assert_eq!(string_seed(""), 0);
    }

    #[test]
    fn test_string_seed_truncates_wide_chars() {
        // U+0141 truncates to 0x41
        assert_eq!(string_seed("\u{141}"), 0x41);
    }

    #[test]
    fn test_hash_text() {
        assert_eq!(hash_text("fpk"), 0x1_a0f8_83f8_0a45);
        assert_eq!(hash_text("fpkd"), 0x2_7f25_aaa0_ddaa);
        assert_eq!(
            hash_text("tpp/pack/player/motion/player2_resident_motion"),
            0x2_9dcd_9af9_14f6
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/Assets/tpp/a.fpk"), "tpp/a.fpk");
        assert_eq!(normalize_path("//tpp/a.fpk"), "tpp/a.fpk");
        assert_eq!(normalize_path("/Assets//tpp"), "tpp");
        assert_eq!(normalize_path("tpp"), "tpp");
    }

    #[test]
    fn test_meta_flag_rules() {
        assert!(!is_meta_path("/Assets/tpp/pack/a.fpk"));
        assert!(is_meta_path("/Assets/tpptest/a.fpk"));
        assert!(is_meta_path("/tpp/pack/a.fpk"));
        assert!(is_meta_path("fpk"));
    }

    #[test]
    fn test_hash_path() {
        assert_eq!(hash_path(MOTION), 0x2_9dcd_9af9_14f6);
        assert_eq!(
            hash_path("/Assets/tpp/pack/player/motion/player2_resident_motion.fpk"),
            0x2_f5a7_5b1f_07e6
        );
        assert_eq!(hash_path("/Assets/tpptest/foo.fpk"), 0x7_4279_d821_4ee2);
        assert_eq!(hash_path("/tpp/pack/x.fpk"), 0x5_76c9_29a8_2bb7);
        assert_eq!(hash_path("fpk"), 0x5_a0f8_83f8_0a45);
    }

    #[test]
    fn test_hash_path_without_extension() {
        assert_eq!(
            hash_path_without_extension(&format!("{MOTION}.fpk")),
            hash_path(MOTION)
        );
        assert_eq!(hash_path_without_extension("/Assets/tpptest/foo.fpk"), 0x6_def8_f539_45cd);
        assert_eq!(hash_path_without_extension("/tpp/pack/x.fpk"), 0x7_4247_1e0a_bd0d);
    }

    #[test]
    fn test_seed_comes_from_hashed_text() {
        // Short normalized paths seed from what is actually hashed
        assert_eq!(hash_path("/Assets/ab"), hash_text("ab"));
        assert_eq!(hash_path("/Assets/ab"), 0x1_04fe_960c_3007);
    }

    #[test]
    fn test_key_partition() {
        let hash = entry_hash(&format!("{MOTION}.fpk"));
        assert_eq!(file_name_key(hash), file_name_key(hash_path(MOTION)));
        assert_eq!(extension_key(hash), 0xa45);
        assert_eq!(extension_key(hash), hash_path("fpk") & EXTENSION_MASK);
    }

    #[test]
    fn test_entry_hash_without_extension() {
        assert_eq!(entry_hash(MOTION), file_name_key(hash_path(MOTION)));
        assert_eq!(extension_key(entry_hash(MOTION)), 0);
    }
}
