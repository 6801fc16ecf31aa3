//! Seeded 64-bit CityHash (v1.0.3 construction)
//!
//! Fox Engine hashes paths with the seeded 64-bit variant of Google's
//! CityHash as it shipped in release 1.0.3. Later CityHash releases changed
//! the short-input paths, so this module carries its own implementation
//! instead of pulling a crate that tracks upstream.

// Some primes between 2^63 and 2^64 for various uses.
const K0: u64 = 0xc3a5_c85c_97cb_3127;
const K1: u64 = 0xb492_b66f_be98_f273;
const K2: u64 = 0x9ae1_6a3b_2f90_404f;
const K3: u64 = 0xc949_d7c7_509e_6557;

/// Murmur-inspired multiplier used to fold 128 bits into 64
const K_MUL: u64 = 0x9ddf_ea08_eb38_2d69;

#[inline]
fn fetch64(s: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&s[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

#[inline]
fn fetch32(s: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&s[offset..offset + 4]);
    u64::from(u32::from_le_bytes(buf))
}

#[inline]
fn shift_mix(val: u64) -> u64 {
    val ^ (val >> 47)
}

/// Fold a 128-bit value (low, high) into 64 bits
#[inline]
fn hash_len16(low: u64, high: u64) -> u64 {
    let mut a = (low ^ high).wrapping_mul(K_MUL);
    a ^= a >> 47;
    let mut b = (high ^ a).wrapping_mul(K_MUL);
    b ^= b >> 47;
    b.wrapping_mul(K_MUL)
}

fn hash_len0_to16(s: &[u8]) -> u64 {
    let len = s.len();
    if len > 8 {
        let a = fetch64(s, 0);
        let b = fetch64(s, len - 8);
        return hash_len16(a, b.wrapping_add(len as u64).rotate_right(len as u32)) ^ b;
    }
    if len >= 4 {
        let a = fetch32(s, 0);
        return hash_len16((len as u64).wrapping_add(a << 3), fetch32(s, len - 4));
    }
    if len > 0 {
        let a = u32::from(s[0]);
        let b = u32::from(s[len >> 1]);
        let c = u32::from(s[len - 1]);
        let y = a.wrapping_add(b << 8);
        let z = (len as u32).wrapping_add(c << 2);
        return shift_mix(u64::from(y).wrapping_mul(K2) ^ u64::from(z).wrapping_mul(K3))
            .wrapping_mul(K2);
    }
    K2
}

fn hash_len17_to32(s: &[u8]) -> u64 {
    let len = s.len();
    let a = fetch64(s, 0).wrapping_mul(K1);
    let b = fetch64(s, 8);
    let c = fetch64(s, len - 8).wrapping_mul(K2);
    let d = fetch64(s, len - 16).wrapping_mul(K0);
    hash_len16(
        a.wrapping_sub(b)
            .rotate_right(43)
            .wrapping_add(c.rotate_right(30))
            .wrapping_add(d),
        a.wrapping_add((b ^ K3).rotate_right(20))
            .wrapping_sub(c)
            .wrapping_add(len as u64),
    )
}

/// Return a 16-byte hash for 32 bytes at `offset` mixed with seeds `a` and `b`
fn weak_hash_len32_with_seeds(s: &[u8], offset: usize, mut a: u64, mut b: u64) -> (u64, u64) {
    let w = fetch64(s, offset);
    let x = fetch64(s, offset + 8);
    let y = fetch64(s, offset + 16);
    let z = fetch64(s, offset + 24);

    a = a.wrapping_add(w);
    b = b.wrapping_add(a).wrapping_add(z).rotate_right(21);
    let c = a;
    a = a.wrapping_add(x);
    a = a.wrapping_add(y);
    b = b.wrapping_add(a.rotate_right(44));
    (a.wrapping_add(z), b.wrapping_add(c))
}

fn hash_len33_to64(s: &[u8]) -> u64 {
    let len = s.len();
    let mut z = fetch64(s, 24);
    let mut a = fetch64(s, 0).wrapping_add(
        (len as u64)
            .wrapping_add(fetch64(s, len - 16))
            .wrapping_mul(K0),
    );
    let mut b = a.wrapping_add(z).rotate_right(52);
    let mut c = a.rotate_right(37);
    a = a.wrapping_add(fetch64(s, 8));
    c = c.wrapping_add(a.rotate_right(7));
    a = a.wrapping_add(fetch64(s, 16));
    let vf = a.wrapping_add(z);
    let vs = b.wrapping_add(a.rotate_right(31)).wrapping_add(c);

    a = fetch64(s, 16).wrapping_add(fetch64(s, len - 32));
    z = fetch64(s, len - 8);
    b = a.wrapping_add(z).rotate_right(52);
    c = a.rotate_right(37);
    a = a.wrapping_add(fetch64(s, len - 24));
    c = c.wrapping_add(a.rotate_right(7));
    a = a.wrapping_add(fetch64(s, len - 16));
    let wf = a.wrapping_add(z);
    let ws = b.wrapping_add(a.rotate_right(31)).wrapping_add(c);

    let r = shift_mix(
        vf.wrapping_add(ws)
            .wrapping_mul(K2)
            .wrapping_add(wf.wrapping_add(vs).wrapping_mul(K0)),
    );
    shift_mix(r.wrapping_mul(K0).wrapping_add(vs)).wrapping_mul(K2)
}

/// Unseeded CityHash64 of `s`
pub fn city_hash64(s: &[u8]) -> u64 {
    let len = s.len();
    if len <= 32 {
        if len <= 16 {
            return hash_len0_to16(s);
        }
        return hash_len17_to32(s);
    }
    if len <= 64 {
        return hash_len33_to64(s);
    }

    // For strings over 64 bytes we hash the end first, and then as we
    // loop we keep 56 bytes of state: v, w, x, y, and z.
    let mut x = fetch64(s, len - 40);
    let mut y = fetch64(s, len - 16).wrapping_add(fetch64(s, len - 56));
    let mut z = hash_len16(
        fetch64(s, len - 48).wrapping_add(len as u64),
        fetch64(s, len - 24),
    );
    let mut v = weak_hash_len32_with_seeds(s, len - 64, len as u64, z);
    let mut w = weak_hash_len32_with_seeds(s, len - 32, y.wrapping_add(K1), x);
    x = x.wrapping_mul(K1).wrapping_add(fetch64(s, 0));

    // Operate on 64-byte chunks up to the largest multiple of 64 below len.
    let mut remaining = (len - 1) & !63;
    let mut offset = 0;
    loop {
        x = x
            .wrapping_add(y)
            .wrapping_add(v.0)
            .wrapping_add(fetch64(s, offset + 8))
            .rotate_right(37)
            .wrapping_mul(K1);
        y = y
            .wrapping_add(v.1)
            .wrapping_add(fetch64(s, offset + 48))
            .rotate_right(42)
            .wrapping_mul(K1);
        x ^= w.1;
        y = y.wrapping_add(v.0).wrapping_add(fetch64(s, offset + 40));
        z = z.wrapping_add(w.0).rotate_right(33).wrapping_mul(K1);
        v = weak_hash_len32_with_seeds(s, offset, v.1.wrapping_mul(K1), x.wrapping_add(w.0));
        w = weak_hash_len32_with_seeds(
            s,
            offset + 32,
            z.wrapping_add(w.1),
            y.wrapping_add(fetch64(s, offset + 16)),
        );
        std::mem::swap(&mut z, &mut x);

        offset += 64;
        remaining -= 64;
        if remaining == 0 {
            break;
        }
    }

    hash_len16(
        hash_len16(v.0, w.0)
            .wrapping_add(shift_mix(y).wrapping_mul(K1))
            .wrapping_add(z),
        hash_len16(v.1, w.1).wrapping_add(x),
    )
}

/// Seeded CityHash64 of `s`
///
/// Equivalent to folding the unseeded hash minus `seed0` together with
/// `seed1`. Total over every input length.
pub fn hash64(s: &[u8], seed0: u64, seed1: u64) -> u64 {
    hash_len16(city_hash64(s).wrapping_sub(seed0), seed1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SEED: u64 = 0x1234_5678_90ab_cdef;

    fn sequence(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(city_hash64(b""), 0x9ae1_6a3b_2f90_404f);
        assert_eq!(hash64(b"", K2, SEED), 0x1561_5811_497c_a75f);
    }

    #[test]
    fn test_short_inputs() {
        // 1-3 bytes
        assert_eq!(city_hash64(b"a"), 0x2420_662c_d003_acfa);
        assert_eq!(city_hash64(b"abc"), 0x3a91_2f48_3a4e_ce31);
        // 4-8 bytes
        assert_eq!(city_hash64(b"abcd"), 0xf75a_3b8a_1499_428d);
        assert_eq!(city_hash64(b"hello"), 0x23c7_ada5_f323_c8df);
        assert_eq!(city_hash64(b"abcdefgh"), 0x4382_a8d0_fe8e_db17);
        // 9-16 bytes
        assert_eq!(city_hash64(b"abcdefghi"), 0x66c7_fa4e_b3fa_b8d1);
        assert_eq!(city_hash64(b"0123456789abcdef"), 0x099d_21e9_9dac_3317);
    }

    #[test]
    fn test_medium_inputs() {
        // 17-32 bytes
        assert_eq!(city_hash64(b"0123456789abcdefg"), 0x0aff_c467_e579_303a);
        assert_eq!(city_hash64(b"Assets/tpp/pack/player"), 0x00bc_0e06_472d_0e5c);
        assert_eq!(city_hash64(&sequence(32)), 0x40cf_ef3d_0088_69dc);
        // 33-64 bytes
        assert_eq!(city_hash64(&sequence(33)), 0x532c_06f6_02b7_f406);
        assert_eq!(city_hash64(&sequence(64)), 0xf7a2_aca4_d0a3_fde1);
    }

    #[test]
    fn test_long_inputs() {
        assert_eq!(city_hash64(&sequence(65)), 0xac58_9c99_0483_dd2e);
        assert_eq!(city_hash64(&sequence(128)), 0x10b1_5363_0af1_f395);
        assert_eq!(city_hash64(&sequence(200)), 0xf4d2_4e8c_7493_c3d8);
    }

    #[test]
    fn test_seeded_vectors() {
        assert_eq!(hash64(b"a", K2, SEED), 0x861c_c03f_4371_1dbf);
        assert_eq!(hash64(b"abcdefghi", K2, SEED), 0xea3a_f55d_c264_cb53);
        assert_eq!(hash64(b"0123456789abcdefg", K2, SEED), 0xa56c_a847_e9dd_a57a);
        assert_eq!(hash64(&sequence(33), K2, SEED), 0xa6e6_9ab1_1477_1015);
        assert_eq!(hash64(&sequence(200), K2, SEED), 0x47d9_9596_7631_7bc2);
    }

    #[test]
    fn test_seeds_change_output() {
        let data = b"/Assets/tpp/level/mission2/free/f30010/f30010.fox2";
        let base = hash64(data, K2, SEED);
        assert_ne!(base, hash64(data, K2, SEED ^ 1));
        assert_ne!(base, hash64(data, K2 ^ 1, SEED));
    }

    proptest! {
        #[test]
        fn prop_hash_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..300),
                                      seed0 in any::<u64>(), seed1 in any::<u64>()) {
            prop_assert_eq!(hash64(&data, seed0, seed1), hash64(&data.clone(), seed0, seed1));
        }
    }
}
