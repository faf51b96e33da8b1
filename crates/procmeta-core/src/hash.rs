//! Module name hashing.
//!
//! Modules are identified across loads by a 32-bit MurmurHash3 (x86_32, seed
//! 0) of their lowercase file name without extension. The value does not
//! depend on the load address, so annotations keyed by it survive
//! relocation. Collisions are possible and accepted.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// MurmurHash3 x86_32.
///
/// ```rust
/// use procmeta_core::hash::murmur3_32;
///
/// assert_eq!(murmur3_32(b"", 0), 0);
/// assert_eq!(murmur3_32(b"hello", 0), 0x248b_fa47);
/// ```
#[must_use]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32
{
    let mut h = seed;
    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h ^= mix_k(k);
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, byte) in tail.iter().enumerate() {
            k ^= u32::from(*byte) << (8 * i);
        }
        h ^= mix_k(k);
    }

    // Only the low 32 bits of the length take part, as in the reference
    #[allow(clippy::cast_possible_truncation)]
    let len = data.len() as u32;
    fmix32(h ^ len)
}

fn mix_k(k: u32) -> u32
{
    k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

fn fmix32(mut h: u32) -> u32
{
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

/// Identity hash of a module name.
///
/// Case-insensitive and extension-insensitive: `Foo.dll`, `FOO.DLL` and `foo`
/// hash identically. A directory prefix is ignored. Returns `0` for an empty
/// name.
///
/// ```rust
/// use procmeta_core::hash::hash_from_name;
///
/// assert_eq!(hash_from_name("Foo.dll"), hash_from_name("FOO.DLL"));
/// assert_eq!(hash_from_name("foo"), hash_from_name("C:\\Windows\\foo.exe"));
/// ```
#[must_use]
pub fn hash_from_name(name: &str) -> u32
{
    let folded = name.to_lowercase();
    let file = folded.rsplit(['\\', '/']).next().unwrap_or_default();
    let stem = file.rfind('.').map_or(file, |dot| &file[..dot]);
    if stem.is_empty() {
        return 0;
    }
    murmur3_32(stem.as_bytes(), 0)
}
