//! Fixed-length digests over the Spritz sponge.

use crate::engine::Spritz;

/// Hash `message` to a digest of `bits / 8` bytes.
///
/// `bits` must be a multiple of 8 in `8..=2048`. The digest size is absorbed
/// into the sponge as a single byte, so the 128- and 256-byte variants fold
/// to `0x80` and `0x00`; every envelope on disk was produced with that
/// folding, and it must not change.
///
/// # Panics
///
/// Panics if `bits` is outside the supported range. All callers in this
/// crate pass compile-time constants.
pub fn sum(bits: usize, message: &[u8]) -> Vec<u8> {
    assert!(
        bits >= 8 && bits <= 2048 && bits % 8 == 0,
        "digest size must be a multiple of 8 bits in 8..=2048"
    );
    let n = bits / 8;

    let mut state = Spritz::new();
    state.absorb(message);
    state.absorb_stop();
    state.absorb_byte(n as u8);
    state.squeeze(n)
}
