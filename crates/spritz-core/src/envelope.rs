//! The self-describing encrypted file format around a Spritz stream.
//!
//! Two header versions exist on disk. The current format (binary):
//!
//! ```text
//! [4 bytes: encrypted IV]
//! [4 bytes: random check bytes r0..r3]        (encrypted)
//!     -- r3 keystream bytes discarded inline --
//! [1 byte: version = 0x02]                     (encrypted)
//! [4 bytes: sum(32, r0..r3)]                   (encrypted)
//! [1 byte: L = filename length]                (encrypted)
//! [L bytes: filename]                          (encrypted)
//! [payload]                                    (encrypted)
//! ```
//!
//! The legacy format is recognized by a plaintext leading `0x01`, carries its
//! IV in the clear, and keys the stream with the 5000-iteration derivation.
//! It is read but never written.
//!
//! The random check bytes double as the password check: only a reader that
//! derives the same state can reproduce the keystream offset and the digest,
//! so a wrong password is detected before any payload is surfaced, without a
//! known-plaintext marker in the file.

use std::io::{self, Read, Write};

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::engine::Spritz;
use crate::error::{Result, SpritzError};
use crate::hash::sum;
use crate::stream::{new_stream, StreamReader, StreamWriter};

/// IV length in bytes.
const IV_LEN: usize = 4;

/// Digest width of the header check, in bits (4 bytes).
const CHECK_BITS: usize = 32;
const CHECK_LEN: usize = CHECK_BITS / 8;

/// Digest width of the password pre-hash for the current format, in bits
/// (256 bytes).
const MASTER_DIGEST_BITS: usize = 2048;

/// Leading byte that marks a legacy header.
const V1_MARKER: u8 = 1;

/// Version byte stored (encrypted) in current headers.
const V2_VERSION: u8 = 2;

/// Key-derivation work factor baked into the legacy format.
const V1_ITERATIONS: u32 = 5000;

/// Rounds of keystream/re-absorb interleaving after the IV is mixed in.
const REHASH_ROUNDS: usize = 20;

/// Read exactly `buf.len()` header bytes, folding EOF into `ShortRead`.
fn read_header_bytes<R: Read>(src: &mut R, buf: &mut [u8]) -> Result<()> {
    src.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => SpritzError::ShortRead,
        _ => SpritzError::from(e),
    })
}

/// Read the stored filename, if the header says one is present.
fn read_filename<R: Read>(src: &mut R, len: u8) -> Result<String> {
    if len == 0 {
        return Ok(String::new());
    }
    let mut name = vec![0u8; len as usize];
    read_header_bytes(src, &mut name)?;
    Ok(String::from_utf8_lossy(&name).into_owned())
}

/// Interleave keystream output with re-absorption of the IV and the password
/// digest. Writer and reader run this with identical inputs, so their states
/// stay in lockstep. `digest` is overwritten every round.
fn rehash_key(cipher: &mut Spritz, iv: &[u8], digest: &mut [u8]) {
    for _ in 0..REHASH_ROUNDS {
        cipher.drip_many(digest);
        cipher.absorb(iv);
        cipher.absorb_stop();
        cipher.absorb(digest);
    }
}

/// Seed the current-format cipher up to the point where the IV would be
/// encrypted or decrypted.
fn v2_prelude(master: &[u8]) -> Spritz {
    let mut cipher = Spritz::new();
    cipher.absorb(master);
    cipher.absorb_stop();
    cipher.absorb_byte(IV_LEN as u8);
    cipher
}

fn read_v1_header<R: Read>(mut src: R, password: &str) -> Result<(StreamReader<R>, String)> {
    let mut iv = [0u8; IV_LEN];
    read_header_bytes(&mut src, &mut iv)?;

    let cipher = new_stream(password, &iv, V1_ITERATIONS);
    let mut reader = StreamReader::new(cipher, src);

    // 4 random bytes, their 4-byte digest, and the filename length.
    let mut header = [0u8; 2 * CHECK_LEN + 1];
    read_header_bytes(&mut reader, &mut header)?;
    if sum(CHECK_BITS, &header[..CHECK_LEN])[..] != header[CHECK_LEN..2 * CHECK_LEN] {
        return Err(SpritzError::BadPasswordOrCorrupt);
    }

    let filename = read_filename(&mut reader, header[2 * CHECK_LEN])?;
    Ok((reader, filename))
}

fn read_v2_header<R: Read>(
    mut src: R,
    first_byte: u8,
    password: &str,
) -> Result<(StreamReader<R>, String)> {
    let mut iv = [0u8; IV_LEN];
    iv[0] = first_byte;
    read_header_bytes(&mut src, &mut iv[1..])?;

    let mut master = sum(MASTER_DIGEST_BITS, password.as_bytes());
    let mut cipher = v2_prelude(&master);

    // The IV on disk is encrypted with the prelude keystream.
    cipher.apply_keystream(&mut iv);
    rehash_key(&mut cipher, &iv, &mut master);
    master.zeroize();

    let mut reader = StreamReader::new(cipher, src);

    let mut rbytes = [0u8; CHECK_LEN];
    read_header_bytes(&mut reader, &mut rbytes)?;
    reader.skip_keystream(rbytes[CHECK_LEN - 1] as usize);

    // Version byte, digest of the random bytes, filename length.
    let mut rest = [0u8; CHECK_LEN + 2];
    read_header_bytes(&mut reader, &mut rest)?;
    if rest[0] != V2_VERSION || sum(CHECK_BITS, &rbytes)[..] != rest[1..1 + CHECK_LEN] {
        return Err(SpritzError::BadPasswordOrCorrupt);
    }

    let filename = read_filename(&mut reader, rest[1 + CHECK_LEN])?;
    Ok((reader, filename))
}

/// Open an encrypted envelope for reading.
///
/// Dispatches on the header version, verifies the password check, and
/// returns a reader positioned at the start of the payload together with the
/// stored filename (empty if none was recorded).
///
/// # Errors
///
/// [`SpritzError::BadPasswordOrCorrupt`] if any integrity check fails;
/// [`SpritzError::ShortRead`] if `src` ends inside the header.
pub fn wrap_reader<R: Read>(mut src: R, password: &str) -> Result<(StreamReader<R>, String)> {
    let mut marker = [0u8; 1];
    read_header_bytes(&mut src, &mut marker)?;

    if marker[0] == V1_MARKER {
        read_v1_header(src, password)
    } else {
        read_v2_header(src, marker[0], password)
    }
}

/// Open an encrypted envelope for writing, drawing randomness from the
/// operating system.
///
/// Writes the complete header to `sink` and returns a writer that encrypts
/// everything subsequently written to it. `filename` is stored in the header
/// (it may be empty) and handed back by [`wrap_reader`].
pub fn wrap_writer<W: Write>(sink: W, password: &str, filename: &str) -> Result<StreamWriter<W>> {
    wrap_writer_with_rng(sink, password, filename, &mut OsRng)
}

/// [`wrap_writer`] with a caller-supplied random source.
///
/// # Errors
///
/// [`SpritzError::Entropy`] if the random source refuses;
/// [`SpritzError::FilenameTooLong`] if `filename` exceeds the single header
/// length byte; I/O errors from `sink` are passed through.
pub fn wrap_writer_with_rng<W: Write, G: RngCore + CryptoRng>(
    mut sink: W,
    password: &str,
    filename: &str,
    rng: &mut G,
) -> Result<StreamWriter<W>> {
    if filename.len() > u8::MAX as usize {
        return Err(SpritzError::FilenameTooLong(filename.len()));
    }

    let mut master = sum(MASTER_DIGEST_BITS, password.as_bytes());
    let mut cipher = v2_prelude(&master);

    let mut iv = [0u8; IV_LEN];
    rng.try_fill_bytes(&mut iv)?;

    let mut enc_iv = [0u8; IV_LEN];
    cipher.xor_key_stream(&mut enc_iv, &iv)?;
    if enc_iv[0] == V1_MARKER {
        // A leading 0x01 would be read back as a legacy header. Bump the
        // first IV byte and patch its encrypted form to match, so the reader
        // recovers the bumped value.
        enc_iv[0] ^= iv[0] ^ iv[0].wrapping_add(1);
        iv[0] = iv[0].wrapping_add(1);
    }

    // The IV goes out through the sink directly; the stream writer only
    // exists once the rehash below has run.
    sink.write_all(&enc_iv)?;

    rehash_key(&mut cipher, &iv, &mut master);
    master.zeroize();

    let mut writer = StreamWriter::new(cipher, sink);

    let mut rbytes = [0u8; CHECK_LEN];
    rng.try_fill_bytes(&mut rbytes)?;
    let discard = rbytes[CHECK_LEN - 1] as usize;
    let check = sum(CHECK_BITS, &rbytes);

    writer.write_all(&rbytes)?;
    writer.skip_keystream(discard);
    writer.write_all(&[V2_VERSION])?;
    writer.write_all(&check)?;
    writer.write_all(&[filename.len() as u8])?;
    writer.write_all(filename.as_bytes())?;

    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out a fixed byte script instead of randomness, so header bytes
    /// are reproducible.
    struct ScriptedRng {
        script: Vec<u8>,
        pos: usize,
    }

    impl ScriptedRng {
        fn new(script: &[u8]) -> Self {
            ScriptedRng {
                script: script.to_vec(),
                pos: 0,
            }
        }
    }

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            let mut buf = [0u8; 4];
            self.fill_bytes(&mut buf);
            u32::from_le_bytes(buf)
        }

        fn next_u64(&mut self) -> u64 {
            let mut buf = [0u8; 8];
            self.fill_bytes(&mut buf);
            u64::from_le_bytes(buf)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            let end = self.pos + dest.len();
            dest.copy_from_slice(&self.script[self.pos..end]);
            self.pos = end;
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ScriptedRng {}

    fn write_envelope(password: &str, filename: &str, payload: &[u8], script: &[u8]) -> Vec<u8> {
        let mut sink = Vec::new();
        let mut rng = ScriptedRng::new(script);
        let mut writer =
            wrap_writer_with_rng(&mut sink, password, filename, &mut rng).expect("write header");
        writer.write_all(payload).expect("write payload");
        writer.flush().expect("flush");
        drop(writer);
        sink
    }

    fn read_envelope(data: &[u8], password: &str) -> Result<(String, Vec<u8>)> {
        let (mut reader, filename) = wrap_reader(data, password)?;
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        Ok((filename, payload))
    }

    #[test]
    fn test_fixed_rng_header_bytes() {
        let data = write_envelope("pw", "f", b"hello", &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(hex::encode(&data), "cca7003aec1e1375bc156207eb15b91710fb9a17");
    }

    #[test]
    fn test_fixed_artifact_reads_back() {
        let data = hex::decode("cca7003aec1e1375bc156207eb15b91710fb9a17").unwrap();
        let (filename, payload) = read_envelope(&data, "pw").unwrap();
        assert_eq!(filename, "f");
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn test_round_trip_with_os_rng() {
        let mut sink = Vec::new();
        let mut writer = wrap_writer(&mut sink, "hunter2", "doc.txt").unwrap();
        writer.write_all(b"payload body").unwrap();
        drop(writer);

        let (filename, payload) = read_envelope(&sink, "hunter2").unwrap();
        assert_eq!(filename, "doc.txt");
        assert_eq!(payload, b"payload body");
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let data = write_envelope("correct", "f", b"secret", &[0, 1, 2, 3, 4, 5, 6, 7]);
        let result = read_envelope(&data, "incorrect");
        assert!(matches!(result, Err(SpritzError::BadPasswordOrCorrupt)));
    }

    #[test]
    fn test_corrupted_header_is_rejected() {
        let mut data = write_envelope("pw", "f", b"secret", &[0, 1, 2, 3, 4, 5, 6, 7]);
        data[6] ^= 0xff; // inside the encrypted check bytes
        let result = read_envelope(&data, "pw");
        assert!(matches!(result, Err(SpritzError::BadPasswordOrCorrupt)));
    }

    #[test]
    fn test_truncated_header_is_short_read() {
        let data = write_envelope("pw", "f", b"secret", &[0, 1, 2, 3, 4, 5, 6, 7]);
        let result = read_envelope(&data[..9], "pw");
        assert!(matches!(result, Err(SpritzError::ShortRead)));
    }

    #[test]
    fn test_header_never_starts_with_legacy_marker() {
        // iv[0] = 205 collides with the legacy marker after encryption under
        // this password; the writer must perturb it.
        let data = write_envelope("pw", "n", b"quirk", &[205, 9, 9, 9, 4, 5, 6, 7]);
        assert_ne!(data[0], V1_MARKER);
        assert_eq!(hex::encode(&data), "02af0b30c01c8d2fb88e40cc28935b6cbe012311");

        let (filename, payload) = read_envelope(&data, "pw").unwrap();
        assert_eq!(filename, "n");
        assert_eq!(payload, b"quirk");
    }

    #[test]
    fn test_empty_filename_and_payload() {
        let data = write_envelope("longer passphrase", "", b"", &[10, 20, 30, 40, 9, 9, 9, 0]);
        assert_eq!(hex::encode(&data), "a7d84bd8a1dcc9f6392d2d957c06");

        let (filename, payload) = read_envelope(&data, "longer passphrase").unwrap();
        assert_eq!(filename, "");
        assert_eq!(payload, b"");
    }

    #[test]
    fn test_legacy_envelope_reads_back() {
        // Produced by the legacy (version 1) writer: plaintext marker and IV,
        // then a 5000-iteration stream over the header and payload.
        let data = hex::decode(concat!(
            "0109080706c7b1bbcec8e646001ce9165a6f6986",
            "0e511e04f5e7555c5887e6d3d1fb3656fae0f634"
        ))
        .unwrap();
        let (filename, payload) = read_envelope(&data, "pw").unwrap();
        assert_eq!(filename, "notes.txt");
        assert_eq!(payload, b"v1 secret payload");
    }

    #[test]
    fn test_legacy_envelope_wrong_password() {
        let data = hex::decode(concat!(
            "0109080706c7b1bbcec8e646001ce9165a6f6986",
            "0e511e04f5e7555c5887e6d3d1fb3656fae0f634"
        ))
        .unwrap();
        let result = read_envelope(&data, "pW");
        assert!(matches!(result, Err(SpritzError::BadPasswordOrCorrupt)));
    }

    #[test]
    fn test_filename_longer_than_length_byte_is_rejected() {
        let name = "x".repeat(300);
        let result = wrap_writer_with_rng(
            Vec::new(),
            "pw",
            &name,
            &mut ScriptedRng::new(&[0; 8]),
        );
        assert!(matches!(result, Err(SpritzError::FilenameTooLong(300))));
    }

    #[test]
    fn test_empty_source_is_short_read() {
        let result = wrap_reader(std::io::empty(), "pw");
        assert!(matches!(result, Err(SpritzError::ShortRead)));
    }
}
