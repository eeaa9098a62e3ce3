use std::io::{self, Read};

use checksums::{FileDigest, MD4_DIGEST_LEN};

const READ_SIZE: usize = 64 * 1024;

/// Seeded MD4 of everything `reader` yields, the checksum that trails a
/// file's token stream.
///
/// The sender runs this on a second handle to the file while the first one
/// streams literal data.
pub fn whole_file_digest<R: Read>(mut reader: R, seed: i32) -> io::Result<[u8; MD4_DIGEST_LEN]> {
    let mut digest = FileDigest::new(seed);
    let mut buffer = vec![0u8; READ_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        digest.update(&buffer[..read]);
    }
    Ok(digest.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_incremental_digest() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i * 7) as u8).collect();
        let mut expected = FileDigest::new(99);
        expected.update(&data);
        assert_eq!(whole_file_digest(data.as_slice(), 99).expect("digest"), expected.finalize());
    }

    #[test]
    fn empty_input_digests_the_seed() {
        let got = whole_file_digest(io::empty(), 0x1234).expect("digest");
        assert_eq!(got, checksums::Md4::digest(&0x1234i32.to_le_bytes()));
    }
}
