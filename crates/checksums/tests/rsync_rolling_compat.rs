//! Weak checksum compatibility with the reference implementation.
//!
//! The fixture is a 3 MiB file made of 1 MiB of `0x11`, 1 MiB of `0xbb` and
//! 1 MiB of `0xee`, checksummed in independent 1768-byte chunks. The values
//! for chunks that contain bytes at or above `0x80` only come out right when
//! bytes are sign-extended.

use checksums::{RollingChecksum, weak_checksum};

const MIB: usize = 1 << 20;
const CHUNK: usize = 1768;

fn fixture() -> Vec<u8> {
    let mut data = Vec::with_capacity(3 * MIB);
    data.resize(MIB, 0x11);
    data.resize(2 * MIB, 0xbb);
    data.resize(3 * MIB, 0xee);
    data
}

/// (checksum, number of consecutive chunks with that checksum)
const EXPECTED_RUNS: [(u32, usize); 6] = [
    (0xa5d4_7568, 593),
    (0x2364_5688, 1),
    (0x8c1c_2378, 592),
    (0x1250_4720, 1),
    (0x7d98_83b0, 592),
    (0x61b8_dff0, 1),
];

#[test]
fn chunked_checksums_match_reference_values() {
    let data = fixture();
    let sums: Vec<u32> = data.chunks(CHUNK).map(weak_checksum).collect();

    let expected: Vec<u32> = EXPECTED_RUNS
        .iter()
        .flat_map(|&(sum, count)| std::iter::repeat_n(sum, count))
        .collect();
    assert_eq!(sums.len(), expected.len());
    for (index, (got, want)) in sums.iter().zip(&expected).enumerate() {
        assert_eq!(got, want, "chunk {index}: got {got:#010x}, want {want:#010x}");
    }
}

#[test]
fn first_chunk_boundary_values() {
    let data = fixture();
    assert_eq!(weak_checksum(&data[..CHUNK]), 0xa5d4_7568);
    assert_eq!(weak_checksum(&data[593 * CHUNK..594 * CHUNK]), 0x2364_5688);
}

#[test]
fn rolling_across_the_first_boundary_agrees_with_fresh_sums() {
    let data = fixture();
    let start = MIB - CHUNK;
    let mut rolling = RollingChecksum::from_block(&data[start..start + CHUNK]);
    for offset in start + 1..=MIB {
        rolling
            .roll(data[offset - 1], data[offset + CHUNK - 1])
            .expect("non-empty window");
        assert_eq!(
            rolling.value(),
            weak_checksum(&data[offset..offset + CHUNK]),
            "offset {offset}"
        );
    }
}
