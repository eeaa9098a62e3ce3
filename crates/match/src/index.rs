use rustc_hash::FxHashMap;

use protocol::wire::SumBuf;

/// Signature blocks grouped by the tag of their weak checksum.
///
/// Blocks are ordered by tag with ties kept in block order, and a map from
/// tag to the position of its first block gives the candidate run for a
/// rolling checksum in one lookup.
#[derive(Clone, Debug, Default)]
pub struct TagIndex {
    targets: Vec<(u16, u32)>,
    first: FxHashMap<u16, usize>,
}

impl TagIndex {
    /// Indexes `blocks`.
    pub fn new(blocks: &[SumBuf]) -> Self {
        let mut targets: Vec<(u16, u32)> = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (checksums::tag(block.sum1), i as u32))
            .collect();
        targets.sort_by_key(|&(tag, _)| tag);

        let mut first = FxHashMap::default();
        for (position, &(tag, _)) in targets.iter().enumerate() {
            first.entry(tag).or_insert(position);
        }
        Self { targets, first }
    }

    /// Block indices sharing `tag`, in block order.
    pub fn candidates(&self, tag: u16) -> impl Iterator<Item = u32> + '_ {
        let start = self.first.get(&tag).copied().unwrap_or(self.targets.len());
        self.targets[start..]
            .iter()
            .take_while(move |&&(t, _)| t == tag)
            .map(|&(_, index)| index)
    }

    /// Number of indexed blocks.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
