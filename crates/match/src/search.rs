//! The rolling search that turns a file and a signature into tokens.

use std::io::{self, Read, Seek};

use checksums::{FileDigest, MD4_DIGEST_LEN, RollingChecksum, RollingError, block_checksum};
use logging::{Logger, Role, debug_log};
use protocol::wire::CHUNK_SIZE;
use signature::FileSignature;

use crate::index::TagIndex;
use crate::map::MapFile;
use crate::sink::TokenSink;

/// What a search sent and the checksum that follows its tokens.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MatchReport {
    /// Blocks sent as copy tokens.
    pub matches: u64,
    /// Weak checksum hits rejected by the strong checksum.
    pub false_alarms: u64,
    /// Bytes sent as literal data.
    pub literal_bytes: u64,
    /// Bytes covered by copy tokens.
    pub matched_bytes: u64,
    /// Seeded MD4 over the whole file, in file order.
    pub digest: [u8; MD4_DIGEST_LEN],
}

/// Block search against one file's signature.
#[derive(Debug)]
pub struct HashSearch<'a> {
    signature: &'a FileSignature,
    index: TagIndex,
    seed: i32,
    logger: Logger,
}

struct Pending {
    digest: FileDigest,
    last_match: u64,
    report: MatchReport,
}

impl Pending {
    /// Sends `[last_match, upto)` as literal data.
    fn flush_literal<R, S>(&mut self, map: &mut MapFile<R>, sink: &mut S, upto: u64) -> io::Result<()>
    where
        R: Read + Seek,
        S: TokenSink + ?Sized,
    {
        while self.last_match < upto {
            let len = (upto - self.last_match).min(CHUNK_SIZE as u64) as usize;
            let data = map.read(self.last_match, len)?;
            self.digest.update(data);
            sink.literal(data)?;
            self.report.literal_bytes += len as u64;
            self.last_match += len as u64;
        }
        Ok(())
    }
}

impl<'a> HashSearch<'a> {
    /// Indexes `signature` for searching with the session `seed`.
    pub fn new(signature: &'a FileSignature, seed: i32) -> Self {
        Self {
            signature,
            index: TagIndex::new(signature.blocks()),
            seed,
            logger: Logger::quiet(Role::Sender),
        }
    }

    /// Reports potential matches and the final counts through `logger`.
    #[must_use]
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Scans the file behind `map` and emits its delta into `sink`,
    /// including the final end token.
    ///
    /// Matched blocks are sent as copy tokens and everything else as
    /// literal data, so replaying the tokens against the basis file the
    /// signature was made from reproduces the mapped file exactly.
    pub fn run<R, S>(&self, map: &mut MapFile<R>, sink: &mut S) -> io::Result<MatchReport>
    where
        R: Read + Seek,
        S: TokenSink + ?Sized,
    {
        let mut pending = Pending {
            digest: FileDigest::new(self.seed),
            last_match: 0,
            report: MatchReport::default(),
        };

        if !self.signature.is_empty() && !map.is_empty() {
            self.scan(map, sink, &mut pending)?;
        }
        let len = map.len();
        pending.flush_literal(map, sink, len)?;
        sink.end()?;

        let mut report = pending.report;
        report.digest = pending.digest.finalize();
        debug_log!(
            self.logger,
            Deltasum,
            2,
            "done hash search: matches={} false_alarms={} literal={} matched={}",
            report.matches,
            report.false_alarms,
            report.literal_bytes,
            report.matched_bytes
        );
        Ok(report)
    }

    fn scan<R, S>(&self, map: &mut MapFile<R>, sink: &mut S, pending: &mut Pending) -> io::Result<()>
    where
        R: Read + Seek,
        S: TokenSink + ?Sized,
    {
        let head = self.signature.head();
        let blocks = self.signature.blocks();
        let len = map.len();
        let block_length = u64::from(head.block_length);
        let last_len = u64::from(head.block_len(head.count - 1));
        // No block fits at or beyond `end`.
        let end = (len + 1).saturating_sub(last_len);

        let mut offset = 0u64;
        let mut k = block_length.min(len) as usize;
        let mut sum = RollingChecksum::from_block(map.read(0, k)?);

        while offset < end {
            if let Some(index) = self.find_match(map, offset, k, &sum, &mut pending.report)? {
                let block_len = blocks[index as usize].len;
                pending.flush_literal(map, sink, offset)?;
                pending.digest.update(map.read(offset, block_len as usize)?);
                sink.copy(index, block_len)?;
                pending.report.matches += 1;
                pending.report.matched_bytes += u64::from(block_len);

                offset += u64::from(block_len);
                pending.last_match = offset;
                k = block_length.min(len - offset) as usize;
                sum = RollingChecksum::from_block(map.read(offset, k)?);
                continue;
            }

            let backup = (offset - pending.last_match) as usize;
            let more = offset + (k as u64) < len;
            let window = map.read(pending.last_match, backup + k + usize::from(more))?;
            let outgoing = window[backup];
            if more {
                sum.roll(outgoing, window[backup + k]).map_err(rolling_error)?;
            } else {
                sum.trim_front(outgoing).map_err(rolling_error)?;
                k -= 1;
            }
            offset += 1;

            // Bound the literal run kept in the window.
            if offset - pending.last_match >= CHUNK_SIZE as u64 + block_length
                && end.saturating_sub(offset) > CHUNK_SIZE as u64
            {
                pending.flush_literal(map, sink, offset)?;
            }
        }
        Ok(())
    }

    fn find_match<R: Read + Seek>(
        &self,
        map: &mut MapFile<R>,
        offset: u64,
        k: usize,
        sum: &RollingChecksum,
        report: &mut MatchReport,
    ) -> io::Result<Option<u32>> {
        let blocks = self.signature.blocks();
        let checksum_length = self.signature.head().checksum_length;
        let value = sum.value();
        let mut strong = None;

        for index in self.index.candidates(sum.tag()) {
            let block = &blocks[index as usize];
            if block.sum1 != value || block.len as usize != k {
                continue;
            }
            debug_log!(
                self.logger,
                Deltasum,
                3,
                "potential match at {offset} i={index} sum={value:08x}"
            );
            let digest = match strong {
                Some(digest) => digest,
                None => {
                    let digest = block_checksum(map.read(offset, k)?, self.seed);
                    strong = Some(digest);
                    digest
                }
            };
            if digest[..checksum_length as usize] != *block.strong(checksum_length) {
                report.false_alarms += 1;
                continue;
            }
            return Ok(Some(index));
        }
        Ok(None)
    }
}

fn rolling_error(error: RollingError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, error)
}
