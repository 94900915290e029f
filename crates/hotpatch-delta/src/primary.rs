use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::engine::{ByteDiffEngine, EngineErrorCode, EngineOp, Progress};
use crate::error::{EngineError, EngineResult};
use crate::format::{decode_commands, encode_commands, Command, DeltaHeader};

/// Length of the block used to seed a match.
const SEED_LEN: usize = 16;
/// Source offsets remembered per seed block.
const MAX_CANDIDATES: usize = 8;
/// Bytes processed between cancellation checks and progress reports.
const CHECKPOINT: usize = 64 * 1024;
const ZSTD_LEVEL: i32 = 3;

/// In-process copy/insert delta engine.
///
/// The source is indexed in fixed-size blocks; the target is scanned byte
/// by byte, and any position that starts an indexed block is extended into
/// the longest matching copy. Unmatched bytes become inserts.
#[derive(Debug, Default)]
pub struct PrimaryEngine {
    cancelled: AtomicBool,
}

impl PrimaryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn checkpoint(&self, op: EngineOp) -> EngineResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(EngineError::failed(op, EngineErrorCode::Cancelled, "cancelled"));
        }
        Ok(())
    }

    fn compute_commands(
        &self,
        old: &[u8],
        new: &[u8],
        progress: Progress<'_>,
    ) -> EngineResult<Vec<Command>> {
        let mut index: HashMap<&[u8], Vec<usize>> = HashMap::new();
        for (block, chunk) in old.chunks_exact(SEED_LEN).enumerate() {
            let bucket = index.entry(chunk).or_default();
            if bucket.len() < MAX_CANDIDATES {
                bucket.push(block * SEED_LEN);
            }
        }

        let total = new.len() as u64;
        let mut commands = Vec::new();
        let mut pending = Vec::new();
        let mut pos = 0;
        let mut next_checkpoint = 0;

        while pos < new.len() {
            if pos >= next_checkpoint {
                self.checkpoint(EngineOp::Diff)?;
                progress(pos as u64, total);
                next_checkpoint = pos + CHECKPOINT;
            }

            let best = new
                .get(pos..pos + SEED_LEN)
                .and_then(|seed| index.get(seed))
                .and_then(|candidates| {
                    candidates
                        .iter()
                        .map(|&start| (start, common_prefix(&old[start..], &new[pos..])))
                        .max_by_key(|&(_, len)| len)
                });

            match best {
                Some((offset, len)) if len >= SEED_LEN => {
                    if !pending.is_empty() {
                        commands.push(Command::Insert(std::mem::take(&mut pending)));
                    }
                    commands.push(Command::Copy {
                        offset: offset as u64,
                        len: len as u64,
                    });
                    pos += len;
                }
                _ => {
                    pending.push(new[pos]);
                    pos += 1;
                }
            }
        }
        if !pending.is_empty() {
            commands.push(Command::Insert(pending));
        }
        progress(total, total);
        Ok(commands)
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

impl ByteDiffEngine for PrimaryEngine {
    fn name(&self) -> &'static str {
        "primary"
    }

    fn diff(&self, old: &[u8], new: &[u8], progress: Progress<'_>) -> EngineResult<Vec<u8>> {
        let commands = self.compute_commands(old, new, progress)?;
        let copies = commands
            .iter()
            .filter(|c| matches!(c, Command::Copy { .. }))
            .count();

        let stream = encode_commands(&commands);
        let compressed = zstd::encode_all(stream.as_slice(), ZSTD_LEVEL).map_err(|e| {
            EngineError::failed(EngineOp::Diff, EngineErrorCode::CompressFailed, e.to_string())
        })?;

        let mut out = Vec::with_capacity(compressed.len() + 20);
        DeltaHeader::for_target(new).write(&mut out);
        out.extend_from_slice(&compressed);
        debug!(
            old = old.len(),
            new = new.len(),
            commands = commands.len(),
            copies,
            delta = out.len(),
            "computed byte diff"
        );
        Ok(out)
    }

    fn apply(&self, old: &[u8], patch: &[u8], progress: Progress<'_>) -> EngineResult<Vec<u8>> {
        let (header, used) = DeltaHeader::read(patch)?;
        let stream = zstd::decode_all(&patch[used..]).map_err(|e| {
            EngineError::failed(EngineOp::Apply, EngineErrorCode::DecompressFailed, e.to_string())
        })?;
        let commands = decode_commands(&stream)?;

        let total = header.target_len;
        let capacity = usize::try_from(total).map_err(|_| {
            EngineError::failed(EngineOp::Apply, EngineErrorCode::CorruptPatch, "target too large")
        })?;
        let mut out = Vec::with_capacity(capacity.min(old.len().saturating_mul(4) + patch.len()));
        let mut next_checkpoint = 0;

        for command in commands {
            if out.len() >= next_checkpoint {
                self.checkpoint(EngineOp::Apply)?;
                progress(out.len() as u64, total);
                next_checkpoint = out.len() + CHECKPOINT;
            }
            match command {
                Command::Copy { offset, len } => {
                    let range = usize::try_from(offset)
                        .ok()
                        .zip(usize::try_from(len).ok())
                        .and_then(|(start, len)| Some(start..start.checked_add(len)?))
                        .filter(|range| range.end <= old.len())
                        .ok_or_else(|| {
                            EngineError::failed(
                                EngineOp::Apply,
                                EngineErrorCode::CorruptPatch,
                                format!("copy {offset}+{len} outside source of {} bytes", old.len()),
                            )
                        })?;
                    out.extend_from_slice(&old[range]);
                }
                Command::Insert(bytes) => out.extend_from_slice(&bytes),
            }
        }

        if out.len() as u64 != header.target_len {
            return Err(EngineError::failed(
                EngineOp::Apply,
                EngineErrorCode::SizeMismatch,
                format!("expected {} bytes, produced {}", header.target_len, out.len()),
            ));
        }
        if crc32fast::hash(&out) != header.target_crc32 {
            return Err(EngineError::failed(
                EngineOp::Apply,
                EngineErrorCode::ChecksumMismatch,
                "reconstructed target does not match its checksum",
            ));
        }
        progress(total, total);
        Ok(out)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
