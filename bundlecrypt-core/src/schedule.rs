use tracing::{debug, warn};

use crate::crc32;
use crate::error::{CryptError, Result};

/// Identifiers are fixed-width in the scheme: the first 36 bytes of the
/// asset id are hashed, zero-padded when the id is shorter.
pub const IDENTIFIER_LEN: usize = 36;

/// Ceiling on generated fragment steps. `frag_size` is derived so that about
/// a hundred fragments cover the whole layout; crossing this ceiling means
/// the generator and the encoder have diverged.
pub const MAX_STEPS: usize = 128;

/// Sizing margin the encoder adds before deriving fragment sizes. Protocol
/// constant; the layout is only byte-identical if this matches.
const SIZING_MARGIN: i64 = 1000;

/// Initial generator state. Protocol constant.
const SEED: i64 = 0x3F_FFFF_EFFF_FFFF;

/// One contiguous run of the decrypted stream and where its bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyEvent {
    /// Offset into the physical bundle, or into the key fragment when
    /// `source_is_key` is set.
    pub source_offset: u32,
    pub length: u32,
    pub source_is_key: bool,
    /// Starting offset of the run in the decrypted (logical) stream.
    pub dest_offset: u32,
}

/// The complete copy-event layout for one bundle.
///
/// Built once from the identifier, the encrypted length and the key
/// fragment, then immutable. Events are stored in ascending, contiguous
/// `dest_offset` order and tile `[0, padded_len)` exactly; `dest_offsets`
/// carries the same start offsets in a flat index the locator can probe
/// without touching the event structs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub events: Vec<CopyEvent>,
    pub dest_offsets: Vec<u32>,
    /// True decrypted length: physical length plus key fragment length.
    pub logical_len: i64,
    /// Layout length including the encoder's sizing margin. Offsets in
    /// `[logical_len, padded_len)` exist only to keep fragment sizing
    /// stable and are never requested by the stream.
    pub padded_len: i64,
    avg_fragment: i64,
}

/// Fragment-length generator keyed off the identifier checksum.
///
/// 64-bit signed wrapping arithmetic throughout; the remainder keeps the
/// dividend's sign, so every draw lands in `(0, 2 * frag_size)`. Each draw
/// is both the next state and the next raw fragment length.
struct FragmentRng {
    state: i64,
    crc: i64,
    frag_size: i64,
}

impl FragmentRng {
    fn next(&mut self) -> i64 {
        self.state = self
            .state
            .wrapping_mul(self.crc)
            .wrapping_add(self.state)
            % self.frag_size
            + self.frag_size;
        self.state
    }
}

impl Schedule {
    /// Derives the copy-event schedule for one bundle.
    ///
    /// `physical_len` is the exact byte length of the encrypted source,
    /// excluding the key fragment. Every numeric operation below is part of
    /// the scheme: the generator, the clamps, the swap formula and the walk
    /// order must all match the encoder bit for bit, or the derived layout
    /// no longer lines up with the shuffled data.
    pub fn build(identifier: &[u8], physical_len: u64, key_fragment: &[u8]) -> Result<Self> {
        if identifier.is_empty() {
            return Err(CryptError::EmptyIdentifier);
        }
        if key_fragment.is_empty() {
            return Err(CryptError::EmptyKeyFragment);
        }
        let key_len = key_fragment.len();

        // Copy events address both byte spaces with u32 offsets, so the
        // whole padded layout has to fit one.
        let padded_len = physical_len
            .checked_add(key_len as u64 + SIZING_MARGIN as u64)
            .filter(|&len| len <= u32::MAX as u64)
            .ok_or(CryptError::BundleTooLarge {
                physical_len,
                key_len,
            })?;

        let padded_len = padded_len as i64;
        let physical_len = physical_len as i64;
        let logical_len = physical_len + key_len as i64;

        // 1. Seed the generator from the fixed-width identifier buffer.
        let crc = crc32::compute(&identifier_buf(identifier));

        // 2. Fragment sizing: about a hundred fragments, never below 1000
        // bytes.
        let frag_size = (padded_len / 100).max(1000);

        let mut rng = FragmentRng {
            state: SEED,
            crc: crc as i64,
            frag_size,
        };

        // 3. Step generation: split [0, padded_len) into pseudo-random
        // fragments, clamping the last one to the layout end.
        let mut steps: Vec<(i64, i64)> = Vec::with_capacity(MAX_STEPS);
        let mut pos = 0i64;
        while pos < padded_len {
            if steps.len() == MAX_STEPS {
                return Err(CryptError::ScheduleOverflow {
                    max: MAX_STEPS,
                    padded_len,
                });
            }
            let mut len = rng.next();
            if pos + len > padded_len {
                len = padded_len - pos;
            }
            steps.push((pos, len));
            pos += len;
        }
        let step_count = steps.len();

        // 4. Keyed permutation. Index 0 never moves; swap targets land in
        // [1, step_count - 1].
        let mut indices: Vec<usize> = (0..step_count).collect();
        for i in 1..step_count {
            let target = (rng.next() % (step_count as i64 - 1)) as usize + 1;
            indices.swap(i, target);
        }

        // 5. Fragments were emitted into the shuffled layout in permuted
        // order, so each step's shuffled offset is its prefix sum in that
        // order.
        let mut shuffled_offset = vec![0i64; step_count];
        let mut offset = 0i64;
        for &index in &indices {
            shuffled_offset[index] = offset;
            offset += steps[index].1;
        }

        // 6. Walk the original step order, splitting fragments that straddle
        // the end of the physical bundle into a physical part followed by a
        // key part. Dest offsets are assigned contiguously in this walk, so
        // they come out ascending with no gaps.
        let mut events = Vec::with_capacity(step_count + 1);
        let mut dest_offsets = Vec::with_capacity(step_count + 1);
        for (step_index, &(dest, len)) in steps.iter().enumerate() {
            let src = shuffled_offset[step_index];
            if src + len <= physical_len {
                dest_offsets.push(dest as u32);
                events.push(CopyEvent {
                    source_offset: src as u32,
                    length: len as u32,
                    source_is_key: false,
                    dest_offset: dest as u32,
                });
            } else if src >= physical_len {
                dest_offsets.push(dest as u32);
                events.push(CopyEvent {
                    source_offset: (src - physical_len) as u32,
                    length: len as u32,
                    source_is_key: true,
                    dest_offset: dest as u32,
                });
            } else {
                let physical_part = physical_len - src;
                dest_offsets.push(dest as u32);
                events.push(CopyEvent {
                    source_offset: src as u32,
                    length: physical_part as u32,
                    source_is_key: false,
                    dest_offset: dest as u32,
                });
                dest_offsets.push((dest + physical_part) as u32);
                events.push(CopyEvent {
                    source_offset: 0,
                    length: (len - physical_part) as u32,
                    source_is_key: true,
                    dest_offset: (dest + physical_part) as u32,
                });
            }
        }

        let avg_fragment = (padded_len / events.len() as i64).max(1);

        debug!(
            events = events.len(),
            steps = step_count,
            frag_size,
            logical_len,
            "derived shuffle schedule"
        );

        Ok(Schedule {
            events,
            dest_offsets,
            logical_len,
            padded_len,
            avg_fragment,
        })
    }

    /// Index of the event containing logical offset `p`, or `None` outside
    /// `[0, padded_len)`.
    ///
    /// Fragment lengths are bounded around `frag_size`, so dividing by the
    /// average lands on or next to the right slot; a directed probe covers
    /// the miss cases without scanning the whole table.
    pub fn locate(&self, p: i64) -> Option<usize> {
        if p < 0 || p >= self.padded_len {
            return None;
        }
        let p = p as u32;
        let last = self.events.len() - 1;
        let guess = ((p as i64 / self.avg_fragment) as usize).min(last);

        if self.contains(guess, p) {
            return Some(guess);
        }

        if self.dest_offsets[guess] > p {
            let mut index = guess;
            while index > 0 {
                index -= 1;
                if self.contains(index, p) {
                    return Some(index);
                }
            }
        } else {
            let mut index = guess;
            while index < last {
                index += 1;
                if self.contains(index, p) {
                    return Some(index);
                }
            }
        }

        // Correctness net: reaching it means the probe's geometry
        // assumptions no longer hold for this schedule.
        warn!(offset = p, "fast locator missed, falling back to linear scan");
        self.locate_linear(p as i64)
    }

    /// Plain scan over every event; the locator's defensive fallback.
    pub(crate) fn locate_linear(&self, p: i64) -> Option<usize> {
        if p < 0 || p >= self.padded_len {
            return None;
        }
        let p = p as u32;
        (0..self.events.len()).find(|&index| self.contains(index, p))
    }

    fn contains(&self, index: usize, p: u32) -> bool {
        let start = self.dest_offsets[index];
        start <= p && p - start < self.events[index].length
    }
}

/// First 36 bytes of the identifier, zero-padded. The scheme hashes a
/// fixed-width buffer, not the raw string.
fn identifier_buf(identifier: &[u8]) -> [u8; IDENTIFIER_LEN] {
    let mut buf = [0u8; IDENTIFIER_LEN];
    let take = identifier.len().min(IDENTIFIER_LEN);
    buf[..take].copy_from_slice(&identifier[..take]);
    buf
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    const GUID: &str = "f47ac10b-58cc-4372-a567-0e02b2c3d479";

    const SHAPES: [(u64, usize); 4] = [(0, 16), (1500, 16), (5000, 32), (30_000, 64)];

    fn build(physical_len: u64, key_len: usize) -> Schedule {
        Schedule::build(GUID.as_bytes(), physical_len, &vec![0x11; key_len]).unwrap()
    }

    #[test]
    fn deterministic_across_builds() {
        assert_eq!(build(5000, 32), build(5000, 32));
        assert_eq!(build(0, 16), build(0, 16));
    }

    #[test]
    fn events_tile_the_decrypted_space() {
        for (physical_len, key_len) in SHAPES {
            let schedule = build(physical_len, key_len);
            assert_eq!(schedule.events.len(), schedule.dest_offsets.len());

            let mut expected_dest = 0u32;
            for (event, &dest) in schedule.events.iter().zip(&schedule.dest_offsets) {
                assert_eq!(event.dest_offset, dest);
                assert_eq!(event.dest_offset, expected_dest);
                assert!(event.length > 0);
                expected_dest += event.length;
            }
            assert_eq!(expected_dest as i64, schedule.padded_len);
            assert_eq!(schedule.logical_len, physical_len as i64 + key_len as i64);
            assert_eq!(schedule.padded_len, schedule.logical_len + 1000);
        }
    }

    #[test]
    fn sources_partition_the_shuffled_layout() {
        for (physical_len, key_len) in SHAPES {
            let schedule = build(physical_len, key_len);
            let physical_len = physical_len as u32;

            let mut sources: Vec<(u32, u32)> = schedule
                .events
                .iter()
                .map(|event| {
                    let start = if event.source_is_key {
                        physical_len + event.source_offset
                    } else {
                        // physical runs never cross into key territory
                        assert!(event.source_offset + event.length <= physical_len);
                        event.source_offset
                    };
                    (start, event.length)
                })
                .collect();

            sources.sort_unstable();
            let mut expected = 0u32;
            for (start, length) in sources {
                assert_eq!(start, expected);
                expected += length;
            }
            assert_eq!(expected as i64, schedule.padded_len);
        }
    }

    #[test]
    fn identifier_is_fixed_width() {
        let long = b"f47ac10b-58cc-4372-a567-0e02b2c3d479-extra-tail";
        assert_eq!(
            Schedule::build(long, 2048, &[0x22; 8]).unwrap(),
            Schedule::build(&long[..IDENTIFIER_LEN], 2048, &[0x22; 8]).unwrap(),
        );

        let mut padded = [0u8; IDENTIFIER_LEN];
        padded[..3].copy_from_slice(b"abc");
        assert_eq!(
            Schedule::build(b"abc", 2048, &[0x22; 8]).unwrap(),
            Schedule::build(&padded, 2048, &[0x22; 8]).unwrap(),
        );
    }

    #[test]
    fn key_only_bundle_builds() {
        // no physical source at all: the whole stream resolves from the key
        let schedule = build(0, 48);
        assert_eq!(schedule.logical_len, 48);
        assert!(schedule.events.iter().all(|event| event.source_is_key));
    }

    #[test]
    fn locator_agrees_with_linear_scan() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for (physical_len, key_len) in SHAPES {
            let schedule = build(physical_len, key_len);
            for _ in 0..10_000 {
                let p = rng.gen_range(0..schedule.padded_len);
                assert_eq!(schedule.locate(p), schedule.locate_linear(p), "offset {p}");
            }
            assert_eq!(schedule.locate(-1), None);
            assert_eq!(schedule.locate(schedule.padded_len), None);
        }
    }

    #[test]
    fn rejects_contract_violations() {
        assert!(matches!(
            Schedule::build(b"", 100, &[0x11; 4]),
            Err(CryptError::EmptyIdentifier)
        ));
        assert!(matches!(
            Schedule::build(GUID.as_bytes(), 100, b""),
            Err(CryptError::EmptyKeyFragment)
        ));
        assert!(matches!(
            Schedule::build(GUID.as_bytes(), u32::MAX as u64, &[0x11; 4]),
            Err(CryptError::BundleTooLarge { .. })
        ));
    }
}
