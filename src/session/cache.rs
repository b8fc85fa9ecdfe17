//! Per-frame fingerprints and the cache of composited frames.

use std::collections::BTreeMap;
use std::sync::Arc;

use xxhash_rust::xxh3::Xxh3;

use crate::model::frame::{Drawing, DrawingFrame, Tool};

const XXH3_SEED: u64 = 0x6f1a_2c3b_9d4e_5f70;

/// How much of a frame goes into its fingerprint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    /// Id, drawing count and total point count only. Edits that keep both counts (a recolor, a
    /// moved point) are not detected.
    Counts,
    /// Counts plus a hash of every drawing and of the base still.
    #[default]
    Content,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameFingerprint {
    pub id: u32,
    pub drawings: usize,
    pub points: usize,
    /// Zero in [`FingerprintMode::Counts`].
    pub content: u128,
}

pub fn fingerprint_frame(frame: &DrawingFrame, mode: FingerprintMode) -> FrameFingerprint {
    let content = match mode {
        FingerprintMode::Counts => 0,
        FingerprintMode::Content => {
            let mut h = StableHasher::new();
            h.write_u32(frame.width);
            h.write_u32(frame.height);
            h.write_bytes(&frame.image_data);
            h.write_u32(frame.drawings.len() as u32);
            for d in &frame.drawings {
                write_drawing(&mut h, d);
            }
            h.finish()
        }
    };
    FrameFingerprint {
        id: frame.id,
        drawings: frame.drawings.len(),
        points: frame.total_points(),
        content,
    }
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_bytes(&v.to_bits().to_le_bytes());
    }

    fn finish(self) -> u128 {
        self.inner.digest128()
    }
}

fn write_drawing(h: &mut StableHasher, d: &Drawing) {
    h.write_u8(match d.tool {
        Tool::Pen => 0,
        Tool::Line => 1,
        Tool::Rectangle => 2,
        Tool::Circle => 3,
    });
    h.write_bytes(&[d.color.r, d.color.g, d.color.b, d.color.a]);
    h.write_f64(d.pen_size);
    h.write_u32(d.points.len() as u32);
    for p in &d.points {
        h.write_f64(p.x);
        h.write_f64(p.y);
    }
}

/// Encoded composites keyed by frame id.
///
/// Holds at most `capacity` entries; inserting beyond that evicts the lowest ids. Entries are
/// only valid within one extraction, see [`FrameCache::begin_extraction`].
pub struct FrameCache {
    capacity: usize,
    mode: FingerprintMode,
    extraction: u64,
    entries: BTreeMap<u32, (FrameFingerprint, Arc<[u8]>)>,
}

impl FrameCache {
    pub fn new(capacity: usize, mode: FingerprintMode) -> Self {
        Self {
            capacity: capacity.max(1),
            mode,
            extraction: 0,
            entries: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> FingerprintMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything when frames come from a different extraction than the cached ones.
    pub fn begin_extraction(&mut self, extraction: u64) {
        if extraction != self.extraction {
            self.entries.clear();
            self.extraction = extraction;
        }
    }

    pub fn get(&self, fp: &FrameFingerprint) -> Option<Arc<[u8]>> {
        self.entries
            .get(&fp.id)
            .filter(|(cached, _)| cached == fp)
            .map(|(_, png)| Arc::clone(png))
    }

    pub fn insert(&mut self, fp: FrameFingerprint, png: Arc<[u8]>) {
        self.entries.insert(fp.id, (fp, png));
        while self.entries.len() > self.capacity {
            self.entries.pop_first();
        }
    }

    pub fn contains_id(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/cache.rs"]
mod tests;
