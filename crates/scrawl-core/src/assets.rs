//! Asset cache for image operations.
//!
//! Each image operation's asset is decoded at most once, keyed by the
//! operation id. Before the first successful decode nothing is drawn for
//! that operation; completion flags exactly one redraw. Failed decodes are
//! remembered so malformed assets are never retried, only logged.

use crate::ops::{ImageFormat, ImageOp, OpId};
use std::collections::{HashMap, HashSet, VecDeque};

/// A decoded RGBA8 bitmap.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows.
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Pixel at (x, y), or transparent black outside the bitmap.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0, 0];
        }
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

/// Session-scoped decode cache. Entries are immutable once inserted and
/// never evicted within a session.
#[derive(Debug, Default)]
pub struct AssetCache {
    decoded: HashMap<OpId, Bitmap>,
    failed: HashSet<OpId>,
    queue: VecDeque<(OpId, ImageOp)>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an asset for decoding. Re-requests for an id that already
    /// resolved (or failed) are ignored.
    pub fn request(&mut self, id: OpId, op: &ImageOp) {
        if self.decoded.contains_key(&id)
            || self.failed.contains(&id)
            || self.queue.iter().any(|(qid, _)| *qid == id)
        {
            return;
        }
        self.queue.push_back((id, op.clone()));
    }

    /// Drain the decode queue. Returns `true` when at least one asset
    /// resolved, i.e. a re-render is needed.
    pub fn poll(&mut self) -> bool {
        let mut resolved = false;
        while let Some((id, op)) = self.queue.pop_front() {
            match decode(&op) {
                Some(bitmap) => {
                    self.decoded.insert(id, bitmap);
                    resolved = true;
                }
                None => {
                    log::warn!("asset decode failed for operation {id}");
                    self.failed.insert(id);
                }
            }
        }
        resolved
    }

    pub fn get(&self, id: &OpId) -> Option<&Bitmap> {
        self.decoded.get(id)
    }

    pub fn has_failed(&self, id: &OpId) -> bool {
        self.failed.contains(id)
    }
}

/// Decode an image payload. Only PNG is decoded natively; other formats
/// are left to the embedding renderer and fail here quietly.
fn decode(op: &ImageOp) -> Option<Bitmap> {
    let data = op.data()?;
    match ImageFormat::from_magic_bytes(&data)? {
        ImageFormat::Png => decode_png(&data),
        ImageFormat::Jpeg => None,
    }
}

fn decode_png(data: &[u8]) -> Option<Bitmap> {
    let decoder = png::Decoder::new(std::io::Cursor::new(data));
    let mut reader = decoder.read_info().ok()?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).ok()?;
    buf.truncate(info.buffer_size());

    let pixels = match info.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => {
            let mut out = Vec::with_capacity(buf.len() / 3 * 4);
            for px in buf.chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
            out
        }
        png::ColorType::Grayscale => {
            let mut out = Vec::with_capacity(buf.len() * 4);
            for &g in &buf {
                out.extend_from_slice(&[g, g, g, 255]);
            }
            out
        }
        png::ColorType::GrayscaleAlpha => {
            let mut out = Vec::with_capacity(buf.len() * 2);
            for px in buf.chunks_exact(2) {
                out.extend_from_slice(&[px[0], px[0], px[0], px[1]]);
            }
            out
        }
        png::ColorType::Indexed => return None,
    };

    Some(Bitmap {
        width: info.width,
        height: info.height,
        pixels,
    })
}
