//! Raster flattening for `save()`.
//!
//! A minimal software rasterizer: the reduced scene is stamped onto an
//! opaque white RGBA8 pixmap and PNG-encoded. This is not the display
//! renderer; interactive rasterization is delegated to the embedding
//! surface. This path only exists so a board can be flattened to an image.

use crate::assets::AssetCache;
use crate::ops::{OpBody, Operation, Rgba, HIGHLIGHTER_ALPHA};
use kurbo::{BezPath, Point};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("surface has zero area")]
    EmptySurface,
    #[error("png encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
}

/// An opaque RGBA8 pixel surface.
#[derive(Debug, Clone)]
pub struct Pixmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Pixmap {
    /// Create a white-filled pixmap.
    pub fn white(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![255; (width * height * 4) as usize],
        }
    }

    /// Alpha-blend a color over the pixel at (x, y).
    fn blend(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = ((y as u32 * self.width + x as u32) * 4) as usize;
        let a = color.a as u32;
        for (offset, src) in [color.r, color.g, color.b].into_iter().enumerate() {
            let dst = self.pixels[i + offset] as u32;
            self.pixels[i + offset] = ((src as u32 * a + dst * (255 - a)) / 255) as u8;
        }
    }

    /// Stroke a polyline with a round pen. The whole polyline is
    /// accumulated as one coverage mask and blended once, so a
    /// translucent color never compounds where stamps overlap.
    pub fn stroke_polyline(&mut self, points: &[Point], width: f64, color: Rgba) {
        let mut coverage = Coverage::new(self.width, self.height);
        coverage.polyline(points, width);
        self.fill_coverage(&coverage, color);
    }

    /// Stroke a Bézier path by flattening it into polylines. All subpaths
    /// share one coverage mask; self-intersections stay single-blended.
    pub fn stroke_path(&mut self, path: &BezPath, width: f64, color: Rgba) {
        let mut coverage = Coverage::new(self.width, self.height);
        let mut current: Vec<Point> = Vec::new();
        let mut start: Option<Point> = None;
        path.flatten(0.25, |el| match el {
            kurbo::PathEl::MoveTo(p) => {
                if current.len() > 1 {
                    coverage.polyline(&std::mem::take(&mut current), width);
                } else {
                    current.clear();
                }
                start = Some(p);
                current.push(p);
            }
            kurbo::PathEl::LineTo(p) => current.push(p),
            kurbo::PathEl::ClosePath => {
                if let Some(s) = start {
                    current.push(s);
                }
            }
            // flatten() only emits moves, lines and closes
            _ => {}
        });
        if current.len() > 1 {
            coverage.polyline(&current, width);
        }
        self.fill_coverage(&coverage, color);
    }

    /// Blend the color once over every covered pixel.
    fn fill_coverage(&mut self, coverage: &Coverage, color: Rgba) {
        for y in 0..self.height {
            for x in 0..self.width {
                if coverage.covered(x, y) {
                    self.blend(x as i64, y as i64, color);
                }
            }
        }
    }

    /// Draw a decoded bitmap into a destination rectangle, nearest-neighbor.
    pub fn draw_bitmap(&mut self, bitmap: &crate::assets::Bitmap, dest: crate::ops::Bounds) {
        if dest.w <= 0.0 || dest.h <= 0.0 {
            return;
        }
        let x0 = dest.x.floor().max(0.0) as i64;
        let y0 = dest.y.floor().max(0.0) as i64;
        let x1 = ((dest.x + dest.w).ceil() as i64).min(self.width as i64);
        let y1 = ((dest.y + dest.h).ceil() as i64).min(self.height as i64);
        for y in y0..y1 {
            for x in x0..x1 {
                let u = ((x as f64 - dest.x) / dest.w * bitmap.width as f64) as u32;
                let v = ((y as f64 - dest.y) / dest.h * bitmap.height as f64) as u32;
                let [r, g, b, a] = bitmap.pixel(u, v);
                self.blend(x, y, Rgba::new(r, g, b, a));
            }
        }
    }

    /// Encode the pixmap as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, SaveError> {
        if self.width == 0 || self.height == 0 {
            return Err(SaveError::EmptySurface);
        }
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
        }
        Ok(bytes)
    }
}

/// Per-stroke pixel coverage mask.
struct Coverage {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Coverage {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; (width * height) as usize],
        }
    }

    fn covered(&self, x: u32, y: u32) -> bool {
        self.bits[(y * self.width + x) as usize]
    }

    fn set(&mut self, x: i64, y: i64) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        self.bits[(y as u32 * self.width + x as u32) as usize] = true;
    }

    /// Mark a filled disc.
    fn stamp(&mut self, center: Point, radius: f64) {
        let r = radius.max(0.5);
        let (cx, cy) = (center.x, center.y);
        for y in (cy - r).floor() as i64..=(cy + r).ceil() as i64 {
            for x in (cx - r).floor() as i64..=(cx + r).ceil() as i64 {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                if dx * dx + dy * dy <= r * r {
                    self.set(x, y);
                }
            }
        }
    }

    /// Mark a polyline by stamping discs along each segment.
    fn polyline(&mut self, points: &[Point], width: f64) {
        let radius = width / 2.0;
        for window in points.windows(2) {
            let (a, b) = (window[0], window[1]);
            let len = (b - a).hypot();
            let steps = (len.ceil() as usize).max(1);
            for i in 0..=steps {
                let t = i as f64 / steps as f64;
                self.stamp(
                    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t),
                    radius,
                );
            }
        }
        if points.len() == 1 {
            self.stamp(points[0], radius);
        }
    }
}

/// Flatten a reduced scene onto a fresh white pixmap.
///
/// Text-family operations are skipped: glyph rasterization lives in the
/// external text widget layer. Images without a decoded asset are skipped.
pub fn flatten_scene(
    scene: &[Operation],
    assets: &AssetCache,
    width: u32,
    height: u32,
) -> Result<Pixmap, SaveError> {
    if width == 0 || height == 0 {
        return Err(SaveError::EmptySurface);
    }
    let mut pixmap = Pixmap::white(width, height);
    for op in scene {
        match &op.body {
            OpBody::Stroke(p) => pixmap.stroke_path(&p.to_path(), p.size, p.color),
            OpBody::Highlighter(p) => {
                pixmap.stroke_path(&p.to_path(), p.size, p.color.with_alpha(HIGHLIGHTER_ALPHA))
            }
            OpBody::Shape(s) => pixmap.stroke_path(&s.to_path(), s.size, s.color),
            OpBody::Image(_) => {
                if let Some(bitmap) = assets.get(&op.id) {
                    pixmap.draw_bitmap(bitmap, op.pos);
                }
            }
            OpBody::Text(_) | OpBody::Latex(_) | OpBody::Emoji(_) | OpBody::Formula(_) => {}
            OpBody::Undo
            | OpBody::Redo
            | OpBody::Clear
            | OpBody::Update { .. }
            | OpBody::Remove { .. } => {}
        }
    }
    Ok(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{Bounds, PathOp};

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * pixmap.width + x) * 4) as usize;
        [
            pixmap.pixels[i],
            pixmap.pixels[i + 1],
            pixmap.pixels[i + 2],
            pixmap.pixels[i + 3],
        ]
    }

    #[test]
    fn test_white_background() {
        let pixmap = Pixmap::white(4, 4);
        assert_eq!(pixel(&pixmap, 0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn test_stroke_marks_pixels() {
        let mut pixmap = Pixmap::white(20, 20);
        pixmap.stroke_polyline(
            &[Point::new(2.0, 10.0), Point::new(18.0, 10.0)],
            3.0,
            Rgba::black(),
        );
        assert_eq!(pixel(&pixmap, 10, 10), [0, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 10, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn test_highlighter_blends() {
        let scene = vec![Operation::new(
            "u1",
            1,
            Bounds::new(0.0, 0.0, 20.0, 1.0),
            OpBody::Highlighter(PathOp {
                points: vec![
                    Point::new(0.0, 10.0),
                    Point::new(10.0, 10.0),
                    Point::new(19.0, 10.0),
                ],
                color: Rgba::black(),
                size: 4.0,
            }),
        )];
        let pixmap = flatten_scene(&scene, &AssetCache::new(), 20, 20).unwrap();
        let [r, _, _, _] = pixel(&pixmap, 10, 10);
        // 30% black over white leaves a visibly gray pixel.
        assert!(r > 150 && r < 200, "expected translucent blend, got {r}");
    }

    #[test]
    fn test_self_overlap_blends_once() {
        // A thick zig-zag whose stamps overlap heavily: every covered
        // pixel must carry exactly one application of the 0.3 alpha.
        // 30% black over white: (255 * (255 - 76)) / 255 = 179.
        let mut pixmap = Pixmap::white(30, 30);
        pixmap.stroke_polyline(
            &[
                Point::new(5.0, 15.0),
                Point::new(25.0, 15.0),
                Point::new(5.0, 16.0),
                Point::new(25.0, 17.0),
            ],
            8.0,
            Rgba::black().with_alpha(0.3),
        );
        let [r, _, _, _] = pixel(&pixmap, 15, 15);
        assert_eq!(r, 179);
    }

    #[test]
    fn test_separate_strokes_compound() {
        // Two distinct highlighter strokes crossing the same pixel darken
        // it twice; only overlap within a single stroke is collapsed.
        let mut pixmap = Pixmap::white(30, 30);
        let translucent = Rgba::black().with_alpha(0.3);
        pixmap.stroke_polyline(
            &[Point::new(5.0, 15.0), Point::new(25.0, 15.0)],
            4.0,
            translucent,
        );
        pixmap.stroke_polyline(
            &[Point::new(15.0, 5.0), Point::new(15.0, 25.0)],
            4.0,
            translucent,
        );
        let [crossing, _, _, _] = pixel(&pixmap, 15, 15);
        let [single, _, _, _] = pixel(&pixmap, 6, 15);
        assert_eq!(single, 179);
        assert!(crossing < single);
    }

    #[test]
    fn test_undrawn_image_skipped() {
        let scene = vec![Operation::new(
            "u1",
            1,
            Bounds::new(0.0, 0.0, 10.0, 10.0),
            OpBody::Image(crate::ops::ImageOp::new("data:image/png;base64,AAAA")),
        )];
        let pixmap = flatten_scene(&scene, &AssetCache::new(), 10, 10).unwrap();
        assert_eq!(pixel(&pixmap, 5, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn test_png_round_trip() {
        let pixmap = Pixmap::white(3, 2);
        let bytes = pixmap.encode_png().unwrap();
        let decoder = png::Decoder::new(std::io::Cursor::new(&bytes));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!(info.width, 3);
        assert_eq!(info.height, 2);
    }

    #[test]
    fn test_zero_surface_rejected() {
        assert!(matches!(
            flatten_scene(&[], &AssetCache::new(), 0, 10),
            Err(SaveError::EmptySurface)
        ));
    }
}
