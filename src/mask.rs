//! Freehand inpainting mask over an uploaded image.
//!
//! The surface keeps the decoded background untouched and paints into a
//! separate coverage plane (one byte per pixel, 0 = untouched, 255 = fully
//! masked). Every export composites that plane as pure red over the
//! background, so the backend reads mask strength from the red channel.

use base64::Engine;
use bytes::Bytes;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, io::Cursor};
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};

pub const MASK_COLOR: [u8; 3] = [255, 0, 0];
pub const DEFAULT_BRUSH_SIZE: f32 = 20.0;
pub const MIN_BRUSH_SIZE: f32 = 1.0;
pub const MAX_BRUSH_SIZE: f32 = 100.0;
const UNDO_DEPTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self { Self { x, y } }

    /// Maps a position on a scaled display of the raster back into raster pixels.
    pub fn from_display(x: f32, y: f32, display: (f32, f32), raster: (u32, u32)) -> Self {
        let scale = |v: f32, shown: f32, actual: u32| if shown > 0.0 { v * actual as f32 / shown } else { v };
        Self { x: scale(x, display.0, raster.0), y: scale(y, display.1, raster.1) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

/// Device-agnostic drag gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

impl PointerEvent {
    /// Touch input collapses onto the same drag model as the mouse.
    pub fn from_touch(phase: TouchPhase, at: Point) -> Self {
        match phase {
            TouchPhase::Start => Self::Down(at),
            TouchPhase::Move => Self::Move(at),
            TouchPhase::End | TouchPhase::Cancel => Self::Up,
        }
    }
}

/// A lossless image export plus its pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn to_base64(&self) -> String { base64::engine::general_purpose::STANDARD.encode(&self.bytes) }

    pub fn to_data_url(&self) -> String { format!("data:image/png;base64,{}", self.to_base64()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskStats {
    pub masked_pixels: u64,
    pub total_pixels: u64,
}

impl MaskStats {
    pub fn coverage(&self) -> f32 {
        if self.total_pixels == 0 { 0.0 } else { self.masked_pixels as f32 / self.total_pixels as f32 }
    }
}

pub struct MaskSurface {
    background: RgbaImage,
    coverage: GrayImage,
    tool: Tool,
    brush_size: f32,
    last_point: Option<Point>,
    history: VecDeque<GrayImage>,
    strokes: usize,
}

impl std::fmt::Debug for MaskSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskSurface")
            .field("dimensions", &self.dimensions())
            .field("tool", &self.tool)
            .field("brush_size", &self.brush_size)
            .field("stroking", &self.is_stroking())
            .field("strokes", &self.strokes)
            .finish()
    }
}

impl MaskSurface {
    pub fn new(background: DynamicImage) -> ClientResult<Self> {
        let background = background.to_rgba8();
        let (w, h) = background.dimensions();
        if w == 0 || h == 0 {
            return Err(ClientError::ImageLoad("image has no pixels".into()));
        }
        info!("🖌️ Mask surface bound to {}x{} background", w, h);
        Ok(Self {
            background,
            coverage: GrayImage::new(w, h),
            tool: Tool::default(),
            brush_size: DEFAULT_BRUSH_SIZE,
            last_point: None,
            history: VecDeque::new(),
            strokes: 0,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> ClientResult<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Self::new(decoded)
    }

    /// Decodes off the async executor and resolves once the surface is ready.
    pub async fn load(bytes: Bytes) -> ClientResult<Self> {
        tokio::task::spawn_blocking(move || Self::from_bytes(&bytes))
            .await
            .map_err(|e| ClientError::ImageLoad(format!("decode task failed: {e}")))?
    }

    /// Rebinds to a new background, discarding all mask state.
    pub fn initialize(&mut self, bytes: &[u8]) -> ClientResult<()> {
        let fresh = Self::from_bytes(bytes)?;
        let (tool, brush_size) = (self.tool, self.brush_size);
        *self = fresh;
        self.tool = tool;
        self.brush_size = brush_size;
        Ok(())
    }

    pub fn dimensions(&self) -> (u32, u32) { self.background.dimensions() }
    pub fn tool(&self) -> Tool { self.tool }
    pub fn set_tool(&mut self, tool: Tool) { self.tool = tool; }
    pub fn brush_size(&self) -> f32 { self.brush_size }
    pub fn set_brush_size(&mut self, size: f32) { self.brush_size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE); }
    pub fn is_stroking(&self) -> bool { self.last_point.is_some() }
    pub fn stroke_count(&self) -> usize { self.strokes }
    pub fn can_undo(&self) -> bool { !self.history.is_empty() }

    /// Mask strength at a pixel, 0 when out of bounds.
    pub fn coverage_at(&self, x: u32, y: u32) -> u8 {
        self.coverage.get_pixel_checked(x, y).map(|p| p.0[0]).unwrap_or(0)
    }

    pub fn begin_stroke(&mut self, at: Point) {
        self.end_stroke();
        self.snapshot();
        self.paint_segment(at, at);
        self.last_point = Some(at);
        self.strokes += 1;
    }

    pub fn continue_stroke(&mut self, to: Point) {
        let Some(from) = self.last_point else { return };
        self.paint_segment(from, to);
        self.last_point = Some(to);
    }

    pub fn end_stroke(&mut self) { self.last_point = None; }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down(p) => self.begin_stroke(p),
            PointerEvent::Move(p) => self.continue_stroke(p),
            PointerEvent::Up => self.end_stroke(),
        }
    }

    pub fn clear(&mut self) {
        self.end_stroke();
        self.snapshot();
        self.coverage.pixels_mut().for_each(|p| p.0[0] = 0);
        debug!("Mask cleared");
    }

    pub fn invert(&mut self) {
        self.end_stroke();
        self.snapshot();
        self.coverage.pixels_mut().for_each(|p| p.0[0] = 255 - p.0[0]);
        debug!("Mask inverted");
    }

    /// Restores the coverage from before the last stroke, clear or invert.
    pub fn undo(&mut self) -> bool {
        self.end_stroke();
        match self.history.pop_back() {
            Some(previous) => { self.coverage = previous; true }
            None => false,
        }
    }

    pub fn stats(&self) -> MaskStats {
        let masked_pixels = self.coverage.pixels().filter(|p| p.0[0] > 0).count() as u64;
        let (w, h) = self.dimensions();
        MaskStats { masked_pixels, total_pixels: w as u64 * h as u64 }
    }

    /// Background with the mask composited on top, encoded as PNG.
    pub fn serialize(&self) -> ClientResult<EncodedImage> {
        let mut out = self.background.clone();
        for (px, cov) in out.pixels_mut().zip(self.coverage.pixels()) {
            *px = source_over(*px, cov.0[0]);
        }
        encode_png(&out)
    }

    /// Background multiplied by the red mask tint, for human inspection only.
    pub fn preview_composite(&self) -> ClientResult<EncodedImage> {
        let mut out = self.background.clone();
        for (px, cov) in out.pixels_mut().zip(self.coverage.pixels()) {
            *px = multiply(*px, cov.0[0]);
        }
        encode_png(&out)
    }

    fn snapshot(&mut self) {
        if self.history.len() == UNDO_DEPTH {
            self.history.pop_front();
        }
        self.history.push_back(self.coverage.clone());
    }

    /// Round-capped segment: every pixel whose center lies within half the
    /// brush width of the segment takes the tool's value.
    fn paint_segment(&mut self, from: Point, to: Point) {
        let value = match self.tool { Tool::Brush => 255u8, Tool::Eraser => 0u8 };
        let r = self.brush_size / 2.0;
        let (w, h) = self.coverage.dimensions();

        let min_x = (from.x.min(to.x) - r).floor().max(0.0) as u32;
        let min_y = (from.y.min(to.y) - r).floor().max(0.0) as u32;
        let max_x = (from.x.max(to.x) + r).ceil();
        let max_y = (from.y.max(to.y) + r).ceil();
        if max_x < 0.0 || max_y < 0.0 {
            return;
        }
        let max_x = (max_x as u32).min(w.saturating_sub(1));
        let max_y = (max_y as u32).min(h.saturating_sub(1));

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                if distance_to_segment(center, from, to) <= r {
                    self.coverage.put_pixel(x, y, Luma([value]));
                }
            }
        }
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq < f32::EPSILON { 0.0 } else { (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0) };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

fn blend(under: u8, over: u8, alpha: u8) -> u8 {
    let (u, o, a) = (under as u32, over as u32, alpha as u32);
    ((u * (255 - a) + o * a + 127) / 255) as u8
}

fn source_over(bg: Rgba<u8>, alpha: u8) -> Rgba<u8> {
    let [r, g, b, a] = bg.0;
    Rgba([
        blend(r, MASK_COLOR[0], alpha),
        blend(g, MASK_COLOR[1], alpha),
        blend(b, MASK_COLOR[2], alpha),
        blend(a, 255, alpha),
    ])
}

fn multiply(bg: Rgba<u8>, alpha: u8) -> Rgba<u8> {
    let [r, g, b, a] = bg.0;
    let tint = |c: u8, m: u8| blend(c, ((c as u32 * m as u32 + 127) / 255) as u8, alpha);
    Rgba([tint(r, MASK_COLOR[0]), tint(g, MASK_COLOR[1]), tint(b, MASK_COLOR[2]), a])
}

fn encode_png(img: &RgbaImage) -> ClientResult<EncodedImage> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    let (width, height) = img.dimensions();
    Ok(EncodedImage { bytes: buf.into_inner(), width, height })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn solid_png(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        encode_png(&img).unwrap().bytes
    }

    fn surface() -> MaskSurface {
        MaskSurface::from_bytes(&solid_png(64, 48, [20, 120, 200])).unwrap()
    }

    fn scribble(s: &mut MaskSurface) {
        s.begin_stroke(Point::new(5.0, 5.0));
        s.continue_stroke(Point::new(40.0, 30.0));
        s.continue_stroke(Point::new(60.0, 10.0));
        s.end_stroke();
    }

    #[test]
    fn zero_strokes_serializes_to_background() {
        let bg = solid_png(64, 48, [20, 120, 200]);
        let s = surface();
        let out = s.serialize().unwrap();
        assert_eq!((out.width, out.height), (64, 48));
        assert_eq!(out.bytes, bg);
    }

    #[test]
    fn clear_restores_fresh_serialization() {
        let fresh = surface().serialize().unwrap();
        let mut s = surface();
        scribble(&mut s);
        s.set_tool(Tool::Eraser);
        s.begin_stroke(Point::new(10.0, 10.0));
        s.continue_stroke(Point::new(12.0, 40.0));
        assert_ne!(s.serialize().unwrap(), fresh);
        s.clear();
        assert_eq!(s.serialize().unwrap(), fresh);
    }

    #[test]
    fn brush_paints_pure_red() {
        let mut s = surface();
        s.set_brush_size(10.0);
        s.begin_stroke(Point::new(20.0, 20.0));
        s.end_stroke();
        assert_eq!(s.coverage_at(20, 20), 255);
        assert_eq!(s.coverage_at(0, 0), 0);

        let decoded = image::load_from_memory(&s.serialize().unwrap().bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(20, 20).0, [255, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(0, 0).0, [20, 120, 200, 255]);
    }

    #[test]
    fn segment_covers_path_between_points() {
        let mut s = surface();
        s.set_brush_size(4.0);
        s.begin_stroke(Point::new(2.0, 24.0));
        s.continue_stroke(Point::new(60.0, 24.0));
        for x in 2..60 {
            assert_eq!(s.coverage_at(x, 24), 255, "gap at x={x}");
        }
        assert_eq!(s.coverage_at(30, 10), 0);
    }

    #[test]
    fn eraser_removes_earlier_paint_only() {
        let mut s = surface();
        s.set_brush_size(8.0);
        s.set_tool(Tool::Eraser);
        s.begin_stroke(Point::new(30.0, 20.0));
        s.end_stroke();
        s.set_tool(Tool::Brush);
        s.begin_stroke(Point::new(30.0, 20.0));
        s.end_stroke();
        assert_eq!(s.coverage_at(30, 20), 255, "erasing first must not block later paint");

        s.set_tool(Tool::Eraser);
        s.begin_stroke(Point::new(30.0, 20.0));
        s.end_stroke();
        assert_eq!(s.coverage_at(30, 20), 0);
        assert_eq!(s.serialize().unwrap(), surface().serialize().unwrap());
    }

    #[test]
    fn move_and_end_without_begin_are_noops() {
        let mut s = surface();
        s.continue_stroke(Point::new(10.0, 10.0));
        s.end_stroke();
        assert_eq!(s.stats().masked_pixels, 0);
        assert!(!s.can_undo());
    }

    #[test]
    fn invert_twice_is_identity() {
        let mut s = surface();
        scribble(&mut s);
        let before: Vec<u8> = s.coverage.as_raw().clone();
        let bytes = s.serialize().unwrap();
        s.invert();
        assert_eq!(s.coverage_at(0, 47), 255);
        s.invert();
        assert_eq!(s.coverage.as_raw(), &before);
        assert_eq!(s.serialize().unwrap(), bytes);
    }

    #[test]
    fn invert_of_empty_mask_covers_everything() {
        let mut s = surface();
        s.invert();
        let stats = s.stats();
        assert_eq!(stats.masked_pixels, stats.total_pixels);
        assert_eq!(stats.coverage(), 1.0);
    }

    #[test]
    fn undo_walks_back_strokes() {
        let mut s = surface();
        s.begin_stroke(Point::new(10.0, 10.0));
        s.end_stroke();
        let one = s.stats();
        s.begin_stroke(Point::new(50.0, 40.0));
        s.end_stroke();
        assert!(s.stats().masked_pixels > one.masked_pixels);
        assert!(s.undo());
        assert_eq!(s.stats(), one);
        assert!(s.undo());
        assert_eq!(s.stats().masked_pixels, 0);
        assert!(!s.undo());
    }

    #[test]
    fn undo_history_is_bounded() {
        let mut s = surface();
        for i in 0..(UNDO_DEPTH + 5) {
            s.begin_stroke(Point::new(i as f32, 1.0));
        }
        let mut undone = 0;
        while s.undo() {
            undone += 1;
        }
        assert_eq!(undone, UNDO_DEPTH);
    }

    #[test]
    fn preview_tints_without_mutating() {
        let mut s = surface();
        s.set_brush_size(6.0);
        s.begin_stroke(Point::new(32.0, 24.0));
        s.end_stroke();
        let before = s.serialize().unwrap();
        let preview = s.preview_composite().unwrap();
        assert_eq!(s.serialize().unwrap(), before);

        let decoded = image::load_from_memory(&preview.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(32, 24).0, [20, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(0, 0).0, [20, 120, 200, 255]);
    }

    #[test]
    fn touch_maps_onto_pointer_gesture() {
        let mut s = surface();
        for (phase, p) in [(TouchPhase::Start, (4.0, 4.0)), (TouchPhase::Move, (30.0, 4.0)), (TouchPhase::End, (0.0, 0.0))] {
            s.handle_pointer(PointerEvent::from_touch(phase, Point::new(p.0, p.1)));
        }
        assert!(!s.is_stroking());
        assert_eq!(s.coverage_at(20, 4), 255);
        assert_eq!(PointerEvent::from_touch(TouchPhase::Cancel, Point::default()), PointerEvent::Up);
    }

    #[test]
    fn display_coordinates_scale_to_raster() {
        let p = Point::from_display(100.0, 50.0, (200.0, 100.0), (64, 48));
        assert_eq!(p, Point::new(32.0, 24.0));
    }

    #[test]
    fn undecodable_bytes_fail_with_image_load() {
        assert!(matches!(MaskSurface::from_bytes(b"not an image"), Err(ClientError::ImageLoad(_))));
    }

    #[test]
    fn initialize_rebinds_and_keeps_tool_settings() {
        let mut s = surface();
        s.set_tool(Tool::Eraser);
        s.set_brush_size(33.0);
        scribble(&mut s);
        s.initialize(&solid_png(16, 16, [0, 0, 0])).unwrap();
        assert_eq!(s.dimensions(), (16, 16));
        assert_eq!(s.tool(), Tool::Eraser);
        assert_eq!(s.brush_size(), 33.0);
        assert!(!s.can_undo());
    }

    #[test]
    fn brush_size_is_clamped() {
        let mut s = surface();
        s.set_brush_size(0.0);
        assert_eq!(s.brush_size(), MIN_BRUSH_SIZE);
        s.set_brush_size(1_000.0);
        assert_eq!(s.brush_size(), MAX_BRUSH_SIZE);
    }

    #[tokio::test]
    async fn load_decodes_off_thread() {
        let s = MaskSurface::load(Bytes::from(solid_png(8, 4, [1, 2, 3]))).await.unwrap();
        assert_eq!(s.dimensions(), (8, 4));
    }

    #[test]
    fn data_url_is_png() {
        let url = surface().serialize().unwrap().to_data_url();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}
