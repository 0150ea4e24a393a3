// src/render/surface.rs
//! Drawing surface abstraction
//!
//! The renderer only needs solid rectangles, stroked polylines and filled
//! polygons. Hosts implement [`Surface`] over their canvas; [`FrameBuffer`]
//! is a software raster used headless and in tests, and [`DrawRecorder`]
//! keeps the raw call sequence.

use serde::{Deserialize, Serialize};

/// Opaque color as `0xRRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0x000000);
    pub const WHITE: Color = Color(0xffffff);

    pub fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn b(self) -> u8 {
        self.0 as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Target of the scrolling renderer
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn stroke_path(&mut self, path: &[Point], line_width: f32, color: Color);
    fn fill_path(&mut self, path: &[Point], color: Color);
}

/// Software raster
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::BLACK; (width as usize) * (height as usize)],
        }
    }

    /// Change geometry, clearing every pixel
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    /// Rows of column `x` painted with `color`
    pub fn rows_with(&self, x: u32, color: Color) -> Vec<u32> {
        (0..self.height)
            .filter(|y| self.pixel(x, *y) == Some(color))
            .collect()
    }

    pub fn count(&self, color: Color) -> usize {
        self.pixels.iter().filter(|p| **p == color).count()
    }

    fn put(&mut self, x: i64, y: i64, color: Color) {
        if x >= 0 && y >= 0 && (x as u64) < self.width as u64 && (y as u64) < self.height as u64 {
            let index = (y as usize) * (self.width as usize) + x as usize;
            self.pixels[index] = color;
        }
    }

    fn stamp(&mut self, center: Point, line_width: f32, color: Color) {
        let half = (line_width / 2.0).max(0.5);
        let x0 = (center.x - half).floor() as i64;
        let x1 = (center.x + half).ceil() as i64;
        let y0 = (center.y - half).floor() as i64;
        let y1 = (center.y + half).ceil() as i64;
        for y in y0..y1.max(y0 + 1) {
            for x in x0..x1.max(x0 + 1) {
                self.put(x, y, color);
            }
        }
    }
}

impl Surface for FrameBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let x_end = rect.x as i64 + rect.width as i64;
        let y_end = rect.y as i64 + rect.height as i64;
        for y in rect.y as i64..y_end {
            for x in rect.x as i64..x_end {
                self.put(x, y, color);
            }
        }
    }

    fn stroke_path(&mut self, path: &[Point], line_width: f32, color: Color) {
        match path {
            [] => {}
            [only] => self.stamp(*only, line_width, color),
            _ => {
                for segment in path.windows(2) {
                    let (a, b) = (segment[0], segment[1]);
                    let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0) as usize;
                    for step in 0..=steps {
                        let t = step as f32 / steps as f32;
                        let point = Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
                        self.stamp(point, line_width, color);
                    }
                }
            }
        }
    }

    fn fill_path(&mut self, path: &[Point], color: Color) {
        if path.len() < 3 {
            return;
        }
        let min_x = path.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor() as i64;
        let max_x = path.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil() as i64;
        let min_y = path.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor() as i64;
        let max_y = path.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil() as i64;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                if contains(path, Point::new(x as f32, y as f32)) {
                    self.put(x, y, color);
                }
            }
        }
    }
}

/// Even-odd point-in-polygon test, edges inclusive of their lower end
fn contains(polygon: &[Point], p: Point) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let cross_x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x <= cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// One recorded drawing call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect { rect: Rect, color: Color },
    StrokePath { path: Vec<Point>, line_width: f32, color: Color },
    FillPath { path: Vec<Point>, color: Color },
}

/// Surface that records calls instead of rasterizing them
#[derive(Debug, Clone, Default)]
pub struct DrawRecorder {
    width: u32,
    height: u32,
    ops: Vec<DrawOp>,
}

impl DrawRecorder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Return and forget everything recorded so far
    pub fn take(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }
}

impl Surface for DrawRecorder {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn stroke_path(&mut self, path: &[Point], line_width: f32, color: Color) {
        self.ops.push(DrawOp::StrokePath {
            path: path.to_vec(),
            line_width,
            color,
        });
    }

    fn fill_path(&mut self, path: &[Point], color: Color) {
        self.ops.push(DrawOp::FillPath {
            path: path.to_vec(),
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_channels() {
        let color = Color(0x12ab34);
        assert_eq!((color.r(), color.g(), color.b()), (0x12, 0xab, 0x34));
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut fb = FrameBuffer::new(10, 10);
        fb.fill_rect(Rect::new(8, 8, 5, 5), Color::WHITE);
        assert_eq!(fb.count(Color::WHITE), 4);
        assert_eq!(fb.pixel(9, 9), Some(Color::WHITE));
        assert_eq!(fb.pixel(10, 9), None);
    }

    #[test]
    fn test_vertical_stroke() {
        let mut fb = FrameBuffer::new(10, 20);
        fb.stroke_path(&[Point::new(4.0, 0.0), Point::new(4.0, 20.0)], 1.0, Color::WHITE);
        assert_eq!(fb.rows_with(4, Color::WHITE).len(), 20);
    }

    #[test]
    fn test_fill_triangle() {
        let mut fb = FrameBuffer::new(20, 20);
        fb.fill_path(
            &[Point::new(10.0, 15.0), Point::new(6.0, 10.0), Point::new(14.0, 10.0)],
            Color::WHITE,
        );
        assert_eq!(fb.pixel(10, 12), Some(Color::WHITE));
        assert_eq!(fb.pixel(2, 12), Some(Color::BLACK));
    }

    #[test]
    fn test_recorder_keeps_order() {
        let mut recorder = DrawRecorder::new(5, 5);
        recorder.fill_rect(Rect::new(0, 0, 1, 1), Color::BLACK);
        recorder.fill_path(&[Point::default(); 3], Color::WHITE);
        let ops = recorder.take();
        assert!(matches!(ops[0], DrawOp::FillRect { .. }));
        assert!(matches!(ops[1], DrawOp::FillPath { .. }));
        assert!(recorder.ops().is_empty());
    }
}
