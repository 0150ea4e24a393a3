// src/render/mod.rs
//! Scrolling display rendering

pub mod renderer;
pub mod scan;
pub mod surface;

pub use renderer::{FrameReport, ScrollingRenderer, SignalMode, ViewOptions};
pub use scan::ScanState;
pub use surface::{Color, DrawOp, DrawRecorder, FrameBuffer, Point, Rect, Surface};
