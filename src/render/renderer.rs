// src/render/renderer.rs
//! Scrolling trace renderer
//!
//! One renderer drives one surface. Each frame converts elapsed time into a
//! whole number of columns (keeping the sub-pixel remainder) and, for every
//! column crossed, erases a strip just ahead of the scan line, redraws the
//! grid there and extends the trace. Markers for events crossed during the
//! frame are drawn once every column is done.

use super::scan::ScanState;
use super::surface::{Color, Point, Rect, Surface};
use crate::config::constants::display;
use crate::config::{Palette, SurfaceConfig};
use crate::error::{DefibError, DefibResult};
use crate::waveform::{EventIndexSet, WaveformSnapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// How the trace is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SignalMode {
    /// Samples from the waveform stream
    #[default]
    Trace,
    /// Dotted baseline, used while no rhythm has been revealed
    Dotted,
    /// Solid baseline
    FlatLine,
}

/// Per-frame display options supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewOptions {
    pub show_synchro_markers: bool,
    pub signal_mode: SignalMode,
}

/// What one frame did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Columns advanced this frame
    pub columns: u32,
    /// Stream indices of R-peaks crossed by the scan line
    pub peaks_crossed: Vec<usize>,
    /// Stream indices of pacing spikes crossed by the scan line
    pub spikes_crossed: Vec<usize>,
    /// The surface was cleared and fully repainted first
    pub repainted: bool,
}

impl FrameReport {
    pub fn crossed_peak(&self) -> bool {
        !self.peaks_crossed.is_empty()
    }
}

enum Marker {
    Arrow(u32),
    Spike(u32),
}

/// Scrolling renderer bound to one surface
#[derive(Debug, Clone)]
pub struct ScrollingRenderer {
    config: SurfaceConfig,
    sampling_rate_hz: u32,
    scan: ScanState,
    geometry: Option<(u32, u32)>,
}

impl ScrollingRenderer {
    pub fn new(config: SurfaceConfig, sampling_rate_hz: u32) -> DefibResult<Self> {
        Self::check_geometry(config.width, config.height, config.time_window_seconds)?;
        if sampling_rate_hz == 0 {
            return Err(DefibError::Runtime("sampling rate must be positive".to_string()));
        }
        Ok(Self {
            config,
            sampling_rate_hz,
            scan: ScanState::default(),
            geometry: None,
        })
    }

    fn check_geometry(width: u32, height: u32, time_window_seconds: f32) -> DefibResult<()> {
        if width == 0 || height == 0 || !(time_window_seconds > 0.0) {
            return Err(DefibError::InvalidSurface {
                width,
                height,
                time_window_seconds,
            });
        }
        Ok(())
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn scan_state(&self) -> &ScanState {
        &self.scan
    }

    /// New geometry for this surface. Clears the scan state; the next frame
    /// repaints the whole surface.
    pub fn resize(&mut self, width: u32, height: u32) -> DefibResult<()> {
        Self::check_geometry(width, height, self.config.time_window_seconds)?;
        self.config.width = width;
        self.config.height = height;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        self.scan.reset();
        self.geometry = None;
        debug!(width = self.config.width, height = self.config.height, "scan state reset");
    }

    /// Draw one frame at session time `now`.
    pub fn render_frame<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        now: Duration,
        snapshot: &WaveformSnapshot,
        view: &ViewOptions,
    ) -> FrameReport {
        let mut report = FrameReport::default();
        let (width, height) = (surface.width(), surface.height());
        if width == 0 || height == 0 {
            return report;
        }

        if self.geometry != Some((width, height)) {
            if self.geometry.is_some() {
                self.config.width = width;
                self.config.height = height;
                self.invalidate();
            }
            self.geometry = Some((width, height));
            self.paint_background(surface, width, height);
            report.repainted = true;
        }

        let pixels_per_second = width as f64 / self.config.time_window_seconds as f64;
        let samples_per_pixel =
            self.config.time_window_seconds as f64 * self.sampling_rate_hz as f64 / width as f64;
        let stream_len = snapshot.stream.len();
        let palette = self.config.palette;
        let mut markers = Vec::new();

        for column in self.scan.advance(now, pixels_per_second) {
            let x = (column % width as u64) as u32;
            let window_start = ((column - x as u64) as f64 * samples_per_pixel).floor() as usize;
            let sample_index = (window_start + (x as f64 * samples_per_pixel).floor() as usize) % stream_len;

            let bar_x = (x + display::ERASE_LEAD_PX) % width;
            surface.fill_rect(
                Rect::new(bar_x as i32, 0, self.config.erase_width_px, height),
                Color(palette.background),
            );
            self.draw_grid_column(surface, bar_x, width, height);

            self.draw_trace_column(surface, x, height, snapshot, sample_index, view.signal_mode);

            // a sample belongs to the column whose span covers its start
            let first = window_start + (x as f64 * samples_per_pixel).ceil() as usize;
            let last = window_start + ((x + 1) as f64 * samples_per_pixel).ceil() as usize;

            for peak in crossed(&snapshot.peaks, first, last, stream_len) {
                report.peaks_crossed.push(peak);
                if view.show_synchro_markers {
                    markers.push(Marker::Arrow(x));
                }
            }
            for spike in crossed(&snapshot.spikes, first, last, stream_len) {
                report.spikes_crossed.push(spike);
                markers.push(Marker::Spike(x));
            }
            report.columns += 1;
        }

        for marker in markers {
            match marker {
                Marker::Arrow(x) => draw_arrow(surface, x, palette),
                Marker::Spike(x) => draw_spike(surface, x, height, palette),
            }
        }

        trace!(
            columns = report.columns,
            scan_x = self.scan.scan_x(width),
            peaks = report.peaks_crossed.len(),
            "frame rendered"
        );
        report
    }

    fn paint_background<S: Surface + ?Sized>(&self, surface: &mut S, width: u32, height: u32) {
        surface.fill_rect(Rect::new(0, 0, width, height), Color(self.config.palette.background));
        for x in 0..width {
            self.draw_grid_column(surface, x, width, height);
        }
    }

    fn draw_grid_column<S: Surface + ?Sized>(&self, surface: &mut S, x: u32, width: u32, height: u32) {
        let color = Color(self.config.palette.grid);
        let pixels_per_second = width as f32 / self.config.time_window_seconds;
        let time_step = (pixels_per_second / display::GRID_TIME_DIVISIONS_PER_S)
            .round()
            .max(1.0) as u32;

        if x > 0 && x % time_step == 0 {
            surface.fill_rect(Rect::new(x as i32, 0, 1, height), color);
        }
        let spacing = self.config.grid_row_spacing_px.max(1) as usize;
        for y in (0..height).step_by(spacing) {
            surface.fill_rect(Rect::new(x as i32, y as i32, 1, 1), color);
        }
    }

    fn draw_trace_column<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        x: u32,
        height: u32,
        snapshot: &WaveformSnapshot,
        sample_index: usize,
        mode: SignalMode,
    ) {
        let color = Color(self.config.palette.trace);
        let center = height as f32 / 2.0;

        let y = match mode {
            SignalMode::Dotted => {
                if x % display::DOT_PATTERN_PX == 0 {
                    let half = (display::DOT_SIZE_PX / 2) as i32;
                    surface.fill_rect(
                        Rect::new(x as i32, center as i32 - half, display::DOT_SIZE_PX, display::DOT_SIZE_PX),
                        color,
                    );
                }
                self.scan.last_y = Some(center);
                return;
            }
            SignalMode::FlatLine => center,
            SignalMode::Trace => self.map_sample(snapshot, snapshot.stream.sample_at(sample_index), height),
        };

        let path = match self.scan.last_y {
            Some(last_y) if x > 0 => [Point::new(x as f32 - 1.0, last_y), Point::new(x as f32, y)],
            _ => [Point::new(x as f32, y), Point::new(x as f32, y)],
        };
        surface.stroke_path(&path, display::TRACE_WIDTH_PX, color);
        self.scan.last_y = Some(y);
    }

    /// Vertical pixel position of `value`
    pub fn map_sample(&self, snapshot: &WaveformSnapshot, value: f32, height: u32) -> f32 {
        let height = height as f32;
        let top = height * self.config.top_margin_ratio;
        let bottom = height * self.config.bottom_margin_ratio;
        let band = height - top - bottom;

        if snapshot.gain_mapped {
            let center = top + band / 2.0;
            return (center - value * self.config.gain_px_per_mv).clamp(0.0, height);
        }

        let range = snapshot.stream.max() - snapshot.stream.min();
        let normalized = if range == 0.0 {
            0.5
        } else {
            (value - snapshot.stream.min()) / range
        };
        top + (1.0 - normalized) * band
    }
}

/// Event indices in the absolute sample range `first..last`, folded into
/// a stream of `len` samples
fn crossed(events: &EventIndexSet, first: usize, last: usize, len: usize) -> Vec<usize> {
    if events.is_empty() || last <= first || len == 0 {
        return Vec::new();
    }
    if last - first >= len {
        return events.iter().collect();
    }
    let start = first % len;
    let end = start + (last - first);
    if end <= len {
        events.in_range(start, end).collect()
    } else {
        events
            .in_range(start, len)
            .chain(events.in_range(0, end - len))
            .collect()
    }
}

fn draw_arrow<S: Surface + ?Sized>(surface: &mut S, x: u32, palette: Palette) {
    let color = Color(palette.marker);
    let x = x as f32;
    surface.stroke_path(
        &[Point::new(x, 0.0), Point::new(x, display::ARROW_SHAFT_PX)],
        display::TRACE_WIDTH_PX,
        color,
    );
    surface.fill_path(
        &[
            Point::new(x, display::ARROW_TIP_PX),
            Point::new(x - display::ARROW_HALF_WIDTH_PX, display::ARROW_SHAFT_PX),
            Point::new(x + display::ARROW_HALF_WIDTH_PX, display::ARROW_SHAFT_PX),
        ],
        color,
    );
}

fn draw_spike<S: Surface + ?Sized>(surface: &mut S, x: u32, height: u32, palette: Palette) {
    surface.stroke_path(
        &[Point::new(x as f32, 0.0), Point::new(x as f32, height as f32)],
        display::SPIKE_WIDTH_PX,
        Color(palette.marker),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatorConfig;
    use crate::render::surface::{DrawOp, DrawRecorder, FrameBuffer};
    use crate::rhythm::RhythmType;
    use crate::waveform::{synthesize, WaveformParams};

    fn sinus_snapshot() -> WaveformSnapshot {
        let params = WaveformParams {
            rhythm: RhythmType::Sinus,
            heart_rate: 60,
            ..WaveformParams::default()
        };
        synthesize(&params, &SimulatorConfig::default())
    }

    fn renderer(width: u32) -> ScrollingRenderer {
        ScrollingRenderer::new(SurfaceConfig::new(width, 65, 7.0), 250).unwrap()
    }

    #[test]
    fn test_rejects_degenerate_geometry() {
        assert!(ScrollingRenderer::new(SurfaceConfig::new(0, 65, 7.0), 250).is_err());
        assert!(ScrollingRenderer::new(SurfaceConfig::new(800, 65, 0.0), 250).is_err());
        assert!(renderer(800).resize(800, 0).is_err());
    }

    #[test]
    fn test_first_frame_paints_background_only() {
        let mut renderer = renderer(700);
        let mut fb = FrameBuffer::new(700, 65);
        let report = renderer.render_frame(&mut fb, Duration::ZERO, &sinus_snapshot(), &ViewOptions::default());

        assert!(report.repainted);
        assert_eq!(report.columns, 0);
        assert_eq!(fb.count(Color(0x00ff00)), 0);
    }

    #[test]
    fn test_grid_follows_surface_width() {
        let mut renderer = renderer(700);
        renderer.resize(1400, 65).unwrap();
        // the host has not resized its surface yet
        let mut fb = FrameBuffer::new(700, 65);
        renderer.render_frame(&mut fb, Duration::ZERO, &sinus_snapshot(), &ViewOptions::default());

        let grid = Color(0x002200);
        assert_eq!(fb.rows_with(20, grid).len(), 65);
        assert_eq!(fb.rows_with(60, grid).len(), 65);
        assert_eq!(fb.rows_with(30, grid), vec![0, 10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_one_second_advances_pixels_per_second() {
        let mut renderer = renderer(700);
        let mut fb = FrameBuffer::new(700, 65);
        let snapshot = sinus_snapshot();
        renderer.render_frame(&mut fb, Duration::ZERO, &snapshot, &ViewOptions::default());
        let report = renderer.render_frame(&mut fb, Duration::from_secs(1), &snapshot, &ViewOptions::default());

        assert_eq!(report.columns, 100);
        assert!(!report.repainted);
        assert_eq!(report.peaks_crossed, vec![95]);
        assert!(!fb.rows_with(50, Color(0x00ff00)).is_empty());
    }

    #[test]
    fn test_markers_follow_all_columns() {
        let mut renderer = renderer(700);
        let mut recorder = DrawRecorder::new(700, 65);
        let snapshot = sinus_snapshot();
        let view = ViewOptions {
            show_synchro_markers: true,
            signal_mode: SignalMode::Trace,
        };

        renderer.render_frame(&mut recorder, Duration::ZERO, &snapshot, &view);
        recorder.take();
        renderer.render_frame(&mut recorder, Duration::from_secs(1), &snapshot, &view);

        let ops = recorder.take();
        let first_marker = ops
            .iter()
            .position(|op| matches!(op, DrawOp::FillPath { .. }))
            .unwrap();
        // nothing but marker drawing after the first arrowhead
        assert!(ops[first_marker..]
            .iter()
            .all(|op| !matches!(op, DrawOp::FillRect { .. })));
        assert_eq!(
            ops.iter().filter(|op| matches!(op, DrawOp::FillPath { .. })).count(),
            1
        );
    }

    #[test]
    fn test_hidden_synchro_markers_still_report_peaks() {
        let mut renderer = renderer(700);
        let mut recorder = DrawRecorder::new(700, 65);
        let snapshot = sinus_snapshot();

        renderer.render_frame(&mut recorder, Duration::ZERO, &snapshot, &ViewOptions::default());
        let report = renderer.render_frame(&mut recorder, Duration::from_secs(1), &snapshot, &ViewOptions::default());

        assert!(report.crossed_peak());
        assert!(!recorder.ops().iter().any(|op| matches!(op, DrawOp::FillPath { .. })));
    }

    #[test]
    fn test_resize_resets_scan_state() {
        let mut renderer = renderer(700);
        let mut fb = FrameBuffer::new(700, 65);
        let snapshot = sinus_snapshot();
        renderer.render_frame(&mut fb, Duration::ZERO, &snapshot, &ViewOptions::default());
        renderer.render_frame(&mut fb, Duration::from_millis(500), &snapshot, &ViewOptions::default());
        assert!(renderer.scan_state().accumulator > 0.0);

        fb.resize(350, 65);
        let report = renderer.render_frame(&mut fb, Duration::from_secs(1), &snapshot, &ViewOptions::default());

        assert!(report.repainted);
        assert_eq!(report.columns, 0);
        assert_eq!(renderer.config().width, 350);
        assert_eq!(renderer.scan_state().last_frame, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_dotted_mode_bypasses_stream() {
        let mut renderer = renderer(700);
        let mut fb = FrameBuffer::new(700, 65);
        let snapshot = sinus_snapshot();
        let view = ViewOptions {
            show_synchro_markers: false,
            signal_mode: SignalMode::Dotted,
        };
        renderer.render_frame(&mut fb, Duration::ZERO, &snapshot, &view);
        renderer.render_frame(&mut fb, Duration::from_millis(200), &snapshot, &view);

        // 20 columns scanned, dots every 4 px on the centre row
        assert_eq!(fb.rows_with(4, Color(0x00ff00)), vec![31, 32]);
        assert_eq!(fb.rows_with(5, Color(0x00ff00)), vec![31, 32]);
        assert!(fb.rows_with(6, Color(0x00ff00)).is_empty());
        assert_eq!(fb.rows_with(8, Color(0x00ff00)), vec![31, 32]);
    }

    #[test]
    fn test_gain_mapping_is_centred() {
        let renderer = renderer(800);
        let mut snapshot = sinus_snapshot();
        snapshot.gain_mapped = true;
        let y = renderer.map_sample(&snapshot, 0.0, 65);
        // top 19.5, band 39
        assert!((y - 39.0).abs() < 1e-4);
        assert!((renderer.map_sample(&snapshot, 1.0, 65) - 19.0).abs() < 1e-4);
    }

    #[test]
    fn test_normalized_mapping_spans_band() {
        let renderer = renderer(800);
        let snapshot = sinus_snapshot();
        let top = renderer.map_sample(&snapshot, snapshot.stream.max(), 65);
        let bottom = renderer.map_sample(&snapshot, snapshot.stream.min(), 65);
        assert!((top - 19.5).abs() < 1e-4);
        assert!((bottom - 58.5).abs() < 1e-4);
    }

    #[test]
    fn test_crossed_wraps_around_stream_end() {
        let events: EventIndexSet = [2, 98].into_iter().collect();
        assert_eq!(crossed(&events, 195, 205, 100), vec![98, 2]);
        assert!(crossed(&events, 10, 10, 100).is_empty());
    }
}
