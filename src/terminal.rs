// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based scanner view
//!
//! Renders the camera feed with Unicode half-block characters for improved
//! vertical resolution, draws the smoothed detection overlays on top, and
//! shows the list of scanned codes. Key bindings: 'c' cycles cameras,
//! 'x' clears the list, 'e' exports it, 'q' quits.

use std::io::{self, stdout};
use std::time::Instant;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    style::Style, widgets::Widget,
};
use tracing::error;

use crate::backends::{PixelFormat, VideoFrame};
use crate::constants::timing;
use crate::frame_processor::types::Point;
use crate::overlay::{DisplayTweener, RenderSurface, render_overlays};
use crate::registry::ResultRegistry;
use crate::scanner::Scanner;

/// File the result list is exported to
const EXPORT_FILE: &str = "scancam-export.txt";

/// Run the terminal scanner view.
///
/// Must be called within a tokio runtime; recognition work is dispatched
/// to the blocking pool.
pub fn run(mut scanner: Scanner) -> Result<(), Box<dyn std::error::Error>> {
    scanner.start()?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut scanner);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    scanner.shutdown();
    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    scanner: &mut Scanner,
) -> Result<(), Box<dyn std::error::Error>> {
    let multi_camera = scanner.manager().devices().len() > 1;
    let mut status_message = build_status_message(multi_camera);

    loop {
        scanner.tick(Instant::now());

        terminal.draw(|f| {
            let area = f.area();

            // Reserve the bottom line for status and, when there are
            // results, a pane above it for the list
            let results_height = results_pane_height(scanner.registry(), area);
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area
                    .height
                    .saturating_sub(1)
                    .saturating_sub(results_height),
            };

            let view = ViewWidget {
                frame: scanner.latest_frame().map(|f| f.as_ref()),
                tweener: scanner.tweener(),
            };
            f.render_widget(&view, camera_area);

            if results_height > 0 {
                let results_area = Rect {
                    x: area.x,
                    y: camera_area.y + camera_area.height,
                    width: area.width,
                    height: results_height,
                };
                f.render_widget(
                    ResultsPane {
                        registry: scanner.registry(),
                    },
                    results_area,
                );
            }

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &status_message,
                },
                status_area,
            );
        })?;

        // Handle input with timeout for frame updates
        if event::poll(timing::RENDER_TICK)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            // Ctrl+C to quit
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }

            // 'c' to switch camera
            if key.code == KeyCode::Char('c') && multi_camera {
                match scanner.switch_camera() {
                    Ok(()) => {
                        let name = scanner
                            .manager()
                            .current_device()
                            .map(|d| d.display_name(0))
                            .unwrap_or_else(|| "camera".to_string());
                        status_message = format!("Switched to {}", name);
                    }
                    Err(e) => {
                        error!("Failed to switch camera: {}", e);
                        status_message = format!("Error: {}", e);
                    }
                }
            }

            // 'x' to clear the result list
            if key.code == KeyCode::Char('x') {
                scanner.clear_results();
                status_message = "List cleared".to_string();
            }

            // 'e' to export the result list
            if key.code == KeyCode::Char('e') {
                let count = scanner.registry().len();
                match std::fs::write(EXPORT_FILE, scanner.export_text()) {
                    Ok(()) => {
                        status_message = format!("Exported {} codes to {}", count, EXPORT_FILE);
                    }
                    Err(e) => {
                        error!("Failed to export list: {}", e);
                        status_message = format!("Error: {}", e);
                    }
                }
            }

            // 'h' to show key help again
            if key.code == KeyCode::Char('h') {
                status_message = build_status_message(multi_camera);
            }

            // 'q' also quits
            if key.code == KeyCode::Char('q') {
                break;
            }
        }
    }

    Ok(())
}

fn build_status_message(multi_camera: bool) -> String {
    let mut msg = String::new();
    if multi_camera {
        msg.push_str("'c' switch camera | ");
    }
    msg.push_str("'x' clear list | 'e' export | 'q' quit");
    msg
}

/// Height of the results pane: a title line plus one line per entry, capped
fn results_pane_height(registry: &ResultRegistry, area: Rect) -> u16 {
    if registry.is_empty() {
        return 0;
    }
    let wanted = registry.len() as u16 + 1;
    wanted.min(6).min(area.height.saturating_sub(4))
}

/// Widget rendering the camera frame with the detection overlays on top
struct ViewWidget<'a> {
    frame: Option<&'a VideoFrame>,
    tweener: &'a DisplayTweener,
}

impl Widget for &ViewWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };
        if area.width == 0 || area.height == 0 || frame.width == 0 || frame.height == 0 {
            return;
        }

        // Calculate display dimensions maintaining aspect ratio.
        // Each terminal cell displays 2 vertical pixels using half-blocks.
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        // Scale factors (frame pixels per terminal cell / half-cell)
        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        // Render using half-block characters:
        // upper half (▀) colored with fg, lower half with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }

        // Draw the smoothed overlays through the same transform
        let mut surface = CellSurface {
            buf,
            area,
            x_offset,
            y_offset,
            x_scale,
            y_scale,
        };
        render_overlays(self.tweener, &mut surface);
    }
}

fn sample_pixel(frame: &VideoFrame, x: u32, y: u32) -> Color {
    let x = x.min(frame.width - 1);
    let y = y.min(frame.height - 1);
    let data = &frame.data;

    match frame.format {
        PixelFormat::Rgba => {
            let idx = (y * frame.stride + x * 4) as usize;
            if idx + 2 < data.len() {
                Color::Rgb(data[idx], data[idx + 1], data[idx + 2])
            } else {
                Color::Rgb(0, 0, 0)
            }
        }
        PixelFormat::Gray8 => {
            let idx = (y * frame.stride + x) as usize;
            if idx < data.len() {
                let v = data[idx];
                Color::Rgb(v, v, v)
            } else {
                Color::Rgb(0, 0, 0)
            }
        }
    }
}

/// Render surface mapping frame pixel coordinates onto terminal cells
struct CellSurface<'a> {
    buf: &'a mut Buffer,
    area: Rect,
    x_offset: u16,
    y_offset: u16,
    x_scale: f64,
    y_scale: f64,
}

impl CellSurface<'_> {
    fn cell_at(&self, p: Point) -> Option<(u16, u16)> {
        if p.x < 0.0 || p.y < 0.0 {
            return None;
        }
        let cell_x = self.x_offset as u32 + (p.x as f64 / self.x_scale) as u32;
        let cell_y = self.y_offset as u32 + (p.y as f64 / (self.y_scale * 2.0)) as u32;
        if cell_x >= (self.area.x + self.area.width) as u32
            || cell_y >= (self.area.y + self.area.height) as u32
        {
            return None;
        }
        Some((cell_x as u16, cell_y as u16))
    }
}

impl RenderSurface for CellSurface<'_> {
    fn clear(&mut self) {
        // The frame repaints every cell each tick; nothing to erase
    }

    fn draw_path(&mut self, points: &[Point]) {
        for point in points {
            if let Some((x, y)) = self.cell_at(*point)
                && let Some(cell) = self.buf.cell_mut((x, y))
            {
                cell.set_char('+');
                cell.set_fg(Color::Green);
            }
        }
    }

    fn draw_marker(&mut self, center: Point) {
        if let Some((x, y)) = self.cell_at(center)
            && let Some(cell) = self.buf.cell_mut((x, y))
        {
            cell.set_char('●');
            cell.set_fg(Color::Green);
        }
    }

    fn draw_label(&mut self, anchor: Point, text: &str) {
        let Some((x, y)) = self.cell_at(anchor) else {
            return;
        };
        // Center the text on the anchor, clipped to the drawing area
        let half = (text.len() as u16) / 2;
        let start_x = x.saturating_sub(half).max(self.area.x);
        let max_width = (self.area.x + self.area.width).saturating_sub(start_x) as usize;
        let clipped: String = text.chars().take(max_width).collect();
        self.buf.set_string(
            start_x,
            y,
            clipped,
            Style::default().fg(Color::Green).bg(Color::Black),
        );
    }
}

/// Pane listing the scanned codes, most recent last
struct ResultsPane<'a> {
    registry: &'a ResultRegistry,
}

impl Widget for ResultsPane<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }

        let title = format!("Scanned codes ({})", self.registry.len());
        buf.set_string(
            area.x,
            area.y,
            truncated(&title, area.width),
            Style::default().fg(Color::Black).bg(Color::Green),
        );
        for x in area.x + title.len().min(area.width as usize) as u16..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::Green);
            }
        }

        // Show the newest entries that fit
        let rows = (area.height - 1) as usize;
        let entries = self.registry.entries();
        let skip = entries.len().saturating_sub(rows);
        for (i, entry) in entries.iter().skip(skip).enumerate() {
            let line = format!("{} ({})", entry.value, entry.format);
            buf.set_string(
                area.x,
                area.y + 1 + i as u16,
                truncated(&line, area.width),
                Style::default().fg(Color::White),
            );
        }
    }
}

fn truncated(text: &str, width: u16) -> String {
    text.chars().take(width as usize).collect()
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        buf.set_string(
            area.x,
            area.y,
            truncated(self.message, area.width),
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
