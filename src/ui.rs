//! Monitor screen rendering

use crate::state::{RoutingState, Thresholds};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

/// Snapshot of the loop for one redraw
#[derive(Clone)]
pub struct UiState {
    pub device_name: String,
    pub status: String,
    pub routing: RoutingState,
    pub average: f64,
    pub band_energy: f64,
    pub thresholds: Thresholds,
    /// Fraction of the smoothing window filled so far
    pub fill: f64,
}

impl UiState {
    /// Value at the right end of the gauge
    fn full_scale(&self) -> f64 {
        (self.thresholds.high * crate::constants::ui::GAUGE_HEADROOM).max(1.0)
    }
}

/// Colour of gauge cell `i`: grey below the low threshold, green between the
/// thresholds, red above the high one.
fn zone_color(i: usize, low_pos: usize, high_pos: usize) -> Color {
    if i < low_pos {
        Color::DarkGray
    } else if i <= high_pos {
        Color::Green
    } else {
        Color::Red
    }
}

fn position(ratio: f64, width: usize) -> usize {
    (ratio.clamp(0.0, 1.0) * width.saturating_sub(1) as f64).round() as usize
}

/// Create a bar filled to `ratio`, coloured by classification zone
pub fn create_gradient_bar(width: usize, ratio: f64, low_ratio: f64, high_ratio: f64) -> Line<'static> {
    let exact = ratio.clamp(0.0, 1.0) * width as f64;
    let filled = exact as usize;
    let partial_fill = exact - filled as f64;
    let low_pos = position(low_ratio, width);
    let high_pos = position(high_ratio, width);

    let spans: Vec<Span> = (0..width)
        .map(|i| {
            let ch = if i < filled {
                '█'
            } else if i == filled && partial_fill > 0.0 {
                match (partial_fill * 8.0) as usize {
                    0 | 1 => '░',
                    2 | 3 => '▒',
                    4 | 5 => '▓',
                    _ => '█',
                }
            } else {
                '░'
            };
            Span::styled(
                ch.to_string(),
                Style::default().fg(zone_color(i, low_pos, high_pos)),
            )
        })
        .collect();

    Line::from(spans)
}

/// Marker line with a `▲` under each threshold
pub fn create_threshold_markers(width: usize, low_ratio: f64, high_ratio: f64) -> Line<'static> {
    let low_pos = position(low_ratio, width);
    let high_pos = position(high_ratio, width);

    let spans: Vec<Span> = (0..width)
        .map(|i| {
            if i == low_pos || i == high_pos {
                Span::styled("▲", Style::default().fg(Color::White))
            } else {
                Span::raw(" ")
            }
        })
        .collect();

    Line::from(spans)
}

/// Render the complete UI
pub fn render_ui(f: &mut Frame, state: &UiState) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(0),
        ])
        .split(size);

    let device_block = Block::default().title("Device").borders(Borders::ALL);
    let device_text = Paragraph::new(state.device_name.as_str()).block(device_block);
    f.render_widget(device_text, chunks[0]);

    let status_block = Block::default().title("Status").borders(Borders::ALL);
    let status_text = Paragraph::new(state.status.as_str()).block(status_block);
    f.render_widget(status_text, chunks[1]);

    let routing_color = match state.routing {
        RoutingState::DigitalPassthrough => Color::Green,
        RoutingState::StandardPlayback => Color::Yellow,
    };
    let window = if state.fill < 1.0 {
        format!("  (window {:.0}% filled)", state.fill * 100.0)
    } else {
        String::new()
    };
    let routing = Paragraph::new(Line::from(vec![
        Span::styled(state.routing.to_string(), Style::default().fg(routing_color)),
        Span::raw(window),
    ]))
    .block(Block::default().title("Routing").borders(Borders::ALL));
    f.render_widget(routing, chunks[2]);

    let full_scale = state.full_scale();
    let ratio = state.average / full_scale;
    let low_ratio = state.thresholds.low / full_scale;
    let high_ratio = state.thresholds.high / full_scale;
    let bar_width =
        (chunks[3].width as usize).saturating_sub(crate::constants::ui::BAR_BORDER_WIDTH);
    let gauge = Paragraph::new(vec![
        create_gradient_bar(bar_width, ratio, low_ratio, high_ratio),
        create_threshold_markers(bar_width, low_ratio, high_ratio),
    ])
    .block(
        Block::default()
            .title(format!(
                "Band energy: {:.0} (Raw: {:.0}, thresholds {:.0} / {:.0})",
                state.average, state.band_energy, state.thresholds.low, state.thresholds.high
            ))
            .borders(Borders::ALL),
    );
    f.render_widget(gauge, chunks[3]);
}
