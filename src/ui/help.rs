//! Help overlay listing the key bindings.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Row, Table},
    Frame,
};

const BINDINGS: [(&str, &str); 16] = [
    ("h", "All stories"),
    ("f", "Favorites"),
    ("m", "My stories"),
    ("p", "Profile"),
    ("j / Down", "Next story"),
    ("k / Up", "Previous story"),
    ("g / Home", "First story"),
    ("s", "Toggle favorite"),
    ("d", "Delete own story (My stories)"),
    ("o / Enter", "Open story in browser"),
    ("r", "Reload stories"),
    ("n", "Submit a story"),
    ("l", "Log in"),
    ("c", "Create account"),
    ("L", "Log out"),
    ("q / Ctrl+c", "Quit"),
];

pub fn render(f: &mut Frame) {
    let overlay = centered_rect(60, 70, f.area());
    if overlay.width < 30 || overlay.height < 6 {
        return;
    }

    f.render_widget(Clear, overlay);

    let rows: Vec<Row> = BINDINGS
        .iter()
        .map(|(key, action)| Row::new(vec![format!("  {key}"), action.to_string()]))
        .collect();

    let table = Table::new(rows, [Constraint::Length(14), Constraint::Min(20)])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Help (? to close) "),
        )
        .header(
            Row::new(vec!["Key", "Action"])
                .style(
                    Style::default()
                        .add_modifier(Modifier::BOLD)
                        .add_modifier(Modifier::UNDERLINED),
                )
                .bottom_margin(1),
        );

    f.render_widget(table, overlay);
}

/// Centered rectangle taking the given percentage of `area`.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
