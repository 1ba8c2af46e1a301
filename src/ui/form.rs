//! Input form overlay for login, signup and story submission.

use crate::app::Form;
use crate::util::tail_to_width;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const LABEL_WIDTH: usize = 10;

pub fn render(f: &mut Frame, form: &Form) {
    let area = f.area();

    let width = 60u16.min(area.width.saturating_sub(4));
    let height = (form.fields.len() as u16 + 6).min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let overlay = Rect::new(x, y, width, height);

    if overlay.width < 30 || overlay.height < 6 {
        return;
    }

    f.render_widget(Clear, overlay);

    // Borders, the focus marker and the label column.
    let value_width = (overlay.width as usize).saturating_sub(LABEL_WIDTH + 7);
    let mut lines = vec![Line::raw("")];
    for (i, field) in form.fields.iter().enumerate() {
        let focused = i == form.focus && !form.pending;
        let shown = if field.secret {
            "*".repeat(field.value.chars().count())
        } else {
            field.value.clone()
        };
        let cursor = if focused { "_" } else { "" };
        let value = format!("{}{cursor}", tail_to_width(&shown, value_width));
        let style = if focused {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::raw(if focused { "> " } else { "  " }),
            Span::styled(format!("{:<LABEL_WIDTH$}", field.label), style),
            Span::styled(value, style),
        ]));
    }
    lines.push(Line::raw(""));
    lines.push(if form.pending {
        Line::styled("Please wait...  (Esc) Close", Style::default().fg(Color::Gray))
    } else {
        Line::styled(
            "(Enter) Submit  (Tab) Next field  (Esc) Cancel",
            Style::default().fg(Color::Gray),
        )
    });

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(form.kind.title()),
    );

    f.render_widget(paragraph, overlay);
}
