use crate::util::single_line;
use crate::view::ProfileView;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Render the profile panel for the logged-in user.
pub fn render(f: &mut Frame, profile: Option<&ProfileView>, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" User Profile Info ");

    let Some(profile) = profile else {
        f.render_widget(Paragraph::new("Not logged in").block(block), area);
        return;
    };

    let label = Style::default().add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(vec![
            Span::styled("Name: ", label),
            Span::raw(single_line(&profile.name).into_owned()),
        ]),
        Line::from(vec![
            Span::styled("Username: ", label),
            Span::raw(single_line(&profile.username).into_owned()),
        ]),
        Line::from(vec![
            Span::styled("Account Created: ", label),
            Span::raw(profile.account_created.clone()),
        ]),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}
