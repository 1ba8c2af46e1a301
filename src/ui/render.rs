//! Frame layout: header, current screen, status bar, overlays.

use crate::api::StoryApi;
use crate::app::App;
use crate::router::Screen;
use crate::storage::SessionStore;
use crate::util::{single_line, truncate_to_width};
use crate::view::ListKind;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::{form, help, profile, status, stories};

pub(super) const MIN_WIDTH: u16 = 50;
pub(super) const MIN_HEIGHT: u16 = 8;

pub(super) fn render<A: StoryApi, S: SessionStore>(f: &mut Frame, app: &App<A, S>) {
    let area = f.area();
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    match app.router.screen() {
        Screen::List(kind) => stories::render(f, app, app.router.view(kind), chunks[1]),
        Screen::Profile => profile::render(f, app.router.profile().as_ref(), chunks[1]),
    }
    status::render(f, app, chunks[2]);

    if app.show_help {
        help::render(f);
    }
    if let Some(id) = &app.confirm_delete {
        render_confirm_overlay(f, app, id);
    }
    if let Some(open_form) = &app.form {
        form::render(f, open_form);
    }
}

/// Navigation tabs on the left, current user on the right.
fn render_header<A: StoryApi, S: SessionStore>(f: &mut Frame, app: &App<A, S>, area: Rect) {
    let screen = app.router.screen();
    let authenticated = app.router.session().is_authenticated();

    let mut spans = vec![Span::styled(
        "Hack or Snooze ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    let tabs: &[(Screen, &str)] = if authenticated {
        &[
            (Screen::List(ListKind::Home), "all"),
            (Screen::List(ListKind::Favorites), "favorites"),
            (Screen::List(ListKind::MyStories), "my stories"),
            (Screen::Profile, "profile"),
        ]
    } else {
        &[(Screen::List(ListKind::Home), "all")]
    };
    for (tab, label) in tabs {
        let style = if *tab == screen {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!(" {label} "), style));
    }

    let user = match app.router.session().identity() {
        Some(identity) => single_line(identity.username()).into_owned(),
        None => "not logged in".to_string(),
    };
    let user = truncate_to_width(&user, 24).into_owned();

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(26)])
        .split(area);
    f.render_widget(Paragraph::new(Line::from(spans)), halves[0]);
    f.render_widget(
        Paragraph::new(user)
            .alignment(Alignment::Right)
            .style(Style::default().fg(Color::Gray)),
        halves[1],
    );
}

fn render_confirm_overlay<A: StoryApi, S: SessionStore>(
    f: &mut Frame,
    app: &App<A, S>,
    id: &str,
) {
    let area = f.area();

    let title = app
        .router
        .cache()
        .by_id(id)
        .map(|story| single_line(&story.title).into_owned())
        .or_else(|| app.selected_item().map(|item| single_line(&item.title).into_owned()))
        .unwrap_or_else(|| id.to_string());
    let text = format!(
        "Delete \"{}\"?\n\nThis cannot be undone.\n\n(y) Confirm  (n/Esc) Cancel",
        truncate_to_width(&title, 40)
    );

    let width = 50u16.min(area.width.saturating_sub(4));
    let height = 7u16.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let overlay = Rect::new(x, y, width, height);

    if overlay.width < 10 || overlay.height < 5 {
        return;
    }

    f.render_widget(Clear, overlay);

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Confirm "),
        )
        .alignment(Alignment::Center);

    f.render_widget(paragraph, overlay);
}
