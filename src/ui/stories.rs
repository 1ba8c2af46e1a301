use crate::api::StoryApi;
use crate::app::App;
use crate::storage::SessionStore;
use crate::util::{single_line, truncate_to_width};
use crate::view::{ItemDescriptor, RenderedList};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

const STAR_EMPTY: &str = "☆ ";
const STAR_FILLED: &str = "★ ";
const DELETE_MARKER: &str = "🗑 ";
const BUSY_SUFFIX: &str = " …";

/// Render one of the three story lists.
pub fn render<A: StoryApi, S: SessionStore>(
    f: &mut Frame,
    app: &App<A, S>,
    list: &RenderedList,
    area: Rect,
) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let title = format!(" {} ({}) ", list.kind.title(), list.items.len());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    if list.items.is_empty() {
        let message = match list.empty {
            Some(empty) => empty.message,
            None if app.router.is_idle() => "No stories",
            None => "Loading stories…",
        };
        let paragraph = Paragraph::new(message)
            .style(Style::default().fg(Color::Gray))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    // Borders plus the "(host)" tail need room next to the title.
    let title_width = app
        .config
        .title_width
        .min(area.width.saturating_sub(20) as usize)
        .max(10);

    let items: Vec<ListItem> = list
        .items
        .iter()
        .map(|item| ListItem::new(vec![title_line(item, title_width), byline(item)]))
        .collect();

    let widget = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default().with_selected(Some(app.selected));
    f.render_stateful_widget(widget, area, &mut state);
}

/// Icons, title and host for one story.
fn title_line(item: &ItemDescriptor, title_width: usize) -> Line<'static> {
    let mut spans = Vec::with_capacity(5);

    if item.show_delete_icon {
        spans.push(Span::styled(DELETE_MARKER, Style::default().fg(Color::Red)));
    }
    if item.show_favorite_icon {
        let star = if item.favorite_icon_filled {
            STAR_FILLED
        } else {
            STAR_EMPTY
        };
        spans.push(Span::styled(star, Style::default().fg(Color::Yellow)));
    }

    let title = single_line(&item.title);
    let title_style = if item.busy {
        Style::default().fg(Color::Gray)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    spans.push(Span::styled(
        truncate_to_width(&title, title_width).into_owned(),
        title_style,
    ));

    let host = single_line(&item.host_label);
    if !host.is_empty() {
        spans.push(Span::styled(
            format!(" ({host})"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if item.busy {
        spans.push(Span::styled(BUSY_SUFFIX, Style::default().fg(Color::Gray)));
    }

    Line::from(spans)
}

fn byline(item: &ItemDescriptor) -> Line<'static> {
    Line::from(Span::styled(
        format!(
            "    by {} · posted by {}",
            single_line(&item.author),
            single_line(&item.submitted_by)
        ),
        Style::default().fg(Color::Gray),
    ))
}
