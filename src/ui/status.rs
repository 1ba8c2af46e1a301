use crate::api::StoryApi;
use crate::app::App;
use crate::router::Screen;
use crate::storage::SessionStore;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

/// Render the status bar.
pub fn render<A: StoryApi, S: SessionStore>(f: &mut Frame, app: &App<A, S>, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let (text, is_error): (Cow<'_, str>, bool) =
        if let Some((msg, is_error, _)) = &app.status_message {
            (Cow::Borrowed(msg.as_ref()), *is_error)
        } else {
            (Cow::Borrowed(hints(app)), false)
        };

    let style = if is_error {
        Style::default().bg(Color::Red).fg(Color::White)
    } else {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    };

    f.render_widget(Paragraph::new(text).style(style), area);
}

fn hints<A: StoryApi, S: SessionStore>(app: &App<A, S>) -> &'static str {
    if app.form.is_some() {
        return "[Tab]next field [Enter]submit [Esc]cancel";
    }
    match (app.router.session().is_authenticated(), app.router.screen()) {
        (false, _) => "[j/k]move [o]pen [r]efresh [l]ogin [c]reate account [?]help [q]uit",
        (true, Screen::Profile) => "[h]ome [f]avorites [m]y stories [L]ogout [?]help [q]uit",
        (true, Screen::List(_)) => {
            "[h/f/m]lists [p]rofile [s]tar [n]ew [d]elete [o]pen [r]efresh [?]help [q]uit"
        }
    }
}
