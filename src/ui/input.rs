//! Keyboard handling for the TUI.
//!
//! Keys are turned into router events; anything the router refuses ends up
//! on the status line instead of changing state.

use crate::api::StoryApi;
use crate::app::{App, FormKind, MAX_FIELD_LENGTH};
use crate::router::{RouterError, Screen, UiEvent};
use crate::storage::SessionStore;
use crate::util::browser_url;
use crate::view::ListKind;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};

use super::Action;

pub(super) fn handle_input<A: StoryApi, S: SessionStore>(
    app: &mut App<A, S>,
    code: KeyCode,
    modifiers: KeyModifiers,
) -> Result<Action> {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Ok(Action::Quit);
    }

    if app.show_help {
        if matches!(code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
            app.show_help = false;
        }
        return Ok(Action::Continue);
    }

    if app.form.is_some() {
        handle_form_input(app, code);
        return Ok(Action::Continue);
    }

    if app.confirm_delete.is_some() {
        handle_confirm_input(app, code);
        return Ok(Action::Continue);
    }

    match code {
        KeyCode::Char('q') => return Ok(Action::Quit),
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('h') => navigate(app, Screen::List(ListKind::Home)),
        KeyCode::Char('f') => navigate(app, Screen::List(ListKind::Favorites)),
        KeyCode::Char('m') => navigate(app, Screen::List(ListKind::MyStories)),
        KeyCode::Char('p') => navigate(app, Screen::Profile),
        KeyCode::Char('j') | KeyCode::Down => app.nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.nav_up(),
        KeyCode::Char('g') | KeyCode::Home => app.selected = 0,
        KeyCode::Char('r') => {
            let result = app.router.dispatch(UiEvent::Refresh);
            report(app, result, "Refreshing...");
        }
        KeyCode::Char('s') => {
            if let Some(id) = app.selected_item().map(|item| item.id.clone()) {
                let result = app.router.dispatch(UiEvent::ToggleFavorite(id));
                report(app, result, "Updating favorite...");
            }
        }
        KeyCode::Char('d') | KeyCode::Delete => request_delete(app),
        KeyCode::Char('o') | KeyCode::Enter => open_selected(app),
        KeyCode::Char('l') => open_account_form(app, FormKind::Login),
        KeyCode::Char('c') => open_account_form(app, FormKind::Signup),
        KeyCode::Char('n') => {
            if app.router.session().is_authenticated() {
                app.open_form(FormKind::Submit);
            } else {
                app.set_status("Log in to submit stories (press l)");
            }
        }
        KeyCode::Char('L') => {
            if app.router.session().is_authenticated() {
                let result = app.router.dispatch(UiEvent::Logout);
                report(app, result, "");
                app.absorb_notice();
                app.selected = 0;
            }
        }
        _ => {}
    }
    Ok(Action::Continue)
}

fn open_account_form<A: StoryApi, S: SessionStore>(app: &mut App<A, S>, kind: FormKind) {
    if app.router.session().is_authenticated() {
        app.set_status("Already logged in (L to log out)");
    } else {
        app.open_form(kind);
    }
}

/// Typing goes to the focused field; Enter submits, Esc closes.
///
/// While the request runs only Esc is accepted.
fn handle_form_input<A: StoryApi, S: SessionStore>(app: &mut App<A, S>, code: KeyCode) {
    let Some(form) = app.form.as_mut() else {
        return;
    };
    if code == KeyCode::Esc {
        app.form = None;
        app.set_status("Cancelled");
        return;
    }
    if form.pending {
        return;
    }
    match code {
        KeyCode::Enter => app.submit_form(),
        KeyCode::Tab | KeyCode::Down => form.next(),
        KeyCode::BackTab | KeyCode::Up => form.prev(),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(c) => {
            if !form.push_char(c) {
                app.set_status(format!("Field at max length ({MAX_FIELD_LENGTH} chars)"));
            }
        }
        _ => {}
    }
}

fn navigate<A: StoryApi, S: SessionStore>(app: &mut App<A, S>, screen: Screen) {
    if app.router.screen() == screen {
        return;
    }
    match app.router.dispatch(UiEvent::Navigate(screen)) {
        Ok(()) => app.selected = 0,
        Err(e) => app.set_error(e.to_string()),
    }
}

/// Delete is only offered on rows that show the delete marker.
fn request_delete<A: StoryApi, S: SessionStore>(app: &mut App<A, S>) {
    let Some((id, deletable, busy)) = app
        .selected_item()
        .map(|item| (item.id.clone(), item.show_delete_icon, item.busy))
    else {
        return;
    };
    if !deletable {
        app.set_status("Only your own stories can be deleted (press m)");
        return;
    }
    if busy {
        app.set_error(RouterError::Busy(id).to_string());
        return;
    }

    if app.config.confirm_delete {
        app.confirm_delete = Some(id);
    } else {
        let result = app.router.dispatch(UiEvent::DeleteStory(id));
        report(app, result, "Deleting...");
    }
}

fn handle_confirm_input<A: StoryApi, S: SessionStore>(app: &mut App<A, S>, code: KeyCode) {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            if let Some(id) = app.confirm_delete.take() {
                let result = app.router.dispatch(UiEvent::DeleteStory(id));
                report(app, result, "Deleting...");
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.confirm_delete = None;
            app.set_status("Cancelled");
        }
        _ => {}
    }
}

fn open_selected<A: StoryApi, S: SessionStore>(app: &mut App<A, S>) {
    let Some(raw) = app.selected_item().map(|item| item.url.clone()) else {
        return;
    };
    match browser_url(&raw) {
        Err(e) => app.set_error(e),
        Ok(url) => {
            if let Err(e) = open::that(url.as_str()) {
                tracing::warn!(url = %url, error = %e, "Failed to open browser");
                app.set_error(format!("Failed to open browser: {e}"));
            } else {
                app.set_status(format!("Opening {}", url.host_str().unwrap_or_default()));
            }
        }
    }
}

/// Show `pending` while a request runs, or the reason it was refused.
fn report<A: StoryApi, S: SessionStore>(
    app: &mut App<A, S>,
    result: Result<(), RouterError>,
    pending: &'static str,
) {
    match result {
        Ok(()) if !pending.is_empty() => app.set_status(pending),
        Ok(()) => {}
        Err(e) => app.set_error(e.to_string()),
    }
}
