use crate::api::{NewStory, StoryApi, StoryId};
use crate::config::Config;
use crate::router::{AppEvent, Router, Screen, Task, UiEvent};
use crate::storage::SessionStore;
use crate::view::{ItemDescriptor, RenderedList};
use secrecy::SecretString;
use std::borrow::Cow;
use tokio::time::Instant;

/// How long a status message stays visible.
const STATUS_TTL_SECS: u64 = 4;

/// Longest value a form field accepts.
pub const MAX_FIELD_LENGTH: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Login,
    Signup,
    Submit,
}

impl FormKind {
    pub fn title(self) -> &'static str {
        match self {
            FormKind::Login => " Log in ",
            FormKind::Signup => " Create account ",
            FormKind::Submit => " Submit a story ",
        }
    }

    /// The request a submitted form of this kind waits on.
    fn task(self) -> Task {
        match self {
            FormKind::Login | FormKind::Signup => Task::Auth,
            FormKind::Submit => Task::Submit,
        }
    }

    fn pending_message(self) -> &'static str {
        match self {
            FormKind::Login => "Logging in...",
            FormKind::Signup => "Creating account...",
            FormKind::Submit => "Submitting story...",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
    /// Drawn masked.
    pub secret: bool,
}

impl FormField {
    fn text(label: &'static str) -> Self {
        Self {
            label,
            value: String::new(),
            secret: false,
        }
    }

    fn secret(label: &'static str) -> Self {
        Self {
            secret: true,
            ..Self::text(label)
        }
    }
}

/// Modal text input for login, signup and story submission.
///
/// The form stays open while its request runs and is closed only once the
/// request succeeds; on failure the typed values are kept for another try.
#[derive(Debug, Clone)]
pub struct Form {
    pub kind: FormKind,
    pub fields: Vec<FormField>,
    pub focus: usize,
    /// Submitted and waiting for the server.
    pub pending: bool,
}

impl Form {
    pub fn new(kind: FormKind) -> Self {
        let fields = match kind {
            FormKind::Login => vec![FormField::text("Username"), FormField::secret("Password")],
            FormKind::Signup => vec![
                FormField::text("Name"),
                FormField::text("Username"),
                FormField::secret("Password"),
            ],
            FormKind::Submit => vec![
                FormField::text("Author"),
                FormField::text("Title"),
                FormField::text("URL"),
            ],
        };
        Self {
            kind,
            fields,
            focus: 0,
            pending: false,
        }
    }

    /// Append to the focused field. Returns false once the field is full.
    pub fn push_char(&mut self, c: char) -> bool {
        let field = &mut self.fields[self.focus];
        if field.value.chars().count() >= MAX_FIELD_LENGTH {
            return false;
        }
        field.value.push(c);
        true
    }

    pub fn backspace(&mut self) {
        self.fields[self.focus].value.pop();
    }

    pub fn next(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len();
    }

    pub fn prev(&mut self) {
        self.focus = self.focus.checked_sub(1).unwrap_or(self.fields.len() - 1);
    }

    fn value(&self, label: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map_or("", |f| f.value.as_str())
    }

    /// The router event for the filled-in form, or the first missing field.
    pub fn to_event(&self) -> Result<UiEvent, String> {
        if let Some(missing) = self.fields.iter().find(|f| f.value.trim().is_empty()) {
            return Err(format!("{} is required", missing.label));
        }

        let text = |label: &str| self.value(label).trim().to_string();
        let password = || SecretString::from(self.value("Password").to_string());
        Ok(match self.kind {
            FormKind::Login => UiEvent::Login {
                username: text("Username"),
                password: password(),
            },
            FormKind::Signup => UiEvent::Signup {
                username: text("Username"),
                password: password(),
                name: text("Name"),
            },
            FormKind::Submit => UiEvent::SubmitStory(NewStory {
                author: text("Author"),
                title: text("Title"),
                url: text("URL"),
            }),
        })
    }
}

/// Terminal front-end state wrapped around the router.
///
/// The router owns the story and session state; this only adds what the
/// terminal needs on top: the cursor, the status line and a pending delete
/// confirmation.
pub struct App<A, S> {
    pub router: Router<A, S>,
    pub config: Config,
    /// Cursor position in the current list.
    pub selected: usize,
    pub needs_redraw: bool,
    /// Message, error flag, and when it was set.
    pub status_message: Option<(Cow<'static, str>, bool, Instant)>,
    /// Story awaiting a y/n answer before deletion.
    pub confirm_delete: Option<StoryId>,
    pub show_help: bool,
    /// Open input form, drawn over the current screen.
    pub form: Option<Form>,
}

impl<A: StoryApi, S: SessionStore> App<A, S> {
    pub fn new(router: Router<A, S>, config: Config) -> Self {
        Self {
            router,
            config,
            selected: 0,
            needs_redraw: true,
            status_message: None,
            confirm_delete: None,
            show_help: false,
            form: None,
        }
    }

    /// Open an empty form. The story form starts with the user's name as
    /// author.
    pub fn open_form(&mut self, kind: FormKind) {
        let mut form = Form::new(kind);
        if kind == FormKind::Submit {
            if let Some(identity) = self.router.session().identity() {
                form.fields[0].value = identity.name().to_string();
                form.focus = 1;
            }
        }
        self.form = Some(form);
    }

    /// Send the open form to the router. The form stays open until the
    /// request settles.
    pub fn submit_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        if form.pending {
            return;
        }
        let event = match form.to_event() {
            Ok(event) => event,
            Err(msg) => {
                self.set_error(msg);
                return;
            }
        };
        let kind = form.kind;
        match self.router.dispatch(event) {
            Ok(()) => {
                form.pending = true;
                self.set_status(kind.pending_message());
            }
            Err(e) => self.set_error(e.to_string()),
        }
    }

    /// Commit a background result and bring the front-end state in line
    /// with it.
    pub fn apply_event(&mut self, event: AppEvent) {
        let task = event.task();
        self.router.apply(event);

        if let Some(form) = self
            .form
            .as_mut()
            .filter(|form| form.pending && form.kind.task() == task)
        {
            let failed = match form.kind {
                FormKind::Login | FormKind::Signup => !self.router.session().is_authenticated(),
                FormKind::Submit => self.router.notice().is_some_and(|n| n.is_error),
            };
            if failed {
                form.pending = false;
            } else {
                self.form = None;
                self.selected = 0;
            }
        }

        self.absorb_notice();
        if self
            .confirm_delete
            .as_ref()
            .is_some_and(|id| !self.router.session().identity().is_some_and(|i| i.owns(id)))
        {
            self.confirm_delete = None;
        }
        self.clamp_selection();
        self.needs_redraw = true;
    }

    /// Rows of the list on screen, or `None` on the profile screen.
    pub fn current_list(&self) -> Option<&RenderedList> {
        match self.router.screen() {
            Screen::List(kind) => Some(self.router.view(kind)),
            Screen::Profile => None,
        }
    }

    pub fn nav_down(&mut self) {
        let len = self.current_list().map_or(0, |list| list.items.len());
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn nav_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn selected_item(&self) -> Option<&ItemDescriptor> {
        self.current_list()?.items.get(self.selected)
    }

    /// Keep the cursor inside the current list after it changed length.
    pub fn clamp_selection(&mut self) {
        let len = self.current_list().map_or(0, |list| list.items.len());
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), false, Instant::now()));
    }

    pub fn set_error(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), true, Instant::now()));
    }

    /// Move the router's latest notice onto the status line.
    pub fn absorb_notice(&mut self) {
        if let Some(notice) = self.router.take_notice() {
            if notice.is_error {
                self.set_error(notice.message);
            } else {
                self.set_status(notice.message);
            }
        }
    }

    /// Clear the status message once it has been shown long enough.
    /// Returns true if a message was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, _, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}
