use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use snooze::api::{HttpApi, NewStory, StoryApi};
use snooze::app::App;
use snooze::config::Config;
use snooze::router::{AppEvent, Notice, Router, Screen, UiEvent};
use snooze::storage::{FileSessionStore, MemorySessionStore, SessionStore};
use snooze::util::single_line;
use snooze::view::ListKind;
use snooze::ui;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "snooze", version, about = "Terminal client for Hack or Snooze")]
struct Args {
    /// Story service root URL (overrides config.toml)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Keep the login session in memory only
    #[arg(long)]
    no_persist: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session
    Login {
        #[arg(short, long)]
        username: String,
    },
    /// Create an account and log in
    Signup {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        name: String,
    },
    /// Forget the saved session
    Logout,
    /// Submit a new story
    Submit {
        #[arg(long)]
        author: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        url: String,
    },
    /// Print a story list
    List {
        #[arg(value_enum, default_value_t = ListArg::Home)]
        list: ListArg,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ListArg {
    Home,
    Favorites,
    Mine,
}

impl Command {
    /// Whether the command needs the saved session and story list loaded.
    ///
    /// Logout must clear the saved session even when the server would reject
    /// it or cannot be reached.
    fn needs_startup(&self) -> bool {
        !matches!(self, Command::Logout)
    }
}

impl From<ListArg> for ListKind {
    fn from(arg: ListArg) -> Self {
        match arg {
            ListArg::Home => ListKind::Home,
            ListArg::Favorites => ListKind::Favorites,
            ListArg::Mine => ListKind::MyStories,
        }
    }
}

/// ~/.config/snooze/
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("snooze"))
}

fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    }

    // The session file holds a bearer token; keep the directory private.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    Ok(())
}

/// Log to a file while the TUI owns the terminal, to stderr otherwise.
fn init_tracing(config_dir: &Path, tui: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,snooze=info"));

    if tui {
        let log_path = config_dir.join("snooze.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

/// Password from `SNOOZE_PASSWORD`, or one line of stdin.
fn read_password() -> Result<SecretString> {
    if let Ok(password) = std::env::var("SNOOZE_PASSWORD") {
        return Ok(SecretString::from(password));
    }

    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(SecretString::from(password))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_config_dir(&config_dir)?;
    init_tracing(&config_dir, args.command.is_none())?;

    let mut config =
        Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;
    if let Some(url) = &args.api_url {
        config.api_base_url = url.clone();
    }

    let api = Arc::new(HttpApi::new(&config.api_base_url).context("Failed to create API client")?);

    if args.no_persist {
        run(args.command, config, api, MemorySessionStore::new()).await
    } else {
        let store = FileSessionStore::open(config_dir.join("session.toml"));
        run(args.command, config, api, store).await
    }
}

async fn run<A: StoryApi, S: SessionStore>(
    command: Option<Command>,
    config: Config,
    api: Arc<A>,
    store: S,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(32);
    let mut router = Router::new(api, store, event_tx);

    let Some(command) = command else {
        router.start().await;
        let mut app = App::new(router, config);
        ui::run(&mut app, event_rx).await?;
        return Ok(());
    };

    if command.needs_startup() {
        router.start().await;
    }

    // A startup failure (e.g. the story list not loading) only matters to
    // commands that print that list.
    let startup = router.take_notice();
    if let Some(notice) = &startup {
        tracing::warn!(message = %notice.message, "Startup notice");
    }

    match command {
        Command::Login { username } => {
            let password = read_password()?;
            router.dispatch(UiEvent::Login { username, password })?;
        }
        Command::Signup { username, name } => {
            let password = read_password()?;
            router.dispatch(UiEvent::Signup {
                username,
                password,
                name,
            })?;
        }
        Command::Logout => router.dispatch(UiEvent::Logout)?,
        Command::Submit { author, title, url } => {
            router.dispatch(UiEvent::SubmitStory(NewStory { author, title, url }))?;
        }
        Command::List { list } => {
            if let Some(notice) = startup.filter(|n| n.is_error) {
                bail!(notice.message);
            }
            let kind = ListKind::from(list);
            if kind != ListKind::Home {
                router.dispatch(UiEvent::Navigate(Screen::List(kind)))?;
            }
            if let Some(notice) = settle(&mut router, &mut event_rx).await? {
                if notice.is_error {
                    bail!(notice.message);
                }
            }
            print_list(&router, kind);
            return Ok(());
        }
    }

    match settle(&mut router, &mut event_rx).await? {
        Some(notice) if notice.is_error => bail!(notice.message),
        Some(notice) => println!("{}", notice.message),
        None => {}
    }
    Ok(())
}

/// Apply background results until nothing is outstanding.
///
/// Returns the notice worth reporting: the first error if there was one,
/// otherwise the latest message.
async fn settle<A: StoryApi, S: SessionStore>(
    router: &mut Router<A, S>,
    event_rx: &mut mpsc::Receiver<AppEvent>,
) -> Result<Option<Notice>> {
    let mut kept = router.take_notice();
    while !router.is_idle() {
        let event = event_rx
            .recv()
            .await
            .context("Background task channel closed")?;
        router.apply(event);
        if let Some(notice) = router.take_notice() {
            if !kept.as_ref().is_some_and(|k| k.is_error) {
                kept = Some(notice);
            }
        }
    }
    Ok(kept)
}

fn print_list<A: StoryApi, S: SessionStore>(router: &Router<A, S>, kind: ListKind) {
    let list = router.view(kind);
    if let Some(empty) = list.empty {
        println!("{}", empty.message);
        return;
    }
    for item in &list.items {
        let star = match (item.show_favorite_icon, item.favorite_icon_filled) {
            (false, _) => "",
            (true, true) => "★ ",
            (true, false) => "☆ ",
        };
        println!(
            "{star}{} ({})\n    by {} · posted by {} · {}",
            single_line(&item.title),
            single_line(&item.host_label),
            single_line(&item.author),
            single_line(&item.submitted_by),
            item.id
        );
    }
}
