use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tasklist::db::DB_FILE_NAME;
use tasklist::server::{self, AppState};
use tasklist::task::DUE_DATE_FORMAT;
use tasklist::{
    ColorScheme, Filter, NewTask, Priority, RootClassList, Scheme, SqliteStorage, Storage, TaskId,
    TaskStore,
};

#[derive(Parser)]
#[command(name = "tasklist")]
#[command(about = "Local task list with a persisted color scheme")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, global = true)]
    debug: bool,
    /// Directory holding the task database
    #[arg(long, global = true, env = "TASKLIST_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    Task { #[command(subcommand)] action: TaskCommands },
    Theme { #[command(subcommand)] action: ThemeCommands },
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
        #[arg(long, default_value = "ui")]
        ui: PathBuf,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    Add {
        text: String,
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        #[arg(short, long, value_parser = parse_due)]
        due: Option<String>,
    },
    List {
        #[arg(short, long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
    },
    Toggle { id: TaskId },
    Done { id: TaskId },
    Undo { id: TaskId },
    Rm { id: TaskId },
    Edit { id: TaskId, text: String },
    #[command(name = "priority")]
    SetPriority { id: TaskId, priority: Priority },
    /// Sets the due date, or clears it when no date is given
    Due {
        id: TaskId,
        #[arg(value_parser = parse_due)]
        date: Option<String>,
    },
    ClearDone,
}

#[derive(Subcommand)]
enum ThemeCommands {
    Show,
    Toggle,
    Set { scheme: Scheme },
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterArg { All, Active, Done }

impl From<FilterArg> for Filter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => Filter::All,
            FilterArg::Active => Filter::Active,
            FilterArg::Done => Filter::Done,
        }
    }
}

fn parse_due(s: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(s, DUE_DATE_FORMAT)
        .map(|d| d.format(DUE_DATE_FORMAT).to_string())
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

/// Reads the terminal's `COLORFGBG` hint ("fg;bg" or "fg;x;bg").
fn terminal_prefers_dark() -> Option<bool> {
    env::var("COLORFGBG").ok().as_deref().and_then(dark_background)
}

fn dark_background(colorfgbg: &str) -> Option<bool> {
    let bg: u8 = colorfgbg.rsplit(';').next()?.trim().parse().ok()?;
    match bg {
        0..=6 | 8 => Some(true),
        7 | 9..=15 => Some(false),
        _ => None,
    }
}

fn open_storage(data_dir: Option<PathBuf>) -> Result<Arc<dyn Storage>> {
    let dir = match data_dir.or_else(|| dirs::data_dir().map(|d| d.join("tasklist"))) {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    let path = dir.join(DB_FILE_NAME);
    let storage = SqliteStorage::open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Arc::new(storage))
}

fn mount_scheme(storage: Arc<dyn Storage>) -> (ColorScheme, RootClassList) {
    let classes = RootClassList::new();
    let mut scheme = ColorScheme::new(storage, Arc::new(classes.clone()));
    scheme.load_initial(&terminal_prefers_dark);
    (scheme, classes)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    let storage = open_storage(cli.data_dir)?;

    match cli.command {
        Commands::Task { action } => run_task(TaskStore::load(storage), action),
        Commands::Theme { action } => {
            let (mut scheme, _) = mount_scheme(storage);
            match action {
                ThemeCommands::Show => {}
                ThemeCommands::Toggle => scheme.toggle(),
                ThemeCommands::Set { scheme: s } => scheme.set_dark(s == Scheme::Dark),
            }
            println!("🎨 Color scheme: {}", scheme.scheme());
            Ok(())
        }
        Commands::Serve { port, ui } => {
            let (scheme, classes) = mount_scheme(storage.clone());
            let tasks = TaskStore::load(storage);
            let state = Arc::new(Mutex::new(AppState { tasks, scheme, classes }));
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::serve(state, port, &ui))
        }
    }
}

fn run_task(mut store: TaskStore, action: TaskCommands) -> Result<()> {
    let target = match &action {
        TaskCommands::Toggle { id }
        | TaskCommands::Done { id }
        | TaskCommands::Undo { id }
        | TaskCommands::Rm { id }
        | TaskCommands::Edit { id, .. }
        | TaskCommands::SetPriority { id, .. }
        | TaskCommands::Due { id, .. } => Some(*id),
        _ => None,
    };
    if let Some(id) = target {
        if store.get(id).is_none() {
            println!("❌ Task [{}] not found.", id);
            return Ok(());
        }
    }

    match action {
        TaskCommands::Add { text, priority, due } => {
            let id = store.add(NewTask::new(text).priority(priority).due_date(due));
            println!("✅ Task [{}] added.", id);
        }
        TaskCommands::List { filter } => print_tasks(&store, filter.into()),
        TaskCommands::Toggle { id } => store.toggle(id),
        TaskCommands::Done { id } => store.set_done(id, true),
        TaskCommands::Undo { id } => store.set_done(id, false),
        TaskCommands::Rm { id } => {
            store.remove(id);
            println!("🗑️ Task [{}] removed.", id);
        }
        TaskCommands::Edit { id, text } => store.update_text(id, text),
        TaskCommands::SetPriority { id, priority } => store.update_priority(id, priority),
        TaskCommands::Due { id, date } => store.update_due_date(id, date),
        TaskCommands::ClearDone => {
            let before = store.len();
            store.clear_done();
            println!("🧹 Cleared {} finished tasks.", before - store.len());
        }
    }
    Ok(())
}

fn print_tasks(store: &TaskStore, filter: Filter) {
    let counts = store.counts();
    let today = Local::now().date_naive();
    println!("TASKS ({} open / {} done):", counts.remaining, counts.done);
    for t in store.iter_filtered(filter) {
        let mark = if t.done { "x" } else { " " };
        let due = t.due_date.as_deref().map(|d| format!(" due {}", d)).unwrap_or_default();
        let overdue = if t.is_overdue(today) { " ⚠️ overdue" } else { "" };
        println!("[{}] {} {} ({}){}{}", mark, t.id, t.text, t.priority, due, overdue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorfgbg_background_index_decides() {
        assert_eq!(dark_background("15;0"), Some(true));
        assert_eq!(dark_background("0;default;15"), Some(false));
        assert_eq!(dark_background("15;8"), Some(true));
        assert_eq!(dark_background("15;default"), None);
        assert_eq!(dark_background(""), None);
    }

    #[test]
    fn due_dates_are_normalized() {
        assert_eq!(parse_due("2026-1-5").as_deref(), Ok("2026-01-05"));
        assert!(parse_due("tomorrow").is_err());
    }

    #[test]
    fn cli_parses_nested_commands() {
        let args = ["tasklist", "task", "add", "buy milk", "-p", "high"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Task { action: TaskCommands::Add { text, priority, due } } => {
                assert_eq!(text, "buy milk");
                assert_eq!(priority, Priority::High);
                assert_eq!(due, None);
            }
            _ => panic!("expected task add"),
        }
    }
}
