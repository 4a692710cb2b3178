use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info};
use simplelog::{Config, WriteLogger};

use pageflip::clock::SystemClock;
use pageflip::dir_source::DirectorySource;
use pageflip::panic_handler::initialize_panic_handler;
use pageflip::positions::{JsonFileStorage, Storage};
use pageflip::settings::load_settings;
use pageflip::{SpreadMode, Viewer};

/// How long a command may keep the loop busy before the prompt returns
const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);
const TICK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "pageflip", version, about = "Page through a directory of page images")]
struct Args {
    /// Directory holding one file per page; defaults to the last document read
    document: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reading positions file
    #[arg(long)]
    positions: Option<PathBuf>,

    /// Show one page at a time even on wide viewports
    #[arg(long)]
    single: bool,

    /// Initial viewport width
    #[arg(long)]
    width: Option<f32>,

    /// Initial viewport height
    #[arg(long)]
    height: Option<f32>,

    /// Log file
    #[arg(long, default_value = "pageflip.log")]
    log_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
enum ReplCommand {
    Next,
    Prev,
    GoTo(usize),
    Resize(f32, f32),
    Zoom(f32),
    Spread(SpreadMode),
    Bookmark,
    Bookmarks,
    Retry,
    State,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<ReplCommand> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;
    let mut number = || parts.next().and_then(|n| n.parse::<f32>().ok());

    let parsed = match cmd {
        "n" | "next" => ReplCommand::Next,
        "p" | "prev" => ReplCommand::Prev,
        "g" | "goto" => ReplCommand::GoTo(number()?.max(0.0) as usize),
        "r" | "resize" => {
            let width = number()?;
            let height = number()?;
            ReplCommand::Resize(width, height)
        }
        "z" | "zoom" => ReplCommand::Zoom(number()?),
        "single" => ReplCommand::Spread(SpreadMode::Single),
        "two" => ReplCommand::Spread(SpreadMode::TwoPage),
        "b" | "bookmark" => ReplCommand::Bookmark,
        "bl" | "bookmarks" => ReplCommand::Bookmarks,
        "retry" => ReplCommand::Retry,
        "s" | "state" => ReplCommand::State,
        "h" | "help" | "?" => ReplCommand::Help,
        "q" | "quit" | "exit" => ReplCommand::Quit,
        _ => return None,
    };
    Some(parsed)
}

const HELP: &str = "commands: n(ext) p(rev) g(oto) N r(esize) W H z(oom) F single two \
b(ookmark) bl retry s(tate) q(uit)";

fn main() -> Result<()> {
    initialize_panic_handler();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref());
    if args.single {
        settings.spread = SpreadMode::Single;
    }
    if let Some(width) = args.width {
        settings.initial_viewport.width = width;
    }
    if let Some(height) = args.height {
        settings.initial_viewport.height = height;
    }

    WriteLogger::init(
        settings.log_level(),
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("creating log file {}", args.log_file.display()))?,
    )?;
    info!("Starting pageflip");

    let positions_path = args.positions.clone().or_else(|| settings.positions_path());
    let storage = JsonFileStorage::load_or_ephemeral(positions_path.as_deref());

    let document = match args.document {
        Some(path) => path,
        None => match storage.most_recent_document() {
            Some(key) => PathBuf::from(key),
            None => bail!("no document given and no reading history"),
        },
    };
    let document_key = document
        .canonicalize()
        .unwrap_or_else(|_| document.clone())
        .to_string_lossy()
        .into_owned();

    let mut viewer = Viewer::new(settings.viewer_options(), storage, Arc::new(SystemClock));
    viewer.open(&document_key, Arc::new(DirectorySource::new(&document)));
    settle(&mut viewer);
    print_state(&viewer);

    let result = run_repl(&mut viewer);
    if let Err(err) = &result {
        error!("Application error: {err:?}");
    }

    info!("Shutting down pageflip");
    result
}

fn run_repl<S: Storage>(viewer: &mut Viewer<S>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    print!("> ");
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        match parse_command(&line) {
            Some(ReplCommand::Quit) => break,
            Some(command) => {
                execute(viewer, command);
                settle(viewer);
                print_state(viewer);
            }
            None if line.trim().is_empty() => {}
            None => println!("unknown command, try `help`"),
        }
        print!("> ");
        stdout.flush()?;
    }
    Ok(())
}

fn execute<S: Storage>(viewer: &mut Viewer<S>, command: ReplCommand) {
    let accepted = match command {
        ReplCommand::Next => viewer.request_next(),
        ReplCommand::Prev => viewer.request_prev(),
        ReplCommand::GoTo(page) => viewer.go_to_page(page),
        ReplCommand::Resize(width, height) => {
            viewer.on_resize(width, height);
            true
        }
        ReplCommand::Zoom(factor) => {
            viewer.set_zoom(factor);
            true
        }
        ReplCommand::Spread(mode) => {
            viewer.set_spread_preference(mode);
            true
        }
        ReplCommand::Bookmark => {
            let on = viewer.toggle_bookmark();
            println!("bookmark {}", if on { "added" } else { "removed" });
            true
        }
        ReplCommand::Bookmarks => {
            println!("bookmarks: {:?}", viewer.bookmarks());
            true
        }
        ReplCommand::Retry => viewer.retry_document_info(),
        ReplCommand::State => true,
        ReplCommand::Help => {
            println!("{HELP}");
            true
        }
        ReplCommand::Quit => false,
    };
    if !accepted {
        println!("ignored");
    }
}

/// Tick until page turns, resizes and fetches have all finished
fn settle<S: Storage>(viewer: &mut Viewer<S>) {
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    loop {
        viewer.tick();
        let fetching = viewer
            .session()
            .is_some_and(|session| !session.scheduler().is_settled());
        if (viewer.next_deadline().is_none() && !fetching) || Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(TICK_INTERVAL);
    }
}

fn print_state<S: Storage>(viewer: &Viewer<S>) {
    let Some(state) = viewer.state() else {
        println!("no document open");
        return;
    };
    let total = state
        .total_pages
        .map_or_else(|| "?".to_string(), |t| t.to_string());
    let layout = viewer.layout();
    let ready: Vec<String> = viewer
        .visible_pages()
        .into_iter()
        .map(|page| {
            let mark = if viewer.is_page_ready(page) { "" } else { " (loading)" };
            format!("{page}{mark}")
        })
        .collect();

    println!(
        "page {} of {total} [{}] loaded {}% | {} {:.0}x{:.0} render {}x{}",
        state.current_page,
        ready.join(", "),
        state.loading_progress,
        layout.spread_mode.as_str(),
        layout.page_width,
        layout.page_height,
        layout.render_width,
        layout.render_height,
    );
    if let Some(err) = viewer.session().and_then(|s| s.document_error()) {
        println!("document failed to load: {err} (try `retry`)");
    }
}
