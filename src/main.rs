use std::io::{self, BufWriter, Stdout, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use followtail::config::DEFAULT_POLL_INTERVAL_MS;
use followtail::{Highlighter, Line, LineSink, Result, Viewer, WatchConfig, WatchEvent};

#[derive(Parser)]
#[command(name = "followtail")]
#[command(about = "Follow a growing log file")]
struct Args {
    file: PathBuf,

    /// Milliseconds between checks of the file
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    interval_ms: u64,

    /// Colour lines matching REGEX; may be repeated, first match wins
    #[arg(long = "highlight", value_name = "REGEX[=COLOR]")]
    highlights: Vec<String>,

    /// Print lines without colour
    #[arg(long)]
    no_color: bool,

    /// Log reloads to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Writes lines to stdout as they arrive.
struct TerminalSink {
    out: BufWriter<Stdout>,
    highlighter: Highlighter,
    count: usize,
}

impl TerminalSink {
    fn new(highlighter: Highlighter) -> Self {
        Self {
            out: BufWriter::new(io::stdout()),
            highlighter,
            count: 0,
        }
    }
}

impl LineSink for TerminalSink {
    fn append(&mut self, line: Line) {
        let text = self.highlighter.paint(line.as_str());
        if let Err(e) = writeln!(self.out, "{}", text) {
            debug!("stdout write failed: {}", e);
        }
        self.count += 1;
    }

    fn clear(&mut self) {
        if self.count > 0 {
            let _ = self.out.flush();
            eprintln!("--- file truncated, reloading ---");
        }
        self.count = 0;
    }

    fn line_count(&self) -> usize {
        self.count
    }

    fn batch_complete(&mut self) {
        if let Err(e) = self.out.flush() {
            debug!("stdout flush failed: {}", e);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "followtail=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: Args) -> Result<()> {
    let highlighter = if args.no_color {
        Highlighter::default()
    } else {
        Highlighter::parse_all(args.highlights.as_slice())?
    };

    let config = WatchConfig::default()
        .with_poll_interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut viewer = Viewer::new(config, TerminalSink::new(highlighter));
    let events = viewer.subscribe();
    viewer.attach(&args.file)?;

    let mut waiting = false;
    while let Ok(event) = events.recv_blocking() {
        match event {
            WatchEvent::Changed { old_len, new_len } => {
                if waiting {
                    eprintln!("--- {} is readable again ---", args.file.display());
                    waiting = false;
                }
                debug!(old_len, new_len, "file changed");
            }
            WatchEvent::ReadFailed { path, message, .. } => {
                if !waiting {
                    eprintln!("--- cannot read {}: {}, waiting ---", path.display(), message);
                    waiting = true;
                }
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("followtail: {}", e);
            ExitCode::FAILURE
        }
    }
}
