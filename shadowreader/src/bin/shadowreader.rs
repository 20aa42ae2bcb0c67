//! Line-oriented host for the reading engine.
//!
//! Commands read from stdin: `n` next page, `p` previous page, `/word`
//! search forward, `a` toggle auto-advance, `q` quit.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use shadowreader::auto_advance::{AdvanceState, AutoAdvance};
use shadowreader::config::ReaderConfig;
use shadowreader::errors::ReaderError;
use shadowreader::observability::{init_tracing, LogFormat};
use shadowreader::position::{JsonFileSettingsStore, PositionStore};
use shadowreader::session::{DisplaySink, Reading, ReadingSession};
use shadowreader::web::http_sites;

#[derive(Parser, Debug)]
#[command(name = "shadowreader")]
#[command(version, about = "Page through a text file or web novel", long_about = None)]
#[command(after_help = "COMMANDS (stdin):
    n        Next page
    p        Previous page
    /word    Search forward for word
    a        Toggle auto-advance
    q        Quit")]
struct Cli {
    /// Local file path or book URL
    #[arg(value_name = "BOOK")]
    book: String,

    /// Reader configuration (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File holding saved reading positions
    #[arg(long, value_name = "FILE", default_value = "shadowreader-positions.json")]
    settings: PathBuf,

    /// Log output: pretty or json
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    log_format: LogFormat,
}

fn show(reading: &Reading) {
    let text = reading.display_text();
    if text.is_empty() {
        println!("-- end --");
    } else {
        println!("{text}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = match &cli.config {
        Some(path) => ReaderConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ReaderConfig::default(),
    };
    let page_size = config.page_size;

    let store = JsonFileSettingsStore::open(&cli.settings)
        .await
        .with_context(|| format!("opening {}", cli.settings.display()))?;
    let positions = PositionStore::new(Arc::new(store));
    let sites = http_sites(&config)?;
    let session = Arc::new(ReadingSession::new(config, positions, sites)?);

    session
        .open(cli.book.as_str())
        .await
        .with_context(|| format!("opening {}", cli.book))?;

    let auto = AutoAdvance::new();
    let display: Arc<dyn DisplaySink> = Arc::new(|text: &str| {
        if !text.is_empty() {
            println!("{text}");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let result = match line {
            "" => continue,
            "q" => break,
            "n" => session.turn_forward(page_size).await.map(|r| show(&r)),
            "p" => session.turn_backward(page_size).await.map(|r| show(&r)),
            "a" => {
                match auto.toggle(session.clone(), display.clone()) {
                    AdvanceState::Disabled => println!("auto-advance is disabled (interval is 0)"),
                    state => println!("auto-advance: {state:?}"),
                }
                Ok(())
            }
            _ => match line.strip_prefix('/') {
                Some(keyword) => session.search_forward(keyword).await.map(|r| show(&r)),
                None => {
                    println!("commands: n, p, /word, a, q");
                    Ok(())
                }
            },
        };

        match result {
            Ok(()) => {}
            Err(ReaderError::Busy) => println!("busy, try again"),
            Err(e) => {
                warn!(error = %e, "Command failed");
                println!("error: {e}");
            }
        }
    }

    auto.stop();
    session.close().await;
    Ok(())
}
