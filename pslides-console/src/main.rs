//! pslides console: an audience view and a speaker view in one terminal.
//!
//! Both decks attach to the same in-process channel. Key strokes typed one
//! per line (`right`, `PageDown`, `p`, `alt+m`, ...) drive the audience deck;
//! the speaker deck follows through state sync.
//!
//! ```text
//! pslides-console [<deck.json>] [--topic <name>]
//! ```

mod view;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use log::{error, info};
use pslides_core::{DeckMode, DeckSource, KeyStroke};
use pslides_sync::{ChannelRegistry, DeckSession, SyncConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, PartialEq)]
struct Args {
    deck_path: Option<PathBuf>,
    topic: String,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args { deck_path: None, topic: SyncConfig::default().topic };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--topic" => parsed.topic = args.next().ok_or("--topic needs a value")?,
            flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
            path if parsed.deck_path.is_none() => parsed.deck_path = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument {extra}")),
        }
    }
    Ok(parsed)
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\nusage: pslides-console [<deck.json>] [--topic <name>]");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let source = match &args.deck_path {
        Some(path) => DeckSource::from_path(path)?,
        None => view::demo_source(),
    };

    let registry = ChannelRegistry::default();
    let config = SyncConfig { topic: args.topic.clone(), ..SyncConfig::default() };
    let audience_deck = source.clone().into_builder().mode(DeckMode::Presentation).build();
    let speaker_deck = source.into_builder().mode(DeckMode::Speaker).build();
    let audience = DeckSession::attach(audience_deck, &registry, config.clone()).await;
    let speaker = DeckSession::attach(speaker_deck, &registry, config).await;
    info!("Starting pslides console on '{}' (deck {})", args.topic, audience.deck_id());

    show(&audience, &speaker).await;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "q" || line == "quit" {
            break;
        }
        let Some(stroke) = KeyStroke::parse(line) else {
            println!("unrecognized key '{line}'");
            continue;
        };
        if !audience.with_deck(|deck| deck.handle_key(&stroke)).await {
            println!("nothing bound to {stroke}");
            continue;
        }
        // Give the speaker's receiver a chance to apply the new state.
        tokio::time::sleep(Duration::from_millis(10)).await;
        show(&audience, &speaker).await;
    }

    speaker.detach(&registry).await;
    audience.detach(&registry).await;
    info!("Console closed");
    Ok(())
}

async fn show(audience: &DeckSession, speaker: &DeckSession) {
    let audience_view = audience.with_deck(|deck| view::render(deck)).await;
    let speaker_view = speaker.with_deck(|deck| view::render(deck)).await;
    println!("{audience_view}{speaker_view}");
}
