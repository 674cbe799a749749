use clap::{Parser, Subcommand};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::*;

use mood::normalize::{Normalizer, Tokens};
use mood::service::{serve, Render, ServeOptions};
use mood::status::Status;
use mood::vocab::{OovPolicy, Vocabulary};
use mood::{Analyzer, Config, Error, MAX_WORDS};

#[derive(Debug, Parser)]
#[command(name = "mood", version, about = "Tweet sized sentiment analysis")]
struct Args {
    /// Path to the toml config
    #[arg(short, long, default_value = "mood.toml")]
    config: PathBuf,

    /// Print results as json
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score one text and exit
    Analyze { text: String },
    /// Score one text per line from stdin
    Serve,
    /// Fit a vocabulary from a corpus with one text per line
    Vocab {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = MAX_WORDS)]
        max_words: usize,
        #[arg(long, default_value = "padding")]
        oov: OovPolicy,
    },
}

fn init_logging(debug: bool) {
    if debug {
        std::env::set_var("RUST_LOG", "mood=debug");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "mood=info");
    }
    pretty_env_logger::init();
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    let render = if args.json { Render::Json } else { Render::Text };

    match args.command.unwrap_or(Command::Serve) {
        Command::Vocab {
            corpus,
            out,
            max_words,
            oov,
        } => {
            init_logging(false);
            fit_vocab(&corpus, &out, max_words, oov)
        }
        Command::Analyze { text } => {
            let config = Config::load(&args.config)?;
            init_logging(config.debug);
            let analyzer = Analyzer::from_config(&config)?;
            let prediction = analyzer.analyze(&text)?;
            println!("{}", render.prediction(&prediction)?);
            Ok(())
        }
        Command::Serve => {
            let config = Config::load(&args.config)?;
            init_logging(config.debug);
            start_serving(&config, render)
        }
    }
}

fn start_serving(config: &Config, render: Render) -> Result<(), Error> {
    info!("Loading model");
    let analyzer = Analyzer::from_config(config)?;
    let status = Arc::new(Status::new());

    debug!("Setting up stop signals");
    let stop_signal = status.clone();
    let mut signal_count = 0;
    ctrlc::set_handler(move || {
        if signal_count > 0 {
            std::process::exit(1);
        } else {
            stop_signal.stop();
            signal_count += 1;
        }
    })?;

    let options = ServeOptions {
        workers: config.workers,
        request_timeout: config.request_timeout(),
        render,
    };
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(&analyzer, &status, options, stdin.lock(), stdout.lock())?;
    Ok(())
}

fn fit_vocab(corpus: &Path, out: &Path, max_words: usize, oov: OovPolicy) -> Result<(), Error> {
    let normalizer = Normalizer::new()?;
    let texts: Vec<Tokens> = std::fs::read_to_string(corpus)?
        .lines()
        .map(|line| normalizer.normalize(line))
        .collect();
    let vocab = Vocabulary::fit(&texts, max_words, oov)?;
    vocab.save(out)?;
    info!(
        "Fitted {} words from {} texts into {}",
        vocab.len(),
        texts.len(),
        out.display()
    );
    Ok(())
}
