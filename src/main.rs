use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

use dance_coach::config::Config;
use dance_coach::reference::ReferenceTrack;
use dance_coach::runner::Producer;
use dance_coach::session::Session;
use dance_coach::source::RecordedSource;
use dance_coach::timing::PlaybackRate;

/// Score a live keypoint stream against a recorded dance.
#[derive(Parser, Debug)]
#[command(name = "dance_coach", version = env!("GIT_VERSION"), about)]
struct Args {
    /// TOML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Override the reference track path from the config
    #[arg(long, value_name = "FILE")]
    reference: Option<PathBuf>,

    /// Override the live keypoint recording path from the config
    #[arg(long, value_name = "FILE")]
    live: Option<PathBuf>,

    /// Start immediately in this mode (normal or slow)
    #[arg(long)]
    start: Option<PlaybackRate>,

    /// Log level (off, trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn print_help() {
    println!("コマンド:");
    println!("  s  - 通常速度で開始 / リスタート");
    println!("  w  - スロー再生で開始 / リスタート");
    println!("  x  - 停止 (レポート保存)");
    println!("  r  - リセット");
    println!("  f  - 現在のフィードバック");
    println!("  q  - 終了");
}

fn save_report(session: &Session, config: &Config) {
    if let Err(e) = session.report().save(&config.app.report_dir) {
        error!("failed to save session report: {e:#}");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .init();

    info!("dance_coach {}", env!("GIT_VERSION"));

    let config = Config::load_or_default(&args.config)?;
    let reference_path = args
        .reference
        .unwrap_or_else(|| PathBuf::from(&config.app.reference_path));
    let live_path = args.live.unwrap_or_else(|| PathBuf::from(&config.app.live_path));

    let reference = ReferenceTrack::load(&reference_path)
        .with_context(|| format!("invalid reference track {}", reference_path.display()))?;
    info!(
        "reference: {:.1}s at {} fps",
        reference.duration_secs(config.playback.normal_fps),
        config.playback.normal_fps
    );

    let source = RecordedSource::load(&live_path)?
        .looping(config.app.loop_live)
        .mirror_x(config.app.mirror_x)
        .paced(config.app.capture_fps);

    let session = Session::new(
        Arc::new(reference),
        config.scoring.clone(),
        config.playback.clone(),
    );
    if let Some(rate) = args.start {
        session.start(rate);
    }

    let producer = Producer::spawn(session.clone(), source);

    print_help();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        match input.trim() {
            "" => continue,
            "s" => session.start(PlaybackRate::Normal),
            "w" => session.start(PlaybackRate::Slow),
            "x" => {
                session.stop();
                save_report(&session, &config);
            }
            "r" => session.reset(),
            "f" => {
                let snap = session.snapshot();
                println!(
                    "[{}] {} (frame {}/{}, {:.1}s)",
                    if snap.active { snap.rate.to_string() } else { "idle".to_string() },
                    snap.feedback,
                    snap.reference_index,
                    snap.track_len,
                    snap.elapsed_secs
                );
                if producer.is_finished() {
                    println!("(live recording finished)");
                }
            }
            "q" => break,
            "h" | "?" => print_help(),
            other => println!("不明なコマンド: {}", other),
        }
    }

    if session.is_active() {
        session.stop();
        save_report(&session, &config);
    }
    producer.shutdown()?;
    Ok(())
}
