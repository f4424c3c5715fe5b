//! Gravitris: same-colour falling-block puzzle with a gravity-flipping player, in the terminal.

mod app;
mod audio;
mod consolidate;
mod falling;
mod grid;
mod highscores;
mod input;
mod physics;
mod predictor;
mod session;
mod shapes;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use audio::{AudioSink, LogAudio, Silent, TerminalBell};
use clap::{Parser, ValueEnum};
use highscores::HighScores;
use session::{GameSession, SessionConfig};
use std::path::PathBuf;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let theme = match theme::Theme::load(args.theme.as_deref(), args.palette) {
        Ok(theme) => theme,
        Err(err) => {
            log::warn!("theme not loaded, using defaults: {}", err);
            let mut theme = theme::Theme::default();
            theme.apply_palette(args.palette);
            theme
        }
    };

    let scores_path = args
        .scores_file
        .clone()
        .unwrap_or_else(highscores::default_path);
    let high_scores = HighScores::load(&scores_path);

    let seed = args.seed.unwrap_or_else(rand::random);
    let config = SessionConfig::for_grid(args.width, args.height);
    let session = GameSession::new(config, high_scores, seed).context("invalid game settings")?;

    let audio: Box<dyn AudioSink> = match args.audio {
        AudioMode::None => Box::new(Silent),
        AudioMode::Bell => Box::new(TerminalBell),
        AudioMode::Log => Box::new(LogAudio::default()),
    };

    let mut app = App::new(args, theme, session, audio);
    app.run()?;
    Ok(())
}

/// Logs go to `--log-file` when given; otherwise to stderr, and only if RUST_LOG is set,
/// since stderr shares the terminal with the game.
fn init_logging(log_file: Option<&std::path::Path>) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        env_logger::Builder::from_env(env)
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        env_logger::Builder::from_env(env).init();
    }
    Ok(())
}

/// Gravitational Tetris in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "gravitris",
    version,
    about = "Same-colour falling-block puzzle with a gravity-flipping player, in the terminal.",
    long_about = "Gravitris is a terminal puzzle game. A falling shape follows your player \
        horizontally; when it lands it joins the stack, and any same-coloured group it touches \
        is removed together with it. Unsupported blocks then fall. Landing a shape flips your \
        gravity. The game restarts when the stack reaches the top or you leave the playfield.\n\n\
        CONTROLS (normal):\n  Left/Right, A/D  Walk     Q / E, Up   Rotate left / right\n  \
        Space/Enter/Down Place    F          Flip gravity\n  P                Pause    Esc        Quit\n\n\
        CONTROLS (vim):\n  h/l  Walk   u / k  Rotate   j  Place   g  Flip gravity\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Playfield width in columns (grid cells).
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub width: usize,

    /// Playfield height in rows (grid cells).
    #[arg(long, default_value = "20", value_name = "ROWS")]
    pub height: usize,

    /// High score file. Defaults to $XDG_CONFIG_HOME/gravitris/highscores.
    #[arg(long, value_name = "FILE")]
    pub scores_file: Option<PathBuf>,

    /// Seed for the shape sequence. Random if not set.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Target frames per second (simulation runs once per frame).
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Write logs to this file (level from RUST_LOG, default info).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Disable the tile-clear flash.
    #[arg(long)]
    pub no_animation: bool,

    /// Sound cues: none, bell (terminal bell on clears and restarts), or log.
    #[arg(long, default_value = "none")]
    pub audio: AudioMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AudioMode {
    #[default]
    None,
    Bell,
    Log,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["gravitris"]);
        assert_eq!(args.width, 10);
        assert_eq!(args.height, 20);
        assert_eq!(args.palette, Palette::Normal);
        assert_eq!(args.audio, AudioMode::None);
        assert!(args.seed.is_none());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "gravitris",
            "--width",
            "8",
            "--palette",
            "colourblind",
            "--seed",
            "42",
            "--audio",
            "log",
        ]);
        assert_eq!(args.width, 8);
        assert_eq!(args.palette, Palette::Colorblind);
        assert_eq!(args.seed, Some(42));
        assert_eq!(args.audio, AudioMode::Log);
    }
}
