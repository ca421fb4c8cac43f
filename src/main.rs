//! Fruitfall — falling-fruit catch-and-match arcade game in the terminal.

mod app;
mod game;
mod highscores;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use game::Rules;

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let rules = Rules {
        spawn_interval_ms: args.spawn_interval_ms,
        special_chance: args.special_chance,
        base_speed: args.base_speed,
        speed_per_level: args.speed_per_level,
        max_active: args.max_items,
        level_up_score: args.level_up_score,
        time_limit_secs: args.time_limit,
        collector_width: args.collector_width,
        collector_speed: args.collector_speed,
    };
    // Fail fast on malformed tunables before touching the terminal.
    rules
        .validate(args.width, args.height)
        .context("invalid configuration")?;
    let mut app = App::new(args, rules, theme)?;
    app.run()?;
    Ok(())
}

/// Falling-fruit catch-and-match arcade game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "fruitfall",
    version,
    about = "Catch falling fruit in the basket; match three of a kind to score.",
    long_about = "Fruitfall is a terminal arcade game.\n\n\
        Fruit falls from the top of the playfield; move the basket to catch it. The last \
        seven catches sit in the collection row, and three identical fruit in a row score \
        and chain combos. Bombs wipe the collection row; a rainbow pairs off the fruit \
        caught just before it. Miss a fruit and you lose a life; survive the clock with \
        lives to spare.\n\n\
        CONTROLS:\n  Left/Right or a/d or h/l   Move basket (hold to keep moving)\n  \
        P / Esc    Pause       Enter / Space   Start / confirm\n  \
        R          Restart     M               Menu        Q   Quit"
)]
pub struct Args {
    /// Path to theme file (btop-style theme[key]="value"). Built-in palette if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Playfield width in columns.
    #[arg(long, default_value = "40", value_name = "COLS")]
    pub width: u16,

    /// Playfield height in rows.
    #[arg(long, default_value = "20", value_name = "ROWS")]
    pub height: u16,

    /// Session length in seconds.
    #[arg(long, default_value = "60", value_name = "SECS")]
    pub time_limit: u32,

    /// Milliseconds between fruit spawns.
    #[arg(long, default_value = "1000", value_name = "MS")]
    pub spawn_interval_ms: u64,

    /// Chance (0..=1) that a spawn is a bomb or rainbow.
    #[arg(long, default_value = "0.05", value_name = "P")]
    pub special_chance: f64,

    /// Fall speed at level 1, rows per second.
    #[arg(long, default_value = "6.0", value_name = "ROWS/S")]
    pub base_speed: f32,

    /// Fall speed added per level past the first.
    #[arg(long, default_value = "0.9", value_name = "ROWS/S")]
    pub speed_per_level: f32,

    /// Cap on simultaneously falling fruit; spawns are skipped at the cap.
    #[arg(long, default_value = "20", value_name = "N")]
    pub max_items: usize,

    /// Level-up when score reaches level * this threshold.
    #[arg(long, default_value = "200", value_name = "SCORE")]
    pub level_up_score: u32,

    /// Basket width in columns.
    #[arg(long, default_value = "9.0", value_name = "COLS")]
    pub collector_width: f32,

    /// Basket speed in columns per second while held.
    #[arg(long, default_value = "24.0", value_name = "COLS/S")]
    pub collector_speed: f32,

    /// RNG seed for a reproducible run (fresh entropy if not set).
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Skip the menu and start playing immediately.
    #[arg(long)]
    pub no_menu: bool,
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
