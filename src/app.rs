//! App: terminal init, main loop, tick and key handling.

use crate::game::{GameOverReason, GameState, Rules};
use crate::highscores::{self, BestRun};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::Args;
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Simulation steps per second. Item speeds are per-second, so this only
/// sets granularity, not game speed.
const TICK_HZ: f64 = 30.0;
/// Target render frame time for event polling.
const FRAME_MS: u64 = 16;
/// Terminals without key-release reporting refresh holds via OS repeats;
/// a hold with no repeat for this long is treated as released.
const HOLD_EXPIRY_MS: u64 = 250;
/// How long the achievement banner stays up.
const BANNER_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    GameOver,
}

pub struct App {
    args: Args,
    rules: Rules,
    theme: Theme,
    /// Playfield size clamped to terminal so board + sidebar fit on screen.
    playfield_width: u16,
    playfield_height: u16,
    state: GameState,
    screen: Screen,
    paused: bool,
    game_over_reason: Option<GameOverReason>,
    last_tick: Instant,
    last_second: Instant,
    tick_interval: Duration,
    /// Last press/repeat per held direction, for the no-release fallback.
    left_seen: Option<Instant>,
    right_seen: Option<Instant>,
    /// Set once the terminal proves it reports key releases.
    release_events: bool,
    /// Achievement banner text and when it went up.
    banner: Option<(String, Instant)>,
    /// TachyonFX fade for the game-over overlay (created by the renderer).
    gameover_fx: Option<Effect>,
    gameover_fx_time: Option<Instant>,
    best: BestRun,
}

impl App {
    pub fn new(args: Args, rules: Rules, theme: Theme) -> Result<Self> {
        let seed = args.seed.unwrap_or_else(rand::random::<u64>);
        let state = GameState::new(theme.clone(), args.width, args.height, rules.clone(), seed)?;
        let screen = if args.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        let now = Instant::now();
        Ok(Self {
            playfield_width: args.width,
            playfield_height: args.height,
            args,
            rules,
            theme,
            state,
            screen,
            paused: false,
            game_over_reason: None,
            last_tick: now,
            last_second: now,
            tick_interval: Duration::from_secs_f64(1.0 / TICK_HZ),
            left_seen: None,
            right_seen: None,
            release_events: false,
            banner: None,
            gameover_fx: None,
            gameover_fx_time: None,
            best: highscores::load(),
        })
    }

    fn reset_game(&mut self) -> Result<()> {
        let seed = self.args.seed.unwrap_or_else(rand::random::<u64>);
        self.state = GameState::new(
            self.theme.clone(),
            self.playfield_width,
            self.playfield_height,
            self.rules.clone(),
            seed,
        )?;
        self.screen = Screen::Playing;
        self.paused = false;
        self.game_over_reason = None;
        let now = Instant::now();
        self.last_tick = now;
        self.last_second = now;
        self.left_seen = None;
        self.right_seen = None;
        self.banner = None;
        self.gameover_fx = None;
        self.gameover_fx_time = None;
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
                size,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Best-effort: release events make held movement precise.
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        // Shrink the playfield if the terminal cannot fit board + sidebar.
        let (term_cols, term_rows) = size()?;
        let (fit_w, fit_h) = crate::ui::max_playfield_for_terminal(term_cols, term_rows);
        self.playfield_width = self.args.width.min(fit_w).max(1);
        self.playfield_height = self.args.height.min(fit_h).max(1);
        if self.rules.collector_width > f32::from(self.playfield_width) {
            self.rules.collector_width = f32::from(self.playfield_width.saturating_sub(2)).max(1.0);
        }
        if self.playfield_width != self.args.width || self.playfield_height != self.args.height {
            self.state = GameState::new(
                self.theme.clone(),
                self.playfield_width,
                self.playfield_height,
                self.rules.clone(),
                self.state.seed,
            )
            .context("terminal too small for the playfield")?;
        }

        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();

            if self
                .banner
                .as_ref()
                .is_some_and(|(_, since)| now.duration_since(*since) >= Duration::from_millis(BANNER_MS))
            {
                self.banner = None;
            }

            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.state,
                    self.paused,
                    self.game_over_reason,
                    self.best,
                    self.banner.as_ref().map(|(text, _)| text.as_str()),
                    &mut self.gameover_fx,
                    &mut self.gameover_fx_time,
                    now,
                );
            })?;

            let timeout = Duration::from_millis(FRAME_MS).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        let action = key_to_action(key);

                        if matches!(action, Action::MoveLeft | Action::MoveRight) {
                            self.handle_movement_key(action, key.kind);
                            continue;
                        }
                        if key.kind != KeyEventKind::Press {
                            if key.kind == KeyEventKind::Release {
                                self.release_events = true;
                            }
                            continue;
                        }

                        match self.screen {
                            Screen::Menu => match action {
                                Action::Quit => return Ok(()),
                                Action::Confirm => self.reset_game()?,
                                _ => {}
                            },
                            Screen::Playing => {
                                if self.paused {
                                    match action {
                                        Action::Pause | Action::Confirm => self.unpause(),
                                        Action::Quit | Action::Menu => self.to_menu(),
                                        _ => {}
                                    }
                                } else {
                                    match action {
                                        Action::Pause => self.pause(),
                                        Action::Quit | Action::Menu => self.to_menu(),
                                        Action::Restart => self.reset_game()?,
                                        _ => {}
                                    }
                                }
                            }
                            Screen::GameOver => match action {
                                Action::Confirm | Action::Restart => self.reset_game()?,
                                Action::Menu => self.to_menu(),
                                Action::Quit => return Ok(()),
                                _ => {}
                            },
                        }
                    }
                }
            }

            if self.screen == Screen::Playing && !self.paused {
                self.sync_held(Instant::now());
                if self.last_tick.elapsed() >= self.tick_interval {
                    self.last_tick = Instant::now();
                    self.state.tick(self.tick_interval);
                }
                // Countdown runs off the wall clock, independent of the tick.
                while self.last_second.elapsed() >= Duration::from_secs(1) {
                    self.last_second += Duration::from_secs(1);
                    self.state.second_elapsed();
                }
                self.drain_events();
            }
        }
    }

    fn handle_movement_key(&mut self, action: Action, kind: KeyEventKind) {
        if self.screen != Screen::Playing || self.paused {
            return;
        }
        let now = Instant::now();
        match kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                if action == Action::MoveLeft {
                    self.state.held.left = true;
                    self.left_seen = Some(now);
                } else {
                    self.state.held.right = true;
                    self.right_seen = Some(now);
                }
            }
            KeyEventKind::Release => {
                self.release_events = true;
                if action == Action::MoveLeft {
                    self.state.held.left = false;
                    self.left_seen = None;
                } else {
                    self.state.held.right = false;
                    self.right_seen = None;
                }
            }
        }
    }

    /// Without release reporting, a hold is only as fresh as its last OS
    /// repeat; expire stale ones so the collector stops on key-up.
    fn sync_held(&mut self, now: Instant) {
        if self.release_events {
            return;
        }
        let expiry = Duration::from_millis(HOLD_EXPIRY_MS);
        if self
            .left_seen
            .is_some_and(|t| now.duration_since(t) >= expiry)
        {
            self.state.held.left = false;
            self.left_seen = None;
        }
        if self
            .right_seen
            .is_some_and(|t| now.duration_since(t) >= expiry)
        {
            self.state.held.right = false;
            self.right_seen = None;
        }
    }

    fn pause(&mut self) {
        self.paused = true;
        self.state.held = Default::default();
        self.left_seen = None;
        self.right_seen = None;
    }

    fn unpause(&mut self) {
        self.paused = false;
        // Both clocks restart from now so pause time never counts.
        let now = Instant::now();
        self.last_tick = now;
        self.last_second = now;
    }

    fn to_menu(&mut self) {
        self.screen = Screen::Menu;
        self.paused = false;
        self.state.held = Default::default();
        self.left_seen = None;
        self.right_seen = None;
    }

    fn drain_events(&mut self) {
        for ev in self.state.drain_events() {
            match ev {
                crate::game::GameEvent::AchievementUnlocked(a) => {
                    self.banner = Some((a.text().to_string(), Instant::now()));
                }
                crate::game::GameEvent::GameOver { reason, stats } => {
                    self.screen = Screen::GameOver;
                    self.game_over_reason = Some(reason);
                    self.gameover_fx = None;
                    self.gameover_fx_time = None;
                    if self.best.absorb(stats.score, stats.level, stats.max_combo) {
                        // Best-effort; an unwritable config dir never kills a run.
                        let _ = highscores::save(self.best);
                    }
                }
                _ => {}
            }
        }
    }
}
