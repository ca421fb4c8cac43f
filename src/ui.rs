//! Layout and drawing: menu, playfield, sidebar, catch row, overlays.

use crate::app::Screen;
use crate::game::{BUFFER_CAP, FruitKind, GameOverReason, GameState, MAX_LIVES};
use crate::highscores::BestRun;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

const SIDEBAR_WIDTH: u16 = 24;
/// Game-over overlay fade-in duration.
const GAMEOVER_FADE_MS: u32 = 450;
/// Effect markers dim out over their last 500 ms, like the original fade.
const EFFECT_DIM_MS: f32 = 500.0;

/// Max playfield size (columns, rows) that fits a terminal of the given
/// size, leaving room for the board border and the sidebar.
pub fn max_playfield_for_terminal(term_cols: u16, term_rows: u16) -> (u16, u16) {
    let w = term_cols.saturating_sub(2 + SIDEBAR_WIDTH);
    let h = term_rows.saturating_sub(2);
    (w, h)
}

/// Draw the current screen. The game stays visible (frozen) behind the
/// pause and game-over overlays.
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    state: &GameState,
    paused: bool,
    reason: Option<GameOverReason>,
    best: BestRun,
    banner: Option<&str>,
    gameover_fx: &mut Option<Effect>,
    gameover_fx_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    match screen {
        Screen::Menu => draw_menu(frame, state, best, area),
        Screen::Playing => {
            draw_game(frame, state, best, area);
            if let Some(text) = banner {
                draw_banner(frame, state, text, area);
            }
            if paused {
                draw_pause_overlay(frame, state, area);
            }
        }
        Screen::GameOver => {
            draw_game(frame, state, best, area);
            draw_game_over(frame, state, reason, best, area, gameover_fx, gameover_fx_time, now);
        }
    }
}

/// Board + sidebar rects, centered in the frame.
fn game_rects(area: Rect, state: &GameState) -> (Rect, Rect) {
    let pw = state.width as u16 + 2;
    let ph = state.height as u16 + 2;
    let total_w = pw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    let board = Rect {
        x,
        y,
        width: pw.min(area.width),
        height: ph.min(area.height),
    };
    let sidebar = Rect {
        x: (x + pw).min(area.x + area.width),
        y,
        width: SIDEBAR_WIDTH.min(area.width.saturating_sub(pw)),
        height: ph.min(area.height),
    };
    (board, sidebar)
}

fn draw_game(frame: &mut Frame, state: &GameState, best: BestRun, area: Rect) {
    let (board, sidebar) = game_rects(area, state);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" fruitfall ")
        .title_style(Style::default().fg(state.theme.title))
        .border_style(Style::default().fg(state.theme.div_line));
    let inner = block.inner(board);
    block.render(board, frame.buffer_mut());

    draw_playfield(frame, state, inner);
    draw_sidebar(frame, state, best, sidebar);
}

fn draw_playfield(frame: &mut Frame, state: &GameState, inner: Rect) {
    let buf = frame.buffer_mut();
    for y in inner.y..inner.y + inner.height {
        for x in inner.x..inner.x + inner.width {
            buf[(x, y)]
                .set_char(' ')
                .set_style(Style::default().bg(state.theme.bg));
        }
    }

    // Collector: a solid bar across its span on the catch row.
    let cy = state.collector.y.floor() as i32;
    if (0..i32::from(inner.height)).contains(&cy) {
        let x0 = state.collector.x.floor().max(0.0) as i32;
        let x1 = ((state.collector.x + state.collector.width).ceil() as i32)
            .min(i32::from(inner.width));
        for x in x0..x1 {
            buf[(inner.x + x as u16, inner.y + cy as u16)]
                .set_char('█')
                .set_style(
                    Style::default()
                        .fg(state.theme.collector)
                        .bg(state.theme.bg),
                );
        }
    }

    for item in &state.items {
        let ix = item.x.round() as i32;
        let iy = item.y.round() as i32;
        if (0..i32::from(inner.width)).contains(&ix) && (0..i32::from(inner.height)).contains(&iy)
        {
            // Rotation drives a little twinkle on the specials.
            let glyph = if item.kind.is_special() && item.rotation.sin() > 0.0 {
                '✦'
            } else {
                item.kind.glyph()
            };
            let mut style = Style::default()
                .fg(state.fruit_color(item.kind))
                .bg(state.theme.bg);
            if item.kind.is_special() {
                style = style.add_modifier(Modifier::BOLD);
            }
            buf[(inner.x + ix as u16, inner.y + iy as u16)]
                .set_char(glyph)
                .set_style(style);
        }
    }

    for effect in &state.effects {
        let len = effect.text.chars().count() as i32;
        let ex = effect.x.round() as i32 - len / 2;
        let ey = effect.y.round() as i32;
        if !(0..i32::from(inner.height)).contains(&ey) {
            continue;
        }
        let ex = ex.clamp(0, i32::from(inner.width).saturating_sub(1));
        let mut style = Style::default().fg(effect.color).bg(state.theme.bg);
        if effect.lifetime_ms < EFFECT_DIM_MS {
            style = style.add_modifier(Modifier::DIM);
        } else {
            style = style.add_modifier(Modifier::BOLD);
        }
        let max_width = (i32::from(inner.width) - ex).max(0) as usize;
        buf.set_stringn(
            inner.x + ex as u16,
            inner.y + ey as u16,
            &effect.text,
            max_width,
            style,
        );
    }
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, best: BestRun, sidebar: Rect) {
    if sidebar.width < 4 {
        return;
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(0),
        ])
        .split(sidebar);

    // Score / level / lives.
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .title(" stats ")
        .border_style(Style::default().fg(state.theme.div_line));
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());

    let fg = Style::default().fg(state.theme.main_fg);
    let title = Style::default().fg(state.theme.title);
    let mut hearts: Vec<Span> = vec![Span::styled("Lives  ", fg)];
    for i in 0..MAX_LIVES {
        let style = if i < state.lives {
            Style::default().fg(state.theme.heart)
        } else {
            Style::default().fg(state.theme.div_line)
        };
        hearts.push(Span::styled("♥ ", style));
    }
    let lines = vec![
        Line::from(vec![
            Span::styled("Score  ", fg),
            Span::styled(state.score.to_string(), title),
        ]),
        Line::from(vec![
            Span::styled("Best   ", fg),
            Span::styled(best.score.to_string(), fg),
        ]),
        Line::from(vec![
            Span::styled("Level  ", fg),
            Span::styled(state.level.to_string(), title),
        ]),
        Line::from(hearts),
        Line::from(vec![
            Span::styled("Combo  ", fg),
            if state.combo > 0 {
                Span::styled(
                    format!("x{}  (max {})", state.combo, state.max_combo),
                    Style::default()
                        .fg(state.theme.title)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                Span::styled(format!("-  (max {})", state.max_combo), fg)
            },
        ]),
    ];
    Paragraph::new(lines).render(stats_inner, frame.buffer_mut());

    // Countdown gauge.
    let time_block = Block::default()
        .borders(Borders::ALL)
        .title(" time ")
        .border_style(Style::default().fg(state.theme.div_line));
    let time_inner = time_block.inner(chunks[1]);
    time_block.render(chunks[1], frame.buffer_mut());
    let ratio =
        f64::from(state.time_left) / f64::from(state.rules.time_limit_secs.max(1));
    let bar_color = if ratio > 0.5 {
        Color::Green
    } else if ratio > 0.2 {
        Color::Yellow
    } else {
        Color::Red
    };
    Gauge::default()
        .ratio(ratio.clamp(0.0, 1.0))
        .label(format!("{}s", state.time_left))
        .gauge_style(Style::default().fg(bar_color).bg(state.theme.bg))
        .render(time_inner, frame.buffer_mut());

    // The last seven catches, oldest first.
    let catch_block = Block::default()
        .borders(Borders::ALL)
        .title(" catches ")
        .border_style(Style::default().fg(state.theme.div_line));
    let catch_inner = catch_block.inner(chunks[2]);
    catch_block.render(chunks[2], frame.buffer_mut());
    let mut slots: Vec<Span> = Vec::with_capacity(BUFFER_CAP);
    let caught: Vec<FruitKind> = state.buffer.iter().collect();
    for i in 0..BUFFER_CAP {
        match caught.get(i) {
            Some(&kind) => slots.push(Span::styled(
                format!("{} ", kind.glyph()),
                Style::default().fg(state.fruit_color(kind)),
            )),
            None => slots.push(Span::styled(
                "· ".to_string(),
                Style::default().fg(state.theme.div_line),
            )),
        }
    }
    Paragraph::new(Line::from(slots))
        .alignment(Alignment::Center)
        .render(catch_inner, frame.buffer_mut());

    if chunks[3].height >= 2 {
        Paragraph::new(vec![
            Line::from(Span::styled("←/→ move   p pause", fg)),
            Line::from(Span::styled("r restart  q quit", fg)),
        ])
        .alignment(Alignment::Center)
        .render(chunks[3], frame.buffer_mut());
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_banner(frame: &mut Frame, state: &GameState, text: &str, area: Rect) {
    let (board, _) = game_rects(area, state);
    let label = format!(" ★ {text} ★ ");
    let x = board.x + board.width.saturating_sub(label.chars().count() as u16) / 2;
    let style = Style::default()
        .fg(Color::Black)
        .bg(state.theme.title)
        .add_modifier(Modifier::BOLD);
    frame.buffer_mut().set_string(x, board.y, label, style);
}

fn draw_pause_overlay(frame: &mut Frame, state: &GameState, area: Rect) {
    let popup = centered_rect(area, 30, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(Span::styled(
            " P — resume    Q — menu ",
            Style::default().fg(state.theme.main_fg),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default().borders(Borders::ALL).border_style(
                Style::default().fg(state.theme.div_line).bg(state.theme.bg),
            ),
        )
        .render(popup, frame.buffer_mut());
}

fn draw_game_over(
    frame: &mut Frame,
    state: &GameState,
    reason: Option<GameOverReason>,
    best: BestRun,
    area: Rect,
    gameover_fx: &mut Option<Effect>,
    gameover_fx_time: &mut Option<Instant>,
    now: Instant,
) {
    let popup = centered_rect(area, 38, 12);
    let reason_text = match reason {
        Some(GameOverReason::OutOfLives) => "Out of lives!",
        Some(GameOverReason::TimeUp) => "Time's up!",
        None => "",
    };
    let stats = state.final_stats();
    let fg = Style::default().fg(state.theme.main_fg);
    let title = Style::default()
        .fg(state.theme.title)
        .add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(" Game over ", Style::default().fg(Color::Black).bg(Color::Red))),
        Line::from(Span::styled(reason_text, fg)),
        Line::from(""),
        Line::from(vec![
            Span::styled("Score ", fg),
            Span::styled(stats.score.to_string(), title),
            Span::styled("   Level ", fg),
            Span::styled(stats.level.to_string(), title),
            Span::styled("   Combo ", fg),
            Span::styled(stats.max_combo.to_string(), title),
        ]),
        Line::from(Span::styled(
            format!(
                "Survived {}s · best score {}",
                state.elapsed.as_secs(),
                best.score
            ),
            fg,
        )),
        Line::from(""),
        Line::from(Span::styled(
            " R — restart   M — menu   Q — quit ",
            fg,
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default().borders(Borders::ALL).border_style(
                Style::default().fg(state.theme.div_line).bg(state.theme.bg),
            ),
        )
        .render(popup, frame.buffer_mut());

    // Fade the overlay in from the board background.
    let delta = gameover_fx_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let tfx_delta = TfxDuration::from_millis(delta.as_millis().min(u128::from(u32::MAX)) as u32);
    *gameover_fx_time = Some(now);
    if gameover_fx.is_none() {
        let bg = state.theme.bg;
        *gameover_fx = Some(
            fx::fade_from(bg, bg, (GAMEOVER_FADE_MS, Interpolation::Linear)).with_area(popup),
        );
    }
    if let Some(effect) = gameover_fx {
        frame.render_effect(effect, popup, tfx_delta);
    }
}

fn draw_menu(frame: &mut Frame, state: &GameState, best: BestRun, area: Rect) {
    let popup = centered_rect(area, 48, 15);
    let fg = Style::default().fg(state.theme.main_fg);
    let title = Style::default()
        .fg(state.theme.title)
        .add_modifier(Modifier::BOLD);
    let mut fruit_row: Vec<Span> = Vec::new();
    for kind in FruitKind::NORMAL {
        fruit_row.push(Span::styled(
            format!("{} ", kind.glyph()),
            Style::default().fg(state.fruit_color(kind)),
        ));
    }
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("F R U I T F A L L", title)),
        Line::from(fruit_row),
        Line::from(""),
        Line::from(Span::styled(
            "Catch fruit, match three of a kind.",
            fg,
        )),
        Line::from(Span::styled(
            format!("{} seconds on the clock, three lives.", state.rules.time_limit_secs),
            fg,
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Best: ", fg),
            Span::styled(best.score.to_string(), title),
            Span::styled(
                format!("  (level {}, combo {})", best.level, best.max_combo),
                fg,
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled("←/→ or a/d — move    p — pause", fg)),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Enter — start ", Style::default().fg(Color::Black).bg(state.theme.title)),
            Span::styled("   Q — quit", fg),
        ]),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(state.theme.div_line)),
        )
        .render(popup, frame.buffer_mut());
}
