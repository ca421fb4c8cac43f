//! Core simulation: spawning, falling motion, capture, the collection-buffer
//! matcher, and score/combo/lives/level progression.

use crate::theme::Theme;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use ratatui::style::Color;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use thiserror::Error;

/// Collection buffer capacity; the oldest capture is evicted beyond this.
pub const BUFFER_CAP: usize = 7;
/// Starting lives; also the restore cap on level-up.
pub const MAX_LIVES: u32 = 3;

/// Falling item radius in playfield cells (both axes).
const ITEM_RADIUS: f32 = 0.5;
/// Bonus multiplied by the running combo on every match.
const COMBO_BONUS: u32 = 5;
/// Bonus multiplied by the current level on every match.
const LEVEL_BONUS: u32 = 3;
/// Flat score when a rainbow pairs off its predecessor.
const RAINBOW_BONUS: u32 = 100;
/// Collector band: rows above the playfield floor.
const COLLECTOR_RISE: f32 = 2.0;

/// Fruit kinds, including the two specials. Specials never take part in
/// triple matching; they act on the whole buffer at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FruitKind {
    Apple,
    Banana,
    Watermelon,
    Grape,
    Orange,
    Strawberry,
    Bomb,
    Rainbow,
}

impl FruitKind {
    pub const NORMAL: [Self; 6] = [
        Self::Apple,
        Self::Banana,
        Self::Watermelon,
        Self::Grape,
        Self::Orange,
        Self::Strawberry,
    ];
    pub const SPECIAL: [Self; 2] = [Self::Bomb, Self::Rainbow];

    #[inline]
    pub fn is_special(self) -> bool {
        matches!(self, Self::Bomb | Self::Rainbow)
    }

    /// Base score for a matched triple of this kind. Specials score through
    /// their side effects, never through the table.
    pub fn base_points(self) -> u32 {
        match self {
            Self::Apple => 10,
            Self::Banana => 15,
            Self::Watermelon => 20,
            Self::Grape => 25,
            Self::Orange => 30,
            Self::Strawberry => 35,
            Self::Bomb | Self::Rainbow => 0,
        }
    }

    /// Colour index 0..6 for theme.fruit_color(). Specials carry fixed
    /// accents chosen in the renderer instead.
    pub fn color_index(self) -> u8 {
        match self {
            Self::Apple => 0,
            Self::Banana => 1,
            Self::Watermelon => 2,
            Self::Grape => 3,
            Self::Orange => 4,
            Self::Strawberry => 5,
            Self::Bomb | Self::Rainbow => 0,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Self::Bomb => '✸',
            Self::Rainbow => '◈',
            _ => '●',
        }
    }
}

/// One falling item. Positions are playfield cell units; y grows downward
/// and the item leaves play past `GameState::height`.
#[derive(Debug, Clone)]
pub struct FallingItem {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub kind: FruitKind,
    pub vertical_speed: f32,
    pub rotation: f32,
    pub rotation_speed: f32,
}

/// Player-controlled catch zone, clamped to the playfield.
#[derive(Debug, Clone)]
pub struct Collector {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub speed: f32,
}

/// Recency-ordered record of captured kinds awaiting match evaluation.
/// Bounded to [`BUFFER_CAP`]; pushing beyond that evicts the oldest entry.
#[derive(Debug, Clone, Default)]
pub struct CollectionBuffer {
    entries: VecDeque<FruitKind>,
}

impl CollectionBuffer {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(BUFFER_CAP + 1),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = FruitKind> + '_ {
        self.entries.iter().copied()
    }

    pub fn push(&mut self, kind: FruitKind) {
        self.entries.push_back(kind);
        if self.entries.len() > BUFFER_CAP {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The three most recent captures, oldest of the three first.
    pub fn trailing_three(&self) -> Option<[FruitKind; 3]> {
        let n = self.entries.len();
        if n < 3 {
            return None;
        }
        Some([self.entries[n - 3], self.entries[n - 2], self.entries[n - 1]])
    }

    pub fn remove_trailing_three(&mut self) {
        for _ in 0..3 {
            self.entries.pop_back();
        }
    }

    /// The entry just before the most recent one.
    pub fn second_from_last(&self) -> Option<FruitKind> {
        let n = self.entries.len();
        if n < 2 {
            return None;
        }
        Some(self.entries[n - 2])
    }

    pub fn remove_trailing_two(&mut self) {
        for _ in 0..2 {
            self.entries.pop_back();
        }
    }
}

/// Session achievements; each unlocks at most once, session-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Achievement {
    Combo5,
    Score1000,
    Level5,
}

impl Achievement {
    pub fn text(self) -> &'static str {
        match self {
            Self::Combo5 => "5-hit combo!",
            Self::Score1000 => "Score over 1000!",
            Self::Level5 => "Reached level 5!",
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    OutOfLives,
    TimeUp,
}

/// Read-only stats frozen at game over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalStats {
    pub score: u32,
    pub level: u32,
    pub max_combo: u32,
}

/// Discrete notifications for the presentation layer. The core pushes these
/// into a queue the driver drains each frame; it never touches UI or audio.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Captured(FruitKind),
    Matched {
        kind: FruitKind,
        points: u32,
        combo: u32,
    },
    ComboBroken,
    LifeLost {
        remaining: u32,
    },
    BombCleared,
    RainbowMatched,
    LevelUp {
        level: u32,
    },
    AchievementUnlocked(Achievement),
    GameOver {
        reason: GameOverReason,
        stats: FinalStats,
    },
}

/// Transient floating feedback text. Observational only; never feeds back
/// into the simulation.
#[derive(Debug, Clone)]
pub struct EffectMarker {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub color: Color,
    pub lifetime_ms: f32,
}

/// Held movement input, integrated into collector displacement each tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeldKeys {
    pub left: bool,
    pub right: bool,
}

/// Invalid tunables, detected once at session start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("spawn interval must be at least 1 ms")]
    ZeroSpawnInterval,
    #[error("special chance {0} is outside 0..=1")]
    SpecialChanceOutOfRange(f64),
    #[error("base fall speed must be positive, got {0}")]
    NonPositiveSpeed(f32),
    #[error("collector width {collector} does not fit playfield width {playfield}")]
    CollectorTooWide { collector: f32, playfield: f32 },
    #[error("time limit must be at least 1 second")]
    ZeroTimeLimit,
    #[error("playfield {width}x{height} is too small to play on")]
    PlayfieldTooSmall { width: u16, height: u16 },
}

/// Gameplay tunables.
#[derive(Debug, Clone)]
pub struct Rules {
    /// Milliseconds between spawn attempts.
    pub spawn_interval_ms: u64,
    /// Chance that a spawn is a special kind.
    pub special_chance: f64,
    /// Fall speed at level 1, rows/sec.
    pub base_speed: f32,
    /// Fall speed added per level past the first.
    pub speed_per_level: f32,
    /// Hard cap on simultaneously active items; spawns are dropped at cap.
    pub max_active: usize,
    /// Level-up when score reaches `level * level_up_score`.
    pub level_up_score: u32,
    /// Session countdown, seconds.
    pub time_limit_secs: u32,
    /// Collector width in cells.
    pub collector_width: f32,
    /// Collector speed, cells/sec while held.
    pub collector_speed: f32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            spawn_interval_ms: 1000,
            special_chance: 0.05,
            base_speed: 6.0,
            speed_per_level: 0.9,
            max_active: 20,
            level_up_score: 200,
            time_limit_secs: 60,
            collector_width: 9.0,
            collector_speed: 24.0,
        }
    }
}

impl Rules {
    pub fn validate(&self, width: u16, height: u16) -> Result<(), ConfigError> {
        if self.spawn_interval_ms == 0 {
            return Err(ConfigError::ZeroSpawnInterval);
        }
        if !(0.0..=1.0).contains(&self.special_chance) {
            return Err(ConfigError::SpecialChanceOutOfRange(self.special_chance));
        }
        if self.base_speed <= 0.0 {
            return Err(ConfigError::NonPositiveSpeed(self.base_speed));
        }
        if self.time_limit_secs == 0 {
            return Err(ConfigError::ZeroTimeLimit);
        }
        if f32::from(width) < 2.0 * ITEM_RADIUS + 2.0 || f32::from(height) < COLLECTOR_RISE + 2.0 {
            return Err(ConfigError::PlayfieldTooSmall { width, height });
        }
        if self.collector_width > f32::from(width) {
            return Err(ConfigError::CollectorTooWide {
                collector: self.collector_width,
                playfield: f32::from(width),
            });
        }
        Ok(())
    }
}

/// The whole session aggregate. Every mutation flows through `tick`,
/// `second_elapsed`, or the held-input flags; there is exactly one writer.
#[derive(Debug)]
pub struct GameState {
    pub theme: Theme,
    pub rules: Rules,
    /// Playfield size in cells.
    pub width: f32,
    pub height: f32,
    pub collector: Collector,
    pub items: Vec<FallingItem>,
    pub buffer: CollectionBuffer,
    pub score: u32,
    pub level: u32,
    pub lives: u32,
    pub time_left: u32,
    pub combo: u32,
    pub max_combo: u32,
    pub elapsed: Duration,
    pub held: HeldKeys,
    pub effects: Vec<EffectMarker>,
    pub achievements: HashSet<Achievement>,
    pub game_over: Option<GameOverReason>,
    /// Run seed, kept for reproducibility.
    pub seed: u64,
    rng: Pcg32,
    spawn_acc_ms: f64,
    events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(
        theme: Theme,
        width: u16,
        height: u16,
        rules: Rules,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        rules.validate(width, height)?;
        let (w, h) = (f32::from(width), f32::from(height));
        let collector = Collector {
            x: (w - rules.collector_width) / 2.0,
            y: h - COLLECTOR_RISE,
            width: rules.collector_width,
            height: 1.0,
            speed: rules.collector_speed,
        };
        let time_left = rules.time_limit_secs;
        Ok(Self {
            theme,
            rules,
            width: w,
            height: h,
            collector,
            items: Vec::new(),
            buffer: CollectionBuffer::new(),
            score: 0,
            level: 1,
            lives: MAX_LIVES,
            time_left,
            combo: 0,
            max_combo: 0,
            elapsed: Duration::ZERO,
            held: HeldKeys::default(),
            effects: Vec::new(),
            achievements: HashSet::new(),
            game_over: None,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            spawn_acc_ms: 0.0,
            events: Vec::new(),
        })
    }

    /// One simulation step. The driver calls this on a fixed interval; all
    /// speeds are per-second, so behaviour is independent of render rate.
    pub fn tick(&mut self, dt: Duration) {
        if self.game_over.is_some() {
            return;
        }
        self.elapsed += dt;
        self.spawn(dt);
        self.update_items(dt);
        self.tick_effects(dt);
        self.move_collector(dt);
        self.check_matches();
    }

    /// One-second countdown pulse, driven by the wall clock, not the tick.
    pub fn second_elapsed(&mut self) {
        if self.game_over.is_some() {
            return;
        }
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            self.end_game(GameOverReason::TimeUp);
        }
    }

    pub fn final_stats(&self) -> FinalStats {
        FinalStats {
            score: self.score,
            level: self.level,
            max_combo: self.max_combo,
        }
    }

    /// Take all events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Display colour for a kind: theme palette for normal fruit, fixed
    /// accents for the specials.
    pub fn fruit_color(&self, kind: FruitKind) -> Color {
        match kind {
            FruitKind::Bomb => Color::Red,
            FruitKind::Rainbow => Color::Magenta,
            k => self.theme.fruit_color(k.color_index()),
        }
    }

    fn spawn(&mut self, dt: Duration) {
        // At cap the spawn is dropped, not queued; the accumulator stalls.
        if self.items.len() >= self.rules.max_active {
            return;
        }
        self.spawn_acc_ms += dt.as_secs_f64() * 1000.0;
        if self.spawn_acc_ms <= self.rules.spawn_interval_ms as f64 {
            return;
        }
        self.spawn_acc_ms = 0.0;

        let kind = if self.rng.random_bool(self.rules.special_chance) {
            FruitKind::SPECIAL[self.rng.random_range(0..FruitKind::SPECIAL.len())]
        } else {
            FruitKind::NORMAL[self.rng.random_range(0..FruitKind::NORMAL.len())]
        };
        let x = self.rng.random_range(ITEM_RADIUS..self.width - ITEM_RADIUS);
        self.items.push(FallingItem {
            x,
            y: -(2.0 * ITEM_RADIUS),
            radius: ITEM_RADIUS,
            kind,
            vertical_speed: self.rules.base_speed
                + (self.level - 1) as f32 * self.rules.speed_per_level,
            rotation: 0.0,
            rotation_speed: (self.rng.random::<f32>() - 0.5) * 6.0,
        });
    }

    fn update_items(&mut self, dt: Duration) {
        let dt_s = dt.as_secs_f32();
        let mut i = self.items.len();
        while i > 0 {
            i -= 1;
            {
                let item = &mut self.items[i];
                item.y += item.vertical_speed * dt_s;
                item.rotation += item.rotation_speed * dt_s;
            }
            if self.overlaps_collector(&self.items[i]) {
                let item = self.items.remove(i);
                self.collect(&item);
            } else if self.items[i].y - self.items[i].radius > self.height {
                let item = self.items.remove(i);
                self.miss(&item);
            }
        }
    }

    /// Capture test: vertical extent overlaps the collector band and the
    /// radius-inflated horizontal centre overlaps the collector span.
    fn overlaps_collector(&self, item: &FallingItem) -> bool {
        item.y + item.radius > self.collector.y
            && item.y - item.radius < self.collector.y + self.collector.height
            && item.x > self.collector.x - item.radius
            && item.x < self.collector.x + self.collector.width + item.radius
    }

    fn collect(&mut self, item: &FallingItem) {
        self.buffer.push(item.kind);
        self.events.push(GameEvent::Captured(item.kind));
        let color = self.fruit_color(item.kind);
        self.push_effect(item.x, item.y, item.kind.glyph().to_string(), color, 1000.0);
        if item.kind.is_special() {
            self.capture_special(item.kind);
        }
    }

    /// Special side effects run immediately on capture, after the append and
    /// any eviction, not on the tick-based match check.
    fn capture_special(&mut self, kind: FruitKind) {
        match kind {
            FruitKind::Bomb => {
                self.buffer.clear();
                self.events.push(GameEvent::BombCleared);
                self.push_effect(
                    self.width / 2.0,
                    self.height / 2.0,
                    "boom!".to_string(),
                    Color::Red,
                    1500.0,
                );
            }
            FruitKind::Rainbow => {
                // Pairs off the entry just before the rainbow itself for a
                // flat bonus outside the kind table and combo/level bonuses.
                if let Some(prev) = self.buffer.second_from_last() {
                    if !prev.is_special() {
                        self.buffer.remove_trailing_two();
                        self.score += RAINBOW_BONUS;
                        self.events.push(GameEvent::RainbowMatched);
                        self.push_effect(
                            self.width / 2.0,
                            self.height / 2.0,
                            "rainbow!".to_string(),
                            Color::Magenta,
                            1500.0,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    fn miss(&mut self, item: &FallingItem) {
        self.lives = self.lives.saturating_sub(1);
        self.events.push(GameEvent::LifeLost {
            remaining: self.lives,
        });
        self.push_effect(
            item.x,
            self.height - 1.0,
            "miss".to_string(),
            Color::Red,
            1000.0,
        );
        if self.lives == 0 {
            self.end_game(GameOverReason::OutOfLives);
        }
    }

    /// Greedy trailing-3 matcher, once per tick. Never looks deeper than the
    /// three most recent captures and never reorders the buffer.
    fn check_matches(&mut self) {
        let Some(three) = self.buffer.trailing_three() else {
            self.break_combo();
            return;
        };
        // Specials sit out of triple matching entirely; combo is untouched.
        if three.iter().any(|k| k.is_special()) {
            return;
        }
        if three[0] == three[1] && three[1] == three[2] {
            let kind = three[0];
            self.buffer.remove_trailing_three();
            let points = kind.base_points() + self.combo * COMBO_BONUS + self.level * LEVEL_BONUS;
            self.score += points;
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
            self.events.push(GameEvent::Matched {
                kind,
                points,
                combo: self.combo,
            });
            self.push_effect(
                self.width / 2.0,
                self.height / 2.0,
                format!("+{points}"),
                Color::Yellow,
                1500.0,
            );
            self.check_achievements();
            if self.score >= self.level * self.rules.level_up_score {
                self.level_up();
            }
        } else {
            self.break_combo();
        }
    }

    fn break_combo(&mut self) {
        if self.combo > 0 {
            self.combo = 0;
            self.events.push(GameEvent::ComboBroken);
        }
    }

    fn level_up(&mut self) {
        self.level += 1;
        if self.lives < MAX_LIVES {
            self.lives += 1;
        }
        self.events.push(GameEvent::LevelUp { level: self.level });
        self.push_effect(
            self.width / 2.0,
            self.height / 2.0,
            format!("level {}!", self.level),
            Color::Yellow,
            2000.0,
        );
    }

    fn check_achievements(&mut self) {
        if self.combo >= 5 {
            self.unlock(Achievement::Combo5);
        }
        if self.score >= 1000 {
            self.unlock(Achievement::Score1000);
        }
        if self.level >= 5 {
            self.unlock(Achievement::Level5);
        }
    }

    fn unlock(&mut self, achievement: Achievement) {
        if self.achievements.insert(achievement) {
            self.events.push(GameEvent::AchievementUnlocked(achievement));
        }
    }

    fn end_game(&mut self, reason: GameOverReason) {
        if self.game_over.is_some() {
            return;
        }
        self.game_over = Some(reason);
        self.events.push(GameEvent::GameOver {
            reason,
            stats: self.final_stats(),
        });
    }

    fn move_collector(&mut self, dt: Duration) {
        let dx = self.collector.speed * dt.as_secs_f32();
        if self.held.left {
            self.collector.x = (self.collector.x - dx).max(0.0);
        }
        if self.held.right {
            self.collector.x = (self.collector.x + dx).min(self.width - self.collector.width);
        }
    }

    fn tick_effects(&mut self, dt: Duration) {
        let dt_ms = dt.as_secs_f32() * 1000.0;
        self.effects.retain_mut(|e| {
            e.lifetime_ms -= dt_ms;
            e.lifetime_ms > 0.0
        });
    }

    fn push_effect(&mut self, x: f32, y: f32, text: String, color: Color, lifetime_ms: f32) {
        self.effects.push(EffectMarker {
            x,
            y,
            text,
            color,
            lifetime_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u16 = 40;
    const H: u16 = 20;

    fn state() -> GameState {
        GameState::new(Theme::default(), W, H, Rules::default(), 7).unwrap()
    }

    fn item_at(state: &GameState, kind: FruitKind) -> FallingItem {
        FallingItem {
            x: state.collector.x + 1.0,
            y: state.collector.y + 0.5,
            radius: ITEM_RADIUS,
            kind,
            vertical_speed: 6.0,
            rotation: 0.0,
            rotation_speed: 0.0,
        }
    }

    fn capture(state: &mut GameState, kind: FruitKind) {
        let item = item_at(state, kind);
        state.collect(&item);
    }

    #[test]
    fn buffer_bounded_to_seven_evicts_oldest() {
        let mut buf = CollectionBuffer::new();
        buf.push(FruitKind::Apple);
        for _ in 0..BUFFER_CAP {
            buf.push(FruitKind::Banana);
        }
        assert_eq!(buf.len(), BUFFER_CAP);
        // The apple went in first, so it is the one evicted.
        assert!(buf.iter().all(|k| k == FruitKind::Banana));
    }

    #[test]
    fn trailing_three_needs_three_entries() {
        let mut buf = CollectionBuffer::new();
        buf.push(FruitKind::Apple);
        buf.push(FruitKind::Grape);
        assert!(buf.trailing_three().is_none());
        buf.push(FruitKind::Orange);
        assert_eq!(
            buf.trailing_three(),
            Some([FruitKind::Apple, FruitKind::Grape, FruitKind::Orange])
        );
        assert_eq!(buf.second_from_last(), Some(FruitKind::Grape));
    }

    #[test]
    fn invalid_rules_fail_fast() {
        let rules = Rules {
            spawn_interval_ms: 0,
            ..Rules::default()
        };
        assert!(matches!(
            rules.validate(W, H),
            Err(ConfigError::ZeroSpawnInterval)
        ));

        let rules = Rules {
            special_chance: 1.5,
            ..Rules::default()
        };
        assert!(rules.validate(W, H).is_err());

        let rules = Rules {
            collector_width: 100.0,
            ..Rules::default()
        };
        assert!(matches!(
            rules.validate(W, H),
            Err(ConfigError::CollectorTooWide { .. })
        ));

        assert!(Rules::default().validate(W, H).is_ok());
    }

    #[test]
    fn spawner_respects_active_cap() {
        let mut s = state();
        for _ in 0..s.rules.max_active {
            let mut it = item_at(&s, FruitKind::Apple);
            // Park everything far above the collector so nothing resolves.
            it.y = -100.0;
            it.vertical_speed = 0.0;
            s.items.push(it);
        }
        for _ in 0..50 {
            s.tick(Duration::from_millis(100));
        }
        assert_eq!(s.items.len(), s.rules.max_active);
    }

    #[test]
    fn spawner_speed_scales_with_level() {
        let mut s = state();
        s.level = 4;
        s.tick(Duration::from_millis(1001));
        assert_eq!(s.items.len(), 1);
        let expected = s.rules.base_speed + 3.0 * s.rules.speed_per_level;
        assert!((s.items[0].vertical_speed - expected).abs() < f32::EPSILON);
    }

    #[test]
    fn capture_requires_overlap() {
        let s = state();
        let mut hit = item_at(&s, FruitKind::Apple);
        hit.y = s.collector.y;
        assert!(s.overlaps_collector(&hit));

        let mut wide = hit.clone();
        wide.x = s.collector.x + s.collector.width + wide.radius + 0.1;
        assert!(!s.overlaps_collector(&wide));

        let mut high = hit;
        high.y = s.collector.y - high.radius - 0.1;
        assert!(!s.overlaps_collector(&high));
    }

    #[test]
    fn miss_decrements_lives_to_game_over() {
        let mut s = state();
        for expected in [2, 1, 0] {
            let item = item_at(&s, FruitKind::Apple);
            s.miss(&item);
            assert_eq!(s.lives, expected);
        }
        assert_eq!(s.game_over, Some(GameOverReason::OutOfLives));
        // Floored at zero even if another item slips past.
        let item = item_at(&s, FruitKind::Apple);
        s.miss(&item);
        assert_eq!(s.lives, 0);
    }

    #[test]
    fn triple_match_scores_and_increments_combo() {
        let mut s = state();
        for _ in 0..3 {
            capture(&mut s, FruitKind::Apple);
        }
        s.check_matches();
        // base 10 + combo 0 * 5 + level 1 * 3
        assert_eq!(s.score, 13);
        assert_eq!(s.combo, 1);
        assert_eq!(s.max_combo, 1);
        assert!(s.buffer.is_empty());
        assert!(s.drain_events().contains(&GameEvent::Matched {
            kind: FruitKind::Apple,
            points: 13,
            combo: 1
        }));
    }

    #[test]
    fn fourth_item_of_a_kind_does_not_rematch() {
        let mut s = state();
        for _ in 0..3 {
            capture(&mut s, FruitKind::Apple);
        }
        s.check_matches();
        capture(&mut s, FruitKind::Apple);
        s.check_matches();
        assert_eq!(s.buffer.len(), 1);
        assert_eq!(s.score, 13);
    }

    #[test]
    fn mismatched_triple_resets_combo_keeps_buffer() {
        let mut s = state();
        s.combo = 3;
        capture(&mut s, FruitKind::Apple);
        capture(&mut s, FruitKind::Apple);
        capture(&mut s, FruitKind::Grape);
        s.check_matches();
        assert_eq!(s.combo, 0);
        assert_eq!(s.buffer.len(), 3);
        assert_eq!(s.score, 0);
        assert!(s.drain_events().contains(&GameEvent::ComboBroken));
    }

    #[test]
    fn short_buffer_resets_combo() {
        let mut s = state();
        s.combo = 2;
        capture(&mut s, FruitKind::Apple);
        s.check_matches();
        assert_eq!(s.combo, 0);
    }

    #[test]
    fn special_in_trailing_three_skips_matching_and_keeps_combo() {
        let mut s = state();
        s.combo = 2;
        s.buffer.push(FruitKind::Apple);
        s.buffer.push(FruitKind::Apple);
        s.buffer.push(FruitKind::Bomb);
        s.check_matches();
        assert_eq!(s.combo, 2);
        assert_eq!(s.buffer.len(), 3);
        assert_eq!(s.score, 0);
    }

    #[test]
    fn bomb_clears_buffer_at_any_length() {
        for prior in 0..=6 {
            let mut s = state();
            for _ in 0..prior {
                s.buffer.push(FruitKind::Grape);
            }
            capture(&mut s, FruitKind::Bomb);
            assert!(s.buffer.is_empty(), "prior len {prior}");
            assert!(s.drain_events().contains(&GameEvent::BombCleared));
        }
    }

    #[test]
    fn rainbow_pairs_off_predecessor_for_flat_bonus() {
        let mut s = state();
        capture(&mut s, FruitKind::Banana);
        capture(&mut s, FruitKind::Rainbow);
        assert!(s.buffer.is_empty());
        assert_eq!(s.score, 100);
        assert!(s.drain_events().contains(&GameEvent::RainbowMatched));
    }

    #[test]
    fn rainbow_without_predecessor_stays_buffered() {
        let mut s = state();
        capture(&mut s, FruitKind::Rainbow);
        assert_eq!(s.buffer.len(), 1);
        assert_eq!(s.score, 0);

        // A special predecessor does not qualify either.
        let mut s = state();
        s.buffer.push(FruitKind::Rainbow);
        capture(&mut s, FruitKind::Rainbow);
        assert_eq!(s.buffer.len(), 2);
        assert_eq!(s.score, 0);
    }

    #[test]
    fn rainbow_after_eviction_still_pairs_newest() {
        let mut s = state();
        for _ in 0..BUFFER_CAP {
            s.buffer.push(FruitKind::Grape);
        }
        capture(&mut s, FruitKind::Rainbow);
        // Push evicted the oldest grape, then the rainbow took the newest
        // grape with it: 7 + 1 - 1 - 2.
        assert_eq!(s.buffer.len(), 5);
        assert_eq!(s.score, 100);
    }

    #[test]
    fn level_up_at_threshold_restores_one_life() {
        let mut s = state();
        s.score = 190;
        s.lives = 1;
        for _ in 0..3 {
            capture(&mut s, FruitKind::Apple);
        }
        s.check_matches();
        // 190 + 13 crosses level 1 * 200.
        assert_eq!(s.level, 2);
        assert_eq!(s.lives, 2);
        assert!(s.drain_events().contains(&GameEvent::LevelUp { level: 2 }));
    }

    #[test]
    fn level_up_never_exceeds_life_cap() {
        let mut s = state();
        s.score = 190;
        assert_eq!(s.lives, MAX_LIVES);
        for _ in 0..3 {
            capture(&mut s, FruitKind::Apple);
        }
        s.check_matches();
        assert_eq!(s.level, 2);
        assert_eq!(s.lives, MAX_LIVES);
    }

    #[test]
    fn rainbow_bonus_does_not_trigger_level_up() {
        let mut s = state();
        s.score = 150;
        capture(&mut s, FruitKind::Banana);
        capture(&mut s, FruitKind::Rainbow);
        assert_eq!(s.score, 250);
        // Level-up only runs on the triple-match path.
        assert_eq!(s.level, 1);
    }

    #[test]
    fn achievements_unlock_once() {
        let mut s = state();
        s.combo = 4;
        for _ in 0..3 {
            capture(&mut s, FruitKind::Apple);
        }
        s.check_matches();
        assert_eq!(s.combo, 5);
        assert!(s.achievements.contains(&Achievement::Combo5));
        let unlocked = s
            .drain_events()
            .iter()
            .filter(|e| matches!(e, GameEvent::AchievementUnlocked(_)))
            .count();
        assert_eq!(unlocked, 1);

        s.combo = 4;
        for _ in 0..3 {
            capture(&mut s, FruitKind::Apple);
        }
        s.check_matches();
        assert!(
            !s.drain_events()
                .iter()
                .any(|e| matches!(e, GameEvent::AchievementUnlocked(_)))
        );
    }

    #[test]
    fn countdown_reaching_zero_ends_game() {
        let mut s = state();
        for _ in 0..s.rules.time_limit_secs {
            s.second_elapsed();
        }
        assert_eq!(s.time_left, 0);
        assert_eq!(s.game_over, Some(GameOverReason::TimeUp));
        assert!(s.drain_events().iter().any(|e| matches!(
            e,
            GameEvent::GameOver {
                reason: GameOverReason::TimeUp,
                ..
            }
        )));
    }

    #[test]
    fn stats_frozen_after_game_over() {
        let mut s = state();
        s.score = 42;
        let mut it = item_at(&s, FruitKind::Apple);
        it.y = 1.0;
        s.items.push(it);
        for _ in 0..s.rules.time_limit_secs {
            s.second_elapsed();
        }
        let stats = s.final_stats();
        let y_before = s.items[0].y;
        s.tick(Duration::from_millis(500));
        s.second_elapsed();
        assert_eq!(s.final_stats(), stats);
        assert!((s.items[0].y - y_before).abs() < f32::EPSILON);
        assert_eq!(s.time_left, 0);
    }

    #[test]
    fn capture_feeds_buffer_through_motion() {
        let mut s = state();
        let mut item = item_at(&s, FruitKind::Strawberry);
        item.y = s.collector.y - 1.0;
        item.vertical_speed = 6.0;
        s.items.push(item);
        // 6 cells/sec for 200 ms crosses into the collector band.
        s.tick(Duration::from_millis(200));
        assert!(s.items.is_empty());
        assert_eq!(s.buffer.len(), 1);
        assert!(
            s.drain_events()
                .contains(&GameEvent::Captured(FruitKind::Strawberry))
        );
    }

    #[test]
    fn score_and_level_are_monotone_over_a_session() {
        let mut s = state();
        let (mut last_score, mut last_level) = (0, 1);
        for i in 0..3000 {
            s.tick(Duration::from_millis(33));
            if i % 30 == 0 {
                s.second_elapsed();
            }
            assert!(s.score >= last_score);
            assert!(s.level >= last_level);
            assert!(s.lives <= MAX_LIVES);
            assert!(s.buffer.len() <= BUFFER_CAP);
            last_score = s.score;
            last_level = s.level;
            if s.game_over.is_some() {
                break;
            }
        }
        assert!(s.game_over.is_some());
    }

    #[test]
    fn effects_expire() {
        let mut s = state();
        s.push_effect(1.0, 1.0, "+10".to_string(), Color::Yellow, 300.0);
        s.tick_effects(Duration::from_millis(200));
        assert_eq!(s.effects.len(), 1);
        s.tick_effects(Duration::from_millis(200));
        assert!(s.effects.is_empty());
    }

    #[test]
    fn held_input_moves_and_clamps_collector() {
        let mut s = state();
        s.held.left = true;
        for _ in 0..200 {
            s.move_collector(Duration::from_millis(50));
        }
        assert!(s.collector.x.abs() < f32::EPSILON);
        s.held.left = false;
        s.held.right = true;
        for _ in 0..200 {
            s.move_collector(Duration::from_millis(50));
        }
        assert!((s.collector.x - (s.width - s.collector.width)).abs() < f32::EPSILON);
    }
}
