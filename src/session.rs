//! Game session: owns the grid, the active falling shape, score and difficulty,
//! and runs one frame of gameplay per `update`.

use crate::audio::SoundKey;
use crate::consolidate::{self, ConsolidationReport};
use crate::falling::{FallInput, FallTuning, FallingShapeRoot, Vec2};
use crate::grid::{IVec2, TileGrid};
use crate::highscores::HighScores;
use crate::predictor;
use crate::shapes::{Rotation, ShapeCatalog, ShapeDefinition, ShapeId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("grid must be at least {min_w}x{min_h}, got {width}x{height}")]
    GridTooSmall {
        width: usize,
        height: usize,
        min_w: usize,
        min_h: usize,
    },
    #[error("grid must be at most {max_w}x{max_h}, got {width}x{height}")]
    GridTooLarge {
        width: usize,
        height: usize,
        max_w: usize,
        max_h: usize,
    },
    #[error("{0} must be a positive finite number")]
    NotPositive(&'static str),
}

/// Gameplay tuning. Speeds are in cells per second.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub width: usize,
    pub height: usize,
    pub horizontal_speed: f32,
    pub base_vertical_speed: f32,
    pub score_per_second: f32,
    pub score_per_tile: f32,
    /// Seconds between speed increases.
    pub difficulty_cooldown: f32,
    pub speed_step: f32,
    /// Rows above the top of the grid where new shapes appear.
    pub spawn_rows_above: f32,
    /// Player y outside `[player_min_y, player_max_y]` ends the run.
    pub player_min_y: f32,
    pub player_max_y: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::for_grid(10, 20)
    }
}

impl SessionConfig {
    pub const MIN_WIDTH: usize = 4;
    pub const MIN_HEIGHT: usize = 4;
    /// Upper bounds keep the board and its terminal layout within `u16` cell counts.
    pub const MAX_WIDTH: usize = 200;
    pub const MAX_HEIGHT: usize = 200;

    pub fn for_grid(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            horizontal_speed: 6.0,
            base_vertical_speed: 1.5,
            score_per_second: 10.0,
            score_per_tile: 100.0,
            difficulty_cooldown: 15.0,
            speed_step: 0.25,
            spawn_rows_above: 2.0,
            player_min_y: -1.0,
            player_max_y: height as f32 + 6.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < Self::MIN_WIDTH || self.height < Self::MIN_HEIGHT {
            return Err(ConfigError::GridTooSmall {
                width: self.width,
                height: self.height,
                min_w: Self::MIN_WIDTH,
                min_h: Self::MIN_HEIGHT,
            });
        }
        if self.width > Self::MAX_WIDTH || self.height > Self::MAX_HEIGHT {
            return Err(ConfigError::GridTooLarge {
                width: self.width,
                height: self.height,
                max_w: Self::MAX_WIDTH,
                max_h: Self::MAX_HEIGHT,
            });
        }
        let positive = [
            ("horizontal speed", self.horizontal_speed),
            ("vertical speed", self.base_vertical_speed),
            ("difficulty cooldown", self.difficulty_cooldown),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(ConfigError::NotPositive(name));
            }
        }
        Ok(())
    }

    /// World position where new shapes spawn: centre column, above the grid.
    pub fn spawn_position(&self) -> Vec2 {
        Vec2::new(
            (self.width / 2) as f32,
            self.height as f32 + self.spawn_rows_above,
        )
    }
}

/// Score, difficulty and the leaderboard.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub score: f32,
    pub previous_score: f32,
    pub high_scores: HighScores,
    pub speed_multiplier: f32,
    pub difficulty_timer: f32,
}

impl SessionState {
    pub fn new(high_scores: HighScores) -> Self {
        Self {
            score: 0.0,
            previous_score: 0.0,
            high_scores,
            speed_multiplier: 1.0,
            difficulty_timer: 0.0,
        }
    }

    pub fn score_multiplier(&self) -> f32 {
        self.speed_multiplier * 2.0
    }

    /// Per-second score and difficulty escalation. Returns true if the speed went up.
    pub fn tick(&mut self, dt: f32, config: &SessionConfig) -> bool {
        self.score += config.score_per_second * self.score_multiplier() * dt;
        self.difficulty_timer += dt;
        if self.difficulty_timer > config.difficulty_cooldown {
            self.speed_multiplier += config.speed_step;
            self.difficulty_timer = 0.0;
            return true;
        }
        false
    }

    /// Score for `tiles` cleared cells. Returns the amount added.
    pub fn add_cleared_tiles(&mut self, tiles: usize, config: &SessionConfig) -> f32 {
        let gained = tiles as f32 * config.score_per_tile * self.score_multiplier();
        self.score += gained;
        gained
    }

    fn reset_counters(&mut self) {
        self.previous_score = self.score;
        self.score = 0.0;
        self.speed_multiplier = 1.0;
        self.difficulty_timer = 0.0;
    }
}

/// One frame of input for the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    pub dt: f32,
    /// Player proxy position from the physics collaborator.
    pub player: Vec2,
    pub rotate_left: bool,
    pub rotate_right: bool,
    pub place: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    StackReachedTop,
    PlayerOutOfBounds,
    /// Restart picked from the quit menu.
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceTrigger {
    /// Actual row reached the predicted resting row.
    Resting,
    /// Player pressed place.
    Input,
}

/// Signals for the collaborators, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// The grid changed; static colliders must be rebuilt before the next physics step.
    RebuildColliders,
    Sound(SoundKey),
    /// Flip the player's gravity.
    FlipGravity,
    Placed {
        shape: ShapeId,
        trigger: PlaceTrigger,
    },
    TilesCleared {
        cells: Vec<IVec2>,
        tag: ShapeId,
        score: f32,
    },
    Reset {
        reason: ResetReason,
        final_score: f32,
    },
}

/// The gameplay core. Owns the grid exclusively; collaborators read it through `grid()`.
#[derive(Debug)]
pub struct GameSession {
    config: SessionConfig,
    grid: TileGrid,
    catalog: ShapeCatalog,
    active: Option<FallingShapeRoot>,
    pub state: SessionState,
    rng: ChaCha8Rng,
    events: Vec<GameEvent>,
}

impl GameSession {
    pub fn new(config: SessionConfig, high_scores: HighScores, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "session start: grid {}x{}, seed {}",
            config.width,
            config.height,
            seed
        );
        let mut session = Self {
            grid: TileGrid::new(config.width, config.height),
            catalog: ShapeCatalog::standard(),
            active: None,
            state: SessionState::new(high_scores),
            rng: ChaCha8Rng::seed_from_u64(seed),
            events: vec![GameEvent::RebuildColliders],
            config,
        };
        session.spawn_random();
        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    #[cfg(test)]
    pub fn catalog(&self) -> &ShapeCatalog {
        &self.catalog
    }

    pub fn active(&self) -> Option<&FallingShapeRoot> {
        self.active.as_ref()
    }

    /// Replaces the active shape. Predictions are refreshed immediately.
    pub fn spawn(&mut self, shape: Rc<ShapeDefinition>, rotation: Rotation, position: Vec2) {
        let mut root = FallingShapeRoot::new(shape, rotation, position);
        root.clamp_horizontal(self.config.width);
        root.recompute_block_positions();
        root.predicted_block_positions = predictor::predict(&self.grid, &root.block_positions).cells;
        log::debug!(
            "spawn {} rot {} at ({:.1}, {:.1})",
            root.shape.name,
            root.rotation.quarter_turns(),
            root.position.x,
            root.position.y
        );
        self.active = Some(root);
    }

    fn spawn_random(&mut self) {
        let Some(shape) = self.catalog.random(&mut self.rng) else {
            log::warn!("shape catalog is empty; nothing to spawn");
            return;
        };
        let rotation = Rotation::from_quarter_turns(self.rng.random_range(0..4u8));
        let position = self.config.spawn_position();
        self.spawn(shape, rotation, position);
    }

    /// Test hook: place walls directly.
    #[cfg(test)]
    pub fn grid_mut(&mut self) -> &mut TileGrid {
        &mut self.grid
    }

    /// Runs one frame. Order: score/difficulty, shape movement, prediction,
    /// placement and consolidation, loss check. Returns this frame's events.
    pub fn update(&mut self, input: &TickInput) -> Vec<GameEvent> {
        if self.state.tick(input.dt, &self.config) {
            log::info!("speed multiplier now {:.2}", self.state.speed_multiplier);
        }

        let trigger = self.step_active(input);
        if let Some(trigger) = trigger {
            self.place_active(trigger);
        }

        if let Some(reason) = self.loss_condition(input.player) {
            self.reset(reason);
        }

        std::mem::take(&mut self.events)
    }

    /// Moves the active shape and refreshes its prediction. Returns a trigger if it should be placed.
    fn step_active(&mut self, input: &TickInput) -> Option<PlaceTrigger> {
        let root = self.active.as_mut()?;
        let fall_input = FallInput {
            target_x: input.player.x,
            dt: input.dt,
            rotate_left: input.rotate_left,
            rotate_right: input.rotate_right,
        };
        let tuning = FallTuning {
            horizontal_speed: self.config.horizontal_speed,
            vertical_speed: self.config.base_vertical_speed,
        };
        if root.step(&fall_input, &tuning, self.state.speed_multiplier, self.config.width) {
            self.events.push(GameEvent::Sound(SoundKey::Rotate));
        }

        // A fast frame or a sideways move can push cells into the stack; back out upward.
        let lift = predictor::lift_out_of_overlap(&self.grid, &root.block_positions);
        if lift > 0 {
            root.position.y = (root.logical_root().y + lift) as f32;
            root.recompute_block_positions();
        }

        let prediction = predictor::predict(&self.grid, &root.block_positions);
        let resting = prediction.is_resting();
        root.predicted_block_positions = prediction.cells;

        if input.place {
            Some(PlaceTrigger::Input)
        } else if resting {
            Some(PlaceTrigger::Resting)
        } else {
            None
        }
    }

    /// Commits the active shape at its predicted cells, consolidates, spawns the next one.
    fn place_active(&mut self, trigger: PlaceTrigger) {
        let Some(root) = self.active.take() else {
            return;
        };
        let tag = root.shape.id;
        let placed = root.predicted_block_positions;
        let report = consolidate::place_and_consolidate(&mut self.grid, &placed, tag);
        log::info!(
            "placed {} ({:?}) at {} cells",
            root.shape.name,
            trigger,
            placed.len()
        );
        self.events.push(GameEvent::Placed { shape: tag, trigger });
        self.record_consolidation(report, tag);
        self.events.push(GameEvent::RebuildColliders);

        if trigger == PlaceTrigger::Resting {
            self.events.push(GameEvent::FlipGravity);
            self.events.push(GameEvent::Sound(SoundKey::GravitySwitch));
        }
        self.spawn_random();
    }

    fn record_consolidation(&mut self, report: ConsolidationReport, tag: ShapeId) {
        if report.cleared.is_empty() {
            return;
        }
        let score = self.state.add_cleared_tiles(report.cleared.len(), &self.config);
        log::info!(
            "cleared {} cells (+{:.0}), gravity {} passes / {} shifts",
            report.cleared.len(),
            score,
            report.gravity_passes,
            report.cells_shifted
        );
        self.events.push(GameEvent::Sound(SoundKey::TileClear));
        self.events.push(GameEvent::TilesCleared {
            cells: report.cleared,
            tag,
            score,
        });
    }

    fn loss_condition(&self, player: Vec2) -> Option<ResetReason> {
        if self.grid.top_row_occupied() {
            Some(ResetReason::StackReachedTop)
        } else if player.y < self.config.player_min_y || player.y > self.config.player_max_y {
            Some(ResetReason::PlayerOutOfBounds)
        } else {
            None
        }
    }

    /// Clears the board, records the score and starts over.
    pub fn reset(&mut self, reason: ResetReason) {
        let final_score = self.state.score;
        log::info!("reset ({:?}), final score {:.0}", reason, final_score);
        self.grid.clear();
        self.active = None;
        if let Err(err) = self.state.high_scores.record(final_score) {
            log::warn!("{}", err);
        }
        self.state.reset_counters();
        self.events.push(GameEvent::Reset { reason, final_score });
        self.events.push(GameEvent::Sound(SoundKey::Restart));
        self.events.push(GameEvent::RebuildColliders);
        self.spawn_random();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "gravitris_session_test_{}_{}_{}",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    fn session() -> GameSession {
        let mut s = GameSession::new(SessionConfig::default(), HighScores::in_memory(), 7).unwrap();
        s.update(&idle(0.0));
        s
    }

    /// Player standing safely in the middle of the board.
    fn idle(dt: f32) -> TickInput {
        TickInput {
            dt,
            player: Vec2::new(4.0, 1.0),
            ..TickInput::default()
        }
    }

    fn shape(s: &GameSession, id: u8) -> Rc<ShapeDefinition> {
        s.catalog().get(ShapeId(id)).unwrap()
    }

    #[test]
    fn test_new_spawns_one_shape_above_grid() {
        let s = GameSession::new(SessionConfig::default(), HighScores::in_memory(), 1).unwrap();
        let root = s.active().expect("shape spawned");
        assert!(root.position.y >= 20.0);
        assert_eq!(root.predicted_block_positions.len(), 4);
        assert!(root.predicted_block_positions.iter().any(|c| c.y == 0));
    }

    #[test]
    fn test_rejects_tiny_grid() {
        let err = GameSession::new(SessionConfig::for_grid(2, 20), HighScores::in_memory(), 1).unwrap_err();
        assert!(matches!(err, ConfigError::GridTooSmall { .. }));
    }

    #[test]
    fn test_rejects_oversized_grid() {
        let err = SessionConfig::for_grid(40_000, 20).validate().unwrap_err();
        assert!(matches!(err, ConfigError::GridTooLarge { width: 40_000, .. }));
        let err = GameSession::new(SessionConfig::for_grid(10, 100_000), HighScores::in_memory(), 1).unwrap_err();
        assert!(matches!(err, ConfigError::GridTooLarge { height: 100_000, .. }));
        let max = SessionConfig::for_grid(SessionConfig::MAX_WIDTH, SessionConfig::MAX_HEIGHT);
        assert_eq!(max.validate(), Ok(()));
    }

    #[test]
    fn test_score_per_second_and_difficulty() {
        let config = SessionConfig::default();
        let mut state = SessionState::new(HighScores::in_memory());
        state.tick(1.0, &config);
        assert!((state.score - 20.0).abs() < 1e-4);
        let mut raised = false;
        for _ in 0..15 {
            raised |= state.tick(1.0, &config);
        }
        assert!(raised);
        assert!((state.speed_multiplier - 1.25).abs() < 1e-6);
        assert_eq!(state.difficulty_timer, 0.0);
    }

    #[test]
    fn test_clearing_five_tiles_scores_one_thousand() {
        let config = SessionConfig::default();
        let mut state = SessionState::new(HighScores::in_memory());
        assert_eq!(state.score_multiplier(), 2.0);
        let gained = state.add_cleared_tiles(5, &config);
        assert_eq!(gained, 1000.0);
        assert_eq!(state.score, 1000.0);
    }

    #[test]
    fn test_explicit_place_commits_prediction_and_respawns() {
        let mut s = session();
        let o = shape(&s, 1);
        s.spawn(o, Rotation::default(), Vec2::new(0.0, 15.0));
        let events = s.update(&TickInput {
            place: true,
            ..idle(0.0)
        });
        for c in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(s.grid().tag_at(IVec2::new(c.0, c.1)), Some(ShapeId(1)));
        }
        assert!(events.contains(&GameEvent::Placed {
            shape: ShapeId(1),
            trigger: PlaceTrigger::Input
        }));
        assert!(events.contains(&GameEvent::RebuildColliders));
        assert!(!events.contains(&GameEvent::FlipGravity));
        assert!(s.active().is_some());
    }

    #[test]
    fn test_auto_place_when_resting_flips_gravity() {
        let mut s = session();
        let o = shape(&s, 1);
        s.spawn(o, Rotation::default(), Vec2::new(4.0, 0.0));
        let events = s.update(&idle(0.0));
        assert!(s.grid().is_wall(IVec2::new(4, 0)));
        assert!(events.contains(&GameEvent::FlipGravity));
        assert!(events.contains(&GameEvent::Sound(SoundKey::GravitySwitch)));
        assert!(events.contains(&GameEvent::Placed {
            shape: ShapeId(1),
            trigger: PlaceTrigger::Resting
        }));
    }

    #[test]
    fn test_shape_inside_stack_is_lifted_then_placed_on_top() {
        let mut s = session();
        for y in 0..3 {
            s.grid_mut().set(IVec2::new(4, y), Cell::Wall(ShapeId(2)));
        }
        // O with root (4,1) covers (4,1) and (4,2), both walls.
        let o = shape(&s, 1);
        s.spawn(o, Rotation::default(), Vec2::new(4.0, 1.0));
        let events = s.update(&idle(0.0));

        assert!(events.contains(&GameEvent::Placed {
            shape: ShapeId(1),
            trigger: PlaceTrigger::Resting
        }));
        assert!(events.contains(&GameEvent::FlipGravity));
        for y in 0..3 {
            assert_eq!(s.grid().tag_at(IVec2::new(4, y)), Some(ShapeId(2)));
        }
        for (x, y) in [(4, 3), (5, 3), (4, 4), (5, 4)] {
            assert_eq!(s.grid().tag_at(IVec2::new(x, y)), Some(ShapeId(1)), "({x}, {y})");
        }
        assert!(!s.grid().is_wall(IVec2::new(5, 1)));
        assert_eq!(s.grid().wall_count(), 7);
    }

    #[test]
    fn test_shape_falls_then_rests_and_places() {
        let mut s = session();
        let i = shape(&s, 0);
        s.spawn(i, Rotation::default(), Vec2::new(4.0, 6.0));
        let mut placed = false;
        for _ in 0..200 {
            let events = s.update(&idle(0.05));
            if events.iter().any(|e| matches!(e, GameEvent::Placed { .. })) {
                placed = true;
                break;
            }
        }
        assert!(placed);
        for x in 3..7 {
            assert_eq!(s.grid().tag_at(IVec2::new(x, 0)), Some(ShapeId(0)));
        }
    }

    #[test]
    fn test_matching_neighbour_clears_and_scores() {
        let mut s = session();
        // Red (Z) run on the floor, then a red Z placed against it.
        for x in 0..3 {
            s.grid_mut().set(IVec2::new(x, 0), Cell::Wall(ShapeId(4)));
        }
        let z = shape(&s, 4);
        // Z resting with root (3,0): cells (3,0),(4,0),(2,1),(3,1); (2,0) is the match.
        s.spawn(z, Rotation::default(), Vec2::new(3.0, 10.0));
        let events = s.update(&TickInput {
            place: true,
            ..idle(0.0)
        });
        let cleared = events.iter().find_map(|e| match e {
            GameEvent::TilesCleared { cells, score, .. } => Some((cells.len(), *score)),
            _ => None,
        });
        assert_eq!(cleared, Some((7, 1400.0)));
        assert_eq!(s.grid().wall_count(), 0);
        assert_eq!(s.state.score, 1400.0);
    }

    #[test]
    fn test_reset_when_stack_reaches_top() {
        let path = temp_file_path("reset");
        let mut s = GameSession::new(SessionConfig::default(), HighScores::load(&path), 3).unwrap();
        s.state.score = 420.0;
        s.state.speed_multiplier = 2.5;
        s.grid_mut().set(IVec2::new(0, 19), Cell::Wall(ShapeId(2)));
        let events = s.update(&idle(0.0));

        assert_eq!(s.grid().wall_count(), 0);
        assert_eq!(s.state.score, 0.0);
        assert_eq!(s.state.speed_multiplier, 1.0);
        assert_eq!(s.state.previous_score, 420.0);
        assert_eq!(s.state.high_scores.scores(), &[420.0]);
        assert!(events.contains(&GameEvent::Reset {
            reason: ResetReason::StackReachedTop,
            final_score: 420.0
        }));
        let raw = std::fs::read_to_string(&path).expect("score file written");
        assert_eq!(raw.trim(), "420");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_reset_when_player_leaves_band() {
        let mut s = session();
        s.grid_mut().set(IVec2::new(3, 0), Cell::Wall(ShapeId(2)));
        let events = s.update(&TickInput {
            player: Vec2::new(4.0, -1.5),
            ..idle(0.0)
        });
        assert_eq!(s.grid().wall_count(), 0);
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::Reset {
                reason: ResetReason::PlayerOutOfBounds,
                ..
            }
        )));
        assert!(s.active().is_some());
    }

    #[test]
    fn test_rotate_input_emits_sound() {
        let mut s = session();
        let events = s.update(&TickInput {
            rotate_left: true,
            ..idle(0.0)
        });
        assert!(events.contains(&GameEvent::Sound(SoundKey::Rotate)));
    }
}
