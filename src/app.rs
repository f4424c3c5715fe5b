//! App: terminal init, main loop, event dispatch between session, physics, audio and UI.

use crate::Args;
use crate::audio::{AudioSink, SoundKey};
use crate::falling::Vec2;
use crate::input::InputState;
use crate::physics::{FallingBodies, GridColliders, PhysicsWorld, PlayerProxy, create_bounds};
use crate::session::{GameEvent, GameSession, ResetReason, TickInput};
use crate::theme::Theme;
use crate::ui::{self, ClearFlash, View};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};

/// Longest simulated frame; longer stalls (suspend, resize) are cut short.
const MAX_FRAME_DT: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    Restart,
    Exit,
}

impl QuitOption {
    fn next(self) -> Self {
        match self {
            Self::Resume => Self::Restart,
            Self::Restart => Self::Exit,
            Self::Exit => Self::Resume,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Resume => Self::Exit,
            Self::Restart => Self::Resume,
            Self::Exit => Self::Restart,
        }
    }
}

pub struct App {
    args: Args,
    theme: Theme,
    session: GameSession,
    world: PhysicsWorld,
    colliders: GridColliders,
    falling: FallingBodies,
    player: PlayerProxy,
    audio: Box<dyn AudioSink>,
    input: InputState,
    flash: ClearFlash,
    screen: Screen,
    paused: bool,
    quit_selected: QuitOption,
    started: Instant,
    last_frame: Instant,
}

impl App {
    pub fn new(args: Args, theme: Theme, session: GameSession, audio: Box<dyn AudioSink>) -> Self {
        let config = session.config();
        let mut world = PhysicsWorld::default();
        create_bounds(&mut world, config.width, config.height);
        let spawn = Vec2::new((config.width / 2) as f32, 0.5);
        let player = PlayerProxy::new(&mut world, spawn);
        let now = Instant::now();
        Self {
            args,
            theme,
            session,
            world,
            colliders: GridColliders::default(),
            falling: FallingBodies::default(),
            player,
            audio,
            input: InputState::default(),
            flash: ClearFlash::default(),
            screen: Screen::Playing,
            paused: false,
            quit_selected: QuitOption::Resume,
            started: now,
            last_frame: now,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events keep walking keys from sticking; not every terminal supports them.
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        log::info!(
            "exit: score {:.0}, best {:.0}",
            self.session.state.score,
            self.session.state.high_scores.best().unwrap_or(0.0)
        );
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.args.frame_rate.max(1.0));
        self.last_frame = Instant::now();
        loop {
            let now = Instant::now();
            let view = View {
                session: &self.session,
                theme: &self.theme,
                player: self.player.position(&self.world),
                gravity: self.player.gravity(),
                screen: self.screen,
                paused: self.paused,
                quit_selected: self.quit_selected,
                clock: now.duration_since(self.started).as_secs_f32(),
            };
            let flash = &mut self.flash;
            let no_animation = self.args.no_animation;
            terminal.draw(|f| ui::draw(f, &view, flash, now, no_animation))?;

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        if !self.handle_key(key) {
                            return Ok(());
                        }
                    }
                }
            }

            let actions = self.input.take_actions();
            if self.screen == Screen::Playing {
                if actions.quit {
                    self.screen = Screen::QuitMenu;
                    self.quit_selected = QuitOption::Resume;
                    self.input.release_all();
                } else if actions.pause {
                    self.paused = !self.paused;
                    self.input.release_all();
                }
            }

            let frame_now = Instant::now();
            let dt = frame_now
                .saturating_duration_since(self.last_frame)
                .as_secs_f32()
                .min(MAX_FRAME_DT);
            self.last_frame = frame_now;

            if self.screen == Screen::Playing && !self.paused {
                if actions.flip_gravity {
                    self.player.flip_gravity(&mut self.world);
                    self.audio.play(SoundKey::GravitySwitch);
                }
                let walk = self.input.walk_direction(frame_now);
                self.player.walk(&mut self.world, walk);
                let input = TickInput {
                    dt,
                    player: self.player.position(&self.world),
                    rotate_left: actions.rotate_left,
                    rotate_right: actions.rotate_right,
                    place: actions.place,
                };
                self.step(&input);
            }
        }
    }

    /// One simulation frame: session update, event dispatch, then physics.
    fn step(&mut self, input: &TickInput) {
        let events = self.session.update(input);
        let respawned = self.dispatch(events);
        self.falling
            .sync(&mut self.world, self.session.active(), respawned);
        self.world.step(input.dt);
    }

    /// Routes session events to physics, audio and the renderer. Returns true if a new
    /// shape was spawned.
    fn dispatch(&mut self, events: Vec<GameEvent>) -> bool {
        let mut respawned = false;
        let unstick_limit = self.session.grid().height() + 1;
        for event in events {
            match event {
                GameEvent::RebuildColliders => {
                    self.colliders.rebuild(&mut self.world, self.session.grid());
                    if !self.player.unstick(&mut self.world, unstick_limit) {
                        log::warn!("player still overlapping after rebuild");
                    }
                }
                GameEvent::Sound(key) => self.audio.play(key),
                GameEvent::FlipGravity => self.player.flip_gravity(&mut self.world),
                GameEvent::Placed { shape, trigger } => {
                    log::debug!("placed shape {} ({:?})", shape.0, trigger);
                    respawned = true;
                }
                GameEvent::TilesCleared { cells, tag, score } => {
                    log::debug!("cleared {} tiles of {} for {:.0}", cells.len(), tag.0, score);
                    if !self.args.no_animation {
                        self.flash.start(&cells);
                    }
                }
                GameEvent::Reset { reason, final_score } => {
                    log::debug!("reset {:?} at {:.0}", reason, final_score);
                    self.player.reset(&mut self.world);
                    self.falling.clear(&mut self.world);
                    self.flash.clear();
                    respawned = true;
                }
            }
        }
        respawned
    }

    /// Returns false when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.screen {
            Screen::Playing => self.input.handle_key(key, Instant::now()),
            Screen::QuitMenu => {
                if key.kind != KeyEventKind::Press {
                    return true;
                }
                match key.code {
                    KeyCode::Down | KeyCode::Right | KeyCode::Char('j' | 's' | 'd' | 'l') => {
                        self.quit_selected = self.quit_selected.next();
                    }
                    KeyCode::Up | KeyCode::Left | KeyCode::Char('k' | 'w' | 'a' | 'h') => {
                        self.quit_selected = self.quit_selected.prev();
                    }
                    KeyCode::Enter | KeyCode::Char(' ') => match self.quit_selected {
                        QuitOption::Resume => self.resume(),
                        QuitOption::Restart => {
                            self.session.reset(ResetReason::Requested);
                            self.resume();
                        }
                        QuitOption::Exit => return false,
                    },
                    KeyCode::Esc | KeyCode::Char('p' | 'P') => self.resume(),
                    _ => {}
                }
            }
        }
        true
    }

    fn resume(&mut self) {
        self.screen = Screen::Playing;
        self.paused = false;
        self.input.release_all();
        self.last_frame = Instant::now();
    }
}
