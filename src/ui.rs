//! Layout and drawing: playfield, ghost, player, sidebar, pause and quit overlays.

use crate::app::{QuitOption, Screen};
use crate::falling::Vec2;
use crate::grid::{Cell, IVec2};
use crate::physics::GravityDir;
use crate::session::GameSession;
use crate::theme::{Theme, blend};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal columns per grid cell.
const CELL_WIDTH: u16 = 2;
/// Rows drawn above the grid so the spawning shape is visible.
const SPAWN_ROWS: u16 = 4;
const SIDEBAR_WIDTH: u16 = 26;
/// Tile-clear flash (TachyonFX fade to background).
const CLEAR_FADE_MS: u32 = 350;
/// Ghost pulse period in seconds.
const GHOST_PERIOD: f32 = 1.5;
const GHOST_MIN_ALPHA: f32 = 0.2;
const GHOST_MAX_ALPHA: f32 = 0.7;
const LEADERBOARD_LEN: usize = 10;

/// Everything one frame needs.
pub struct View<'a> {
    pub session: &'a GameSession,
    pub theme: &'a Theme,
    pub player: Vec2,
    pub gravity: GravityDir,
    pub screen: Screen,
    pub paused: bool,
    pub quit_selected: QuitOption,
    /// Seconds since start; drives the ghost pulse.
    pub clock: f32,
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Ghost opacity at `clock` seconds: eased triangle wave between the min and max alpha.
pub fn ghost_alpha(clock: f32) -> f32 {
    let phase = (clock / GHOST_PERIOD).rem_euclid(1.0);
    let tri = if phase < 0.5 {
        phase * 2.0
    } else {
        2.0 - phase * 2.0
    };
    GHOST_MIN_ALPHA + (GHOST_MAX_ALPHA - GHOST_MIN_ALPHA) * ease_in_out_cubic(tri)
}

/// Pending tile-clear flash: cells drawn white, then faded to the background.
#[derive(Default)]
pub struct ClearFlash {
    cells: Vec<IVec2>,
    effect: Option<Effect>,
    last_process: Option<Instant>,
}

impl ClearFlash {
    /// Adds cells to the flash and restarts the fade.
    pub fn start(&mut self, cells: &[IVec2]) {
        self.cells.extend_from_slice(cells);
        self.effect = None;
        self.last_process = None;
    }

    pub fn is_active(&self) -> bool {
        !self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn finish_if_done(&mut self) {
        if self.effect.as_ref().is_some_and(|e| e.done()) {
            self.clear();
        }
    }
}

fn total_rows(session: &GameSession) -> u16 {
    saturating_u16(session.grid().height()).saturating_add(SPAWN_ROWS)
}

fn saturating_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// Playfield size in terminal cells including the border, for a `width × height` grid.
fn playfield_size(width: usize, height: usize) -> (u16, u16) {
    let w = saturating_u16(width).saturating_mul(CELL_WIDTH);
    let h = saturating_u16(height).saturating_add(SPAWN_ROWS);
    (w.saturating_add(2), h.saturating_add(2))
}

/// Terminal position of the left column of a grid cell, if visible.
fn cell_to_screen(board: Rect, rows: u16, cell: IVec2) -> Option<(u16, u16)> {
    if cell.x < 0 || cell.y < 0 || cell.y >= rows as i32 {
        return None;
    }
    let x = u32::from(board.x) + cell.x as u32 * u32::from(CELL_WIDTH);
    let y = u32::from(board.y) + u32::from(rows) - 1 - cell.y as u32;
    let right = u32::from(board.x) + u32::from(board.width);
    let bottom = u32::from(board.y) + u32::from(board.height);
    (x + 1 < right && y < bottom).then_some((x as u16, y as u16))
}

fn put_cell(frame: &mut Frame, board: Rect, rows: u16, cell: IVec2, symbol: &str, style: Style) {
    if let Some((x, y)) = cell_to_screen(board, rows, cell) {
        let buf = frame.buffer_mut();
        buf[(x, y)].set_symbol(symbol).set_style(style);
        buf[(x + 1, y)].set_symbol(symbol).set_style(style);
    }
}

pub fn draw(frame: &mut Frame, view: &View, flash: &mut ClearFlash, now: Instant, no_animation: bool) {
    let area = frame.area();
    let grid = view.session.grid();
    let (pw, ph) = playfield_size(grid.width(), grid.height());
    let total_w = pw.saturating_add(SIDEBAR_WIDTH);

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);

    let board = draw_playfield(frame, view, inner[0], flash);
    draw_sidebar(frame, view, inner[1]);

    if flash.is_active() {
        if no_animation {
            flash.clear();
        } else {
            apply_clear_effect(frame, view, board, flash, now);
        }
    }

    match view.screen {
        Screen::Playing if view.paused => draw_pause_overlay(frame, view.theme, area),
        Screen::Playing => {}
        Screen::QuitMenu => draw_quit_menu(frame, view.theme, view.quit_selected),
    }
}

/// Draws the board and returns its inner rect.
fn draw_playfield(frame: &mut Frame, view: &View, area: Rect, flash: &ClearFlash) -> Rect {
    let theme = view.theme;
    let session = view.session;
    let title = format!(" Gravitris  | Score: {:.0} ", session.state.score);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    let board = block.inner(area);
    block.render(area, frame.buffer_mut());

    let rows = total_rows(session);
    let grid = session.grid();
    let height = grid.height() as i32;

    for y in 0..rows as i32 {
        for x in 0..grid.width() as i32 {
            let cell = IVec2::new(x, y);
            let Some((sx, sy)) = cell_to_screen(board, rows, cell) else {
                continue;
            };
            let (left, right, style) = match grid.get(cell) {
                Some(Cell::Wall(tag)) => {
                    let c = theme.shape_color(tag);
                    ("█", "█", Style::default().fg(c).bg(c))
                }
                _ if y >= height => (" ", " ", Style::default().bg(theme.bg)),
                _ => (" ", "·", Style::default().fg(theme.div_line).bg(theme.bg)),
            };
            let buf = frame.buffer_mut();
            buf[(sx, sy)].set_symbol(left).set_style(style);
            buf[(sx + 1, sy)].set_symbol(right).set_style(style);
        }
    }

    // Spawn line.
    if let Some((_, sy)) = cell_to_screen(board, rows, IVec2::new(0, height)) {
        for sx in board.x..board.x + board.width {
            frame.buffer_mut()[(sx, sy)]
                .set_symbol("╌")
                .set_style(Style::default().fg(theme.inactive_fg).bg(theme.bg));
        }
    }

    if let Some(active) = session.active() {
        let color = theme.shape_color(active.shape.id);
        let ghost = blend(theme.bg, color, ghost_alpha(view.clock));
        for &cell in &active.predicted_block_positions {
            put_cell(frame, board, rows, cell, "▒", Style::default().fg(ghost).bg(theme.bg));
        }
        for &cell in &active.block_positions {
            put_cell(frame, board, rows, cell, "█", Style::default().fg(color).bg(color));
        }
    }

    for &cell in &flash.cells {
        put_cell(frame, board, rows, cell, "█", Style::default().fg(Color::White).bg(Color::White));
    }

    let player = IVec2::new(view.player.x.round() as i32, view.player.y.round() as i32);
    let (left, right) = match view.gravity {
        GravityDir::Down => ("◢", "◣"),
        GravityDir::Up => ("◥", "◤"),
    };
    if let Some((sx, sy)) = cell_to_screen(board, rows, player) {
        let style = Style::default().fg(theme.player).bold();
        let buf = frame.buffer_mut();
        buf[(sx, sy)].set_symbol(left).set_style(style);
        buf[(sx + 1, sy)].set_symbol(right).set_style(style);
    }

    board
}

/// Buffer positions covered by the flash cells.
fn flash_positions(board: Rect, rows: u16, cells: &[IVec2]) -> HashSet<(u16, u16)> {
    cells
        .iter()
        .filter_map(|&c| cell_to_screen(board, rows, c))
        .flat_map(|(x, y)| [(x, y), (x + 1, y)])
        .collect()
}

/// Create or advance the fade over the cleared cells.
fn apply_clear_effect(
    frame: &mut Frame,
    view: &View,
    board: Rect,
    flash: &mut ClearFlash,
    now: Instant,
) {
    let delta = flash
        .last_process
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    flash.last_process = Some(now);

    if flash.effect.is_none() {
        let positions = flash_positions(board, total_rows(view.session), &flash.cells);
        let filter =
            CellFilter::PositionFn(ref_count(move |pos: Position| positions.contains(&(pos.x, pos.y))));
        let bg = view.theme.bg;
        let effect = fx::fade_to(bg, bg, (CLEAR_FADE_MS, Interpolation::QuadOut))
            .with_filter(filter)
            .with_area(board);
        flash.effect = Some(effect);
    }

    if let Some(effect) = flash.effect.as_mut() {
        frame.render_effect(effect, board, TfxDuration::from_millis(delta_ms));
    }
    flash.finish_if_done();
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let state = &view.session.state;
    let config = view.session.config();
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let dim_style = Style::default().fg(theme.inactive_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),                          // Stats
            Constraint::Length(4),                          // Next speed-up
            Constraint::Length(LEADERBOARD_LEN as u16 + 3), // Leaderboard
            Constraint::Fill(1),                            // Controls
        ])
        .split(area);

    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let gravity = match view.gravity {
        GravityDir::Down => "down ▼",
        GravityDir::Up => "up ▲",
    };
    let stats = Text::from(vec![
        stat("Score:    ", format!("{:.0}", state.score)),
        stat("Previous: ", format!("{:.0}", state.previous_score)),
        stat("Speed:    ", format!("x{:.2}", state.speed_multiplier)),
        stat("Points:   ", format!("x{:.2}", state.score_multiplier())),
        stat("Gravity:  ", gravity.to_string()),
    ]);
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    Paragraph::new(stats)
        .block(stats_block)
        .render(chunks[0], frame.buffer_mut());

    let speed_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(" Speed up ", title_style));
    let speed_inner = speed_block.inner(chunks[1]);
    speed_block.render(chunks[1], frame.buffer_mut());
    let ratio = if config.difficulty_cooldown > 0.0 {
        (state.difficulty_timer / config.difficulty_cooldown).clamp(0.0, 1.0) as f64
    } else {
        0.0
    };
    Gauge::default()
        .ratio(ratio)
        .label(format!(
            "{:.0}s",
            (config.difficulty_cooldown - state.difficulty_timer).max(0.0)
        ))
        .gauge_style(Style::default().fg(theme.title).bg(theme.bg))
        .render(speed_inner, frame.buffer_mut());

    let mut lines: Vec<Line> = state
        .high_scores
        .top(LEADERBOARD_LEN)
        .iter()
        .enumerate()
        .map(|(i, score)| {
            Line::from(vec![
                Span::styled(format!("{:>2}. ", i + 1), dim_style),
                Span::styled(format!("{:.0}", score), fg_style),
            ])
        })
        .collect();
    if lines.is_empty() {
        lines.push(Line::from(Span::styled("no scores yet", dim_style)));
    }
    Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(Span::styled(" Best ", title_style)),
        )
        .render(chunks[2], frame.buffer_mut());

    let controls = Text::from(vec![
        Line::from(Span::styled("←/→ a/d  walk", dim_style)),
        Line::from(Span::styled("q / e    rotate", dim_style)),
        Line::from(Span::styled("space    place", dim_style)),
        Line::from(Span::styled("f        flip", dim_style)),
        Line::from(Span::styled("p pause  esc quit", dim_style)),
    ]);
    Paragraph::new(controls)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style),
        )
        .render(chunks[3], frame.buffer_mut());
}

fn centered(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centered(area, 28, 5);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P: Resume    Esc: Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

pub fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let quit_rect = centered(frame.area(), 24, 8);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");

    // Clear background
    for y in quit_rect.y..quit_rect.y + quit_rect.height {
        for x in quit_rect.x..quit_rect.x + quit_rect.width {
            frame.buffer_mut()[(x, y)].set_style(Style::default().bg(theme.bg));
        }
    }

    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::Restart, " Restart "),
        (QuitOption::Exit, " Exit "),
    ];

    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default().fg(theme.bg).bg(theme.title).bold()
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        if ry < inner.y + inner.height {
            frame.buffer_mut().set_string(rx, ry, label, style);
        }
    }
}
