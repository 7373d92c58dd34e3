/// Input collector.
///
/// Drains every pending terminal event once per frame and turns it into a
/// `Command`:
///   - Mouse click (left button)  → touch at that screen cell
///   - Arrow keys / WASD          → touch one tile away from the player
///   - R                          → restart the level
///   - N / P                      → next / previous level
///   - Esc / Q / Ctrl+C           → quit
///
/// Screen cells are resolved to world points by the renderer, which owns
/// the layout.

use std::time::Duration;

use crossterm::event::{
    self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Command {
    /// Touch at a terminal cell.
    TouchScreen { column: u16, row: u16 },
    /// Touch one tile away from the player, in tile steps (row grows down).
    Nudge { dc: i32, dr: i32 },
    Restart,
    NextLevel,
    PrevLevel,
    Quit,
}

pub struct InputState {
    /// Commands collected during the most recent `drain_events()`.
    pub commands: Vec<Command>,
}

impl InputState {
    pub fn new() -> Self {
        InputState { commands: Vec::with_capacity(8) }
    }

    /// Drain all pending terminal events without blocking.
    /// Call this once per frame, before the simulation step.
    pub fn drain_events(&mut self) {
        self.commands.clear();
        while poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(ev) => self.commands.extend(command_for(&ev)),
                Err(e) => {
                    log::warn!("terminal read failed: {e}");
                    break;
                }
            }
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.commands.contains(&Command::Quit)
    }

    /// Last touch of the frame wins.
    pub fn last_touch(&self) -> Option<Command> {
        self.commands
            .iter()
            .rev()
            .find(|c| matches!(c, Command::TouchScreen { .. } | Command::Nudge { .. }))
            .copied()
    }

    pub fn was_issued(&self, command: Command) -> bool {
        self.commands.contains(&command)
    }
}

impl Default for InputState {
    fn default() -> Self {
        InputState::new()
    }
}

/// Map one terminal event to a command.
pub fn command_for(ev: &Event) -> Option<Command> {
    match ev {
        Event::Key(key) => key_command(key),
        Event::Mouse(mouse) => mouse_command(mouse),
        _ => None,
    }
}

fn key_command(key: &KeyEvent) -> Option<Command> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c' | 'C')) {
        return Some(Command::Quit);
    }
    let command = match key.code {
        KeyCode::Left | KeyCode::Char('a' | 'A') => Command::Nudge { dc: -1, dr: 0 },
        KeyCode::Right | KeyCode::Char('d' | 'D') => Command::Nudge { dc: 1, dr: 0 },
        KeyCode::Up | KeyCode::Char('w' | 'W') => Command::Nudge { dc: 0, dr: -1 },
        KeyCode::Down | KeyCode::Char('s' | 'S') => Command::Nudge { dc: 0, dr: 1 },
        KeyCode::Char('r' | 'R') => Command::Restart,
        KeyCode::Char('n' | 'N') => Command::NextLevel,
        KeyCode::Char('p' | 'P') => Command::PrevLevel,
        KeyCode::Esc | KeyCode::Char('q' | 'Q') => Command::Quit,
        _ => return None,
    };
    Some(command)
}

fn mouse_command(mouse: &MouseEvent) -> Option<Command> {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) | MouseEventKind::Drag(MouseButton::Left) => {
            Some(Command::TouchScreen { column: mouse.column, row: mouse.row })
        }
        _ => None,
    }
}
