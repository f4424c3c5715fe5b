//! Fire-and-forget sound cues.

use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundKey {
    Rotate,
    GravitySwitch,
    TileClear,
    Restart,
}

impl SoundKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rotate => "rotate",
            Self::GravitySwitch => "gravity_switch",
            Self::TileClear => "tile_clear",
            Self::Restart => "restart",
        }
    }
}

/// Plays a sound by key. No result, no ordering guarantee.
pub trait AudioSink {
    fn play(&mut self, key: SoundKey);
}

/// Plays nothing.
#[derive(Debug, Default)]
pub struct Silent;

impl AudioSink for Silent {
    fn play(&mut self, _key: SoundKey) {}
}

/// Rings the terminal bell for the loud cues (tile clear, restart).
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AudioSink for TerminalBell {
    fn play(&mut self, key: SoundKey) {
        if matches!(key, SoundKey::TileClear | SoundKey::Restart) {
            let mut out = std::io::stdout();
            let _ = out.write_all(b"\x07");
            let _ = out.flush();
        }
    }
}

/// Writes each cue to the log; handy with `--log-file`.
#[derive(Debug, Default)]
pub struct LogAudio {
    pub played: u64,
}

impl AudioSink for LogAudio {
    fn play(&mut self, key: SoundKey) {
        self.played += 1;
        log::debug!("sound: {}", key.as_str());
    }
}
