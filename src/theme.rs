//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::shapes::ShapeId;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Number of shape colours (one per catalog shape).
pub const SHAPE_COLORS: usize = 7;

/// One Dark palette and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Shape colours by tag: I cyan, O yellow, T magenta, S green, Z red, J blue, L orange.
    pub shapes: [Color; SHAPE_COLORS],
    /// Playfield background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, speed).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text (leaderboard ranks, spawn zone).
    pub inactive_fg: Color,
    /// Player marker.
    pub player: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

const ONEDARK_SHAPES: [Color; SHAPE_COLORS] = [
    rgb(0x56B6C2), // hi_fg / cyan
    rgb(0xE5C07B), // title / yellow
    rgb(0xC678DD), // net_box / magenta
    rgb(0x98C379), // mem_box / green
    rgb(0xE06C75), // cpu_end / red
    rgb(0x61AFEF), // cpu_box / blue
    rgb(0xD19A66), // orange
];

impl Theme {
    /// Hardcoded One Dark defaults.
    pub fn onedark_default() -> Self {
        Self {
            shapes: ONEDARK_SHAPES,
            bg: rgb(0x31353F),
            div_line: rgb(0x3F444F),
            main_fg: rgb(0xABB2BF),
            title: rgb(0xE5C07B),
            inactive_fg: rgb(0x5C6370),
            player: rgb(0xFFFFFF),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override shape colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.shapes = [
                    rgb(0x00FFFF),
                    rgb(0xFFFF00),
                    rgb(0xFF00FF),
                    rgb(0x00FF00),
                    rgb(0xFF0000),
                    rgb(0x0088FF),
                    rgb(0xFF8800),
                ];
            }
            crate::Palette::Colorblind => {
                // Tol "bright"/"vibrant" mix: no pair relies on red vs green alone.
                self.shapes = [
                    rgb(0x33BBEE),
                    rgb(0xBBBB00),
                    rgb(0xEE3377),
                    rgb(0x009988),
                    rgb(0xCC3311),
                    rgb(0x0077BB),
                    rgb(0xEE7733),
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let keys: [&[&str]; SHAPE_COLORS] = [
            &["hi_fg", "proc_misc"],
            &["title", "cpu_mid"],
            &["net_box"],
            &["mem_box", "cpu_start"],
            &["cpu_end", "temp_end"],
            &["cpu_box"],
            &["used_end", "download_end"],
        ];
        let mut shapes = ONEDARK_SHAPES;
        for (slot, names) in shapes.iter_mut().zip(keys) {
            if let Some(c) = names.iter().find_map(|k| get(k)) {
                *slot = c;
            }
        }
        let fallback = Self::onedark_default();
        Self {
            shapes,
            bg: get("meter_bg").unwrap_or(fallback.bg),
            div_line: get("div_line").unwrap_or(fallback.div_line),
            main_fg: get("main_fg").unwrap_or(fallback.main_fg),
            title: get("title").unwrap_or(fallback.title),
            inactive_fg: get("inactive_fg").unwrap_or(fallback.inactive_fg),
            player: get("hi_fg").unwrap_or(fallback.player),
        }
    }

    /// Colour for a shape tag.
    #[inline]
    pub fn shape_color(&self, id: ShapeId) -> Color {
        self.shapes[(id.0 as usize) % SHAPE_COLORS]
    }
}

/// Linear blend of two colours; `t = 0` gives `from`, `t = 1` gives `to`.
/// Named colours are approximated by their usual RGB values.
pub fn blend(from: Color, to: Color, t: f32) -> Color {
    let (r0, g0, b0) = to_rgb(from);
    let (r1, g1, b1) = to_rgb(to);
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Color::Rgb(mix(r0, r1), mix(g0, g1), mix(b0, b1))
}

fn to_rgb(color: Color) -> (u8, u8, u8) {
    match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Black => (0, 0, 0),
        Color::Red => (255, 0, 0),
        Color::Green => (0, 255, 0),
        Color::Yellow => (255, 255, 0),
        Color::Blue => (0, 0, 255),
        Color::Magenta => (255, 0, 255),
        Color::Cyan => (0, 255, 255),
        Color::Gray => (128, 128, 128),
        Color::DarkGray => (64, 64, 64),
        Color::White => (255, 255, 255),
        _ => (128, 128, 128),
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(eq) = rest.find('=') {
            let value = rest[eq + 1..]
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .to_string();
            if !value.is_empty() {
                map.insert(key.to_string(), value);
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&s[range], 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))
    };
    let (r, g, b) = if s.len() == 6 && s.is_ascii() {
        (channel(0..2)?, channel(2..4)?, channel(4..6)?)
    } else if s.len() == 3 && s.is_ascii() {
        (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17)
    } else {
        return Err(ThemeError::InvalidHex(s.to_string()));
    };
    Ok(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
        assert!(parse_hex("#12345").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn test_theme_file_overrides_shape_colour() {
        let map = parse_theme_file("theme[cpu_end]=\"#112233\"\ntheme[meter_bg]='#000000'");
        let theme = Theme::from_map(&map);
        assert_eq!(theme.shape_color(ShapeId(4)), Color::Rgb(0x11, 0x22, 0x33));
        assert_eq!(theme.bg, Color::Rgb(0, 0, 0));
        assert_eq!(theme.shape_color(ShapeId(0)), ONEDARK_SHAPES[0]);
    }

    #[test]
    fn test_blend_endpoints() {
        let a = Color::Rgb(0, 100, 200);
        let b = Color::Rgb(200, 100, 0);
        assert_eq!(blend(a, b, 0.0), a);
        assert_eq!(blend(a, b, 1.0), b);
        assert_eq!(blend(a, b, 0.5), Color::Rgb(100, 100, 100));
    }
}
