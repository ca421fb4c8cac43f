//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Fruit palette and UI colours, optionally loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Fruit colours (index 0..=5): apple, banana, watermelon, grape,
    /// orange, strawberry.
    pub fruit: [Color; 6],
    /// Playfield background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, level).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Lives hearts.
    pub heart: Color,
    /// Collector body.
    pub collector: Color,
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
        Self::orchard_default()
    }
}

impl Theme {
    /// Hardcoded defaults: fruit hexes from the classic web palette, UI
    /// chrome from One Dark.
    pub fn orchard_default() -> Self {
        Self {
            fruit: [
                parse_hex("#FF6B6B").unwrap(), // apple
                parse_hex("#FFD166").unwrap(), // banana
                parse_hex("#06D6A0").unwrap(), // watermelon
                parse_hex("#118AB2").unwrap(), // grape
                parse_hex("#FF9A3C").unwrap(), // orange
                parse_hex("#FF477E").unwrap(), // strawberry
            ],
            bg: parse_hex("#31353F").unwrap(),
            div_line: parse_hex("#3F444F").unwrap(),
            main_fg: parse_hex("#ABB2BF").unwrap(),
            title: parse_hex("#E5C07B").unwrap(),
            heart: parse_hex("#E06C75").unwrap(),
            collector: parse_hex("#FF8C00").unwrap(),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or
    /// `theme[key]='value'`. Falls back to defaults if path is None or the
    /// file is missing; `palette` selects the colour variant.
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
        let mut t = Self::orchard_default();
        t.apply_palette(palette);
        t
    }

    /// Override fruit colours for high-contrast or colorblind variants.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.fruit = [
                    parse_hex("#FF0000").unwrap(), // red
                    parse_hex("#FFFF00").unwrap(), // yellow
                    parse_hex("#00FF00").unwrap(), // bright green
                    parse_hex("#0088FF").unwrap(), // blue
                    parse_hex("#FF8800").unwrap(), // orange
                    parse_hex("#FF00FF").unwrap(), // magenta
                ];
            }
            crate::Palette::Colorblind => {
                // Colorblind-friendly: avoid red/green alone
                self.fruit = [
                    parse_hex("#CC3311").unwrap(), // red (distinct from blue/orange)
                    parse_hex("#BBBB00").unwrap(), // yellow
                    parse_hex("#009988").unwrap(), // teal
                    parse_hex("#0077BB").unwrap(), // blue
                    parse_hex("#EE7733").unwrap(), // orange
                    parse_hex("#EE3377").unwrap(), // magenta
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let defaults = Self::orchard_default();
        Self {
            fruit: [
                get("fruit_apple").unwrap_or(defaults.fruit[0]),
                get("fruit_banana").unwrap_or(defaults.fruit[1]),
                get("fruit_watermelon").unwrap_or(defaults.fruit[2]),
                get("fruit_grape").unwrap_or(defaults.fruit[3]),
                get("fruit_orange").unwrap_or(defaults.fruit[4]),
                get("fruit_strawberry").unwrap_or(defaults.fruit[5]),
            ],
            bg: get("meter_bg").unwrap_or(defaults.bg),
            div_line: get("div_line").unwrap_or(defaults.div_line),
            main_fg: get("main_fg").unwrap_or(defaults.main_fg),
            title: get("title").unwrap_or(defaults.title),
            heart: get("cpu_end").or_else(|| get("temp_end")).unwrap_or(defaults.heart),
            collector: get("hi_fg").unwrap_or(defaults.collector),
        }
    }

    /// Fruit colour for kind index (0..6).
    #[inline]
    pub fn fruit_color(&self, index: u8) -> Color {
        self.fruit[(index as usize) % 6]
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
        if let Some(stripped) = line.strip_prefix("theme[") {
            if let Some(end) = stripped.find(']') {
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
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let (r, g, b) = if s.len() == 6 {
        let r =
            u8::from_str_radix(&s[0..2], 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))?;
        let g =
            u8::from_str_radix(&s[2..4], 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))?;
        let b =
            u8::from_str_radix(&s[4..6], 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))?;
        (r, g, b)
    } else if s.len() == 3 {
        let r = u8::from_str_radix(&s[0..1], 16)
            .map_err(|_| ThemeError::InvalidHex(s.to_string()))?
            * 17;
        let g = u8::from_str_radix(&s[1..2], 16)
            .map_err(|_| ThemeError::InvalidHex(s.to_string()))?
            * 17;
        let b = u8::from_str_radix(&s[2..3], 16)
            .map_err(|_| ThemeError::InvalidHex(s.to_string()))?
            * 17;
        (r, g, b)
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
        let c = parse_hex("#FF6B6B").unwrap();
        assert!(matches!(c, Color::Rgb(0xFF, 0x6B, 0x6B)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GGHHII").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[fruit_apple]="#FF6B6B""##);
        assert_eq!(map.get("fruit_apple"), Some(&"#FF6B6B".to_string()));
    }

    #[test]
    fn test_fruit_color_wraps() {
        let t = Theme::default();
        assert_eq!(t.fruit_color(0), t.fruit_color(6));
    }
}
