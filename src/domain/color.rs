use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FALLBACK_BACKGROUND: &str = "#64748b";
pub const TEXT_DARK: &str = "#000000";
pub const TEXT_LIGHT: &str = "#ffffff";

const DEFAULT_PALETTE: &[(&str, &str)] = &[
    ("blue", "#3b82f6"),
    ("default", FALLBACK_BACKGROUND),
    ("green", "#22c55e"),
    ("orange", "#f97316"),
    ("pink", "#ec4899"),
    ("purple", "#8b5cf6"),
    ("red", "#ef4444"),
    ("teal", "#14b8a6"),
    ("yellow", "#eab308"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaletteEntry {
    pub background: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Palette {
    pub entries: BTreeMap<String, PaletteEntry>,
}

impl Default for Palette {
    fn default() -> Self {
        let entries = DEFAULT_PALETTE
            .iter()
            .map(|(name, background)| {
                let entry = PaletteEntry {
                    background: (*background).to_string(),
                    text: contrasting_text_color(background).to_string(),
                };
                ((*name).to_string(), entry)
            })
            .collect();
        Palette { entries }
    }
}

impl Palette {
    pub fn resolve(&self, name: &str) -> PaletteEntry {
        if let Some(entry) = self.entries.get(name.trim()) {
            return entry.clone();
        }
        if let Some(entry) = self.entries.get("default") {
            return entry.clone();
        }
        PaletteEntry {
            background: FALLBACK_BACKGROUND.to_string(),
            text: contrasting_text_color(FALLBACK_BACKGROUND).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedColor {
    pub background: String,
    pub text: String,
}

pub fn is_hex_color(value: &str) -> bool {
    parse_hex_rgb(value).is_some()
}

// Malformed input falls back to dark text rather than failing the render.
pub fn contrasting_text_color(value: &str) -> &'static str {
    let Some((red, green, blue)) = parse_hex_rgb(value) else {
        return TEXT_DARK;
    };
    let luminance = 0.299 * f64::from(red) + 0.587 * f64::from(green) + 0.114 * f64::from(blue);
    if luminance >= 128.0 { TEXT_DARK } else { TEXT_LIGHT }
}

pub fn resolve_block_color(value: &str, palette: &Palette) -> ResolvedColor {
    let trimmed = value.trim();
    if is_hex_color(trimmed) {
        return ResolvedColor {
            background: trimmed.to_string(),
            text: contrasting_text_color(trimmed).to_string(),
        };
    }
    let entry = palette.resolve(trimmed);
    ResolvedColor {
        background: entry.background,
        text: entry.text,
    }
}

fn parse_hex_rgb(value: &str) -> Option<(u8, u8, u8)> {
    let digits = value.strip_prefix('#')?;
    // The length match and byte slicing below are only sound over ASCII hex.
    if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        3 => {
            let mut channels = digits
                .chars()
                .map(|digit| digit.to_digit(16).map(|value| (value * 17) as u8));
            let red = channels.next()??;
            let green = channels.next()??;
            let blue = channels.next()??;
            Some((red, green, blue))
        }
        6 => {
            let red = u8::from_str_radix(&digits[0..2], 16).ok()?;
            let green = u8::from_str_radix(&digits[2..4], 16).ok()?;
            let blue = u8::from_str_radix(&digits[4..6], 16).ok()?;
            Some((red, green, blue))
        }
        _ => None,
    }
}
