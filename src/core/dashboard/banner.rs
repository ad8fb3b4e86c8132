// Banner colour handling
use crate::core::dashboard::types::Banner;

/// Foreground used on dark banner backgrounds
pub const LIGHT_TEXT: &str = "#DDDDDD";
/// Foreground used on light banner backgrounds
pub const DARK_TEXT: &str = "#222222";

/// Parse `#RRGGBB` into its channels
pub fn parse_hex_colour(hex_colour: &str) -> Option<(u8, u8, u8)> {
    let digits = hex_colour.strip_prefix('#')?;
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Whether the banner needs light text: mean channel value below 127
///
/// Anything that is not a `#RRGGBB` colour keeps the dark text.
pub fn go_light(hex_colour: &str) -> bool {
    match parse_hex_colour(hex_colour) {
        Some((r, g, b)) => (u32::from(r) + u32::from(g) + u32::from(b)) / 3 < 127,
        None => false,
    }
}

/// Foreground colour for a banner background
pub fn text_colour_for(hex_colour: &str) -> &'static str {
    if go_light(hex_colour) {
        LIGHT_TEXT
    } else {
        DARK_TEXT
    }
}

impl Banner {
    pub fn new(heading: &str, colour: &str, version: Option<String>) -> Self {
        Self {
            heading: heading.to_string(),
            colour: colour.to_string(),
            text_colour: text_colour_for(colour),
            version,
        }
    }
}
