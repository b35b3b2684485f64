//! Pen colors: the 16-entry named palette plus arbitrary RGB.

use serde::{Deserialize, Serialize};

/// Named palette entries, in console color order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Palette {
    Black = 0,
    DarkBlue = 1,
    DarkGreen = 2,
    DarkCyan = 3,
    DarkRed = 4,
    DarkMagenta = 5,
    Brown = 6,
    LightGrey = 7,
    DarkGrey = 8,
    Blue = 9,
    Green = 10,
    Cyan = 11,
    Red = 12,
    Magenta = 13,
    Yellow = 14,
    White = 15,
}

/// `0x00RRGGBB` values for each palette entry
const PALETTE_RGB: [u32; 16] = [
    0x000000, 0x000080, 0x008000, 0x008080, 0x800000, 0x800080, 0x808000, 0xC0C0C0,
    0x808080, 0x0000FF, 0x00FF00, 0x00FFFF, 0xFF0000, 0xFF00FF, 0xFFFF00, 0xFFFFFF,
];

impl Palette {
    pub const ALL: [Palette; 16] = [
        Palette::Black,
        Palette::DarkBlue,
        Palette::DarkGreen,
        Palette::DarkCyan,
        Palette::DarkRed,
        Palette::DarkMagenta,
        Palette::Brown,
        Palette::LightGrey,
        Palette::DarkGrey,
        Palette::Blue,
        Palette::Green,
        Palette::Cyan,
        Palette::Red,
        Palette::Magenta,
        Palette::Yellow,
        Palette::White,
    ];

    pub fn from_index(index: u8) -> Option<Palette> {
        Palette::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn rgb(self) -> u32 {
        PALETTE_RGB[self as usize]
    }
}

/// Current pen: either a named palette entry or a custom RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Palette(Palette),
    Rgb(u8, u8, u8),
}

impl Color {
    /// Pixel value stored in the surface
    pub fn pixel(self) -> u32 {
        match self {
            Color::Palette(p) => p.rgb(),
            Color::Rgb(r, g, b) => rgb(r, g, b),
        }
    }

    /// The named entry, `None` when a custom RGB color is in effect
    pub fn palette(self) -> Option<Palette> {
        match self {
            Color::Palette(p) => Some(p),
            Color::Rgb(..) => None,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::Palette(Palette::White)
    }
}

impl From<Palette> for Color {
    fn from(p: Palette) -> Self {
        Color::Palette(p)
    }
}

pub const fn rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Split a surface pixel into its components
pub const fn split_rgb(pixel: u32) -> (u8, u8, u8) {
    ((pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_indices() {
        for (i, p) in Palette::ALL.iter().enumerate() {
            assert_eq!(p.index() as usize, i);
            assert_eq!(Palette::from_index(i as u8), Some(*p));
        }
        assert_eq!(Palette::from_index(16), None);
        assert_eq!(Palette::Red.rgb(), 0xFF0000);
        assert_eq!(Palette::Black.rgb(), 0);
        assert_eq!(Palette::White.rgb(), 0xFFFFFF);
    }

    #[test]
    fn test_custom_rgb_has_no_palette_entry() {
        assert_eq!(Color::Rgb(255, 0, 0).palette(), None);
        assert_eq!(Color::Rgb(255, 0, 0).pixel(), Palette::Red.rgb());
        assert_eq!(Color::from(Palette::Cyan).palette(), Some(Palette::Cyan));
    }

    #[test]
    fn test_split_rgb() {
        assert_eq!(split_rgb(rgb(0x12, 0x34, 0x56)), (0x12, 0x34, 0x56));
    }
}
