//! Key codes delivered by [`Lab::input_key`](crate::Lab::input_key).
//!
//! Printable keys are reported as their character code. Non-printable keys
//! use the Windows virtual-key code shifted left by 8 bits, which keeps them
//! out of the ASCII range.

use std::fmt;

/// A key press as seen by the application thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Key(pub u32);

impl Key {
    /// Empty-queue sentinel
    pub const NONE: Key = Key(0);

    pub const ENTER: Key = Key(0x0D00);
    pub const ESC: Key = Key(0x1B00);
    pub const BACK: Key = Key(0x0800);
    pub const TAB: Key = Key(0x0900);
    pub const PAGE_UP: Key = Key(0x2100);
    pub const PAGE_DOWN: Key = Key(0x2200);
    pub const LEFT: Key = Key(0x2500);
    pub const UP: Key = Key(0x2600);
    pub const RIGHT: Key = Key(0x2700);
    pub const DOWN: Key = Key(0x2800);

    /// Map a virtual-key code to a key, if it is one of the non-printable
    /// keys the library reports
    pub fn from_virtual(code: u16) -> Option<Key> {
        match code {
            vk::RETURN | vk::ESCAPE | vk::BACK | vk::TAB | vk::PRIOR | vk::NEXT
            | vk::LEFT | vk::UP | vk::RIGHT | vk::DOWN => Some(Key((code as u32) << 8)),
            _ => None,
        }
    }

    /// Map a translated character, rejecting control characters (those keys
    /// arrive through [`Key::from_virtual`]) and characters whose code is
    /// taken by a virtual key, such as U+2500 and [`Key::LEFT`]
    pub fn from_char(code: u32) -> Option<Key> {
        match char::from_u32(code) {
            Some(c) if !c.is_control() && !Key(code).is_virtual() => Some(Key(code)),
            _ => None,
        }
    }

    pub fn is_none(self) -> bool {
        self == Key::NONE
    }

    pub fn is_virtual(self) -> bool {
        self.0 & 0xFF == 0 && Key::from_virtual((self.0 >> 8) as u16) == Some(self)
    }

    /// The character for printable keys
    pub fn as_char(self) -> Option<char> {
        if self.is_virtual() {
            None
        } else {
            char::from_u32(self.0).filter(|c| !c.is_control())
        }
    }

    pub fn code(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Key::NONE => "<none>",
            Key::ENTER => "Enter",
            Key::ESC => "Esc",
            Key::BACK => "Backspace",
            Key::TAB => "Tab",
            Key::PAGE_UP => "PageUp",
            Key::PAGE_DOWN => "PageDown",
            Key::LEFT => "Left",
            Key::UP => "Up",
            Key::RIGHT => "Right",
            Key::DOWN => "Down",
            other => {
                return match other.as_char() {
                    Some(c) => write!(f, "{}", c),
                    None => write!(f, "0x{:04X}", other.0),
                }
            }
        };
        f.write_str(name)
    }
}

/// Windows virtual-key codes used by the backends
pub mod vk {
    pub const BACK: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const RETURN: u16 = 0x0D;
    pub const ESCAPE: u16 = 0x1B;
    pub const PRIOR: u16 = 0x21;
    pub const NEXT: u16 = 0x22;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_codes() {
        assert_eq!(Key::from_virtual(vk::RETURN), Some(Key::ENTER));
        assert_eq!(Key::from_virtual(vk::ESCAPE), Some(Key::ESC));
        assert_eq!(Key::from_virtual(vk::NEXT), Some(Key::PAGE_DOWN));
        assert_eq!(Key::from_virtual(vk::DOWN), Some(Key::DOWN));
        // Shift, F1 and letters are not reported as virtual keys
        assert_eq!(Key::from_virtual(0x10), None);
        assert_eq!(Key::from_virtual(0x70), None);
        assert_eq!(Key::from_virtual(0x41), None);
    }

    #[test]
    fn test_virtual_disjoint_from_ascii() {
        for k in [Key::ENTER, Key::ESC, Key::BACK, Key::TAB, Key::LEFT, Key::DOWN] {
            assert!(k.0 > 0x7F);
            assert!(k.is_virtual());
            assert_eq!(k.as_char(), None);
        }
    }

    #[test]
    fn test_chars() {
        assert_eq!(Key::from_char('a' as u32), Some(Key(0x61)));
        assert_eq!(Key::from_char(' ' as u32), Some(Key(0x20)));
        assert_eq!(Key::from_char('ж' as u32).and_then(Key::as_char), Some('ж'));
        // Enter and Esc as characters are left to the key-down path
        assert_eq!(Key::from_char(0x0D), None);
        assert_eq!(Key::from_char(0x1B), None);
        assert_eq!(Key::from_char(0x7F), None);
    }

    #[test]
    fn test_chars_never_alias_virtual_keys() {
        assert_eq!(Key::from_char(0x2500), None);
        assert_eq!(Key::from_char(0x2200), None);
        assert_eq!(Key::from_char(0x0D00), None);
        assert_eq!(Key::from_char(0x0800), None);
        // Neighbours of a virtual code are ordinary characters
        assert_eq!(Key::from_char(0x2501), Some(Key(0x2501)));
        assert_eq!(Key::from_char(0x2300), Some(Key(0x2300)));

        for code in 0x20..0x3_0000u32 {
            if let Some(key) = Key::from_char(code) {
                assert!(!key.is_virtual(), "U+{:04X} aliases {}", code, key);
                assert!(key.as_char().is_some());
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::ENTER.to_string(), "Enter");
        assert_eq!(Key('q' as u32).to_string(), "q");
        assert_eq!(Key::NONE.to_string(), "<none>");
    }
}
