//! ANSI escape handling for captured output

use std::iter::Peekable;

const ESC: char = '\x1b';
const BEL: char = '\x07';

/// Strip ANSI/VT escape sequences from output.
///
/// Removes CSI sequences (`ESC [ … final`) and control strings (OSC, DCS, SOS,
/// PM and APC, ended by BEL or `ESC \`). `ESC` followed by intermediate bytes
/// (0x20–0x2F) and a final byte is removed whole, as are the two-byte escapes
/// `ESC` 0x30–0x7E. An ESC that starts none of these is dropped by itself, so
/// the result never contains ESC and stripping twice changes nothing.
pub fn strip_ansi_escapes(s: &str) -> String {
    if !s.contains(ESC) {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != ESC {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('[') => {
                chars.next();
                // Parameter and intermediate bytes (0x20–0x3F)
                skip_while_in(&mut chars, 0x20, 0x3F);
                // Final byte (0x40–0x7E)
                skip_one_in(&mut chars, 0x40, 0x7E);
            }
            Some(']' | 'P' | 'X' | '^' | '_') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == BEL {
                        break;
                    }
                    if c == ESC && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            Some(&next) if in_range(next, 0x20, 0x2F) => {
                // Charset designation and other nF escapes: `ESC ( B`
                skip_while_in(&mut chars, 0x20, 0x2F);
                skip_one_in(&mut chars, 0x30, 0x7E);
            }
            Some(&next) if in_range(next, 0x30, 0x7E) => {
                chars.next();
            }
            _ => {}
        }
    }
    result
}

fn in_range(c: char, low: u8, high: u8) -> bool {
    c.is_ascii() && (low..=high).contains(&(c as u8))
}

fn skip_while_in<I: Iterator<Item = char>>(chars: &mut Peekable<I>, low: u8, high: u8) {
    while chars.next_if(|&c| in_range(c, low, high)).is_some() {}
}

fn skip_one_in<I: Iterator<Item = char>>(chars: &mut Peekable<I>, low: u8, high: u8) {
    chars.next_if(|&c| in_range(c, low, high));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_colors() {
        let input = "\x1b[32mHello\x1b[0m World\r\n";
        assert_eq!(strip_ansi_escapes(input), "Hello World\r\n");
    }

    #[test]
    fn test_strip_cursor_movement() {
        let input = "\x1b[2J\x1b[1;1Htop\x1b[K\x1b[?25l";
        assert_eq!(strip_ansi_escapes(input), "top");
    }

    #[test]
    fn test_strip_osc_title() {
        let input = "\x1b]0;my title\x07prompt$ \x1b]8;;http://x\x1b\\link";
        assert_eq!(strip_ansi_escapes(input), "prompt$ link");
    }

    #[test]
    fn test_strip_two_byte_escape() {
        assert_eq!(strip_ansi_escapes("a\x1bMb\x1b7c\x1b8d"), "abcd");
    }

    #[test]
    fn test_strip_charset_designation() {
        assert_eq!(strip_ansi_escapes("\x1b(Babc\x1b)0def\x1b#8"), "abcdef");
        // `tput sgr0` on xterm
        assert_eq!(strip_ansi_escapes("red\x1b(B\x1b[m\n"), "red\n");
    }

    #[test]
    fn test_strip_keypad_and_reset() {
        assert_eq!(strip_ansi_escapes("\x1b=x\x1b>y\x1bcz"), "xyz");
    }

    #[test]
    fn test_strip_control_strings() {
        assert_eq!(strip_ansi_escapes("a\x1bP1$r0m\x1b\\b"), "ab");
        assert_eq!(strip_ansi_escapes("a\x1bXsos\x1b\\b"), "ab");
        assert_eq!(strip_ansi_escapes("a\x1b^pm\x07b"), "ab");
        assert_eq!(strip_ansi_escapes("a\x1b_Gf=100;data\x1b\\b"), "ab");
    }

    #[test]
    fn test_strip_mixed_sequences() {
        let input = "\x1b[1mbold\x1b(B\x1b[m \x1b=x\x1b> \x1bcreset\n";
        assert_eq!(strip_ansi_escapes(input), "bold x reset\n");
    }

    #[test]
    fn test_plain_text_unchanged() {
        let input = "no escapes here\tat all é";
        assert_eq!(strip_ansi_escapes(input), input);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "\x1b\x1b[31m[0m",
            "\x1b[1;31mred\x1b[0m",
            "trailing\x1b",
            "\x1b[",
            "\x1b(",
            "\x1bPunterminated",
            "\x1b\x1b(B\x1b\x1bc",
        ];
        for input in inputs {
            let once = strip_ansi_escapes(input);
            assert!(!once.contains('\x1b'), "input: {:?}", input);
            assert_eq!(strip_ansi_escapes(&once), once);
        }
    }
}
