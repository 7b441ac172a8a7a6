//! View models consumed by the board renderer.

/// What the display should show for one frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Screen<'a> {
    Text {
        primary: &'a str,
        secondary: &'a str,
    },
    Scrolling {
        text: &'a str,
        /// Milliseconds per pixel of horizontal travel.
        speed_ms: u16,
        elapsed_ms: u64,
    },
}

impl Screen<'_> {
    /// Horizontal travel of a scrolling screen, in pixels.
    pub fn scroll_offset_px(&self) -> u32 {
        match *self {
            Screen::Scrolling {
                speed_ms,
                elapsed_ms,
                ..
            } => (elapsed_ms / speed_ms.max(1) as u64) as u32,
            _ => 0,
        }
    }
}

/// Greedy word wrap into lines of at most `columns` characters.
///
/// Words longer than a line are split; `\n` forces a break.
#[derive(Clone, Debug)]
pub struct LineWrap<'a> {
    rest: &'a str,
    columns: usize,
}

impl<'a> LineWrap<'a> {
    pub fn new(text: &'a str, columns: usize) -> Self {
        Self {
            rest: text,
            columns: columns.max(1),
        }
    }
}

impl<'a> Iterator for LineWrap<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest.trim_start_matches(' ');
        if rest.is_empty() {
            self.rest = rest;
            return None;
        }

        let mut last_space = None;
        for (count, (index, ch)) in rest.char_indices().enumerate() {
            if ch == '\n' {
                self.rest = &rest[index + 1..];
                return Some(rest[..index].trim_end());
            }
            if count == self.columns {
                let split = if ch == ' ' {
                    index
                } else {
                    last_space.unwrap_or(index)
                };
                self.rest = &rest[split..];
                return Some(rest[..split].trim_end());
            }
            if ch == ' ' {
                last_space = Some(index);
            }
        }

        self.rest = "";
        Some(rest.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_offset_advances_one_pixel_per_period() {
        let frame = |elapsed_ms| Screen::Scrolling {
            text: "quote",
            speed_ms: 35,
            elapsed_ms,
        };
        assert_eq!(frame(0).scroll_offset_px(), 0);
        assert_eq!(frame(34).scroll_offset_px(), 0);
        assert_eq!(frame(35).scroll_offset_px(), 1);
        assert_eq!(frame(700).scroll_offset_px(), 20);
        let text = Screen::Text {
            primary: "quote",
            secondary: "",
        };
        assert_eq!(text.scroll_offset_px(), 0);
    }

    #[test]
    fn zero_speed_does_not_divide_by_zero() {
        let screen = Screen::Scrolling {
            text: "x",
            speed_ms: 0,
            elapsed_ms: 12,
        };
        assert_eq!(screen.scroll_offset_px(), 12);
    }

    fn wrap(text: &str, columns: usize) -> std::vec::Vec<&str> {
        LineWrap::new(text, columns).collect()
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap("Press 1 for a new one", 10), ["Press 1", "for a new", "one"]);
        assert_eq!(wrap("exactly ten", 11), ["exactly ten"]);
        assert_eq!(wrap("   ", 4), std::vec::Vec::<&str>::new());
    }

    #[test]
    fn splits_words_longer_than_a_line() {
        assert_eq!(wrap("abcdefghij kl", 4), ["abcd", "efgh", "ij", "kl"]);
    }

    #[test]
    fn honours_newlines_and_multibyte_text() {
        assert_eq!(wrap("one\ntwo three", 20), ["one", "two three"]);
        assert_eq!(wrap("\u{e9}t\u{e9} \u{e0} Paris", 5), ["\u{e9}t\u{e9} \u{e0}", "Paris"]);
    }
}
