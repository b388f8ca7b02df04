//! The source cursor: an immutable `(text, byte index)` pair that parser combinators advance
//! as they match. Every match is anchored at the cursor's own index - nothing here ever
//! searches forward for a pattern.

use std::cell::Cell;
use std::rc::Rc;

use regex::Regex;

/// A 1-indexed line/column position into the original source, used to render parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    /// Locates the line/column of a byte index into `source` directly, without going through
    /// a [`Cursor`] - used to render a position recorded after the cursor that reached it is
    /// long gone (e.g. a parse error's furthest-failure index).
    pub fn locate(source: &str, index: usize) -> Span {
        let index = index.min(source.len());
        let mut line = 1;
        let mut col = 1;
        for ch in source[..index].chars() {
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        Span { line, col }
    }
}

/// A position in the source text. Cloning is cheap: the source is shared via `Rc<str>` and the
/// furthest-failure tracker (used for top-level parse error reporting) is shared too.
#[derive(Clone)]
pub struct Cursor {
    source: Rc<str>,
    index: usize,
    furthest: Rc<Cell<usize>>,
}

impl Cursor {
    pub fn new(source: impl Into<Rc<str>>) -> Self {
        Cursor {
            source: source.into(),
            index: 0,
            furthest: Rc::new(Cell::new(0)),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn at_end(&self) -> bool {
        self.index >= self.source.len()
    }

    pub fn span(&self) -> Span {
        Span::locate(&self.source, self.index)
    }

    /// The furthest index any match attempt from this cursor's lineage has reached, including
    /// failed ones. Used to build a useful "parse error at index N" message when no grammar
    /// alternative at the top level accounts for the remaining input.
    pub fn furthest(&self) -> usize {
        self.furthest.get().max(self.index)
    }

    pub fn furthest_span(&self) -> Span {
        Span::locate(&self.source, self.furthest())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Attempts an anchored match of `pattern` at the current index. `pattern` must already be
    /// compiled with a leading `^` so a match can only start here. On success, returns the
    /// matched text and a cursor advanced past it.
    pub fn matching(&self, pattern: &Regex) -> Option<(String, Cursor)> {
        let rest = &self.source[self.index..];
        match pattern.find(rest) {
            Some(m) => {
                let text = m.as_str().to_owned();
                let next = Cursor {
                    source: self.source.clone(),
                    index: self.index + m.end(),
                    furthest: self.furthest.clone(),
                };
                Some((text, next))
            }
            None => {
                if self.index > self.furthest.get() {
                    self.furthest.set(self.index);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(pattern: &str) -> Regex {
        Regex::new(&format!("^(?:{pattern})")).unwrap()
    }

    #[test]
    fn matches_at_cursor_start() {
        let cursor = Cursor::new("hello world");
        let (text, rest) = cursor.matching(&re("hello")).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(rest.index(), 5);
    }

    #[test]
    fn does_not_search_forward() {
        let cursor = Cursor::new("  hello");
        assert!(cursor.matching(&re("hello")).is_none());
    }

    #[test]
    fn tracks_furthest_failure() {
        let cursor = Cursor::new("abc");
        let (_, rest) = cursor.matching(&re("a")).unwrap();
        assert!(rest.matching(&re("z")).is_none());
        assert_eq!(rest.furthest(), 1);
    }

    #[test]
    fn span_counts_lines_and_columns() {
        let cursor = Cursor::new("ab\ncd");
        let (_, rest) = cursor.matching(&re("ab\\n")).unwrap();
        let span = rest.span();
        assert_eq!(span.line, 2);
        assert_eq!(span.col, 1);
    }
}
