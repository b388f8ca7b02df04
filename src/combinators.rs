//! Parser combinators.
//!
//! A [`Parser<T>`] wraps a reusable, cheaply-cloneable `Cursor -> Option<(T, Cursor)>` function.
//! `None` is the ordinary "this did not match" sentinel; it is not an error and carries no
//! message. [`error`] produces the other kind of failure - a [`Fatal`] that aborts the whole
//! parse instead of letting an enclosing [`Parser::or`] backtrack past it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cursor::Cursor;

/// A successful parse: the produced value and the cursor advanced past it.
pub type ParseResult<T> = Option<(T, Cursor)>;

/// Raised by [`error`]. Distinct from the `None` sentinel used for ordinary backtracking:
/// `or` propagates a `Fatal` from its first alternative immediately rather than trying the
/// second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fatal(pub String);

impl std::fmt::Display for Fatal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Fatal {}

#[derive(Clone)]
pub struct Parser<T> {
    run: Rc<dyn Fn(Cursor) -> Result<ParseResult<T>, Fatal>>,
}

impl<T: 'static> Parser<T> {
    pub fn new(run: impl Fn(Cursor) -> Result<ParseResult<T>, Fatal> + 'static) -> Self {
        Parser { run: Rc::new(run) }
    }

    pub fn parse(&self, cursor: Cursor) -> Result<ParseResult<T>, Fatal> {
        (self.run)(cursor)
    }

    /// Ordered choice: try `self`; on no-match, try `other` from the same starting cursor. A
    /// fatal failure from `self` is not caught here.
    pub fn or(&self, other: Parser<T>) -> Parser<T> {
        let first = self.clone();
        Parser::new(move |cursor: Cursor| match first.parse(cursor.clone())? {
            Some(result) => Ok(Some(result)),
            None => other.parse(cursor),
        })
    }

    /// Runs `self`, then passes its value to `f`, which builds the parser to continue with from
    /// `self`'s advanced cursor.
    pub fn bind<U: 'static>(&self, f: impl Fn(T) -> Parser<U> + 'static) -> Parser<U> {
        let first = self.clone();
        Parser::new(move |cursor| match first.parse(cursor)? {
            Some((value, rest)) => f(value).parse(rest),
            None => Ok(None),
        })
    }

    /// Runs `self`, discards its value, then runs `other`.
    pub fn and<U: 'static>(&self, other: Parser<U>) -> Parser<U> {
        self.bind(move |_| other.clone())
    }

    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> Parser<U> {
        self.bind(move |value| constant(f(value)))
    }

    /// Like [`Parser::map`], but `f` may itself fail the whole parse (used for literals that
    /// parse out of range, e.g. an integer literal that overflows `i32`).
    pub fn try_map<U: 'static>(&self, f: impl Fn(T) -> Result<U, String> + 'static) -> Parser<U> {
        self.bind(move |value| match f(value) {
            Ok(value) => constant(value),
            Err(message) => error(message),
        })
    }
}

/// Consumes nothing, always yields `value`.
pub fn constant<T: Clone + 'static>(value: T) -> Parser<T> {
    Parser::new(move |cursor| Ok(Some((value.clone(), cursor))))
}

/// Fails the entire parse with `message`, bypassing ordinary `or` backtracking. Used both as a
/// genuine "this cannot be recovered from" combinator and as the body of an unpatched
/// [`placeholder`].
pub fn error<T: 'static>(message: impl Into<String>) -> Parser<T> {
    let message = message.into();
    Parser::new(move |_cursor| Err(Fatal(message.clone())))
}

/// `parser.or(constant(None))`, with the success case wrapped in `Some`. Always succeeds.
pub fn maybe<T: Clone + 'static>(parser: Parser<T>) -> Parser<Option<T>> {
    parser.map(Some).or(constant(None))
}

/// Greedily applies `parser` until it stops matching, yielding the accumulated list. Always
/// succeeds, possibly with an empty list. A fatal failure from `parser` aborts the loop (and the
/// whole parse) rather than being treated as "stop repeating".
pub fn zero_or_more<T: 'static>(parser: Parser<T>) -> Parser<Vec<T>> {
    Parser::new(move |mut cursor: Cursor| {
        let mut items = Vec::new();
        loop {
            match parser.parse(cursor.clone())? {
                Some((value, rest)) => {
                    items.push(value);
                    cursor = rest;
                }
                None => break,
            }
        }
        Ok(Some((items, cursor)))
    })
}

/// Pairs two parsers in sequence, keeping both values. A thin ergonomic layer over `bind` -
/// plain `and` is enough when one side's value is uninteresting (e.g. a keyword or a piece of
/// punctuation), but grammar rules frequently need to keep several values alive at once.
pub fn seq2<A: Clone + 'static, B: 'static>(a: Parser<A>, b: Parser<B>) -> Parser<(A, B)> {
    a.bind(move |a_val: A| {
        let b = b.clone();
        b.map(move |b_val| (a_val.clone(), b_val))
    })
}

pub fn seq3<A: Clone + 'static, B: Clone + 'static, C: 'static>(
    a: Parser<A>,
    b: Parser<B>,
    c: Parser<C>,
) -> Parser<(A, B, C)> {
    seq2(seq2(a, b), c).map(|((a, b), c)| (a, b, c))
}

pub fn seq4<A: Clone + 'static, B: Clone + 'static, C: Clone + 'static, D: 'static>(
    a: Parser<A>,
    b: Parser<B>,
    c: Parser<C>,
    d: Parser<D>,
) -> Parser<(A, B, C, D)> {
    seq2(seq3(a, b, c), d).map(|((a, b, c), d)| (a, b, c, d))
}

pub fn seq5<
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
    D: Clone + 'static,
    E: 'static,
>(
    a: Parser<A>,
    b: Parser<B>,
    c: Parser<C>,
    d: Parser<D>,
    e: Parser<E>,
) -> Parser<(A, B, C, D, E)> {
    seq2(seq4(a, b, c, d), e).map(|((a, b, c, d), e)| (a, b, c, d, e))
}

/// Zero-or-more `item`s separated by `separator` (no trailing separator), as used for call
/// argument lists and parameter lists. Always succeeds, possibly with an empty list.
pub fn separated_list<T: Clone + 'static>(
    item: Parser<T>,
    separator: Parser<()>,
) -> Parser<Vec<T>> {
    let tail = zero_or_more(separator.and(item.clone()));
    let head_and_tail = item.bind(move |first| {
        tail.clone().map(move |rest| {
            let mut all = vec![first.clone()];
            all.extend(rest);
            all
        })
    });
    maybe(head_and_tail).map(|opt| opt.unwrap_or_default())
}

/// Creates a forward-referenced parser together with a setter that patches its real
/// implementation exactly once. Used for grammar rules (`expression`, `statement`, `type`) that
/// are mutually recursive with rules defined after them. Patching twice is a programmer error.
pub fn placeholder<T: 'static>() -> (Parser<T>, impl Fn(Parser<T>)) {
    let slot: Rc<RefCell<Option<Parser<T>>>> = Rc::new(RefCell::new(None));

    let slot_for_run = slot.clone();
    let parser = Parser::new(move |cursor| match slot_for_run.borrow().as_ref() {
        Some(inner) => inner.parse(cursor),
        None => Err(Fatal("forward-referenced parser was never patched".into())),
    });

    let patch = move |real: Parser<T>| {
        let mut slot = slot.borrow_mut();
        assert!(
            slot.is_none(),
            "placeholder parser patched more than once"
        );
        *slot = Some(real);
    };

    (parser, patch)
}
