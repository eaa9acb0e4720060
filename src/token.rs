use std::fmt;

/// An opaque value used to associate a descriptor registered with a
/// [`Selector`](crate::sys::Selector) or [`EventLoop`](crate::reactor::EventLoop)
/// with the handler that should process its readiness.
///
/// Tokens are plain `usize` wrappers; this crate never interprets their value,
/// it only carries them from registration to dispatch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub usize);

impl From<usize> for Token {
    fn from(val: usize) -> Token {
        Token(val)
    }
}

impl From<Token> for usize {
    fn from(val: Token) -> usize {
        val.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
