use std::fmt;
use std::num::NonZeroU8;

const READABLE: u8 = 0b0001;
const WRITABLE: u8 = 0b0010;

/// Interest used in registering a descriptor with the readiness
/// [`Selector`](crate::sys::Selector).
///
/// Interests are backed by a `NonZeroU8` so that `Option<Interest>` is free.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Interest(NonZeroU8);

impl Interest {
    /// Readability interest.
    pub const READABLE: Interest = Interest(unsafe { NonZeroU8::new_unchecked(READABLE) });
    /// Writability interest.
    pub const WRITABLE: Interest = Interest(unsafe { NonZeroU8::new_unchecked(WRITABLE) });

    /// Add `other` to `self`, returning a new `Interest`.
    pub const fn add(self, other: Interest) -> Interest {
        Interest(unsafe { NonZeroU8::new_unchecked(self.0.get() | other.0.get()) })
    }

    /// Remove `other` from `self`. Returns `None` if the result would be empty.
    pub fn remove(self, other: Interest) -> Option<Interest> {
        NonZeroU8::new(self.0.get() & !other.0.get()).map(Interest)
    }

    /// True if this interest includes readability.
    pub const fn is_readable(self) -> bool {
        self.0.get() & READABLE != 0
    }

    /// True if this interest includes writability.
    pub const fn is_writable(self) -> bool {
        self.0.get() & WRITABLE != 0
    }

}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if self.is_readable() {
            write!(f, "READABLE")?;
            first = false;
        }
        if self.is_writable() {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "WRITABLE")?;
        }
        Ok(())
    }
}
