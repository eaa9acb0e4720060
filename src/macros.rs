//! Small macros shared across the crate.

/// Defines `syscall!(fn(args...))`, which calls a raw OS function and turns a
/// `-1` return into `Err(io::Error::last_os_error())`, capturing the OS error
/// immediately after the call rather than leaving it to be (possibly
/// incorrectly) re-read later.
macro_rules! syscall {
    ($fn:ident ( $($arg:expr),* $(,)* ) ) => {{
        #[allow(unused_unsafe)]
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

pub(crate) use syscall;

/// `trace!` that compiles to nothing when the `log` feature is disabled, so
/// call sites never need their own `#[cfg(feature = "log")]`.
macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
    };
}

/// `debug!`, see [`trace!`].
macro_rules! debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::debug!($($arg)*);
    };
}

/// `warn!`, see [`trace!`].
macro_rules! warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::warn!($($arg)*);
    };
}

pub(crate) use debug;
pub(crate) use trace;
pub(crate) use warn;
