//! Kernel-side logging.
//!
//! The core owns no physical console -- that's an external collaborator
//! (spec.md §1) -- but several spec'd conditions are explicitly "a warning,
//! not an error" (waking an already-RUNNABLE process, a timer firing with
//! `wait_state == 0`, ...), and those need to go *somewhere*. This mirrors
//! the teacher's `print!`/`println!`-over-a-trait-object setup
//! (`src/printf.rs`, `src/console.rs`), but as a pluggable sink rather than
//! a fixed UART, since the boot collaborator is the one that knows where
//! kernel messages should land.

use core::fmt;
use spin::Once;

pub trait Logger: Sync {
    fn log(&self, args: fmt::Arguments<'_>);
}

struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _args: fmt::Arguments<'_>) {}
}

#[cfg(test)]
struct StderrLogger;

#[cfg(test)]
impl Logger for StderrLogger {
    fn log(&self, args: fmt::Arguments<'_>) {
        std::eprintln!("{}", args);
    }
}

static LOGGER: Once<&'static (dyn Logger + Sync)> = Once::new();

/// Installs the kernel-wide logger. Called once by the boot collaborator
/// (or, under `cfg(test)`, implicitly defaulted to stderr).
pub fn init(logger: &'static (dyn Logger + Sync)) {
    LOGGER.call_once(|| logger);
}

#[doc(hidden)]
pub fn dispatch(args: fmt::Arguments<'_>) {
    #[cfg(test)]
    {
        LOGGER.call_once(|| &StderrLogger);
    }
    #[cfg(not(test))]
    {
        LOGGER.call_once(|| &NullLogger);
    }
    (*LOGGER.get().expect("klog::init race")).log(args);
}

/// Logs a kernel warning: a condition spec.md calls out as non-fatal
/// (e.g. "Waking an already-runnable process is a warning, not an error").
#[macro_export]
macro_rules! kwarn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => (
        $crate::klog::dispatch(format_args!(concat!("[warn] ", $fmt) $(, $arg)*))
    );
}

/// Logs an informational kernel message.
#[macro_export]
macro_rules! kinfo {
    ($fmt:literal $(, $arg:expr)* $(,)?) => (
        $crate::klog::dispatch(format_args!(concat!("[info] ", $fmt) $(, $arg)*))
    );
}

/// Reports a fatal kernel condition (spec.md §7) and halts.
///
/// On real hardware this unwinds into the boot collaborator's
/// `#[panic_handler]`; under `cfg(test)` it's a regular Rust panic that the
/// test harness catches.
#[macro_export]
macro_rules! kpanic {
    ($($arg:tt)*) => (::core::panic!($($arg)*));
}
