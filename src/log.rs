//! Print macros for logging.
//!
//! The teacher's version of this module writes straight to `sbi_rt::console_write` (an SBI
//! legacy console call), which assumes this crate owns the actual console. As a library with no
//! boot glue of its own (SPEC_FULL.md §1), logging instead goes through whatever
//! [`crate::platform::Platform`] the caller is currently holding, the same seam every other
//! ambient collaborator (allocation, isolation, host memory access) goes through.

use core::fmt::{self, Write};

use crate::platform::Platform;

/// Adapts a `&mut dyn Platform` to `core::fmt::Write` so `format_args!` can be written through
/// [`Platform::log_write`] one `write_str` call at a time.
struct PlatformWriter<'a> {
    platform: &'a mut dyn Platform,
}

impl core::fmt::Write for PlatformWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.platform.log_write(s);
        Ok(())
    }
}

/// Entry point the `print!`/`println!` macros expand to.
pub fn print_for_macro(platform: &mut dyn Platform, args: fmt::Arguments) {
    let mut writer = PlatformWriter { platform };
    // A dropped log line is not a supervisor error; best effort only.
    let _ = writer.write_fmt(args);
}

/// Print to the given platform's log sink.
#[macro_export]
macro_rules! print {
    ($platform:expr, $($arg:tt)*) => ($crate::log::print_for_macro($platform, format_args!($($arg)*)));
}

/// Print with a trailing linebreak to the given platform's log sink.
#[macro_export]
macro_rules! println {
    ($platform:expr, $fmt:expr) => ($crate::print!($platform, concat!($fmt, "\n")));
    ($platform:expr, $fmt:expr, $($arg:tt)*) => ($crate::print!($platform, concat!($fmt, "\n"), $($arg)*));
}
