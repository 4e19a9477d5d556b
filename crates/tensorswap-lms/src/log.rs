//! Leveled diagnostics on top of `tracing`.
//!
//! Level 0 is always emitted as `info`; level 1 maps to `debug` and
//! anything deeper to `trace`, both only when the configuration enables
//! debugging at that level.

/// Emit a message at a diagnostic level, gated by `LmsConfig::log_enabled`.
macro_rules! lms_log {
    ($config:expr, $level:expr, $($arg:tt)+) => {{
        let lms_level: u8 = $level;
        if $config.log_enabled(lms_level) {
            match lms_level {
                0 => tracing::info!(lms_level, "[LMS] {}", format_args!($($arg)+)),
                1 => tracing::debug!(lms_level, "[LMS] {}", format_args!($($arg)+)),
                _ => tracing::trace!(lms_level, "[LMS] {}", format_args!($($arg)+)),
            }
        }
    }};
}

pub(crate) use lms_log;
