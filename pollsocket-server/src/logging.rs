//! Logging utilities for the WebSocket server
//!
//! The macros forward to `tracing` when the `logging` feature is enabled and
//! fall back to stderr otherwise. Each expands to a single block, so it can
//! stand in statement or match-arm position.

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        tracing::error!($($arg)*);
        #[cfg(not(feature = "logging"))]
        eprintln!("[ERROR] {}", format!($($arg)*));
    }};
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        tracing::warn!($($arg)*);
        #[cfg(not(feature = "logging"))]
        eprintln!("[WARN] {}", format!($($arg)*));
    }};
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        tracing::info!($($arg)*);
        #[cfg(not(feature = "logging"))]
        eprintln!("[INFO] {}", format!($($arg)*));
    }};
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        tracing::debug!($($arg)*);
        #[cfg(not(feature = "logging"))]
        let _ = format_args!($($arg)*);
    }};
}

/// Log a trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "logging")]
        tracing::trace!($($arg)*);
        #[cfg(not(feature = "logging"))]
        let _ = format_args!($($arg)*);
    }};
}

/// Initialize logging subsystem
///
/// Reads the filter from `RUST_LOG`, defaulting to `info`. Calling it twice
/// is harmless: the second registration is ignored.
#[cfg(feature = "logging")]
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    Ok(())
}

/// Initialize logging subsystem (no-op when logging feature is disabled)
#[cfg(not(feature = "logging"))]
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_macros() {
        let peer = "127.0.0.1:9000";
        crate::log_info!("accepted {}", peer);
        crate::log_warn!("slow peer {}", peer);
        crate::log_debug!("idle tick");
        crate::log_trace!("frame from {}", peer);
    }

    #[test]
    fn test_logging_macros_in_match_arms() {
        let outcomes: [Result<usize, &str>; 2] = [Ok(3), Err("refused")];
        for outcome in outcomes {
            match outcome {
                Ok(key) => crate::log_debug!("accepted connection {}", key),
                Err(e) => crate::log_warn!("failed to register connection: {}", e),
            }
        }
    }

    #[test]
    fn test_init_logging_twice() {
        assert!(init_logging().is_ok());
        assert!(init_logging().is_ok());
    }
}
