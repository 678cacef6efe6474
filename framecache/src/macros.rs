//! Custom macros for reducing code repetition in framecache

/// Lock a `std::sync::Mutex`, recovering the data if a previous holder
/// panicked
///
/// Every map guarded this way is left structurally valid by each critical
/// section, so a poisoned lock still holds usable state.
///
/// # Example
/// ```
/// use std::sync::Mutex;
/// let frames = Mutex::new(Vec::<u32>::new());
/// framecache::lock!(frames).push(1);
/// ```
#[macro_export]
macro_rules! lock {
    ($mutex:expr) => {
        $mutex
            .lock()
            .unwrap_or_else(::std::sync::PoisonError::into_inner)
    };
}

/// Log an error and continue execution (non-fatal error handling)
///
/// # Example
/// ```
/// fn flush() -> anyhow::Result<()> { Ok(()) }
/// framecache::log_and_continue!(flush(), "flush stats");
/// ```
#[macro_export]
macro_rules! log_and_continue {
    ($expr:expr, $context:expr) => {
        if let Err(e) = $expr {
            log::error!("Failed to {}: {}", $context, e);
        }
    };
}

/// Validate that a value is one of the allowed variants
///
/// # Example
/// ```
/// fn check(level: &str) -> anyhow::Result<()> {
///     framecache::validate_enum!(level, "trace", "debug", "info", "warn", "error")
/// }
/// assert!(check("info").is_ok());
/// assert!(check("loud").is_err());
/// ```
#[macro_export]
macro_rules! validate_enum {
    ($value:expr, $($variant:expr),+) => {
        match $value {
            $($variant)|+ => Ok(()),
            _ => anyhow::bail!("Invalid value: {} (expected one of: {})", $value, [$($variant),+].join(", ")),
        }
    };
}
