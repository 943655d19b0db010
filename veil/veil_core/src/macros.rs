//! Convenience macros for Veil.

/// Log an event with the given level, tagged with the current module.
///
/// # Examples
///
/// ```
/// use veil_core::log_event;
/// use veil_core::utils::LogLevel;
///
/// log_event!(LogLevel::Info, "Runtime initialized");
///
/// log_event!(LogLevel::Debug, "Policy registered",
///     label => "x",
///     guarded => true,
/// );
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:expr, $message:expr) => {
        {
            match $level {
                $crate::utils::LogLevel::Error => log::error!("[{}] {}", module_path!(), $message),
                $crate::utils::LogLevel::Warning => log::warn!("[{}] {}", module_path!(), $message),
                $crate::utils::LogLevel::Info => log::info!("[{}] {}", module_path!(), $message),
                $crate::utils::LogLevel::Debug => log::debug!("[{}] {}", module_path!(), $message),
                $crate::utils::LogLevel::Trace => log::trace!("[{}] {}", module_path!(), $message),
            }
        }
    };

    ($level:expr, $message:expr, $($key:ident => $value:expr),+ $(,)?) => {
        {
            let metadata = vec![$(format!("{}={}", stringify!($key), $value)),+].join(" ");
            match $level {
                $crate::utils::LogLevel::Error => log::error!("[{}] {}: {}", module_path!(), $message, metadata),
                $crate::utils::LogLevel::Warning => log::warn!("[{}] {}: {}", module_path!(), $message, metadata),
                $crate::utils::LogLevel::Info => log::info!("[{}] {}: {}", module_path!(), $message, metadata),
                $crate::utils::LogLevel::Debug => log::debug!("[{}] {}: {}", module_path!(), $message, metadata),
                $crate::utils::LogLevel::Trace => log::trace!("[{}] {}: {}", module_path!(), $message, metadata),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::utils::LogLevel;

    #[test]
    fn test_level_comes_from_caller_scope() {
        let level = LogLevel::Warning;
        log_event!(level, "Level taken from a binding");
        log_event!(LogLevel::Trace, "Event with metadata",
            entries => 3,
            source => "test",
        );
    }
}
