//! Diagnostic and tracing macros.

/// Emit a predefined diagnostic by code.
///
/// # Example
///
/// ```rust,ignore
/// ft_emit!(FT301);
/// ft_emit!(FT201, "worker 2: index out of bounds");
/// ```
#[macro_export]
macro_rules! ft_emit {
    ($code:ident) => {{
        $crate::diagnostics::emit::emit(&$crate::diagnostics::$code);
    }};
    ($code:ident, $($ctx:tt)+) => {{
        $crate::diagnostics::emit::emit_with_context(
            &$crate::diagnostics::$code,
            &::std::format!($($ctx)+),
        );
    }};
}

/// Record a scheduler lifecycle event.
///
/// Forwards to `log::debug!` when the `log` feature is enabled and
/// compiles to nothing otherwise.
#[macro_export]
#[doc(hidden)]
macro_rules! ft_trace {
    ($($arg:tt)+) => {{
        #[cfg(feature = "log")]
        {
            ::log::debug!(target: "frametask", $($arg)+);
        }
        #[cfg(not(feature = "log"))]
        {
            if false {
                let _ = ::std::format!($($arg)+);
            }
        }
    }};
}
