//! ---
//! fwm_section: "03-logging"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Structured logging adapters and sinks."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---

/// Shared expansion for the level macros below.
#[doc(hidden)]
#[macro_export]
macro_rules! __fwm_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            operation = ctx.operation.unwrap_or(""),
            user_id = ctx.user_id.unwrap_or(""),
            role = ctx.role.unwrap_or(""),
            endpoint = ctx.endpoint.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with session context.
#[macro_export]
macro_rules! fwm_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fwm_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fwm_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with session context.
#[macro_export]
macro_rules! fwm_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fwm_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fwm_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with session context.
#[macro_export]
macro_rules! fwm_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fwm_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fwm_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with session context.
#[macro_export]
macro_rules! fwm_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__fwm_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__fwm_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
