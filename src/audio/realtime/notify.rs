//! User-visible notifications raised by a realtime session.

use std::time::Duration;

use strum::{Display, IntoStaticStr};

pub const TAG_CONNECTION_INFO: &str = "websocket-connection-info";
pub const TAG_CONNECTION_SUCCESS: &str = "websocket-connection-success";
pub const TAG_CONNECTION_ERROR: &str = "websocket-connection-error";
pub const TAG_CONNECTION_CLOSE: &str = "websocket-connection-close";

/// Tags dismissed before each new lifecycle notification.
pub const LIFECYCLE_TAGS: [&str; 4] = [
    TAG_CONNECTION_ERROR,
    TAG_CONNECTION_SUCCESS,
    TAG_CONNECTION_CLOSE,
    TAG_CONNECTION_INFO,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NotificationKind {
    ConnectionAttempt,
    ConnectionSucceeded,
    ConnectionError,
    ConnectionClosed,
    ToolExecuting,
    ToolFailed,
}

impl NotificationKind {
    /// Key looked up by the [`Translator`].
    pub fn translation_key(self) -> &'static str {
        match self {
            Self::ConnectionAttempt => "Toasts.WebSocketConnectionAttempt",
            Self::ConnectionSucceeded => "Toasts.WebSocketConnectionSuccess",
            Self::ConnectionError => "Toasts.WebSocketConnectionError",
            Self::ConnectionClosed => "Toasts.WebSocketConnectionClosed",
            Self::ToolExecuting => "Toasts.FunctionExecuting",
            Self::ToolFailed => "Toasts.FunctionExecutionFailed",
        }
    }
}

/// A transient, tagged notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub level: NotificationLevel,
    pub message: String,
    /// Stable tag used to dismiss or replace the notification.
    pub tag: String,
    pub duration: Duration,
}

impl Notification {
    pub fn connection_attempt(translator: &dyn Translator) -> Self {
        Self::lifecycle(
            translator,
            NotificationKind::ConnectionAttempt,
            NotificationLevel::Info,
            TAG_CONNECTION_INFO,
            Duration::from_secs(10),
        )
    }

    pub fn connection_succeeded(translator: &dyn Translator) -> Self {
        Self::lifecycle(
            translator,
            NotificationKind::ConnectionSucceeded,
            NotificationLevel::Success,
            TAG_CONNECTION_SUCCESS,
            Duration::from_secs(3),
        )
    }

    pub fn connection_error(translator: &dyn Translator) -> Self {
        Self::lifecycle(
            translator,
            NotificationKind::ConnectionError,
            NotificationLevel::Error,
            TAG_CONNECTION_ERROR,
            Duration::from_secs(5),
        )
    }

    pub fn connection_closed(translator: &dyn Translator) -> Self {
        Self::lifecycle(
            translator,
            NotificationKind::ConnectionClosed,
            NotificationLevel::Error,
            TAG_CONNECTION_CLOSE,
            Duration::from_secs(3),
        )
    }

    pub fn tool_executing(translator: &dyn Translator, tool_name: &str) -> Self {
        Self {
            kind: NotificationKind::ToolExecuting,
            level: NotificationLevel::Info,
            message: translator.translate(
                NotificationKind::ToolExecuting.translation_key(),
                &[("funcName", tool_name)],
            ),
            tag: tool_tag(tool_name),
            duration: Duration::from_secs(120),
        }
    }

    pub fn tool_failed(translator: &dyn Translator, tool_name: &str) -> Self {
        Self {
            kind: NotificationKind::ToolFailed,
            level: NotificationLevel::Error,
            message: translator.translate(
                NotificationKind::ToolFailed.translation_key(),
                &[("funcName", tool_name)],
            ),
            tag: tool_tag(tool_name),
            duration: Duration::from_secs(3),
        }
    }

    fn lifecycle(
        translator: &dyn Translator,
        kind: NotificationKind,
        level: NotificationLevel,
        tag: &str,
        duration: Duration,
    ) -> Self {
        Self {
            kind,
            level,
            message: translator.translate(kind.translation_key(), &[]),
            tag: tag.to_string(),
            duration,
        }
    }
}

/// Tag shared by the executing and failed notifications of one tool.
pub fn tool_tag(tool_name: &str) -> String {
    format!("run-{tool_name}")
}

/// Resolves a message key (with named arguments) to display text.
pub trait Translator: Send + Sync {
    fn translate(&self, key: &str, args: &[(&str, &str)]) -> String;
}

/// Built-in English messages. `{{name}}` placeholders are filled from args.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTranslator;

impl Translator for DefaultTranslator {
    fn translate(&self, key: &str, args: &[(&str, &str)]) -> String {
        let template = match key {
            "Toasts.WebSocketConnectionAttempt" => "Connecting to the realtime service...",
            "Toasts.WebSocketConnectionSuccess" => "Connected to the realtime service",
            "Toasts.WebSocketConnectionError" => "Realtime connection error",
            "Toasts.WebSocketConnectionClosed" => "Realtime connection closed",
            "Toasts.FunctionExecuting" => "Running {{funcName}}...",
            "Toasts.FunctionExecutionFailed" => "{{funcName}} failed",
            other => other,
        };
        args.iter().fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{{{name}}}}}"), value)
        })
    }
}

/// Shows and dismisses notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
    fn dismiss(&self, tag: &str);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => tracing::warn!(
                kind = %notification.kind,
                tag = %notification.tag,
                "{}",
                notification.message
            ),
            _ => tracing::info!(
                kind = %notification.kind,
                tag = %notification.tag,
                "{}",
                notification.message
            ),
        }
    }

    fn dismiss(&self, tag: &str) {
        tracing::trace!(tag, "Dismissing notification");
    }
}
