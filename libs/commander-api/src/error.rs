/// Категория ошибки внешнего сервиса. По ней HTTP-слой решает, чем
/// ответить клиенту.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Ошибка конфигурации (неизвестный data instance и т.п.), повтор не поможет.
    Config,
    /// Endpoint недоступен. Следующий вызов попробует снова.
    Connect,
    /// I/O или протокол после установленного соединения.
    Io,
    /// Неразборчивый ответ upstream'а или неверный ввод.
    Format,
    /// Upstream явно отказал.
    Rejected,
    Logic,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Connect => "connect",
            ErrorKind::Io => "io",
            ErrorKind::Format => "format",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Logic => "logic",
        }
    }

    /// Повторный вызов может пройти.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Connect | ErrorKind::Io)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ошибка коннекторов, store'ов и командных каналов.
///
/// Display: только сообщение; категория доступна через `kind()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError {
    kind: ErrorKind,
    message: String,
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connect, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn format_err(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }

    pub fn logic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Logic, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Добавить контекст в начало сообщения, категория сохраняется.
    pub fn with_context(mut self, ctx: impl std::fmt::Display) -> Self {
        self.message = format!("{ctx}: {}", self.message);
        self
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ClientError {}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::format_err(e.to_string())
    }
}

impl From<chrono::ParseError> for ClientError {
    fn from(e: chrono::ParseError) -> Self {
        Self::format_err(e.to_string())
    }
}
