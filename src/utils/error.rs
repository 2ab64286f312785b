use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("Record source '{source_name}' unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("Missing messaging configuration: {field}")]
    MissingConfiguration { field: String },

    #[error("Delivery failed{}: {detail}", status_suffix(.status))]
    Delivery { status: Option<u16>, detail: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Source,
    Delivery,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl NotifierError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn source_unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingConfiguration { .. }
            | Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::SourceUnavailable { .. } => ErrorCategory::Source,
            Self::Delivery { .. } | Self::ApiError(_) => ErrorCategory::Delivery,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Delivery { .. } => ErrorSeverity::Medium,
            Self::ApiError(_) => ErrorSeverity::Medium,
            Self::SourceUnavailable { .. } => ErrorSeverity::High,
            Self::MissingConfiguration { .. }
            | Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorSeverity::High,
            Self::IoError(_) | Self::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    /// 排程器依此判斷整體失敗；部分投遞失敗不會走到這裡。
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 2,
            ErrorCategory::Source => 3,
            ErrorCategory::Delivery | ErrorCategory::System => 1,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::MissingConfiguration { .. } => {
                "Set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID (or the [telegram] section of the config file)"
            }
            Self::SourceUnavailable { .. } => {
                "Check the record source credentials, project id and network connectivity"
            }
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration file or environment variables and run again"
            }
            Self::Delivery { .. } | Self::ApiError(_) => {
                "Verify the bot token and chat id with the `check` command"
            }
            Self::IoError(_) => "Check file paths and permissions",
            Self::SerializationError(_) => "Check that the input data is valid JSON",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::MissingConfiguration { field } => format!(
                "Nothing was sent: messaging configuration '{}' is missing",
                field
            ),
            Self::SourceUnavailable { source_name, .. } => format!(
                "Could not read customers from '{}'; no notifications were sent",
                source_name
            ),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NotifierError>;

/// reqwest 的 Display 只有最外層訊息；把 source chain 一起帶出來（逾時、拒絕連線、DNS）
pub fn transport_detail(err: reqwest::Error) -> String {
    let timed_out = err.is_timeout();
    let detail = format!("{:#}", anyhow::Error::from(err));
    if timed_out && !detail.contains("timed out") {
        format!("{}: timed out", detail)
    } else {
        detail
    }
}
