use crate::adapters::firestore::{self, FirestoreAuth, FirestoreSettings};
use crate::adapters::service_account::ServiceAccountKey;
use crate::adapters::telegram::{self, TelegramSettings};
use crate::core::clock::DEFAULT_ADVANCE_DAYS;
use crate::core::dispatcher::Dispatcher;
use crate::core::orchestrator::RunSettings;
use crate::core::retry::RetryPolicy;
use crate::utils::error::{NotifierError, Result};
use crate::utils::validation::{
    is_unset, validate_non_empty_string, validate_path, validate_range, validate_url, Validate,
};
use chrono::FixedOffset;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_UTC_OFFSET: &str = "+03:00";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    #[serde(default = "default_advance_days")]
    pub advance_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            advance_days: default_advance_days(),
        }
    }
}

fn default_utc_offset() -> String {
    DEFAULT_UTC_OFFSET.to_string()
}

fn default_advance_days() -> u32 {
    DEFAULT_ADVANCE_DAYS
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Firestore,
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type", default)]
    pub kind: SourceKind,
    pub project_id: Option<String>,
    pub collection: Option<String>,
    pub access_token: Option<String>,
    pub client_email: Option<String>,
    pub private_key: Option<String>,
    pub token_uri: Option<String>,
    pub endpoint: Option<String>,
    pub page_size: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: Option<String>,
    pub parse_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub timeout_seconds: Option<u64>,
    pub max_in_flight: Option<usize>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_policy")]
    pub policy: String,
    pub attempts: Option<u32>,
    pub delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

fn default_retry_policy() -> String {
    "none".to_string()
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_opt(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| NotifierError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: "Could not parse value".to_string(),
            }),
    }
}

/// "+03:00"、"+0330"、"-5"、"UTC+3" 這類固定時差
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    let invalid = |reason: &str| NotifierError::InvalidConfigValueError {
        field: "schedule.utc_offset".to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(|| invalid("out of range"));
    }

    let re = Regex::new(r"^(?i:utc)?([+-])(\d{1,2})(?::?(\d{2}))?$")
        .map_err(|e| NotifierError::config(e.to_string()))?;
    let caps = re
        .captures(trimmed)
        .ok_or_else(|| invalid("expected a fixed offset like +03:00"))?;

    let hours: i32 = caps[2].parse().map_err(|_| invalid("invalid hours"))?;
    let minutes: i32 = caps
        .get(3)
        .map(|m| m.as_str().parse::<i32>())
        .transpose()
        .map_err(|_| invalid("invalid minutes"))?
        .unwrap_or(0);
    if hours > 14 || minutes > 59 {
        return Err(invalid("offset out of range"));
    }

    let seconds = (hours * 3600 + minutes * 60) * if &caps[1] == "-" { -1 } else { 1 };
    FixedOffset::east_opt(seconds).ok_or_else(|| invalid("offset out of range"))
}

impl NotifierConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| NotifierError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${TELEGRAM_BOT_TOKEN})；找不到的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| NotifierError::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 沒有設定檔時（cron 常見用法）只靠環境變數
    pub fn from_env() -> Result<Self> {
        let customers_file = env_opt("CUSTOMERS_FILE");
        let source = SourceConfig {
            kind: if customers_file.is_some() {
                SourceKind::File
            } else {
                SourceKind::Firestore
            },
            project_id: env_opt("FIREBASE_PROJECT_ID"),
            collection: env_opt("FIRESTORE_COLLECTION"),
            access_token: env_opt("FIRESTORE_ACCESS_TOKEN"),
            client_email: env_opt("FIREBASE_CLIENT_EMAIL"),
            private_key: env_opt("FIREBASE_PRIVATE_KEY"),
            token_uri: None,
            endpoint: env_opt("FIRESTORE_EMULATOR_HOST").map(|host| format!("http://{}", host)),
            page_size: None,
            timeout_seconds: None,
            path: customers_file,
        };

        let retry = env_parsed::<u32>("NOTIFIER_RETRY_ATTEMPTS")?.map(|attempts| RetryConfig {
            policy: if attempts > 1 { "backoff" } else { "none" }.to_string(),
            attempts: Some(attempts),
            delay_ms: None,
            max_delay_ms: None,
        });

        Ok(Self {
            schedule: ScheduleConfig {
                utc_offset: env_opt("NOTIFIER_UTC_OFFSET").unwrap_or_else(default_utc_offset),
                advance_days: env_parsed("NOTIFIER_ADVANCE_DAYS")?
                    .unwrap_or_else(default_advance_days),
            },
            source,
            telegram: TelegramConfig {
                bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
                chat_id: env_opt("TELEGRAM_CHAT_ID"),
                api_base: env_opt("TELEGRAM_API_BASE"),
                parse_mode: None,
            },
            dispatch: DispatchConfig {
                timeout_seconds: env_parsed("NOTIFIER_TIMEOUT_SECONDS")?,
                max_in_flight: env_parsed("NOTIFIER_MAX_IN_FLIGHT")?,
                retry,
            },
        })
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.schedule.utc_offset)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let Some(retry) = &self.dispatch.retry else {
            return Ok(RetryPolicy::None);
        };

        let attempts = retry.attempts.unwrap_or(3);
        let delay = Duration::from_millis(retry.delay_ms.unwrap_or(500));
        match retry.policy.to_ascii_lowercase().as_str() {
            "none" => Ok(RetryPolicy::None),
            "fixed" => Ok(RetryPolicy::Fixed { attempts, delay }),
            "backoff" => Ok(RetryPolicy::Backoff {
                attempts,
                base: delay,
                max: Duration::from_millis(retry.max_delay_ms.unwrap_or(10_000)),
            }),
            other => Err(NotifierError::InvalidConfigValueError {
                field: "dispatch.retry.policy".to_string(),
                value: other.to_string(),
                reason: "Valid policies: none, fixed, backoff".to_string(),
            }),
        }
    }

    pub fn run_settings(&self) -> Result<RunSettings> {
        let dispatcher = Dispatcher::new(
            self.retry_policy()?,
            self.dispatch.max_in_flight.unwrap_or(1),
        );
        Ok(RunSettings::new(self.utc_offset()?)
            .with_advance_days(self.schedule.advance_days)
            .with_dispatcher(dispatcher))
    }

    pub fn telegram_settings(&self) -> TelegramSettings {
        let defaults = TelegramSettings::default();
        TelegramSettings {
            bot_token: self.telegram.bot_token.clone(),
            chat_id: self.telegram.chat_id.clone(),
            api_base: self
                .telegram
                .api_base
                .clone()
                .unwrap_or_else(|| telegram::DEFAULT_API_BASE.to_string()),
            parse_mode: match self.telegram.parse_mode.as_deref() {
                None => defaults.parse_mode,
                Some(mode) if mode.trim().is_empty() || mode.eq_ignore_ascii_case("none") => None,
                Some(mode) => Some(mode.to_string()),
            },
            timeout: self.request_timeout(),
        }
    }

    pub fn firestore_settings(&self) -> Result<FirestoreSettings> {
        let project_id = self
            .source
            .project_id
            .clone()
            .filter(|p| !is_unset(Some(p)))
            .ok_or_else(|| NotifierError::ConfigError {
                message: "source.project_id (FIREBASE_PROJECT_ID) is required for the firestore source"
                    .to_string(),
            })?;

        let mut settings = FirestoreSettings::new(project_id);
        if let Some(collection) = &self.source.collection {
            settings.collection = collection.clone();
        }
        settings.endpoint = self
            .source
            .endpoint
            .clone()
            .unwrap_or_else(|| firestore::DEFAULT_ENDPOINT.to_string());
        settings.auth = self.firestore_auth(&settings.endpoint)?;
        if let Some(page_size) = self.source.page_size {
            settings.page_size = page_size;
        }
        if let Some(timeout) = self.source.timeout_seconds {
            settings.timeout = Duration::from_secs(timeout);
        }
        Ok(settings)
    }

    /// access token 優先，其次 service account；只有指向模擬器等自訂 endpoint 時才允許匿名
    fn firestore_auth(&self, endpoint: &str) -> Result<FirestoreAuth> {
        let set = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !is_unset(Some(v)))
                .map(str::to_string)
        };

        if let Some(token) = set(&self.source.access_token) {
            return Ok(FirestoreAuth::AccessToken(token));
        }

        match (set(&self.source.client_email), set(&self.source.private_key)) {
            (Some(email), Some(private_key)) => {
                let mut key = ServiceAccountKey::new(email, private_key);
                if let Some(token_uri) = set(&self.source.token_uri) {
                    key = key.with_token_uri(token_uri);
                }
                Ok(FirestoreAuth::ServiceAccount(key))
            }
            _ if endpoint.trim_end_matches('/') != firestore::DEFAULT_ENDPOINT => {
                Ok(FirestoreAuth::None)
            }
            (email, _) => Err(NotifierError::config(format!(
                "Firestore credentials missing: set {} (or FIRESTORE_ACCESS_TOKEN), or point FIRESTORE_EMULATOR_HOST at an emulator",
                if email.is_some() {
                    "FIREBASE_PRIVATE_KEY"
                } else {
                    "FIREBASE_CLIENT_EMAIL and FIREBASE_PRIVATE_KEY"
                }
            ))),
        }
    }

    /// 驗證配置的合理性；訊息憑證缺少不算驗證錯誤，於執行開始時另外回報
    pub fn validate_config(&self) -> Result<()> {
        self.utc_offset()?;
        validate_range("schedule.advance_days", self.schedule.advance_days, 1, 30)?;

        if let Some(timeout) = self.dispatch.timeout_seconds {
            validate_range("dispatch.timeout_seconds", timeout, 1, 300)?;
        }
        if let Some(max_in_flight) = self.dispatch.max_in_flight {
            validate_range("dispatch.max_in_flight", max_in_flight, 1, 32)?;
        }
        self.retry_policy()?;

        if let Some(api_base) = &self.telegram.api_base {
            validate_url("telegram.api_base", api_base)?;
        }

        match self.source.kind {
            SourceKind::Firestore => {
                let settings = self.firestore_settings()?;
                validate_url("source.endpoint", &settings.endpoint)?;
                validate_non_empty_string("source.collection", &settings.collection)?;
                validate_range("source.page_size", settings.page_size, 1, 1000)?;
                if let FirestoreAuth::ServiceAccount(key) = &settings.auth {
                    key.encoding_key()?;
                    validate_url("source.token_uri", &key.token_uri)?;
                }
            }
            SourceKind::File => {
                validate_path("source.path", self.source.path.as_deref().unwrap_or_default())?;
            }
        }

        Ok(())
    }
}

impl Validate for NotifierConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
