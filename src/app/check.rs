use crate::adapters::TelegramMessenger;
use crate::app::build_source;
use crate::config::toml_config::NotifierConfig;
use crate::domain::ports::Messenger;
use crate::utils::validation::is_unset;
use std::fmt;

pub const TEST_MESSAGE: &str = "🧪 Test message from the CRM Birthday Bot!\n\nIf you receive this message, your Telegram configuration is working correctly. 🎉";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStep {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub steps: Vec<CheckStep>,
}

impl CheckReport {
    fn record(&mut self, name: &'static str, ok: bool, detail: impl Into<String>) {
        let detail = detail.into();
        if ok {
            tracing::info!("✅ {}: {}", name, detail);
        } else {
            tracing::warn!("❌ {}: {}", name, detail);
        }
        self.steps.push(CheckStep { name, ok, detail });
    }

    pub fn is_ok(&self) -> bool {
        self.steps.iter().all(|s| s.ok)
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, step) in self.steps.iter().enumerate() {
            writeln!(
                f,
                "{}. {} {} - {}",
                index + 1,
                if step.ok { "✅" } else { "❌" },
                step.name,
                step.detail
            )?;
        }
        Ok(())
    }
}

/// 連線自我檢查：資料來源、憑證、bot token，必要時送一則測試訊息
pub async fn run_check(config: &NotifierConfig, send_test: bool) -> CheckReport {
    let mut report = CheckReport::default();

    match build_source(config) {
        Ok(source) => match source.sample().await {
            Ok(sampled) => report.record(
                "record source",
                true,
                format!("{} reachable, sample read returned {} customers", source.name(), sampled),
            ),
            Err(e) => report.record("record source", false, e.to_string()),
        },
        Err(e) => report.record("record source", false, e.to_string()),
    }

    let token_set = !is_unset(config.telegram.bot_token.as_deref());
    let chat_set = !is_unset(config.telegram.chat_id.as_deref());
    report.record(
        "telegram configuration",
        token_set && chat_set,
        format!(
            "TELEGRAM_BOT_TOKEN: {}, TELEGRAM_CHAT_ID: {}",
            if token_set { "set" } else { "missing" },
            if chat_set { "set" } else { "missing" }
        ),
    );
    if !token_set || !chat_set {
        return report;
    }

    let messenger = match TelegramMessenger::new(config.telegram_settings()) {
        Ok(messenger) => messenger,
        Err(e) => {
            report.record("telegram bot", false, e.to_string());
            return report;
        }
    };

    match messenger.get_me().await {
        Ok(username) => report.record("telegram bot", true, format!("connected as @{}", username)),
        Err(e) => {
            report.record("telegram bot", false, format!("bot token invalid: {}", e));
            return report;
        }
    }

    if send_test {
        match messenger.send(TEST_MESSAGE).await {
            Ok(()) => report.record("test message", true, "sent"),
            Err(e) => report.record("test message", false, format!("check the chat id: {}", e)),
        }
    }

    report
}
