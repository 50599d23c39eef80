use std::{env, fmt, fs, path::Path, time::Duration};

use crate::{
    errors::Error,
    identity::{ChatIdentity, ChatTarget, GroupChat, User},
    level::Level,
    Result,
};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for one Telegram log handler.
#[derive(Clone)]
pub struct HandlerConfig {
    pub label: String,
    /// Bot token. Secret: excluded from `Debug` and never logged.
    pub token: String,
    pub target: ChatTarget,
    /// Explicit threshold; `None` follows the process-wide default.
    pub level: Option<Level>,
    /// Deliver without a notification sound.
    pub mute: bool,
    pub api_base: String,
    pub timeout: Duration,
}

impl HandlerConfig {
    pub fn new(
        label: impl Into<String>,
        token: impl Into<String>,
        target: impl Into<ChatTarget>,
    ) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
            target: target.into(),
            level: None,
            mute: false,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn mute(mut self, mute: bool) -> Self {
        self.mute = mute;
        self
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<api_base>/bot<token>/sendMessage`
    pub fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.token
        )
    }
}

impl fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("label", &self.label)
            .field("token", &"<redacted>")
            .field("target", &self.target)
            .field("level", &self.level)
            .field("mute", &self.mute)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Configuration read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub handler: HandlerConfig,
    /// Value for the process-wide default threshold, if set.
    pub default_level: Option<Level>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let chat = get("TELEGRAM_LOG_CHAT").ok_or_else(|| {
            Error::Config("TELEGRAM_LOG_CHAT environment variable is required".to_string())
        })?;
        let chat_id = parse_identity(&chat)
            .ok_or_else(|| Error::Config(format!("invalid TELEGRAM_LOG_CHAT: {chat:?}")))?;

        let mentions: Vec<User> = get("TELEGRAM_LOG_MENTIONS")
            .map(|csv| parse_csv_identities(&csv))
            .unwrap_or_default()
            .into_iter()
            .map(User::from)
            .collect();
        let target: ChatTarget = if mentions.is_empty() {
            chat_id.into()
        } else {
            GroupChat::group(chat_id).mentioning_all(mentions).into()
        };

        let label = get("TELEGRAM_LOG_LABEL").unwrap_or_else(|| "ltg".to_string());
        let mut handler = HandlerConfig::new(label, token, target);

        if let Some(level) = get("TELEGRAM_LOG_LEVEL") {
            handler.level = Some(level.parse()?);
        }
        if let Some(mute) = get("TELEGRAM_LOG_MUTE") {
            handler.mute = parse_bool(&mute);
        }
        if let Some(base) = get("TELEGRAM_API_BASE") {
            handler.api_base = base;
        }
        if let Some(ms) = get("TELEGRAM_LOG_TIMEOUT_MS") {
            let ms = ms
                .trim()
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("invalid TELEGRAM_LOG_TIMEOUT_MS: {ms:?}")))?;
            handler.timeout = Duration::from_millis(ms);
        }

        let default_level = get("TELEGRAM_LOG_DEFAULT_LEVEL")
            .map(|s| s.parse::<Level>())
            .transpose()?;

        Ok(Self {
            handler,
            default_level,
        })
    }
}

/// `-100123` → numeric, `ops` / `@ops` → handle.
pub fn parse_identity(raw: &str) -> Option<ChatIdentity> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(id) = s.parse::<i64>() {
        return Some(ChatIdentity::Numeric(id));
    }
    let name = s.strip_prefix('@').unwrap_or(s);
    if name.is_empty() {
        return None;
    }
    Some(ChatIdentity::Handle(name.to_string()))
}

fn parse_csv_identities(v: &str) -> Vec<ChatIdentity> {
    v.split(',').filter_map(parse_identity).collect()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Fill unset variables from a `.env` file; missing files are ignored.
fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, value) in contents.lines().filter_map(parse_dotenv_line) {
        if env::var_os(key).is_none() {
            env::set_var(key, value);
        }
    }
}

/// One `KEY=value` line. Accepts an `export ` prefix and one pair of matching
/// quotes around the value; comments and blank lines yield `None`.
fn parse_dotenv_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let key = key.strip_prefix("export ").map_or(key, str::trim_start);
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q)?.strip_suffix(*q))
        .unwrap_or(value);
    Some((key, unquoted))
}
