use std::env;
use std::time::Duration;

/// Process-wide settings, read once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    pub webhook: WebhookConfig,
    pub push: PushConfig,
    pub admin_token: Option<String>,
    pub faq_path: Option<String>,
    pub faq_threshold: f64,
    pub site_dir: Option<String>,
    /// Requests per minute per IP on public endpoints. 0 disables limiting.
    pub public_rate_limit_rpm: u32,
}

#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub secret: Option<String>,
    /// Signature checks are skipped. Only ever true in dev mode.
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Base64url-encoded raw P-256 private scalar.
    pub vapid_private_key: Option<String>,
    pub vapid_subject: String,
    pub timeout: Duration,
    pub concurrency: usize,
    pub ttl_secs: u32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_private_key: None,
            vapid_subject: "mailto:admin@example.com".to_string(),
            timeout: Duration::from_secs(10),
            concurrency: 8,
            ttl_secs: 86_400,
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            database_path: "salesbot.db".to_string(),
            base_url: "http://127.0.0.1:5000".to_string(),
            dev_mode: false,
            webhook: WebhookConfig::default(),
            push: PushConfig::default(),
            admin_token: None,
            faq_path: None,
            faq_threshold: crate::faq::DEFAULT_THRESHOLD,
            site_dir: None,
            public_rate_limit_rpm: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("SALESBOT_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 5000);

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let skip_requested = env_flag("WEBHOOK_INSECURE_SKIP_VERIFY");
        if skip_requested && !dev_mode {
            tracing::warn!(
                "WEBHOOK_INSECURE_SKIP_VERIFY ignored: not in dev mode (set SALESBOT_ENV=dev)"
            );
        }

        let defaults = PushConfig::default();
        let push = PushConfig {
            vapid_private_key: env_non_empty("VAPID_PRIVATE_KEY"),
            vapid_subject: env::var("VAPID_SUBJECT").unwrap_or(defaults.vapid_subject),
            timeout: Duration::from_secs(env_parse("PUSH_TIMEOUT_SECS", 10u64).max(1)),
            concurrency: env_parse("PUSH_CONCURRENCY", defaults.concurrency).max(1),
            ttl_secs: env_parse("PUSH_TTL_SECS", defaults.ttl_secs),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "salesbot.db".to_string()),
            base_url,
            dev_mode,
            webhook: WebhookConfig {
                secret: env_non_empty("WEBHOOK_SECRET"),
                insecure_skip_verify: skip_requested && dev_mode,
            },
            push,
            admin_token: env_non_empty("ADMIN_TOKEN"),
            faq_path: env_non_empty("FAQ_PATH"),
            faq_threshold: env_parse("FAQ_THRESHOLD", crate::faq::DEFAULT_THRESHOLD),
            site_dir: env_non_empty("SITE_DIR"),
            public_rate_limit_rpm: env_parse("RATE_LIMIT_PUBLIC_RPM", 30),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
