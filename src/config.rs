use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub node_env: String,
    pub cors_origins: Vec<String>,
    pub db: DbConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub stats: StatsConfig,
    pub sms: SmsConfig,
    pub mpesa: MpesaConfig,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_min: u32,
    pub pool_max: u32,
}

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u8,
    pub key_prefix: String,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub access_expiry_secs: i64,
    pub refresh_expiry_secs: i64,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
    pub auth_max: u32,
}

#[derive(Clone, Debug)]
pub struct StatsConfig {
    pub cache_seconds: u32,
}

#[derive(Clone, Debug)]
pub struct SmsConfig {
    pub username: String,
    pub api_key: String,
    pub sender_id: String,
}

#[derive(Clone, Debug)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub base_url: String,
    pub callback_url: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_or_parse("PORT", 3000),
            node_env: env_or("NODE_ENV", "development"),
            cors_origins: env_or("CORS_ORIGINS", "http://localhost:3000,http://localhost:8080")
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            db: DbConfig {
                host: env_or("DB_HOST", "localhost"),
                port: env_or_parse("DB_PORT", 5432),
                database: env_or("DB_NAME", "chamastack"),
                user: env_or("DB_USER", "chamastack"),
                password: env_or("DB_PASSWORD", ""),
                pool_min: env_or_parse("DB_POOL_MIN", 5),
                pool_max: env_or_parse("DB_POOL_MAX", 50),
            },
            redis: RedisConfig {
                host: env_or("REDIS_HOST", "localhost"),
                port: env_or_parse("REDIS_PORT", 6379),
                password: env::var("REDIS_PASSWORD").ok().filter(|s| !s.is_empty()),
                db: env_or_parse("REDIS_DB", 0),
                key_prefix: "chama:".to_string(),
            },
            jwt: JwtConfig {
                secret: env_or("JWT_SECRET", "change-me-to-a-secure-random-string"),
                access_expiry_secs: parse_duration_to_secs(&env_or("JWT_ACCESS_EXPIRY", "1h")),
                refresh_expiry_secs: parse_duration_to_secs(&env_or("JWT_REFRESH_EXPIRY", "30d")),
            },
            rate_limit: RateLimitConfig {
                window_secs: 60,
                max_requests: env_or_parse("RATE_LIMIT_MAX", 100),
                auth_max: env_or_parse("RATE_LIMIT_AUTH", 10),
            },
            stats: StatsConfig {
                cache_seconds: env_or_parse("STATS_CACHE_SEC", 30),
            },
            sms: SmsConfig {
                username: env_or("AFRICASTALKING_USERNAME", ""),
                api_key: env_or("AFRICASTALKING_API_KEY", ""),
                sender_id: env_or("AFRICASTALKING_SENDER_ID", "CHAMASTACK"),
            },
            mpesa: MpesaConfig {
                consumer_key: env_or("MPESA_CONSUMER_KEY", ""),
                consumer_secret: env_or("MPESA_CONSUMER_SECRET", ""),
                shortcode: env_or("MPESA_SHORTCODE", ""),
                passkey: env_or("MPESA_PASSKEY", ""),
                base_url: env_or("MPESA_BASE_URL", "https://sandbox.safaricom.co.ke"),
                callback_url: env_or(
                    "MPESA_CALLBACK_URL",
                    "http://localhost:3000/api/v1/webhooks/mpesa",
                ),
            },
        }
    }

    pub fn database_url(&self) -> String {
        if let Ok(url) = env::var("DATABASE_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db.user, self.db.password, self.db.host, self.db.port, self.db.database
        )
    }

    pub fn redis_url(&self) -> String {
        if let Ok(url) = env::var("REDIS_URL") {
            return url;
        }
        match &self.redis.password {
            Some(pw) if !pw.is_empty() => format!(
                "redis://:{}@{}:{}/{}",
                pw, self.redis.host, self.redis.port, self.redis.db
            ),
            _ => format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.db
            ),
        }
    }
}

fn parse_duration_to_secs(s: &str) -> i64 {
    let s = s.trim();
    if s.is_empty() {
        return 3600;
    }
    let (num_str, unit) = s.split_at(s.len() - 1);
    let num: i64 = num_str.parse().unwrap_or(1);
    match unit {
        "s" => num,
        "m" => num * 60,
        "h" => num * 3600,
        "d" => num * 86400,
        _ => s.parse().unwrap_or(3600),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_duration_to_secs;

    #[test]
    fn parses_suffixed_durations() {
        assert_eq!(parse_duration_to_secs("45s"), 45);
        assert_eq!(parse_duration_to_secs("5m"), 300);
        assert_eq!(parse_duration_to_secs("1h"), 3600);
        assert_eq!(parse_duration_to_secs("30d"), 2_592_000);
    }

    #[test]
    fn falls_back_on_garbage() {
        assert_eq!(parse_duration_to_secs(""), 3600);
        assert_eq!(parse_duration_to_secs("soon"), 3600);
        assert_eq!(parse_duration_to_secs("7200"), 7200);
    }
}
