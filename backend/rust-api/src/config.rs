use std::collections::BTreeMap;
use std::env;

const DEFAULT_SEASON_REWARDS: &str = "1:300,2:200,3:100";

#[derive(Debug, Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub season: SeasonSettings,
    pub leaderboard_size: i64,
    pub attendance_window_days: i64,
}

#[derive(Debug, Clone)]
pub struct SeasonSettings {
    pub duration_days: i64,
    pub title_prefix: String,
    /// Rank ("1", "2", ...) to coin amount, applied to newly created seasons
    pub default_rewards: BTreeMap<String, i64>,
    /// 0 disables the in-process rotation loop (an external cron runs `rotate-seasons`)
    pub rotation_interval_secs: u64,
    pub lock_ttl_secs: u64,
}

impl Default for SeasonSettings {
    fn default() -> Self {
        Self {
            duration_days: 14,
            title_prefix: "Season".to_string(),
            default_rewards: parse_reward_table(DEFAULT_SEASON_REWARDS).unwrap_or_default(),
            rotation_interval_secs: 0,
            lock_ttl_secs: 300,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), local .env as fallback
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| {
                eprintln!("WARNING: MONGO_URI not set, using local replica set");
                "mongodb://localhost:27017/?replicaSet=rs0&directConnection=true".to_string()
            });

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                    Err(_) => format!("redis://{}:{}/0", host, port),
                }
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "eduverse".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let defaults = SeasonSettings::default();
        let default_rewards = match settings
            .get_string("season.default_rewards")
            .or_else(|_| env::var("SEASON_DEFAULT_REWARDS"))
        {
            Ok(raw) => parse_reward_table(&raw).map_err(config::ConfigError::Message)?,
            Err(_) => defaults.default_rewards,
        };

        let season = SeasonSettings {
            duration_days: settings
                .get_int("season.duration_days")
                .unwrap_or(defaults.duration_days)
                .max(1),
            title_prefix: settings
                .get_string("season.title_prefix")
                .unwrap_or(defaults.title_prefix),
            default_rewards,
            rotation_interval_secs: settings
                .get_int("season.rotation_interval_secs")
                .map(|v| v.max(0) as u64)
                .unwrap_or(defaults.rotation_interval_secs),
            lock_ttl_secs: settings
                .get_int("season.lock_ttl_secs")
                .map(|v| v.max(1) as u64)
                .unwrap_or(defaults.lock_ttl_secs),
        };

        let leaderboard_size = settings
            .get_int("leaderboard.size")
            .unwrap_or(10)
            .clamp(1, 100);

        let attendance_window_days = settings
            .get_int("attendance.window_days")
            .unwrap_or(7)
            .max(0);

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            bind_addr,
            season,
            leaderboard_size,
            attendance_window_days,
        })
    }
}

/// Parses `"1:300,2:200,3:100"` into a rank -> amount table.
pub fn parse_reward_table(raw: &str) -> Result<BTreeMap<String, i64>, String> {
    let mut table = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (rank, amount) = pair
            .split_once(':')
            .ok_or_else(|| format!("Invalid reward entry '{}': expected rank:amount", pair))?;
        let rank: u32 = rank
            .trim()
            .parse()
            .map_err(|_| format!("Invalid reward rank '{}'", rank.trim()))?;
        if rank == 0 {
            return Err("Reward ranks start at 1".to_string());
        }
        let amount: i64 = amount
            .trim()
            .parse()
            .map_err(|_| format!("Invalid reward amount '{}'", amount.trim()))?;
        if amount < 0 {
            return Err(format!("Reward for rank {} must not be negative", rank));
        }
        table.insert(rank.to_string(), amount);
    }
    Ok(table)
}
