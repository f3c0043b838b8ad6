use std::env;

/// Loan period applied by the borrow shortcut when no date is given
pub const DEFAULT_LOAN_DAYS: i64 = 15;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub profile: String,
    pub default_loan_days: i64,
    pub seed_stages: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: database_url_for("default"),
            profile: "default".to_string(),
            default_loan_days: DEFAULT_LOAN_DAYS,
            seed_stages: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let profile = env::var("PROFILE").unwrap_or_else(|_| "default".to_string());

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| database_url_for(&profile));

        Self {
            database_url,
            default_loan_days: env::var("DEFAULT_LOAN_DAYS")
                .ok()
                .and_then(|d| d.parse().ok())
                .filter(|d: &i64| *d > 0)
                .unwrap_or(DEFAULT_LOAN_DAYS),
            seed_stages: env::var("SEED_STAGES")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            profile,
        }
    }
}

fn database_url_for(profile: &str) -> String {
    if profile == "default" {
        "sqlite://library.db?mode=rwc".to_string()
    } else {
        format!("sqlite://library_{}.db?mode=rwc", profile)
    }
}
