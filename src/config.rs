use std::{env, str::FromStr};

use anyhow::Context;

/// Which orders contribute to the analytics revenue figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevenueScope {
    All,
    ExcludeCancelled,
}

impl FromStr for RevenueScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(RevenueScope::All),
            "exclude_cancelled" => Ok(RevenueScope::ExcludeCancelled),
            other => Err(anyhow::anyhow!("unknown REVENUE_SCOPE `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub revenue_scope: RevenueScope,
    pub top_selling_limit: u64,
    pub recent_orders_limit: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_or("APP_PORT", 3000)?;
        let revenue_scope = env::var("REVENUE_SCOPE")
            .ok()
            .map(|v| v.parse::<RevenueScope>())
            .transpose()?
            .unwrap_or(RevenueScope::ExcludeCancelled);

        Ok(Self {
            database_url,
            host,
            port,
            max_connections: env_or("DB_MAX_CONNECTIONS", 10)?,
            jwt_secret,
            access_ttl_minutes: env_or("JWT_ACCESS_TTL_MINUTES", 60)?,
            refresh_ttl_days: env_or("JWT_REFRESH_TTL_DAYS", 7)?,
            revenue_scope,
            top_selling_limit: env_or("ANALYTICS_TOP_SELLING_LIMIT", 5)?,
            recent_orders_limit: env_or("ANALYTICS_RECENT_ORDERS_LIMIT", 5)?,
        })
    }

    /// Config for tests and tools that only need a database.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_connections: 5,
            jwt_secret: "test-secret".to_string(),
            access_ttl_minutes: 60,
            refresh_ttl_days: 7,
            revenue_scope: RevenueScope::ExcludeCancelled,
            top_selling_limit: 5,
            recent_orders_limit: 5,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revenue_scope_parses_known_values() {
        assert_eq!("all".parse::<RevenueScope>().unwrap(), RevenueScope::All);
        assert_eq!(
            "Exclude_Cancelled".parse::<RevenueScope>().unwrap(),
            RevenueScope::ExcludeCancelled
        );
        assert!("paid_only".parse::<RevenueScope>().is_err());
    }
}
