use chrono::NaiveDate;
use std::env;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Day of the year (month, day) without a year attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    /// Parses `MM-DD`. The 29th of February is rejected since it does not exist every year.
    pub fn parse(value: &str) -> Option<Self> {
        let (month, day) = value.trim().split_once('-')?;
        let month: u32 = month.parse().ok()?;
        let day: u32 = day.parse().ok()?;
        // 2023 is not a leap year, so Feb 29 fails here.
        NaiveDate::from_ymd_opt(2023, month, day)?;
        Some(Self { month, day })
    }

    pub fn in_year(&self, year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MIN))
    }
}

/// Excel column names used by the salary import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalaryImportColumns {
    pub staff_number: Option<String>,
    pub salary: Option<String>,
    pub remark: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    /// Receives approved leave applications.
    pub hr_email: Option<String>,
    /// Carried-over vacation days expire after this day.
    pub carry_over_end: MonthDay,
    pub extra_holidays: Vec<MonthDay>,
    pub salary_import: SalaryImportColumns,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_or(&lookup, "ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parse_or(&lookup, "REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: parse_or(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: parse_or(&lookup, "RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: optional("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            log_dir: optional("LOG_DIR").unwrap_or_else(|| "logs".to_string()),

            hr_email: optional("HR_EMAIL"),
            carry_over_end: match optional("VACATION_CARRY_OVER_END") {
                Some(value) => MonthDay::parse(&value).ok_or(ConfigError::Invalid {
                    key: "VACATION_CARRY_OVER_END",
                    value,
                })?,
                None => MonthDay { month: 3, day: 31 },
            },
            extra_holidays: match optional("EXTRA_HOLIDAYS") {
                Some(value) => value
                    .split(',')
                    .filter(|part| !part.trim().is_empty())
                    .map(|part| {
                        MonthDay::parse(part).ok_or_else(|| ConfigError::Invalid {
                            key: "EXTRA_HOLIDAYS",
                            value: part.trim().to_string(),
                        })
                    })
                    .collect::<Result<_, _>>()?,
                None => Vec::new(),
            },
            salary_import: SalaryImportColumns {
                staff_number: optional("SALARY_IMPORT_STAFFNR_COLUMN"),
                salary: optional("SALARY_IMPORT_SALARY_COLUMN"),
                remark: optional("SALARY_IMPORT_REMARK_COLUMN"),
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("SERVER_ADDR", "127.0.0.1:8080"),
        ("DATABASE_URL", "mysql://localhost/staffdesk"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_apply_when_optional_keys_are_absent() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(config.access_token_ttl, 900);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.carry_over_end, MonthDay { month: 3, day: 31 });
        assert!(config.hr_email.is_none());
        assert_eq!(config.salary_import, SalaryImportColumns::default());
    }

    #[test]
    fn missing_required_key_is_reported() {
        let err = Config::from_lookup(lookup(&BASE[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn invalid_numbers_are_errors_not_panics() {
        let mut pairs = BASE.to_vec();
        pairs.push(("ACCESS_TOKEN_TTL", "soon"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ACCESS_TOKEN_TTL", .. }));
    }

    #[test]
    fn vacation_and_import_settings_are_read() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("VACATION_CARRY_OVER_END", "04-30"),
            ("EXTRA_HOLIDAYS", "11-01, 08-15"),
            ("HR_EMAIL", "hr@example.com"),
            ("SALARY_IMPORT_STAFFNR_COLUMN", "Personalnummer"),
            ("SALARY_IMPORT_SALARY_COLUMN", "Brutto"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.carry_over_end, MonthDay { month: 4, day: 30 });
        assert_eq!(
            config.extra_holidays,
            vec![MonthDay { month: 11, day: 1 }, MonthDay { month: 8, day: 15 }]
        );
        assert_eq!(config.hr_email.as_deref(), Some("hr@example.com"));
        assert_eq!(config.salary_import.staff_number.as_deref(), Some("Personalnummer"));
        assert!(config.salary_import.remark.is_none());
    }

    #[test]
    fn month_day_rejects_impossible_dates() {
        assert!(MonthDay::parse("02-30").is_none());
        assert!(MonthDay::parse("13-01").is_none());
        assert!(MonthDay::parse("0331").is_none());
        assert_eq!(
            MonthDay::parse("03-31").unwrap().in_year(2026),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
        );
    }
}
