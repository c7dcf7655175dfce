use crate::error::{AuthError, GridError};
use crate::models::{BoundingBox, Category};
use crate::scrapers::types::RetryPolicy;
use clap::Parser;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const SIGN_IN_URL: &str = "https://www.zealty.ca/sign-in";
pub const MAP_URL: &str = "https://www.zealty.ca/map.html";
pub const FETCH_ENDPOINT: &str = "https://bcrealestatemap.ca/svcFetchDB.php";
/// Constant `from` form field the map widget sends.
pub const FROM_TAG: &str = "dmap";

const USERNAME_VAR: &str = "ZEALTY_USERNAME";
const PASSWORD_VAR: &str = "ZEALTY_PASSWORD";

/// Account used for the browser sign-in.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read credentials through `lookup`; blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(AuthError::MissingCredentials(key))
        };
        Ok(Self {
            username: read(USERNAME_VAR)?,
            password: read(PASSWORD_VAR)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Command-line flags. Credentials come from the environment only.
#[derive(Debug, Parser)]
#[command(author, version, about = "Collect active, sold and expired listings from the Zealty map")]
pub struct Args {
    /// Directory that receives the per-run output folder
    #[arg(short, long, default_value = "data")]
    pub output_dir: PathBuf,

    /// Grid cells per axis; the area is split into divisions² queries
    #[arg(short, long, default_value_t = 3)]
    pub divisions: usize,

    /// Cell queries in flight at once within a category
    #[arg(short, long, default_value_t = 1)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Retries per failing cell before it counts as empty
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Base delay of the exponential backoff between retries
    #[arg(long, default_value_t = 500)]
    pub backoff_ms: u64,

    /// Seconds to wait for the sign-in to complete
    #[arg(long, default_value_t = 15)]
    pub login_wait_secs: u64,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headful: bool,

    /// Save a screenshot of the map page after signing in
    #[arg(long)]
    pub screenshot: bool,

    /// Categories to collect (default: all)
    #[arg(long = "category", value_enum)]
    pub categories: Vec<Category>,

    #[arg(long, default_value_t = 49.0, allow_hyphen_values = true)]
    pub lat_min: f64,
    #[arg(long, default_value_t = 49.5, allow_hyphen_values = true)]
    pub lat_max: f64,
    #[arg(long, default_value_t = -123.3, allow_hyphen_values = true)]
    pub lon_min: f64,
    #[arg(long, default_value_t = -122.5, allow_hyphen_values = true)]
    pub lon_max: f64,
}

/// Browser sign-in settings.
#[derive(Debug, Clone)]
pub struct LoginSettings {
    pub sign_in_url: String,
    pub map_url: String,
    pub wait: Duration,
    pub headless: bool,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            sign_in_url: SIGN_IN_URL.to_string(),
            map_url: MAP_URL.to_string(),
            wait: Duration::from_secs(15),
            headless: true,
        }
    }
}

/// Backend request settings.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            endpoint: FETCH_ENDPOINT.to_string(),
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub area: BoundingBox,
    pub divisions: usize,
    pub concurrency: usize,
    pub categories: Vec<Category>,
    pub output_dir: PathBuf,
    pub screenshot: bool,
    pub login: LoginSettings,
    pub fetch: FetchSettings,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, GridError> {
        let area = BoundingBox::new(args.lat_min, args.lat_max, args.lon_min, args.lon_max)?;
        if args.divisions == 0 {
            return Err(GridError::ZeroDivisions);
        }

        let mut categories = Vec::new();
        for c in args.categories {
            if !categories.contains(&c) {
                categories.push(c);
            }
        }
        if categories.is_empty() {
            categories = Category::ALL.to_vec();
        }

        Ok(Self {
            area,
            divisions: args.divisions,
            concurrency: args.concurrency.max(1),
            categories,
            output_dir: args.output_dir,
            screenshot: args.screenshot,
            login: LoginSettings {
                wait: Duration::from_secs(args.login_wait_secs),
                headless: !args.headful,
                ..LoginSettings::default()
            },
            fetch: FetchSettings {
                timeout: Duration::from_secs(args.timeout_secs),
                retry: RetryPolicy::exponential(args.max_retries, Duration::from_millis(args.backoff_ms)),
                ..FetchSettings::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn credentials_require_both_values() {
        let env = vars(&[("ZEALTY_USERNAME", "me@example.com")]);
        let err = Credentials::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials("ZEALTY_PASSWORD")));

        let env = vars(&[("ZEALTY_USERNAME", "  "), ("ZEALTY_PASSWORD", "pw")]);
        let err = Credentials::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials("ZEALTY_USERNAME")));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let env = vars(&[("ZEALTY_USERNAME", "me@example.com"), ("ZEALTY_PASSWORD", "hunter2")]);
        let creds = Credentials::from_lookup(|k| env.get(k).cloned()).unwrap();
        let shown = format!("{:?}", creds);
        assert!(shown.contains("me@example.com"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn defaults_match_reference_run() {
        let args = Args::parse_from(["zealty-scout"]);
        let cfg = Config::from_args(args).unwrap();
        assert_eq!(cfg.area, BoundingBox::METRO_VANCOUVER);
        assert_eq!(cfg.divisions, 3);
        assert_eq!(cfg.categories, Category::ALL.to_vec());
        assert_eq!(cfg.fetch.timeout, Duration::from_secs(60));
        assert_eq!(cfg.fetch.retry.max_cell_retries, 2);
        assert!(cfg.login.headless);
    }

    #[test]
    fn category_flags_and_negative_bounds() {
        let args = Args::parse_from([
            "zealty-scout",
            "--category",
            "sold",
            "--category",
            "sold",
            "--category",
            "expired",
            "--lon-min",
            "-124.0",
            "--divisions",
            "5",
        ]);
        let cfg = Config::from_args(args).unwrap();
        assert_eq!(cfg.categories, vec![Category::Sold, Category::Expired]);
        assert_eq!(cfg.area.lon_min, -124.0);
        assert_eq!(cfg.divisions, 5);
    }

    #[test]
    fn rejects_zero_divisions() {
        let args = Args::parse_from(["zealty-scout", "--divisions", "0"]);
        assert_eq!(Config::from_args(args).unwrap_err(), GridError::ZeroDivisions);
    }
}
