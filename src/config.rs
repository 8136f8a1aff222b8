use crate::components::calendar_layout::DisplayWindow;
use crate::error::{config_error, env_error, DashResult};
use crate::utils::time::parse_clock_minutes;
use chrono_tz::Tz;
use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::str::FromStr;
use tracing::{info, warn};

/// Default PostHog host when POSTHOG_HOST is not set
pub const DEFAULT_POSTHOG_HOST: &str = "https://us.posthog.com";

/// File holding component enable flags
pub const COMPONENTS_FILE: &str = "config/components.toml";

/// Main configuration structure for the dashboard
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Port the HTTP server listens on
    pub port: u16,
    /// PostHog personal API key
    pub posthog_api_key: Option<String>,
    /// PostHog project ID
    pub posthog_project_id: Option<String>,
    /// PostHog host
    pub posthog_host: String,
    /// Clerk secret key
    pub clerk_secret_key: Option<String>,
    /// Stripe secret key
    pub stripe_secret_key: Option<String>,
    /// Google OAuth client ID
    pub google_client_id: Option<String>,
    /// Google OAuth client secret
    pub google_client_secret: Option<String>,
    /// Google OAuth redirect URI
    pub google_redirect_uri: Option<String>,
    /// Timezone used for the calendar week
    pub timezone: String,
    /// First minute shown in the calendar grid
    pub display_start_minutes: u32,
    /// Last minute shown in the calendar grid
    pub display_end_minutes: u32,
    /// Pixels per hour in the calendar grid
    pub row_height: f64,
    /// Seconds between LLM usage refreshes
    pub usage_refresh_secs: u64,
    /// Seconds between analytics refreshes
    pub analytics_refresh_secs: u64,
    /// Seconds between revenue refreshes
    pub revenue_refresh_secs: u64,
    /// Internal accounts left out of user listings
    pub excluded_emails: Vec<String>,
    /// Mark cookies as Secure
    pub secure_cookies: bool,
    /// Map of component names to their enabled status
    pub components: HashMap<String, bool>,
}

impl Default for Config {
    fn default() -> Self {
        let window = DisplayWindow::default();
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
            posthog_api_key: None,
            posthog_project_id: None,
            posthog_host: DEFAULT_POSTHOG_HOST.to_string(),
            clerk_secret_key: None,
            stripe_secret_key: None,
            google_client_id: None,
            google_client_secret: None,
            google_redirect_uri: None,
            timezone: "UTC".to_string(),
            display_start_minutes: window.start_minutes,
            display_end_minutes: window.end_minutes,
            row_height: window.row_height,
            usage_refresh_secs: 60 * 60,
            analytics_refresh_secs: 60 * 60,
            revenue_refresh_secs: 5 * 60,
            excluded_emails: Vec::new(),
            secure_cookies: false,
            components: default_components(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> DashResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let display_start_minutes = match optional_var("CALENDAR_DISPLAY_START") {
            Some(value) => parse_clock_minutes(&value).ok_or_else(|| env_error("CALENDAR_DISPLAY_START"))?,
            None => defaults.display_start_minutes,
        };
        let display_end_minutes = match optional_var("CALENDAR_DISPLAY_END") {
            Some(value) => parse_clock_minutes(&value).ok_or_else(|| env_error("CALENDAR_DISPLAY_END"))?,
            None => defaults.display_end_minutes,
        };

        let excluded_emails = optional_var("EXCLUDED_EMAILS")
            .map(|value| parse_email_list(&value))
            .unwrap_or_default();

        // Load components configuration from file if it exists
        let mut components = default_components();
        if let Ok(content) = fs::read_to_string(COMPONENTS_FILE) {
            match parse_components(&content) {
                Ok(file_components) => components.extend(file_components),
                Err(e) => warn!("Ignoring malformed {}: {}", COMPONENTS_FILE, e),
            }
        }

        let config = Config {
            bind_address: optional_var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: parse_var("PORT", defaults.port)?,
            posthog_api_key: optional_var("POSTHOG_PERSONAL_API_KEY"),
            posthog_project_id: optional_var("POSTHOG_PROJECT_ID"),
            posthog_host: optional_var("POSTHOG_HOST").unwrap_or(defaults.posthog_host),
            clerk_secret_key: optional_var("CLERK_SECRET_KEY"),
            stripe_secret_key: optional_var("STRIPE_SECRET_KEY"),
            google_client_id: optional_var("GOOGLE_CLIENT_ID"),
            google_client_secret: optional_var("GOOGLE_CLIENT_SECRET"),
            google_redirect_uri: optional_var("GOOGLE_REDIRECT_URI"),
            timezone: optional_var("TIMEZONE").unwrap_or(defaults.timezone),
            display_start_minutes,
            display_end_minutes,
            row_height: parse_var("CALENDAR_ROW_HEIGHT", defaults.row_height)?,
            usage_refresh_secs: parse_var("USAGE_REFRESH_SECS", defaults.usage_refresh_secs)?,
            analytics_refresh_secs: parse_var("ANALYTICS_REFRESH_SECS", defaults.analytics_refresh_secs)?,
            revenue_refresh_secs: parse_var("REVENUE_REFRESH_SECS", defaults.revenue_refresh_secs)?,
            excluded_emails,
            secure_cookies: parse_var("SECURE_COOKIES", defaults.secure_cookies)?,
            components,
        };

        config.validate()?;
        info!(
            "Configuration loaded (timezone={}, calendar window {}-{})",
            config.timezone, config.display_start_minutes, config.display_end_minutes
        );

        Ok(config)
    }

    /// Check values that cannot be validated while parsing
    pub fn validate(&self) -> DashResult<()> {
        self.tz()?;
        self.display_window()?;
        if self.usage_refresh_secs == 0 || self.analytics_refresh_secs == 0 || self.revenue_refresh_secs == 0 {
            return Err(config_error("Refresh intervals must be at least one second"));
        }
        Ok(())
    }

    /// Parsed dashboard timezone
    pub fn tz(&self) -> DashResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Invalid timezone: {}", self.timezone)))
    }

    /// Calendar display window
    pub fn display_window(&self) -> DashResult<DisplayWindow> {
        DisplayWindow::new(self.display_start_minutes, self.display_end_minutes, self.row_height)
    }

    /// Check if a component is enabled
    pub fn is_component_enabled(&self, name: &str) -> bool {
        *self.components.get(name).unwrap_or(&false)
    }
}

fn default_components() -> HashMap<String, bool> {
    let mut components = HashMap::new();
    components.insert("poller".to_string(), true);
    components
}

/// Parse the component enable flags file
fn parse_components(content: &str) -> DashResult<HashMap<String, bool>> {
    Ok(toml::from_str(content)?)
}

/// Read a variable, treating empty values as unset
fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> DashResult<T> {
    match optional_var(key) {
        Some(value) => value.parse::<T>().map_err(|_| env_error(key)),
        None => Ok(default),
    }
}

/// Split a comma separated list of emails, lowercased
pub fn parse_email_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}
