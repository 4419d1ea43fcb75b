//! Process-environment configuration.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Env {
    /// Chat-platform bot token used for membership lookups.
    pub bot_token: String,
    #[serde(default = "default_poll_attempts")]
    pub membership_poll_attempts: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub membership_poll_interval_secs: u64,
}

fn default_poll_attempts() -> u32 {
    crate::membership::MEMBERSHIP_POLL_ATTEMPTS
}

fn default_poll_interval_secs() -> u64 {
    crate::membership::MEMBERSHIP_POLL_INTERVAL.as_secs()
}

pub fn load() -> anyhow::Result<Env> {
    dotenv::dotenv().ok();
    Ok(envy::from_env::<Env>()?)
}
