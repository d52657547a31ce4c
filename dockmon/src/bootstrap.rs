//! Store initialization with bounded retries
//!
//! The service must never run against a store it cannot reach, so startup
//! retries initialization with exponential backoff and gives up for good
//! after a fixed number of attempts.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::errors::MonitorError;
use crate::storage::settings::BootstrapSettings;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Something that must be initialized before the service can start
#[async_trait]
pub trait StoreInitializer: Send + Sync {
    /// Connect to and prepare the store; safe to call repeatedly
    async fn initialize(&self) -> Result<(), MonitorError>;
}

/// Bootstrap options
#[derive(Debug, Clone)]
pub struct Options {
    /// Total attempts, including the first
    pub max_retries: u32,

    /// Backoff between attempts
    pub cooldown: CooldownOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_retries: 15,
            cooldown: CooldownOptions::default(),
        }
    }
}

impl From<&BootstrapSettings> for Options {
    fn from(settings: &BootstrapSettings) -> Self {
        Self {
            max_retries: settings.max_retries.max(1),
            cooldown: CooldownOptions {
                base_delay: Duration::from_millis(settings.initial_delay_ms),
                ..CooldownOptions::default()
            },
        }
    }
}

/// Delay slept after failed attempt `attempt` (0-based)
pub fn retry_delay(options: &Options, attempt: u32) -> Duration {
    calc_exp_backoff(&options.cooldown, attempt)
}

/// Run `initializer` until it succeeds or `options.max_retries` attempts fail
///
/// Returns the number of attempts used. On exhaustion the caller is expected
/// to terminate the process.
pub async fn run<I, S, F>(options: &Options, initializer: &I, sleep_fn: S) -> Result<u32, MonitorError>
where
    I: StoreInitializer + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let max_retries = options.max_retries.max(1);
    info!("Starting store initialization with up to {} attempts", max_retries);

    let mut attempt = 0;
    loop {
        match initializer.initialize().await {
            Ok(()) => {
                info!(
                    "Store initialized (attempt {}/{})",
                    attempt + 1,
                    max_retries
                );
                return Ok(attempt + 1);
            }
            Err(e) => {
                warn!(
                    "Store initialization failed (attempt {}/{}): {}",
                    attempt + 1,
                    max_retries,
                    e
                );

                if attempt + 1 >= max_retries {
                    error!("Maximum retry attempts reached");
                    return Err(MonitorError::BootstrapExhausted {
                        attempts: max_retries,
                        last_error: e.to_string(),
                    });
                }

                let delay = retry_delay(options, attempt);
                info!("Retrying in {:.1} seconds...", delay.as_secs_f64());
                sleep_fn(delay).await;
                attempt += 1;
            }
        }
    }
}
