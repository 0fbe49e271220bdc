//! Espera acotada de trabajos externos asíncronos.
//!
//! Un trabajo remoto (p.ej. render de un clip) se consulta cada `interval`
//! hasta que esté listo, con dos cotas: `max_attempts` consultas y `timeout`
//! de tiempo total. Agotar cualquiera produce `StageError::Timeout`.

use std::future::Future;
use std::time::Duration;

use gen_core::{ConfigError, ConfigSchema, RunConfig, StageError};
use log::debug;
use tokio::time::Instant;

pub const POLL_INTERVAL_MS: &str = "GENFLOW_POLL_INTERVAL_MS";
pub const POLL_MAX_ATTEMPTS: &str = "GENFLOW_POLL_MAX_ATTEMPTS";
pub const POLL_TIMEOUT_SECS: &str = "GENFLOW_POLL_TIMEOUT_SECS";

/// Estado reportado por el servicio en cada consulta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Pending,
    Ready(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_secs(10),
               max_attempts: 90,
               timeout: Duration::from_secs(15 * 60) }
    }
}

impl PollPolicy {
    /// Claves opcionales que ajustan la política.
    pub fn config_schema() -> ConfigSchema {
        ConfigSchema::empty().optional(POLL_INTERVAL_MS)
                             .optional(POLL_MAX_ATTEMPTS)
                             .optional(POLL_TIMEOUT_SECS)
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, ConfigError> {
        let default = Self::default();
        let interval_ms = config.parse_or(POLL_INTERVAL_MS, default.interval.as_millis() as u64)?;
        let max_attempts = config.parse_or(POLL_MAX_ATTEMPTS, default.max_attempts)?;
        let timeout_secs = config.parse_or(POLL_TIMEOUT_SECS, default.timeout.as_secs())?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid { key: POLL_MAX_ATTEMPTS.to_string(),
                                              reason: "must be at least 1".to_string() });
        }
        Ok(Self { interval: Duration::from_millis(interval_ms),
                  max_attempts,
                  timeout: Duration::from_secs(timeout_secs) })
    }
}

/// Consulta `check` hasta obtener `Ready`.
///
/// Espera `interval` antes de cada consulta. Un error de `check` termina la
/// espera de inmediato; una consulta que excede el tiempo restante cuenta
/// como agotamiento.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut check: F) -> Result<T, StageError>
    where F: FnMut(u32) -> Fut,
          Fut: Future<Output = Result<PollStatus<T>, StageError>>
{
    let started = Instant::now();
    let mut attempts = 0;
    while attempts < policy.max_attempts {
        let remaining = match policy.timeout.checked_sub(started.elapsed()) {
            Some(r) if !r.is_zero() => r,
            _ => break,
        };
        attempts += 1;
        let attempt = async {
            tokio::time::sleep(policy.interval).await;
            check(attempts).await
        };
        match tokio::time::timeout(remaining, attempt).await {
            Ok(Ok(PollStatus::Ready(value))) => return Ok(value),
            Ok(Ok(PollStatus::Pending)) => debug!("poll attempt {attempts}: pending"),
            Ok(Err(e)) => return Err(e),
            Err(_) => break,
        }
    }
    Err(StageError::Timeout { attempts,
                              elapsed_ms: started.elapsed().as_millis() as u64 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, timeout_ms: u64) -> PollPolicy {
        PollPolicy { interval: Duration::from_millis(10),
                     max_attempts,
                     timeout: Duration::from_millis(timeout_ms) }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_when_ready() {
        let got = poll_until(policy(5, 1_000), |n| async move {
                      Ok::<_, StageError>(if n < 3 { PollStatus::Pending } else { PollStatus::Ready(n) })
                  }).await;
        assert_eq!(got, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_budget_yields_timeout() {
        let got: Result<(), _> = poll_until(policy(4, 60_000), |_| async { Ok::<_, StageError>(PollStatus::Pending) }).await;
        assert!(matches!(got, Err(StageError::Timeout { attempts: 4, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_budget_yields_timeout() {
        let got: Result<(), _> = poll_until(policy(1_000, 35), |_| async { Ok::<_, StageError>(PollStatus::Pending) }).await;
        let Err(StageError::Timeout { attempts, elapsed_ms }) = got else {
            panic!("expected timeout");
        };
        assert!(attempts <= 4, "attempts = {attempts}");
        assert!(elapsed_ms >= 35);
    }

    #[tokio::test(start_paused = true)]
    async fn service_errors_stop_polling() {
        let got: Result<(), _> = poll_until(policy(10, 1_000), |_| async { Err(StageError::Refused("nsfw".into())) }).await;
        assert_eq!(got, Err(StageError::Refused("nsfw".into())));
    }

    #[test]
    fn policy_reads_overrides_and_rejects_zero_attempts() {
        let cfg = RunConfig::from_pairs([(POLL_INTERVAL_MS, "5"), (POLL_MAX_ATTEMPTS, "3")]);
        let p = PollPolicy::from_config(&cfg).unwrap();
        assert_eq!(p.interval, Duration::from_millis(5));
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.timeout, PollPolicy::default().timeout);

        let bad = RunConfig::from_pairs([(POLL_MAX_ATTEMPTS, "0")]);
        assert!(PollPolicy::from_config(&bad).is_err());
    }
}
