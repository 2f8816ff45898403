//! Platform facilities: CPU temperature and OS time control.
//!
//! Time changes shell out to `timedatectl` (falling back to `date -s`),
//! which deployment provisioning pre-authorizes for the service user.
//! Platforms without either utility get 501 rather than a silent
//! success.

use chrono::{DateTime, Local, Utc};
use gatehouse_core::{Error, Result};
use tokio::process::Command;
use tracing::{error, warn};

const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";
const COMMAND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// CPU temperature in °C from the OS thermal interface, rounded to one
/// decimal. `None` on platforms without the interface.
#[must_use]
pub fn cpu_temperature() -> Option<f64> {
    let raw = std::fs::read_to_string(THERMAL_ZONE).ok()?;
    let millidegrees: f64 = raw.trim().parse().ok()?;
    Some((millidegrees / 100.0).round() / 10.0)
}

async fn run_privileged(args: &[&str]) -> Result<()> {
    let command_line = format!("sudo {}", args.join(" "));
    let spawned = Command::new("sudo").args(args).kill_on_drop(true).output();

    let output = match tokio::time::timeout(COMMAND_TIMEOUT, spawned).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::Unsupported(format!("{command_line}: not available")));
        }
        Ok(Err(e)) => return Err(Error::Io(e)),
        Err(_) => {
            return Err(Error::storage(format!("{command_line}: timed out")));
        }
    };

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(Error::storage(format!("{command_line} failed: {stderr}")))
    }
}

/// Set the OS wall clock to `timestamp` (unix seconds).
///
/// Tries `timedatectl set-time` first, then `date -s`. Synchronous from
/// the caller's point of view: on `Ok` the clock has changed.
pub async fn set_system_time(timestamp: i64) -> Result<DateTime<Local>> {
    let target_utc = DateTime::<Utc>::from_timestamp(timestamp, 0)
        .ok_or_else(|| Error::validation("timestamp out of range"))?;
    let target: DateTime<Local> = target_utc.with_timezone(&Local);
    let time_str = target.format("%Y-%m-%d %H:%M:%S").to_string();

    match run_privileged(&["timedatectl", "set-time", &time_str]).await {
        Ok(()) => {
            warn!(%time_str, "system time updated via timedatectl");
            return Ok(target);
        }
        Err(Error::Unsupported(_)) => {
            // Fall through to the date fallback below.
        }
        Err(error) => {
            // timedatectl exists but refused (e.g. NTP active); the
            // legacy date path sometimes still works.
            error!(%error, "timedatectl set-time failed; trying date");
        }
    }

    run_privileged(&["date", "-s", &time_str]).await?;
    warn!(%time_str, "system time updated via date");
    Ok(target)
}

/// Enable or disable NTP synchronization via `timedatectl set-ntp`.
pub async fn set_ntp(enable: bool) -> Result<()> {
    let flag = if enable { "true" } else { "false" };
    run_privileged(&["timedatectl", "set-ntp", flag]).await?;
    warn!(enable, "NTP synchronization toggled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_temperature_absent_is_none_or_plausible() {
        // Depends on the host: either no thermal zone (None) or a sane
        // reading.
        if let Some(temp) = cpu_temperature() {
            assert!((-50.0..=150.0).contains(&temp));
        }
    }

    #[tokio::test]
    async fn test_set_system_time_rejects_out_of_range() {
        let result = set_system_time(i64::MAX).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }
}
