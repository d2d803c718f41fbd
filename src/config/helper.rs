use anyhow::{anyhow, Result};
use std::time::Duration;

/// Parse duration string (e.g., "500ms", "30s", "5m", "2h") into Duration
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(anyhow!("Empty duration string"));
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        return Err(anyhow!(
            "Duration must end with 'ms', 's', 'm', or 'h': {}",
            s
        ));
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", num_str))?;

    let secs_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(num)),
        "m" => 60,
        "h" => 3600,
        _ => 1,
    };
    let secs = num
        .checked_mul(secs_per_unit)
        .ok_or_else(|| anyhow!("Duration out of range: {}", s))?;

    Ok(Duration::from_secs(secs))
}
