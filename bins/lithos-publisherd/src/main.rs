use std::sync::Arc;

use lithos_config::{PublisherConfig, load_toml_dir};
use lithos_pubsub::Publisher;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Each configured publisher gets its own OS thread running a single
/// current-thread `tokio` runtime, per the per-role event-loop model: one
/// main loop per publisher, no work-stealing across publishers.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")))
        .init();

    let config_dir =
        std::env::args().nth(1).unwrap_or_else(|| "/etc/lithos/publisherd".to_string());
    let configs: Vec<(String, PublisherConfig)> = load_toml_dir(&config_dir)?;
    if configs.is_empty() {
        error!(%config_dir, "no publisher configs found");
        return Ok(());
    }

    let mut handles = Vec::with_capacity(configs.len());
    for (name, config) in configs {
        handles.push(std::thread::spawn(move || {
            if let Err(e) = run_publisher(&name, config) {
                error!(publisher = %name, %e, "publisher thread exited with error");
            }
        }));
    }

    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

fn run_publisher(name: &str, config: PublisherConfig) -> Result<(), Box<dyn std::error::Error>> {
    let publisher_id = fnv1a32(name);
    let publisher_date = today_yyyymmdd();

    let publisher = Arc::new(Publisher::open(&config, publisher_id, publisher_date)?);
    info!(publisher = %name, "starting publisher loop");

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(publisher.run())?;
    Ok(())
}

fn fnv1a32(s: &str) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for byte in s.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(0x01000193);
    }
    hash
}

fn today_yyyymmdd() -> i32 {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    let days = secs / 86_400;
    let (y, m, d) = civil_from_days(days);
    y * 10_000 + m * 100 + d
}

/// Howard Hinnant's days-from-civil algorithm, inverted: converts a day count
/// since the Unix epoch into a (year, month, day) triple without pulling in a
/// calendar crate for a single timestamp field.
fn civil_from_days(z: i64) -> (i32, i32, i32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as i32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as i32;
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}
