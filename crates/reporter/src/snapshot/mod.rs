//! Host snapshot sent on every reporter tick.
//!
//! Only cheap host facts are gathered here; the relayer forwards the JSON
//! without looking at it.

use serde::Serialize;

/// Host facts.
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub hostname: String,
    pub system: &'static str,
    pub arch: &'static str,
    pub pid: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuInfo {
    pub cpu_count_logical: usize,
}

/// One telemetry sample.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Host")]
    pub host: HostInfo,
    #[serde(rename = "CPU")]
    pub cpu: CpuInfo,
}

/// Local hostname, or `unknown` when the OS will not say.
pub fn hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn collect_snapshot() -> Snapshot {
    Snapshot {
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        host: HostInfo {
            hostname: hostname(),
            system: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            pid: std::process::id(),
        },
        cpu: CpuInfo {
            cpu_count_logical: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_uses_dashboard_keys() {
        let value = serde_json::to_value(collect_snapshot()).unwrap();
        assert!(value["Timestamp"].is_string());
        assert_eq!(value["Host"]["pid"], std::process::id());
        assert_eq!(value["Host"]["system"], std::env::consts::OS);
        assert!(value["CPU"]["cpu_count_logical"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn timestamp_format() {
        let ts = collect_snapshot().timestamp;
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[test]
    fn hostname_is_never_empty() {
        assert!(!hostname().is_empty());
    }
}
