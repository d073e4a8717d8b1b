use chrono::Utc;
use sysinfo::System;

const HOST_ID: &str = "HWMON_HOST_ID";

const DEFAULT_HOST_ID: &str = "localhost";

/// Host identifier used in outbound alerts.
///
/// Lookup order: explicit value, `HWMON_HOST_ID`, the OS host name.
pub fn get_host_id(configured: Option<&str>) -> String {
    if let Some(host) = configured {
        return host.to_string();
    }

    std::env::var(HOST_ID)
        .ok()
        .or_else(System::host_name)
        .unwrap_or_else(|| DEFAULT_HOST_ID.to_string())
}

/// Current time as epoch seconds, the textual form used for `event_time`.
pub fn epoch_seconds() -> String {
    Utc::now().timestamp().to_string()
}

/// Third segment of a `domain:category:fru` resource type.
pub fn fru_segment(resource_type: &str) -> Option<&str> {
    resource_type.split(':').nth(2)
}
