//! Host resource snapshot for the admin stats endpoint.

use serde::Serialize;
use std::path::Path;
use sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, System};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Formatted CPU, memory and disk figures.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    /// CPU usage across all cores, e.g. `"12.5%"`.
    pub cpu_usage: String,
    /// Share of memory in use.
    pub memory_usage: String,
    /// Memory available for new allocations, e.g. `"3.2 GB"`.
    pub memory_available: String,
    /// Share of the root disk in use.
    pub disk_usage: String,
    /// Free space on the root disk.
    pub disk_free: String,
}

impl SystemStats {
    /// Sample the host. CPU usage needs two readings, so this waits one sampling interval.
    pub async fn collect() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_cpu_usage();
        system.refresh_memory();

        let total_memory = system.total_memory();
        let available_memory = system.available_memory();
        let memory_used = total_memory.saturating_sub(available_memory);
        let (disk_total, disk_free) = root_disk();
        let disk_used = disk_total.saturating_sub(disk_free);

        Self {
            cpu_usage: format_percent(f64::from(system.global_cpu_usage())),
            memory_usage: format_percent(usage_percent(memory_used, total_memory)),
            memory_available: format_gib(available_memory),
            disk_usage: format_percent(usage_percent(disk_used, disk_total)),
            disk_free: format_gib(disk_free),
        }
    }
}

/// Total and available bytes of the disk mounted at the filesystem root.
fn root_disk() -> (u64, u64) {
    let root = if cfg!(windows) {
        Path::new("C:\\")
    } else {
        Path::new("/")
    };
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == root)
        .or_else(|| disks.list().first())
        .map(|disk| (disk.total_space(), disk.available_space()))
        .unwrap_or((0, 0))
}

fn usage_percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}

fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

fn format_gib(bytes: u64) -> String {
    format!("{:.1} GB", bytes as f64 / GIB)
}

/// Render a byte count in kilobytes, e.g. `"12.3 KB"`.
pub fn format_kib(bytes: u64) -> String {
    if bytes == 0 {
        return "0 KB".into();
    }
    format!("{:.1} KB", bytes as f64 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes_and_percentages() {
        assert_eq!(format_gib(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
        assert_eq!(format_kib(0), "0 KB");
        assert_eq!(format_kib(2048), "2.0 KB");
        assert_eq!(format_percent(usage_percent(1, 4)), "25.0%");
        assert_eq!(usage_percent(5, 0), 0.0);
    }

    #[tokio::test]
    async fn collect_produces_formatted_fields() {
        let stats = SystemStats::collect().await;
        assert!(stats.cpu_usage.ends_with('%'));
        assert!(stats.memory_available.ends_with(" GB"));
        assert!(stats.disk_free.ends_with(" GB"));
    }
}
