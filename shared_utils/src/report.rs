//! Report Module
//!
//! Summary reporting for batch operations

use crate::batch::BatchResult;
use std::path::Path;
use std::time::Duration;

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{} KB", bytes / KB)
    } else {
        format!("{} B", bytes)
    }
}

pub fn print_summary_report(
    result: &BatchResult,
    wall_time: Duration,
    output_dir: &Path,
    operation_name: &str,
) {
    println!();
    println!("══════════════════════════════════════════════════════════════");
    println!("📊 {} Summary Report", operation_name);
    println!("══════════════════════════════════════════════════════════════");
    println!("✅ Success:            {}/{} videos", result.succeeded, result.total);
    println!("❌ Failed:             {}", result.failed);
    println!("📈 Success Rate:       {:.1}%", result.success_rate());
    println!("⏱️  Total time:         {}", format_duration(wall_time));
    println!("⏱️  Encode time:        {}", format_duration(result.elapsed));
    if let Some(avg) = result.average_elapsed() {
        println!("⚡ Average per video:  {:.1}s", avg.as_secs_f64());
    }
    println!("📁 Output:             {}", output_dir.display());

    if !result.errors.is_empty() {
        println!();
        println!("❌ Failed Files ({}):", result.errors.len());
        for (path, error) in &result.errors {
            let name = crate::common_utils::file_name_lossy(path);
            println!("   • {} → {}", name, error);
        }
    }
}
