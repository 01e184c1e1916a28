//! Output formatting helpers for CLI commands

use crate::roster::{JobSnapshot, JobStage, RosterEvent};
use crate::stream::MetricSample;
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for job display
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobView {
    pub id: String,
    pub name: String,
    pub stage: JobStage,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&JobSnapshot> for JobView {
    fn from(job: &JobSnapshot) -> Self {
        Self {
            id: job.id.to_string(),
            name: job.title().to_string(),
            stage: job.stage,
            message: job.message.clone(),
            created_at: job.created_at,
        }
    }
}

/// Format jobs as a table
pub fn format_jobs_table(jobs: &[JobView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Name", "Stage", "Message", "Created"]);

    for job in jobs {
        let created = job
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(&job.id),
            Cell::new(&job.name),
            Cell::new(stage_label(job.stage)),
            Cell::new(&job.message),
            Cell::new(created),
        ]);
    }

    table.to_string()
}

/// Format jobs as JSON
pub fn format_jobs_json(jobs: &[JobView]) -> String {
    serde_json::to_string_pretty(&json!({
        "jobs": jobs
    }))
    .unwrap()
}

/// Stage colored for terminal display
pub fn stage_label(stage: JobStage) -> String {
    match stage {
        JobStage::Running => "RUNNING".green().to_string(),
        JobStage::Updating => "UPDATING".cyan().to_string(),
        JobStage::Completed => "COMPLETED".blue().to_string(),
        JobStage::Error => "ERROR".red().to_string(),
        JobStage::Pending | JobStage::Queued => stage.as_str().yellow().to_string(),
        JobStage::Unknown => "UNKNOWN".dimmed().to_string(),
    }
}

/// Get marker icon for a job stage
pub fn stage_icon(stage: JobStage) -> &'static str {
    match stage {
        JobStage::Running | JobStage::Updating => "▶",
        JobStage::Completed => "✓",
        JobStage::Error => "✗",
        JobStage::Pending | JobStage::Queued => "…",
        JobStage::Unknown => "?",
    }
}

/// One-line notification for a roster change.
pub fn format_roster_event(event: &RosterEvent) -> String {
    match event {
        RosterEvent::StageChanged {
            display_name,
            old,
            new,
            ..
        } => format!(
            "{} {}: {} → {}",
            stage_icon(*new),
            display_name,
            old,
            stage_label(*new)
        ),
        RosterEvent::JobRemoved {
            display_name,
            last_stage,
            implicitly_completed,
            ..
        } => {
            if *implicitly_completed {
                format!("✓ {}: completed (left the roster)", display_name)
            } else {
                format!("- {}: removed (last stage {})", display_name, last_stage)
            }
        }
        RosterEvent::JobAdded {
            display_name,
            stage,
            ..
        } => format!("+ {}: added ({})", display_name, stage_label(*stage)),
    }
}

/// One-line summary of a metric sample.
pub fn format_sample(sample: &MetricSample) -> String {
    let mut parts = vec![format!("cpu {:>5.1}%", sample.cpu_pct)];

    match sample.mem_fraction() {
        Some(fraction) => parts.push(format!(
            "mem {} / {} ({:.0}%)",
            format_bytes(sample.mem_used_bytes),
            format_bytes(sample.mem_total_bytes),
            fraction * 100.0
        )),
        None => parts.push(format!("mem {}", format_bytes(sample.mem_used_bytes))),
    }

    if !sample.gpus.is_empty() {
        let mut ids: Vec<&String> = sample.gpus.keys().collect();
        ids.sort();
        for id in ids {
            let gpu = &sample.gpus[id];
            parts.push(format!("gpu{} {:>5.1}%", id, gpu.utilization_pct));
        }
    }

    parts.push(format!(
        "net rx {} tx {}",
        format_rate(sample.rx_bps),
        format_rate(sample.tx_bps)
    ));

    let prefix = match &sample.replica_id {
        Some(replica) => format!("[{}] ", replica),
        None => String::new(),
    };

    format!(
        "{}{}  {}",
        prefix,
        sample.received_at.format("%H:%M:%S"),
        parts.join("  ")
    )
}

/// Human-readable byte count (binary units).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Human-readable bit rate.
pub fn format_rate(bps: f64) -> String {
    const UNITS: [&str; 4] = ["bps", "Kbps", "Mbps", "Gbps"];
    let mut value = bps;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
