//! Snapshot CLI commands
//!
//! `list` shows what is under the backup root; `prune` applies the retention
//! cap without taking a new snapshot. Both treat the newest snapshot the way
//! `run` treats the one it writes: it is kept and not counted.

use std::fmt::Write as _;

use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::output::{print_output, OutputFormat};
use super::{build_transport, ConfigArgs};
use crate::backup::retention::{self, RetentionPlan};
use crate::cancel::CancellationToken;
use crate::error::{SavesnapError, SavesnapResult};
use crate::snapshot::RemotePath;
use crate::transport::Transport;

/// Arguments for `savesnap list`
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Arguments for `savesnap prune`
#[derive(Args, Debug, Clone)]
pub struct PruneArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Actually delete; without this only the plan is shown
    #[arg(short, long)]
    pub force: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// One row of the snapshot listing
#[derive(Debug, Clone, Serialize, Tabled)]
struct SnapshotRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Snapshot")]
    name: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Retention")]
    status: &'static str,
}

/// What `prune` found and would delete, for JSON and YAML output
#[derive(Debug, Serialize)]
struct PrunePreview<'a> {
    backup_root: String,
    max_backups: Option<usize>,
    #[serde(flatten)]
    plan: &'a RetentionPlan,
}

/// List and plan against the backup root, keeping the newest snapshot
fn plan_for(
    transport: &dyn Transport,
    backup_root: &RemotePath,
    max_backups: Option<usize>,
    cancel: &CancellationToken,
) -> SavesnapResult<RetentionPlan> {
    Ok(retention::plan(
        transport,
        backup_root,
        max_backups.unwrap_or(usize::MAX),
        None,
        cancel,
    )?)
}

fn rows(plan: &RetentionPlan) -> Vec<SnapshotRow> {
    plan.snapshots
        .iter()
        .enumerate()
        .map(|(i, name)| SnapshotRow {
            index: i + 1,
            name: name.to_string(),
            created: name.created_at().format("%Y-%m-%d %H:%M:%S").to_string(),
            host: name.host().to_string(),
            status: if plan.to_delete.iter().any(|d| d.as_str() == name.as_str()) {
                "prune"
            } else {
                "keep"
            },
        })
        .collect()
}

fn render_table(rows: Vec<SnapshotRow>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    format!("{}\n", table)
}

/// Handle `savesnap list`
pub fn handle_list_command(args: &ListArgs, cancel: &CancellationToken) -> anyhow::Result<u8> {
    let settings = args.config.settings()?;
    let backup_root = settings.backup_root()?;
    let policy = settings.retention()?;
    let transport = build_transport(&settings, &backup_root)?;

    let plan = plan_for(transport.as_ref(), &backup_root, policy.max_backups(), cancel)?;
    let rows = rows(&plan);

    print_output(&rows, args.format, || {
        if rows.is_empty() {
            return format!("No snapshots found under {}\n", backup_root);
        }

        let mut out = render_table(rows.clone());
        out.push_str(&format!("\nTotal: {} snapshot(s)", rows.len()));
        if let Some(max) = policy.max_backups() {
            out.push_str(&format!(", keeping at most {} besides the newest", max));
        }
        out.push('\n');
        if !plan.ignored.is_empty() {
            out.push_str(&format!(
                "Ignored {} entry(ies) that are not snapshots\n",
                plan.ignored.len()
            ));
        }
        out
    })?;

    Ok(0)
}

/// Handle `savesnap prune`
pub fn handle_prune_command(args: &PruneArgs, cancel: &CancellationToken) -> anyhow::Result<u8> {
    let settings = args.config.settings()?;
    let backup_root = settings.backup_root()?;
    let policy = settings.retention()?;

    let Some(max_backups) = policy.max_backups() else {
        let preview = PrunePreview {
            backup_root: backup_root.to_string(),
            max_backups: None,
            plan: &RetentionPlan::default(),
        };
        print_output(&preview, args.format, || {
            "No retention cap configured; nothing to prune.\n\
             Set one with --max-backups or SAVESNAP_MAX_BACKUPS.\n"
                .to_string()
        })?;
        return Ok(0);
    };

    let transport = build_transport(&settings, &backup_root)?;
    let plan = plan_for(transport.as_ref(), &backup_root, Some(max_backups), cancel)?;
    let preview = PrunePreview {
        backup_root: backup_root.to_string(),
        max_backups: Some(max_backups),
        plan: &plan,
    };

    if plan.to_delete.is_empty() {
        print_output(&preview, args.format, || {
            format!(
                "No snapshots to prune: {} found, keeping at most {} besides the newest.\n",
                plan.snapshots.len(),
                max_backups
            )
        })?;
        return Ok(0);
    }

    if !args.force {
        print_output(&preview, args.format, || {
            let mut out = String::new();
            let _ = writeln!(out, "Prune Summary");
            let _ = writeln!(out, "=============");
            let _ = writeln!(out, "Backup root:      {}", backup_root);
            let _ = writeln!(out, "Retention cap:    {} (plus the newest)", max_backups);
            let _ = writeln!(out, "Current:          {} snapshot(s)", plan.snapshots.len());
            let _ = writeln!(out, "To be deleted:    {}", plan.to_delete.len());
            for name in &plan.to_delete {
                let _ = writeln!(out, "  - {}", name);
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "To delete them, run again with --force:");
            let _ = writeln!(out, "  savesnap prune --force");
            out
        })?;
        return Ok(0);
    }

    let report = retention::enforce(transport.as_ref(), &backup_root, &policy, None, cancel);

    print_output(&report, args.format, || {
        let mut out = format!("Deleted {} snapshot(s).\n", report.deleted.len());
        for name in &report.deleted {
            out.push_str(&format!("  - {}\n", name));
        }
        if let Some(error) = &report.list_error {
            out.push_str(&format!("Warning: could not list snapshots: {}\n", error));
        }
        for failure in &report.failures {
            out.push_str(&format!(
                "Warning: could not delete {}: {}\n",
                failure.snapshot, failure.error
            ));
        }
        out
    })?;

    if report.cancelled {
        return Err(SavesnapError::Cancelled.into());
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    const NAMES: [&str; 3] = [
        "2025-11-01_080000-box",
        "2025-11-02_080000-box",
        "2025-11-03_080000-box",
    ];

    fn root() -> RemotePath {
        "mem:/backups".parse().unwrap()
    }

    #[test]
    fn test_rows_mark_snapshots_over_the_cap() {
        let transport = MemoryTransport::with_entries(&root(), &NAMES);
        transport.add_dir(&root().join("lost+found"));

        let plan = plan_for(&transport, &root(), Some(1), &CancellationToken::new()).unwrap();
        let rows = rows(&plan);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].name, NAMES[0]);
        assert_eq!(rows[0].status, "prune");
        assert_eq!(rows[1].status, "keep");
        assert_eq!(rows[2].status, "keep");
        assert_eq!(rows[2].created, "2025-11-03 08:00:00");
        assert_eq!(rows[2].host, "box");
        assert_eq!(plan.ignored, vec!["lost+found".to_string()]);
        assert!(transport.delete_calls().is_empty());
    }

    #[test]
    fn test_rows_without_cap_keep_everything() {
        let transport = MemoryTransport::with_entries(&root(), &NAMES);

        let plan = plan_for(&transport, &root(), None, &CancellationToken::new()).unwrap();
        assert!(rows(&plan).iter().all(|row| row.status == "keep"));
    }

    #[test]
    fn test_newest_is_kept_outside_the_cap() {
        let transport = MemoryTransport::with_entries(&root(), &NAMES);

        let plan = plan_for(&transport, &root(), Some(2), &CancellationToken::new()).unwrap();
        assert!(rows(&plan).iter().all(|row| row.status == "keep"));
    }

    #[test]
    fn test_prune_preview_serializes_plan() {
        let transport = MemoryTransport::with_entries(&root(), &NAMES);
        let plan = plan_for(&transport, &root(), Some(1), &CancellationToken::new()).unwrap();
        let preview = PrunePreview {
            backup_root: root().to_string(),
            max_backups: Some(1),
            plan: &plan,
        };

        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(json["max_backups"], 1);
        assert_eq!(json["to_delete"][0], NAMES[0]);
        assert_eq!(json["snapshots"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_table_has_headers() {
        let transport = MemoryTransport::with_entries(&root(), &NAMES);
        let plan = plan_for(&transport, &root(), None, &CancellationToken::new()).unwrap();

        let table = render_table(rows(&plan));
        assert!(table.contains("Snapshot"));
        assert!(table.contains("2025-11-02_080000-box"));
    }
}
