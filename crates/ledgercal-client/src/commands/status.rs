//! `ledgercal status`: daemon state and recent sync history.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use ledgercal_core::SyncStatusReport;
use ledgercal_protocol::StatusInfo;
use serde::Serialize;

use super::{Context, print_json};
use crate::error::ClientResult;

#[derive(Debug, Serialize)]
struct StatusOutput {
    daemon: StatusInfo,
    #[serde(flatten)]
    history: SyncStatusReport,
}

pub async fn run(ctx: &Context, limit: Option<usize>, json: bool) -> ClientResult<()> {
    let client = ctx.client();
    let daemon = client.status().await?;
    let history = client.sync_status(limit).await?;

    if json {
        print_json(&StatusOutput { daemon, history })
    } else {
        print!("{}", render(&daemon, &history));
        Ok(())
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn render(daemon: &StatusInfo, history: &SyncStatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "daemon: up {}s, {} calendar {}",
        daemon.uptime_seconds, daemon.provider, daemon.calendar_id
    );
    match (daemon.last_sync, daemon.last_outcome) {
        (Some(at), Some(outcome)) => {
            let _ = writeln!(out, "last sync: {} ({})", timestamp(at), outcome.as_str());
        }
        _ => out.push_str("last sync: never\n"),
    }
    if let Some(next) = daemon.next_scheduled_sync {
        let _ = writeln!(out, "next scheduled sync: {}", timestamp(next));
    }

    let c = &history.last_24h;
    let _ = writeln!(
        out,
        "last 24h: {} passes ({} ok, {} partial, {} failed), {} pushed, {} pulled, {} deleted",
        c.passes, c.succeeded, c.partial, c.failed, c.pushed, c.pulled, c.deleted
    );

    for entry in &history.recent {
        let s = &entry.summary;
        let _ = writeln!(
            out,
            "  {} {:<9} {:<9} {:<7} +{} <{} -{} ={}{}",
            timestamp(entry.started_at),
            entry.trigger.as_str(),
            s.sync_type.as_str(),
            entry.outcome.as_str(),
            s.pushed,
            s.pulled,
            s.deleted,
            s.skipped,
            match s.errors.len() {
                0 => String::new(),
                n => format!(" ({n} errors)"),
            }
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ledgercal_core::{PassOutcome, SyncLogCounts, SyncLogEntry, SyncSummary, SyncTrigger, SyncType};

    #[test]
    fn renders_daemon_and_history() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
        let daemon = StatusInfo::new(90, "google", "primary")
            .with_last_sync(at, PassOutcome::Partial);

        let mut summary = SyncSummary::new(SyncType::Generated);
        summary.pushed = 1;
        summary.push_error("create failed for X: boom");
        let history = SyncStatusReport {
            recent: vec![SyncLogEntry {
                id: 1,
                calendar_id: "primary".into(),
                trigger: SyncTrigger::Scheduled,
                started_at: at,
                finished_at: at,
                summary,
                outcome: PassOutcome::Partial,
            }],
            last_24h: SyncLogCounts {
                passes: 1,
                partial: 1,
                pushed: 1,
                ..Default::default()
            },
        };

        let text = render(&daemon, &history);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "daemon: up 90s, google calendar primary");
        assert_eq!(lines[1], "last sync: 2025-03-01T06:00:00Z (partial)");
        assert_eq!(
            lines[2],
            "last 24h: 1 passes (0 ok, 1 partial, 0 failed), 1 pushed, 0 pulled, 0 deleted"
        );
        assert!(lines[3].contains("scheduled"));
        assert!(lines[3].ends_with("+1 <0 -0 =0 (1 errors)"));
    }

    #[test]
    fn never_synced() {
        let text = render(
            &StatusInfo::new(1, "google", "primary"),
            &SyncStatusReport::default(),
        );
        assert!(text.contains("last sync: never\n"));
        assert!(!text.contains("next scheduled"));
    }
}
