//! `ledgercal sync`: one reconciliation pass through the daemon.

use std::fmt::Write as _;

use ledgercal_core::{DateWindow, SyncSummary};
use ledgercal_protocol::SyncParams;

use super::{Context, print_json};
use crate::cli::SyncArgs;
use crate::error::{ClientError, ClientResult};

pub async fn run(ctx: &Context, args: &SyncArgs) -> ClientResult<()> {
    let params = params(ctx, args)?;
    let summary = ctx.client().sync(params).await?;

    if args.json {
        print_json(&summary)
    } else {
        print!("{}", render_summary(&summary));
        Ok(())
    }
}

/// Wire parameters from flags, falling back to the configured defaults.
///
/// The window is left to the daemon unless both ends are given.
pub fn params(ctx: &Context, args: &SyncArgs) -> ClientResult<SyncParams> {
    let sync = &ctx.config.sync;
    let mut params = SyncParams::default()
        .with_sync_type(args.sync_type.unwrap_or(sync.sync_type))
        .with_anniversaries(sync.include_anniversary_events && !args.no_anniversaries);

    if let Some(calendar) = &args.calendar {
        params = params.with_calendar_id(calendar);
    }
    if let (Some(from), Some(to)) = (args.from, args.to) {
        let window = DateWindow::new(from, to)
            .map_err(|e| ClientError::invalid_argument(e.to_string()))?;
        if window.is_empty() {
            return Err(ClientError::invalid_argument(format!(
                "window {window} covers no days"
            )));
        }
        params = params.with_window(window);
    }
    Ok(params)
}

pub fn render_summary(summary: &SyncSummary) -> String {
    let mut out = format!(
        "{} pass: {} pushed, {} pulled, {} deleted, {} skipped\n",
        summary.sync_type, summary.pushed, summary.pulled, summary.deleted, summary.skipped
    );
    if summary.has_errors() {
        let _ = writeln!(out, "{} error(s):", summary.errors.len());
        for error in &summary.errors {
            let _ = writeln!(out, "  - {error}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::config::ClientConfig;
    use clap::Parser;
    use ledgercal_core::SyncType;

    fn ctx(config: ClientConfig) -> Context {
        Context::new(&Cli::parse_from(["ledgercal", "config", "path"]), config)
    }

    fn args(flags: &[&str]) -> SyncArgs {
        let mut argv = vec!["ledgercal", "sync"];
        argv.extend_from_slice(flags);
        match Cli::parse_from(argv).command {
            crate::cli::Command::Sync(args) => args,
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn defaults_come_from_config() {
        let mut config = ClientConfig::default();
        config.sync.sync_type = SyncType::Generated;
        config.sync.include_anniversary_events = false;

        let params = params(&ctx(config), &args(&[])).unwrap();
        assert_eq!(params.sync_type, SyncType::Generated);
        assert!(!params.include_anniversary_events);
        assert!(params.calendar_id.is_none());
        assert!(params.window.is_none());
    }

    #[test]
    fn flags_override_config() {
        let params = params(
            &ctx(ClientConfig::default()),
            &args(&[
                "--calendar",
                "team",
                "--type",
                "generated",
                "--no-anniversaries",
                "--from",
                "2025-01-01",
                "--to",
                "2026-01-01",
            ]),
        )
        .unwrap();
        assert_eq!(params.calendar_id.as_deref(), Some("team"));
        assert_eq!(params.sync_type, SyncType::Generated);
        assert!(!params.include_anniversary_events);
        assert_eq!(params.window, DateWindow::year(2025));
    }

    #[test]
    fn inverted_or_empty_window_is_rejected() {
        let ctx = ctx(ClientConfig::default());
        for (from, to) in [("2025-02-01", "2025-01-01"), ("2025-01-01", "2025-01-01")] {
            let result = params(&ctx, &args(&["--from", from, "--to", to]));
            assert!(matches!(result, Err(ClientError::InvalidArgument(_))), "{from}..{to}");
        }
    }

    #[test]
    fn summary_text() {
        let mut summary = SyncSummary::new(SyncType::All);
        summary.pushed = 2;
        summary.skipped = 1;
        assert_eq!(
            render_summary(&summary),
            "all pass: 2 pushed, 0 pulled, 0 deleted, 1 skipped\n"
        );

        summary.push_error("create failed for [Invoice] INV-2: quota");
        assert!(render_summary(&summary).ends_with(
            "1 error(s):\n  - create failed for [Invoice] INV-2: quota\n"
        ));
    }
}
