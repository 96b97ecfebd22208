//! Persisted output layout (spec §6): the rendered Markdown under
//! `drafts/YYYY/MM/`, a same-day backup copy, and a JSON processing log.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::run::RunState;

fn draft_path(output_dir: &Path, when: DateTime<Utc>, edition: &str) -> PathBuf {
    output_dir
        .join(when.format("%Y").to_string())
        .join(when.format("%m").to_string())
        .join(format!("{}_{}_newsletter.md", when.format("%Y-%m-%d_%H%M"), edition))
}

fn backup_path(output_dir: &Path, when: DateTime<Utc>, edition: &str) -> PathBuf {
    output_dir
        .parent()
        .unwrap_or(output_dir)
        .join("backups")
        .join(when.format("%Y-%m-%d").to_string())
        .join(format!("{}_{}_newsletter.md", when.format("%Y-%m-%d_%H%M"), edition))
}

fn log_path(output_dir: &Path, when: DateTime<Utc>) -> PathBuf {
    output_dir
        .parent()
        .unwrap_or(output_dir)
        .join("logs")
        .join(format!("newsletter_{}.json", when.format("%Y-%m-%d")))
}

/// Write the rendered Markdown to `drafts/YYYY/MM/...`, a backup copy under
/// `backups/YYYY-MM-DD/`, and the processing log under `logs/` (spec §6
/// "Persisted output layout"). Skipped entirely in `--dry-run` mode.
pub fn write_run_outputs(state: &RunState, when: DateTime<Utc>) -> Result<(), std::io::Error> {
    if state.config.cli.dry_run {
        tracing::info!("dry run: skipping output writes");
        return Ok(());
    }

    let Some(newsletter) = &state.newsletter else {
        return Ok(());
    };

    let output_dir = &state.config.cli.output_dir;
    let draft = draft_path(output_dir, when, &state.config.cli.edition);
    if let Some(parent) = draft.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&draft, &newsletter.markdown)?;
    tracing::info!(path = %draft.display(), "wrote newsletter draft");

    let backup = backup_path(output_dir, when, &state.config.cli.edition);
    if let Some(parent) = backup.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&backup, &newsletter.markdown)?;

    let log = log_path(output_dir, when);
    if let Some(parent) = log.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let entries: Vec<serde_json::Value> = state
        .log
        .iter()
        .map(|e| serde_json::json!({ "stage": e.stage, "level": format!("{:?}", e.level), "message": e.message, "at": e.at.to_rfc3339() }))
        .collect();
    let log_document = serde_json::json!({
        "status": format!("{:?}", state.status),
        "edition": state.config.cli.edition,
        "articles": newsletter.articles.len(),
        "clusters": state.clusters.len(),
        "entries": entries,
    });
    std::fs::write(&log, serde_json::to_vec_pretty(&log_document)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn draft_path_follows_year_month_layout() {
        let when = Utc.with_ymd_and_hms(2026, 7, 28, 6, 5, 0).unwrap();
        let path = draft_path(Path::new("drafts"), when, "daily");
        assert_eq!(path, PathBuf::from("drafts/2026/07/2026-07-28_0605_daily_newsletter.md"));
    }

    #[test]
    fn backup_path_groups_by_day() {
        let when = Utc.with_ymd_and_hms(2026, 7, 28, 6, 5, 0).unwrap();
        let path = backup_path(Path::new("drafts"), when, "daily");
        assert_eq!(path, PathBuf::from("backups/2026-07-28/2026-07-28_0605_daily_newsletter.md"));
    }
}
