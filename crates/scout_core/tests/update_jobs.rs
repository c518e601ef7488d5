use pretty_assertions::assert_eq;
use scout_core::{
    normalize_site_for_dedupe, update, JobState, JobStatus, Msg, RowOutcome, LOG_TAIL_LINES,
};

fn row(state: JobState, row: usize, ok: bool) -> JobState {
    let outcome = if ok {
        RowOutcome::Written {
            summary: "555-0100, Ann, Lee, 2".to_string(),
        }
    } else {
        RowOutcome::Failed {
            reason: "site unreachable".to_string(),
        }
    };
    update(
        state,
        Msg::RowFinished {
            row,
            url: "https://a.example".to_string(),
            outcome,
        },
    )
    .0
}

#[test]
fn totals_and_progress_never_decrease() {
    let (mut state, _) = update(
        JobState::new("j", 2, 1),
        Msg::Started {
            total_rows: Some(4),
        },
    );
    let mut last_total = 0;
    let mut last_progress = 0;
    for (i, ok) in [true, false, true, true].into_iter().enumerate() {
        state = row(state, i + 2, ok);
        if state.stats().batch_completed >= 2 {
            let (next, _) = update(state, Msg::Boundary { has_more_rows: true });
            let (next, _) = update(next, Msg::CooldownFinished);
            state = next;
        }
        assert!(state.stats().total_completed >= last_total);
        assert!(state.progress() >= last_progress);
        last_total = state.stats().total_completed;
        last_progress = state.progress();
    }
    assert_eq!(state.stats().total_completed, 3);
    assert_eq!(state.stats().total_errors, 1);
    assert_eq!(state.progress(), 100);
}

#[test]
fn progress_falls_back_to_batch_share_when_total_unknown() {
    let (state, _) = update(JobState::new("j", 4, 1), Msg::Started { total_rows: None });
    let state = row(state, 2, true);
    assert_eq!(state.progress(), 25);
}

#[test]
fn snapshot_serializes_status_shape() {
    let (state, _) = update(
        JobState::new("job-42", 80, 300),
        Msg::Started {
            total_rows: Some(2),
        },
    );
    let state = row(state, 2, true);
    let json = serde_json::to_value(state.snapshot()).unwrap();

    assert_eq!(json["job_id"], "job-42");
    assert_eq!(json["status"], "running");
    assert_eq!(json["progress"], 50);
    assert_eq!(json["stats"]["batch_completed"], 1);
    assert_eq!(json["stats"]["batch_limit"], 80);
    assert_eq!(json["stats"]["total_completed"], 1);
    assert_eq!(json["stats"]["total_errors"], 0);
    assert_eq!(json["stats"]["cooldown_remaining_seconds"], 0);
    assert!(json.get("error").is_none());
    assert_eq!(json["log"].as_array().unwrap().len(), 2);
}

#[test]
fn snapshot_log_is_tail_of_append_only_log() {
    let (mut state, _) = update(JobState::new("j", 1, 0), Msg::Started { total_rows: None });
    for i in 0..(LOG_TAIL_LINES + 10) {
        state = update(state, Msg::Log(format!("line {i}"))).0;
    }
    let snapshot = state.snapshot();
    assert_eq!(snapshot.log.len(), LOG_TAIL_LINES);
    assert_eq!(
        snapshot.log.last().map(String::as_str),
        Some(format!("line {}", LOG_TAIL_LINES + 9).as_str())
    );
    assert_eq!(state.log().len(), LOG_TAIL_LINES + 11);
    assert_eq!(snapshot.status, JobStatus::Running);
}

#[test]
fn zero_batch_limit_is_clamped() {
    let state = JobState::new("j", 0, 1);
    assert_eq!(state.stats().batch_limit, 1);
}

#[test]
fn site_normalization_catches_variants() {
    let canonical = normalize_site_for_dedupe("https://example.com/team");
    assert_eq!(canonical, "https://example.com/team");
    assert_eq!(normalize_site_for_dedupe("HTTPS://EXAMPLE.COM/team/"), canonical);
    assert_eq!(normalize_site_for_dedupe("  https://example.com/team?x=1 "), canonical);
    assert_eq!(normalize_site_for_dedupe("example.com"), "http://example.com/");
    assert_eq!(normalize_site_for_dedupe("   "), "");
}
