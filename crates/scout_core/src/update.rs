use crate::{Effect, JobState, JobStatus, Msg, RowOutcome};

/// Pure update function: applies a message to state and returns any effects.
///
/// Only `Msg::Boundary` produces effects; every other message just mutates
/// the record. Terminal states accept log lines and the tally of a row that
/// was already in flight, nothing else.
pub fn update(mut state: JobState, msg: Msg) -> (JobState, Vec<Effect>) {
    let effects = match msg {
        Msg::Started { total_rows } => {
            if state.status() == JobStatus::Pending {
                state.set_total_rows(total_rows);
                state.set_status(JobStatus::Running);
                match total_rows {
                    Some(total) => state.push_log(format!("Starting automation: {total} rows queued.")),
                    None => state.push_log("Starting automation."),
                }
            }
            Vec::new()
        }
        Msg::Boundary { has_more_rows } => decide_next(&mut state, has_more_rows),
        Msg::RowFinished { row, url, outcome } => {
            match outcome {
                RowOutcome::Written { summary } => {
                    state.record_row(true);
                    state.push_log(format!("Row {row}: {url} -> {summary}"));
                }
                RowOutcome::Failed { reason } => {
                    state.record_row(false);
                    state.push_log(format!("Row {row}: {url} failed: {reason}"));
                }
            }
            Vec::new()
        }
        Msg::CooldownTick { remaining_secs } => {
            if state.status() == JobStatus::Cooldown {
                state.stats_mut().cooldown_remaining_seconds = remaining_secs;
            }
            Vec::new()
        }
        Msg::CooldownFinished => {
            if state.status() == JobStatus::Cooldown {
                let stats = state.stats_mut();
                stats.batch_completed = 0;
                stats.cooldown_remaining_seconds = 0;
                if state.take_pause_after_cooldown() {
                    state.set_status(JobStatus::Paused);
                    state.push_log("Cooldown finished; job stays paused.");
                } else {
                    state.set_status(JobStatus::Running);
                    state.push_log("Cooldown finished; resuming.");
                }
            }
            Vec::new()
        }
        Msg::PauseRequested => {
            match state.status() {
                JobStatus::Running => {
                    state.set_status(JobStatus::Paused);
                    state.push_log("Paused by user.");
                }
                JobStatus::Cooldown if !state.pause_after_cooldown() => {
                    state.set_pause_after_cooldown(true);
                    state.push_log("Pause requested; takes effect after cooldown.");
                }
                _ => {}
            }
            Vec::new()
        }
        Msg::ResumeRequested => {
            match state.status() {
                JobStatus::Paused => {
                    state.set_status(JobStatus::Running);
                    state.push_log("Resumed by user.");
                }
                JobStatus::Cooldown if state.pause_after_cooldown() => {
                    state.set_pause_after_cooldown(false);
                    state.push_log("Resumed by user; pending pause cancelled.");
                }
                _ => {}
            }
            Vec::new()
        }
        Msg::StopRequested => {
            if !state.status().is_terminal() {
                state.set_status(JobStatus::Stopped);
                state.stats_mut().cooldown_remaining_seconds = 0;
                state.push_log("Stopped by user.");
            }
            Vec::new()
        }
        Msg::Failed { message } => {
            if !state.status().is_terminal() {
                state.set_status(JobStatus::Error);
                state.stats_mut().cooldown_remaining_seconds = 0;
                state.push_log(format!("Error: {message}"));
                state.set_error(message);
            }
            Vec::new()
        }
        Msg::Log(line) => {
            state.push_log(line);
            Vec::new()
        }
    };

    (state, effects)
}

fn decide_next(state: &mut JobState, has_more_rows: bool) -> Vec<Effect> {
    match state.status() {
        JobStatus::Pending => Vec::new(),
        JobStatus::Completed | JobStatus::Stopped | JobStatus::Error => vec![Effect::Halt],
        JobStatus::Paused => vec![Effect::AwaitResume],
        JobStatus::Cooldown => vec![Effect::Cooldown {
            seconds: state.stats().cooldown_remaining_seconds,
        }],
        JobStatus::Running => {
            if !has_more_rows {
                state.set_status(JobStatus::Completed);
                state.mark_progress_complete();
                state.push_log("All rows processed.");
                return vec![Effect::Halt];
            }
            if state.batch_is_full() {
                let seconds = state.cooldown_secs();
                state.set_status(JobStatus::Cooldown);
                state.stats_mut().cooldown_remaining_seconds = seconds;
                state.push_log(format!(
                    "Batch limit of {} reached; cooling down for {seconds}s.",
                    state.stats().batch_limit
                ));
                return vec![Effect::Cooldown { seconds }];
            }
            vec![Effect::ProcessNextRow]
        }
    }
}
