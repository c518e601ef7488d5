#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Worker started; `total_rows` is the size of the work list if known.
    Started { total_rows: Option<usize> },
    /// Worker reached a row boundary and asks what to do next.
    Boundary { has_more_rows: bool },
    /// A row finished, successfully or not.
    RowFinished {
        row: usize,
        url: String,
        outcome: RowOutcome,
    },
    /// Cooldown countdown update.
    CooldownTick { remaining_secs: u64 },
    /// Cooldown elapsed.
    CooldownFinished,
    /// User clicked Pause.
    PauseRequested,
    /// User clicked Resume.
    ResumeRequested,
    /// User clicked Stop.
    StopRequested,
    /// Orchestrator-level failure; the job cannot continue.
    Failed { message: String },
    /// Free-form progress line for the job log.
    Log(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Facts were written back; `summary` is a short human-readable digest.
    Written { summary: String },
    /// The row failed and was skipped.
    Failed { reason: String },
}
