/// What the worker must do next, as decided by [`crate::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Take the next pending row and process it.
    ProcessNextRow,
    /// The job is paused; wait and ask again.
    AwaitResume,
    /// Sleep out a cooldown of the given length, ticking the remaining time.
    Cooldown { seconds: u64 },
    /// Leave the row loop; the job reached a terminal state.
    Halt,
}
