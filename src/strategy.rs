/// How a catch-up reply is conditioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStrategy {
    /// Format the recent history directly into the prompt.
    FullHistory,
    /// Condition on a precomputed conversation summary plus history, to
    /// bound prompt size on long conversations.
    Summarized,
}

/// Short conversations always use full history; longer ones prefer the
/// summary when one is available.
pub fn choose_strategy(
    ledger_len: usize,
    summary_available: bool,
    summary_threshold: usize,
) -> ResponseStrategy {
    if summary_available && ledger_len >= summary_threshold {
        ResponseStrategy::Summarized
    } else {
        ResponseStrategy::FullHistory
    }
}
