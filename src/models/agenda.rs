use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One occurrence as shown to the user. `occurrence_key` is the stable
/// identity used for acknowledgment and follow-up handle lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaItem {
    pub rule_id: String,
    pub title: String,
    pub instant: NaiveDateTime,
    pub occurrence_key: String,
    pub label: String,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaView {
    /// Future occurrences within the lookahead window, soonest first.
    pub upcoming: Vec<AgendaItem>,
    /// Past, unacknowledged occurrences within the lookback window, most
    /// recent first.
    pub active: Vec<AgendaItem>,
}
