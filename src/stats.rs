// stats.rs — Remaining-count aggregation and snapshot assembly.
// One snapshot = remaining cards (summed across decks) + studied time
// (extracted from the stats report), captured together, all-or-nothing.

use chrono::{DateTime, Local};
use serde::Deserialize;
use tracing::debug;

use crate::client::{AnkiConnect, ClientError};
use crate::report::studied_seconds;

/// Anki reports a synthetic aggregate deck that double-counts everything.
const AGGREGATE_DECK: &str = "All";

/// Per-deck counters as returned by `getDeckStats`. Transient — lives only
/// for the duration of one aggregation call.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DeckStats {
    pub new_count: u32,
    pub learn_count: u32,
    pub review_count: u32,
}

/// One immutable capture of study progress. Superseded, never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSnapshot {
    /// Cards still due today across all decks.
    pub remaining: u32,
    /// Seconds studied today, 0.0 when the report had no usable phrase.
    pub studied_secs: f64,
    pub captured_at: DateTime<Local>,
}

/// Sum the due-card counters across every concrete deck.
///
/// The synthetic "All" deck is dropped (exact name match only). An empty
/// collection short-circuits to 0 without issuing the stats call —
/// AnkiConnect rejects an empty deck list.
pub async fn remaining_count(api: &dyn AnkiConnect) -> Result<u32, ClientError> {
    let deck_names = api.deck_names().await?;

    let concrete: Vec<String> = deck_names
        .into_iter()
        .filter(|name| name != AGGREGATE_DECK)
        .collect();

    if concrete.is_empty() {
        debug!("No concrete decks in collection");
        return Ok(0);
    }

    let stats = api.deck_stats(&concrete).await?;

    let total = stats
        .values()
        .map(|entry| entry.new_count + entry.learn_count + entry.review_count)
        .sum();

    debug!(decks = concrete.len(), remaining = total, "Deck stats aggregated");
    Ok(total)
}

/// Build one snapshot: remaining count and stats report fetched
/// concurrently, either failure aborts the whole build.
pub async fn build_snapshot(api: &dyn AnkiConnect) -> Result<ReviewSnapshot, ClientError> {
    let (remaining, html) = tokio::try_join!(remaining_count(api), api.collection_stats_html())?;

    let studied_secs = studied_seconds(&html);

    Ok(ReviewSnapshot {
        remaining,
        studied_secs,
        captured_at: Local::now(),
    })
}

/// Render seconds as "2h 5m" / "45m" / "0m" for human consumption.
pub fn format_duration(seconds: f64) -> String {
    if seconds <= 0.0 {
        return "0m".to_string();
    }

    let total = seconds.round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
