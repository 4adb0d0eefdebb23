// report.rs — Studied-time extraction from Anki's collection stats HTML.
// The report is human-readable prose wrapped in markup; this strips the
// markup, locates the "Studied … today" phrase and hands the captured
// duration text to the duration parser.

use regex::Regex;
use tracing::debug;

use crate::duration::parse_duration;

/// Phrase patterns tried in order: the strict Anki wording first, then a
/// looser fallback that survives format drift between Anki releases.
const PHRASE_PATTERNS: &[&str] = &[
    r"(?i)Studied\s+\d+\s+cards?\s+in\s+(.+?)\s+today",
    r"(?i)in\s+(.+?)\s+today",
];

/// Bidirectional-isolate and no-break-space characters that Anki embeds in
/// localized reports. Replaced with plain spaces before pattern matching.
const FORMAT_CHARACTERS: &[char] = &[
    '\u{2066}', '\u{2067}', '\u{2068}', '\u{2069}', '\u{200E}', '\u{200F}', '\u{00A0}',
];

/// Extract today's studied time (in seconds) from the stats report HTML.
///
/// Never fails: a report with no recognizable phrase, or one whose phrase
/// does not parse to a positive duration, yields 0.0.
pub fn studied_seconds(html: &str) -> f64 {
    let text = plain_text(html);

    for pattern in PHRASE_PATTERNS {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };

        let Some(captured) = re.captures(&text).and_then(|c| c.get(1)) else {
            continue;
        };

        let seconds = parse_duration(captured.as_str());
        if seconds > 0.0 {
            debug!(
                pattern,
                phrase = captured.as_str(),
                seconds,
                "Studied-time phrase located"
            );
            return seconds;
        }
    }

    debug!(text_len = text.len(), "No studied-time phrase found in report");
    0.0
}

/// Strip markup and normalize whitespace.
///
/// html2md tolerates malformed and partial HTML (html5ever parsing is total),
/// decodes entities and drops tags; leftover markdown markers do not disturb
/// the phrase patterns.
fn plain_text(html: &str) -> String {
    let stripped = html2md::parse_html(html);

    let despaced: String = stripped
        .chars()
        .map(|c| if FORMAT_CHARACTERS.contains(&c) { ' ' } else { c })
        .collect();

    despaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_phrase_with_markup() {
        let html = "<html><body><b>Studied 12 cards in 1 hour 10 minutes today</b></body></html>";
        assert_eq!(studied_seconds(html), 4200.0);
    }

    #[test]
    fn test_single_card_phrase() {
        assert_eq!(studied_seconds("Studied 1 card in 45 seconds today"), 45.0);
    }

    #[test]
    fn test_fallback_phrase() {
        // No "Studied N cards" prefix: the looser pattern picks it up.
        assert_eq!(studied_seconds("<p>Reviews done in 25 minutes today.</p>"), 1500.0);
    }

    #[test]
    fn test_no_phrase_returns_zero() {
        assert_eq!(studied_seconds("<h1>Collection statistics</h1>"), 0.0);
        assert_eq!(studied_seconds(""), 0.0);
    }

    #[test]
    fn test_malformed_html() {
        let html = "<div><b>Studied 3 cards in 2 minutes today";
        assert_eq!(studied_seconds(html), 120.0);
    }

    #[test]
    fn test_plain_text_input() {
        // Raw prose with no markup at all still works.
        assert_eq!(studied_seconds("Studied 30 cards in 10 minutes today"), 600.0);
    }

    #[test]
    fn test_format_characters_replaced() {
        let html = "Studied 7 cards in\u{00A0}\u{2066}15 minutes\u{2069} today";
        assert_eq!(studied_seconds(html), 900.0);
    }

    #[test]
    fn test_zero_duration_phrase_falls_through() {
        // Strict pattern matches but parses to 0; the fallback then captures
        // a shorter span that also fails, so the whole extraction degrades.
        assert_eq!(studied_seconds("Studied 5 cards in no time today"), 0.0);
    }

    #[test]
    fn test_whitespace_collapsed_across_tags() {
        let html = "<td>Studied 9 cards</td>\n<td>in</td>\n<td>1 hour today</td>";
        assert_eq!(studied_seconds(html), 3600.0);
    }
}
