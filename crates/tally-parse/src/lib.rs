//! `STATE-DELTA` block parsing.
//!
//! Upstream text (automation output, model responses, notes) may carry one
//! block of subtractive deltas:
//!
//! ```text
//! STATE-DELTA
//! - entity_001: spell_slot.2 -= 1
//! - entity_002: rage -= 1
//! END STATE-DELTA
//! ```
//!
//! Parsing is permissive: text without a block yields an empty batch and
//! lines that do not match the delta shape are skipped. Callers that want to
//! surface skipped lines use [`parse_with_diagnostics`].
//!
//! ```
//! use tally_parse::parse_state_delta;
//! use tally_types::DeltaKey;
//!
//! let batch = parse_state_delta("STATE-DELTA\n- e1: spell_slot.2 -= 1\nEND STATE-DELTA");
//! assert_eq!(batch.get(&DeltaKey::leveled("e1", 2)), Some(1));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use tally_types::{DeltaBatch, DeltaKey, EntityId, LEVELED_RESOURCE};
use tracing::debug;

/// Matches the first block; markers are case-insensitive and the body spans lines.
#[allow(clippy::expect_used)]
static BLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)STATE-DELTA\s*(?P<body>.*?)\s*END STATE-DELTA")
        .expect("block pattern is a valid literal")
});

/// Matches `- <entity>: <key> -= <amount>` with optional surrounding whitespace.
#[allow(clippy::expect_used)]
static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*-\s*(?P<entity>[a-z0-9_-]+)\s*:\s*(?P<key>[a-z0-9_.-]+)\s*-=\s*(?P<amount>[0-9]+)\s*$",
    )
    .expect("line pattern is a valid literal")
});

/// Line breaks inside the block: `\r\n`, `\n`, or a lone `\r`.
#[allow(clippy::expect_used)]
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n|\r|\n").expect("line break pattern is a valid literal"));

/// Why a line inside the block was left out of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The line is not of the form `- <entity>: <key> -= <amount>`.
    Malformed,
    /// The `spell_slot.` suffix is not an integer that fits in a `u32`.
    InvalidLevel,
}

impl core::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => f.write_str("not a delta line"),
            Self::InvalidLevel => f.write_str("invalid spell slot level"),
        }
    }
}

/// A non-blank line inside the block that did not produce a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number within the whole input text.
    pub line_number: usize,
    /// The line as written, trailing whitespace removed.
    pub text: String,
    /// Why the line was skipped.
    pub reason: SkipReason,
}

/// Result of [`parse_with_diagnostics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Whether a `STATE-DELTA` block was found at all.
    pub block_found: bool,
    /// The accumulated deltas.
    pub batch: DeltaBatch,
    /// Lines inside the block that were ignored, in input order.
    pub skipped: Vec<SkippedLine>,
}

/// Parse the first `STATE-DELTA` block of `text` into a delta batch.
///
/// Returns an empty batch when there is no block. Malformed lines are
/// dropped silently (logged at `debug`).
pub fn parse_state_delta(text: &str) -> DeltaBatch {
    parse_with_diagnostics(text).batch
}

/// Parse like [`parse_state_delta`], also reporting the skipped lines.
pub fn parse_with_diagnostics(text: &str) -> ParseReport {
    let Some(body) = BLOCK_PATTERN
        .captures(text)
        .and_then(|caps| caps.name("body"))
    else {
        debug!("no STATE-DELTA block found");
        return ParseReport::default();
    };

    // Line numbers count from the start of the input, not the block.
    let first_line = text
        .get(..body.start())
        .map_or(0, |prefix| LINE_BREAK.find_iter(prefix).count())
        .saturating_add(1);

    let mut report = ParseReport {
        block_found: true,
        ..ParseReport::default()
    };

    for (index, line) in LINE_BREAK.split(body.as_str()).enumerate() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok((key, amount)) => report.batch.add(key, amount),
            Err(reason) => {
                let line_number = first_line.saturating_add(index);
                debug!(line_number, line, %reason, "skipping STATE-DELTA line");
                report.skipped.push(SkippedLine {
                    line_number,
                    text: line.to_owned(),
                    reason,
                });
            }
        }
    }

    debug!(
        deltas = report.batch.len(),
        skipped = report.skipped.len(),
        "parsed STATE-DELTA block"
    );
    report
}

/// Parse one delta line into its key and amount.
fn parse_line(line: &str) -> Result<(DeltaKey, u64), SkipReason> {
    let caps = LINE_PATTERN.captures(line).ok_or(SkipReason::Malformed)?;
    let (Some(entity), Some(key), Some(amount)) =
        (caps.name("entity"), caps.name("key"), caps.name("amount"))
    else {
        return Err(SkipReason::Malformed);
    };

    // Digits only: parsing fails only on overflow, which saturates.
    let amount: u64 = amount.as_str().parse().unwrap_or(u64::MAX);
    let entity_id = EntityId::from(entity.as_str());
    let key = key.as_str().to_lowercase();

    let delta_key = match key
        .strip_prefix(LEVELED_RESOURCE)
        .and_then(|rest| rest.strip_prefix('.'))
    {
        Some(level) => {
            let level: u32 = level.parse().ok().ok_or(SkipReason::InvalidLevel)?;
            DeltaKey::leveled(entity_id, level)
        }
        None => DeltaKey::scalar(entity_id, key),
    };
    Ok((delta_key, amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = "
    STATE-DELTA
    - entity_001: spell_slot.2 -= 1
    - entity_002: rage -= 1
    - entity_003: ki -= 2
    END STATE-DELTA
    ";

    #[test]
    fn parses_example_block() {
        let batch = parse_state_delta(EXAMPLE);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.get(&DeltaKey::leveled("entity_001", 2)), Some(1));
        assert_eq!(batch.get(&DeltaKey::scalar("entity_002", "rage")), Some(1));
        assert_eq!(batch.get(&DeltaKey::scalar("entity_003", "ki")), Some(2));
    }

    #[test]
    fn no_block_is_empty() {
        assert!(parse_state_delta("nothing to see here").is_empty());
        let report = parse_with_diagnostics("END STATE-DELTA only");
        assert!(!report.block_found);
    }

    #[test]
    fn duplicates_accumulate() {
        let text = "STATE-DELTA\n- e1: rage -= 1\n- e1: rage -= 1\nEND STATE-DELTA";
        let batch = parse_state_delta(text);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.get(&DeltaKey::scalar("e1", "rage")), Some(2));
    }

    #[test]
    fn markers_are_case_insensitive() {
        let text = "state-delta\n- e1: ki -= 3\nend state-delta";
        assert_eq!(
            parse_state_delta(text).get(&DeltaKey::scalar("e1", "ki")),
            Some(3)
        );
    }

    #[test]
    fn key_is_lowercased_entity_is_not() {
        let text = "STATE-DELTA\n- Hero: KI -= 1\n- Hero: Spell_Slot.3 -= 2\nEND STATE-DELTA";
        let batch = parse_state_delta(text);
        assert_eq!(batch.get(&DeltaKey::scalar("Hero", "ki")), Some(1));
        assert_eq!(batch.get(&DeltaKey::leveled("Hero", 3)), Some(2));
    }

    #[test]
    fn bare_spell_slot_maps_to_level_zero() {
        let batch = parse_state_delta("STATE-DELTA\n- e1: spell_slot -= 1\nEND STATE-DELTA");
        assert_eq!(batch.get(&DeltaKey::leveled("e1", 0)), Some(1));
    }

    #[test]
    fn only_first_block_is_read() {
        let text = "STATE-DELTA\n- a: ki -= 1\nEND STATE-DELTA\nSTATE-DELTA\n- b: ki -= 1\nEND STATE-DELTA";
        let batch = parse_state_delta(text);
        assert_eq!(batch.len(), 1);
        assert!(batch.get(&DeltaKey::scalar("a", "ki")).is_some());
    }

    #[test]
    fn malformed_lines_are_reported_with_line_numbers() {
        let text = "intro\nSTATE-DELTA\n- e1: ki -= 1\ne1 loses some rage\n- e1: spell_slot.x -= 1\n- e1: spell_slot.99999999999 -= 1\nEND STATE-DELTA";
        let report = parse_with_diagnostics(text);
        assert!(report.block_found);
        assert_eq!(report.batch.len(), 1);
        let reasons: Vec<(usize, SkipReason)> = report
            .skipped
            .iter()
            .map(|s| (s.line_number, s.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (4, SkipReason::Malformed),
                (5, SkipReason::InvalidLevel),
                (6, SkipReason::InvalidLevel),
            ]
        );
    }

    #[test]
    fn oversized_amount_saturates() {
        let text = "STATE-DELTA\n- e1: ki -= 99999999999999999999999\n- e1: rage -= 1\nEND STATE-DELTA";
        let report = parse_with_diagnostics(text);
        assert!(report.skipped.is_empty());
        assert_eq!(report.batch.get(&DeltaKey::scalar("e1", "ki")), Some(u64::MAX));
        assert_eq!(report.batch.get(&DeltaKey::scalar("e1", "rage")), Some(1));
    }

    #[test]
    fn lone_carriage_returns_split_lines() {
        let text = "note\rSTATE-DELTA\r- e1: ki -= 2\r- e2: rage -= 1\rbad line\rEND STATE-DELTA";
        let report = parse_with_diagnostics(text);
        assert_eq!(report.batch.get(&DeltaKey::scalar("e1", "ki")), Some(2));
        assert_eq!(report.batch.get(&DeltaKey::scalar("e2", "rage")), Some(1));
        let numbers: Vec<usize> = report.skipped.iter().map(|s| s.line_number).collect();
        assert_eq!(numbers, vec![5]);
    }

    #[test]
    fn crlf_line_numbers_count_once() {
        let text = "STATE-DELTA\r\n- e1: ki -= 1\r\n\r\nbad line\r\nEND STATE-DELTA";
        let report = parse_with_diagnostics(text);
        let numbers: Vec<usize> = report.skipped.iter().map(|s| s.line_number).collect();
        assert_eq!(numbers, vec![4]);
    }

    #[test]
    fn negative_amounts_do_not_match() {
        let batch = parse_state_delta("STATE-DELTA\n- e1: ki -= -2\nEND STATE-DELTA");
        assert!(batch.is_empty());
    }

    #[test]
    fn tolerates_spacing_and_crlf() {
        let text = "STATE-DELTA\r\n  -   e1 :  ki   -=  4  \r\nEND STATE-DELTA";
        assert_eq!(
            parse_state_delta(text).get(&DeltaKey::scalar("e1", "ki")),
            Some(4)
        );
    }

    #[test]
    fn rendered_batch_parses_back_to_itself() {
        let batch = parse_state_delta(EXAMPLE);
        assert_eq!(parse_state_delta(&batch.to_string()), batch);
    }

    mod properties {
        use proptest::prelude::*;

        use super::super::*;

        proptest! {
            #[test]
            fn parsing_is_deterministic(text in ".{0,200}") {
                let wrapped = format!("STATE-DELTA\n{text}\nEND STATE-DELTA");
                prop_assert_eq!(parse_state_delta(&wrapped), parse_state_delta(&wrapped));
            }

            #[test]
            fn repeated_lines_sum(
                entity in "[a-z][a-z0-9_]{0,8}",
                resource in "[a-z]{1,8}",
                amounts in proptest::collection::vec(0u64..1_000, 1..10),
            ) {
                let lines: String = amounts
                    .iter()
                    .map(|a| format!("- {entity}: {resource} -= {a}\n"))
                    .collect();
                let batch = parse_state_delta(&format!("STATE-DELTA\n{lines}END STATE-DELTA"));
                let key = DeltaKey::scalar(entity.as_str(), resource.as_str());
                prop_assert_eq!(batch.get(&key), Some(amounts.iter().sum::<u64>()));
            }
        }
    }
}
