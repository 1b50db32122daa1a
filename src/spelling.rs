//! Spelling Outcome Evaluator
//!
//! Maps a typed answer plus hint/attempt context onto [`SpellingOutcome`].
//! - `Legacy`: case-insensitive exact match
//! - `Tolerant`: bounded edit distance, quality 5/4/3 for distance 0/1/2, each of
//!   hint and retry costs one step without dropping a pass below quality 3

use serde::{Deserialize, Serialize};

use crate::types::SpellingOutcome;

/// Largest edit distance still accepted in tolerant mode
pub const TOLERANT_EDIT_CAP: usize = 2;

const PASSING_QUALITY_FLOOR: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpellingMode {
    #[default]
    Legacy,
    Tolerant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellingEvaluation {
    pub outcome: SpellingOutcome,
    /// SM-2 quality after hint/retry penalties, 0 on failure
    pub quality: u8,
    /// Edit distance, capped at `TOLERANT_EDIT_CAP + 1`; exact-match mode reports 0 or 1
    pub distance: usize,
}

pub fn evaluate(
    input: &str,
    correct_answer: &str,
    hint_used: bool,
    attempt_count: i32,
    mode: SpellingMode,
) -> SpellingOutcome {
    evaluate_detailed(input, correct_answer, hint_used, attempt_count, mode).outcome
}

pub fn evaluate_detailed(
    input: &str,
    correct_answer: &str,
    hint_used: bool,
    attempt_count: i32,
    mode: SpellingMode,
) -> SpellingEvaluation {
    let input = normalize(input);
    let answer = normalize(correct_answer);
    let later_attempt = attempt_count.max(1) > 1;

    if input.is_empty() {
        return failed(TOLERANT_EDIT_CAP + 1);
    }

    match mode {
        SpellingMode::Legacy => {
            if input != answer {
                return failed(1);
            }
            let (outcome, quality) = if hint_used {
                (SpellingOutcome::Hinted, 4)
            } else if later_attempt {
                (SpellingOutcome::RetrySuccess, 3)
            } else {
                (SpellingOutcome::Perfect, 5)
            };
            SpellingEvaluation {
                outcome,
                quality,
                distance: 0,
            }
        }
        SpellingMode::Tolerant => {
            let distance = bounded_edit_distance(&input, &answer, TOLERANT_EDIT_CAP);
            let base: u8 = match distance {
                0 => 5,
                1 => 4,
                2 => 3,
                _ => return failed(distance),
            };
            let quality = base
                .saturating_sub(u8::from(hint_used))
                .saturating_sub(u8::from(later_attempt))
                .max(PASSING_QUALITY_FLOOR);

            let outcome = if quality == 5 {
                SpellingOutcome::Perfect
            } else if hint_used {
                SpellingOutcome::Hinted
            } else if later_attempt || quality == 3 {
                SpellingOutcome::RetrySuccess
            } else {
                SpellingOutcome::Hinted
            };
            SpellingEvaluation {
                outcome,
                quality,
                distance,
            }
        }
    }
}

fn failed(distance: usize) -> SpellingEvaluation {
    SpellingEvaluation {
        outcome: SpellingOutcome::Failed,
        quality: 0,
        distance,
    }
}

/// Trim, lowercase and collapse inner whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Levenshtein distance that stops as soon as every cell of the current row
/// exceeds `cap`, returning `cap + 1`
pub fn bounded_edit_distance(a: &str, b: &str, cap: usize) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let over = cap + 1;

    if a.len().abs_diff(b.len()) > cap {
        return over;
    }
    if a.is_empty() || b.is_empty() {
        return a.len().max(b.len()).min(over);
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > cap {
            return over;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()].min(over)
}
