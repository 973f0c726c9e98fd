//! Pairing of statement lines with ledger postings

use super::{ReconciledPair, ReconciliationReport, StatementLine, UnreconciledPosting};
use crate::config::{MatchStrategy, ReconciliationSettings};
use crate::dedup::amounts_match;

/// Matches statement lines against unreconciled postings.
///
/// Amounts must agree to the cent. A posting may be dated on the statement
/// date or up to `max_days_early` days before it, never after.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    settings: ReconciliationSettings,
}

impl ReconciliationEngine {
    pub fn new(settings: ReconciliationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ReconciliationSettings {
        &self.settings
    }

    /// Pair lines with postings. Postings are scanned in the order given,
    /// so callers should pass them sorted by date and insertion order.
    pub fn reconcile(
        &self,
        lines: &[StatementLine],
        postings: &[UnreconciledPosting],
    ) -> ReconciliationReport {
        let mut line_used = vec![false; lines.len()];
        let mut posting_used = vec![false; postings.len()];
        let mut matches = Vec::new();

        match self.settings.strategy {
            MatchStrategy::FirstFit => {
                for (line_index, line) in lines.iter().enumerate() {
                    let found = postings.iter().enumerate().find_map(|(index, posting)| {
                        if posting_used[index] {
                            return None;
                        }
                        self.days_early(line, posting)
                            .map(|days_early| (index, days_early))
                    });
                    if let Some((index, days_early)) = found {
                        line_used[line_index] = true;
                        posting_used[index] = true;
                        matches.push(pair(line_index, &postings[index], days_early));
                    }
                }
            }
            MatchStrategy::PreferSameDay => {
                for wanted in 0..=self.settings.max_days_early {
                    for (line_index, line) in lines.iter().enumerate() {
                        if line_used[line_index] {
                            continue;
                        }
                        let found = (0..postings.len()).find(|&index| {
                            !posting_used[index]
                                && self.days_early(line, &postings[index]) == Some(wanted)
                        });
                        if let Some(index) = found {
                            line_used[line_index] = true;
                            posting_used[index] = true;
                            matches.push(pair(line_index, &postings[index], wanted));
                        }
                    }
                }
                matches.sort_by_key(|m: &ReconciledPair| m.line_index);
            }
        }

        ReconciliationReport {
            matches,
            unmatched_lines: line_used
                .iter()
                .enumerate()
                .filter(|(_, used)| !**used)
                .map(|(index, _)| index)
                .collect(),
            unmatched_postings: postings
                .iter()
                .zip(&posting_used)
                .filter(|(_, used)| !**used)
                .map(|(posting, _)| posting.clone())
                .collect(),
            statement_closing_balance: None,
            ledger_balance: None,
            difference: None,
        }
    }

    /// How many days before the line the posting is dated, if acceptable
    fn days_early(&self, line: &StatementLine, posting: &UnreconciledPosting) -> Option<u32> {
        if !amounts_match(&line.amount, &posting.amount) {
            return None;
        }
        let days = (line.date - posting.date).num_days();
        u32::try_from(days)
            .ok()
            .filter(|days| *days <= self.settings.max_days_early)
    }
}

fn pair(line_index: usize, posting: &UnreconciledPosting, days_early: u32) -> ReconciledPair {
    ReconciledPair {
        line_index,
        transaction_id: posting.transaction_id.clone(),
        posting_id: posting.posting_id.clone(),
        days_early,
    }
}
