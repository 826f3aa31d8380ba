use super::Verdict;
use heurist_core::{HeuristError, Result};
use tracing::debug;

/// Caps `verdict` at `max` findings; `0` means no cap.
///
/// Array-key findings are thinned first, keeping every other line until they fit next to the
/// remaining findings. Without enough array-key findings to thin, the lowest lines are kept.
pub fn reduce_verdict(verdict: &Verdict, max: usize) -> Result<Verdict> {
    if max == 0 || verdict.len() <= max {
        return Ok(verdict.clone());
    }

    let (arrays, other): (Verdict, Verdict) = verdict
        .iter()
        .map(|(line, finding)| (*line, *finding))
        .partition(|(_, finding)| finding.is_array_key());
    if arrays.len() + other.len() != verdict.len() {
        return Err(HeuristError::VerdictReduction {
            original: verdict.len(),
            arrays: arrays.len(),
            other: other.len(),
        });
    }

    if arrays.len() > 2 && other.len() <= max {
        let mut reduced = halve(arrays, max - other.len());
        reduced.extend(other);
        debug!(from = verdict.len(), to = reduced.len(), "verdict thinned");
        return Ok(reduced);
    }

    Ok(verdict
        .iter()
        .take(max)
        .map(|(line, finding)| (*line, *finding))
        .collect())
}

fn halve(mut findings: Verdict, budget: usize) -> Verdict {
    if budget == 0 {
        return Verdict::new();
    }
    while findings.len() > budget {
        findings = findings.into_iter().step_by(2).collect();
    }
    findings
}
