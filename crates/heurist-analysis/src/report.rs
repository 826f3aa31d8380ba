use crate::code_style::{BadLine, TokenComposition};
use crate::entropy::Verdict;
use crate::sinks::DangerousCall;
use crate::sql::SqlRequest;
use crate::validator::StructuralFailure;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    Infected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Suspicious,
    Dangerous,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::Infected => f.write_str("INFECTED"),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Suspicious => f.write_str("SUSPICIOUS"),
            Severity::Dangerous => f.write_str("DANGEROUS"),
        }
    }
}

/// Everything the passes found in one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub file: String,
    pub status: Status,
    pub severity: Option<Severity>,
    pub structural_failures: Vec<StructuralFailure>,
    pub folded_expressions: Vec<String>,
    pub sql_requests: Vec<SqlRequest>,
    pub entropy: Verdict,
    pub bad_lines: BTreeMap<usize, BadLine>,
    pub greedy_lines: BTreeSet<usize>,
    pub composition: TokenComposition,
    pub dangerous_calls: Vec<DangerousCall>,
    pub bad_variables: Vec<String>,
    /// Source after deobfuscation; absent for files without code.
    pub deobfuscated: Option<String>,
    /// Passes that failed but left a best-effort result behind.
    pub errors: Vec<String>,
}

impl AnalysisReport {
    /// Report for a file with nothing to analyse.
    pub fn clean(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            status: Status::Ok,
            severity: None,
            structural_failures: Vec::new(),
            folded_expressions: Vec::new(),
            sql_requests: Vec::new(),
            entropy: Verdict::new(),
            bad_lines: BTreeMap::new(),
            greedy_lines: BTreeSet::new(),
            composition: TokenComposition::default(),
            dangerous_calls: Vec::new(),
            bad_variables: Vec::new(),
            deobfuscated: None,
            errors: Vec::new(),
        }
    }

    pub fn is_infected(&self) -> bool {
        self.status == Status::Infected
    }

    pub fn has_unsafe_sql(&self) -> bool {
        self.sql_requests.iter().any(|r| !r.is_safe)
    }

    /// Derives status and severity from the collected findings.
    pub fn classify(&mut self) {
        let suspicious = self.has_unsafe_sql()
            || !self.entropy.is_empty()
            || !self.bad_lines.is_empty()
            || !self.structural_failures.is_empty();

        (self.status, self.severity) = if !self.dangerous_calls.is_empty() {
            (Status::Infected, Some(Severity::Dangerous))
        } else if suspicious {
            (Status::Infected, Some(Severity::Suspicious))
        } else {
            (Status::Ok, None)
        };
    }
}
