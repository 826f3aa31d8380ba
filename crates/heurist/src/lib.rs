/*! Unified interface for heuristic PHP malware analysis.
 *
 * Single import for the whole pipeline: lexing, deobfuscation passes, detectors and report
 * rendering. [`HeuristicAnalyser`] strings the passes together the way a scanner needs them and
 * hands back one [`AnalysisReport`] per file.
 */

pub use heurist_analysis as analysis;
pub use heurist_core as core;
pub use heurist_emit as emit;
pub use heurist_lexer as lexer;

pub use heurist_analysis::{AnalysisReport, Severity, Status, TiktokenEncoder};
pub use heurist_core::{AnalysisConfig, FileInfo, HeuristError, Result, TokenStream};
pub use heurist_emit::{ReportEmitter, SourceEmitter};
pub use heurist_lexer::tokenize;

use heurist_analysis::{
    find_dangerous_calls, reduce_verdict, CodeStyle, Encoder, EntropyAnalyser, MathFolder,
    Simplifier, SqlExtractor, StructuralValidator, Variables, Verdict,
};
use tracing::{debug, info, warn};

/// Runs every pass over one file.
pub struct HeuristicAnalyser {
    config: AnalysisConfig,
    encoder: Box<dyn Encoder>,
}

impl HeuristicAnalyser {
    /// Analyser with the `cl100k_base` encoder; fails only when its ranks cannot be loaded.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        Ok(Self::with_encoder(config, Box::new(TiktokenEncoder::cl100k()?)))
    }

    pub fn with_encoder(config: AnalysisConfig, encoder: Box<dyn Encoder>) -> Self {
        Self { config, encoder }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyse(&self, file: &FileInfo) -> Result<AnalysisReport> {
        let content = file.text();
        let raw = lex(&content)?;

        let mut validator = StructuralValidator::new(&raw);
        validator.is_valid_code();
        if !validator.open_tag_status().has_code() {
            debug!(file = %file.name, "no php code");
            let mut report = AnalysisReport::clean(file.name.clone());
            report.classify();
            return Ok(report);
        }

        let mut report = AnalysisReport::clean(file.name.clone());
        report.structural_failures = validator.into_failures();

        let mut resolved = Simplifier::simplified(&raw);
        let variables = self.deobfuscate(&mut resolved, &mut report);

        let mut sql = SqlExtractor::new(&self.config.sql);
        sql.scan(&mut resolved, &variables);
        report.sql_requests = sql.into_requests();

        let verdict = EntropyAnalyser::new(&self.config.entropy, self.encoder.as_ref())
            .analyse(&raw, &content, &variables);
        let reduced = reduce_verdict(&verdict, self.config.max_entropy_findings);
        let entropy = settle_verdict(verdict, reduced, &mut report);
        report.entropy = entropy;

        let mut style = CodeStyle::new(&self.config.code_style);
        style.analyse(&content, &raw);
        report.bad_lines = style.bad_lines();
        report.greedy_lines = style.greedy_lines().clone();
        report.composition = style.composition().clone();

        report.dangerous_calls = find_dangerous_calls(&resolved, &variables);
        report.bad_variables = variables
            .tainted_variables()
            .into_iter()
            .map(str::to_string)
            .collect();
        report.deobfuscated = Some(resolved.glue());
        report.classify();

        info!(
            file = %report.file,
            status = %report.status,
            severity = ?report.severity,
            "analysed"
        );
        Ok(report)
    }

    /// Resolution, folding and substitution over an already simplified stream.
    fn deobfuscate(&self, stream: &mut TokenStream, report: &mut AnalysisReport) -> Variables {
        let mut variables = Variables::new(self.config.taint.clone());
        variables.collect(stream);
        variables.concatenate();
        report.folded_expressions = MathFolder::new().fold_to_fixed_point(stream);
        variables.replace_all(stream);
        variables.detect_bad(stream);
        variables
    }

    /// Stream after simplification, folding and substitution; `None` without PHP code.
    pub fn deobfuscate_stream(&self, content: &str) -> Result<Option<TokenStream>> {
        let raw = lex(content)?;
        if !StructuralValidator::new(&raw).open_tag_status().has_code() {
            return Ok(None);
        }
        let mut resolved = Simplifier::simplified(&raw);
        let mut scratch = AnalysisReport::clean("");
        self.deobfuscate(&mut resolved, &mut scratch);
        Ok(Some(resolved))
    }

    pub fn deobfuscate_source(&self, content: &str) -> Result<Option<String>> {
        Ok(self.deobfuscate_stream(content)?.map(|stream| stream.glue()))
    }
}

fn lex(content: &str) -> Result<TokenStream> {
    tokenize(content).map_err(|e| HeuristError::Lex(e.to_string()))
}

/// The reduced verdict, or the full one when reduction fails. The failure is kept on the report.
fn settle_verdict(
    full: Verdict,
    reduced: Result<Verdict>,
    report: &mut AnalysisReport,
) -> Verdict {
    match reduced {
        Ok(reduced) => reduced,
        Err(e) => {
            warn!(file = %report.file, error = %e, "keeping unreduced entropy verdict");
            report.errors.push(e.to_string());
            full
        }
    }
}

/// Analyses one in-memory file with the default configuration.
pub fn analyse(name: &str, content: &str) -> Result<AnalysisReport> {
    let analyser = HeuristicAnalyser::new(AnalysisConfig::default())?;
    analyser.analyse(&FileInfo::new(name, content.as_bytes()))
}
