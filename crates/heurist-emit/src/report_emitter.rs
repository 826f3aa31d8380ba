/*! Human-readable rendering of an [`AnalysisReport`].
 *
 * The header line always carries the file name, the status and, for infected files, the
 * severity. Sections follow only for findings that are present, in a fixed order.
 */

use crate::config::{EmitterConfig, VerbosityLevel};
use crate::emitter::{EmitContext, EmitHelper, EmitResult, Emitter, Tone};
use heurist_analysis::{AnalysisReport, Severity, Status};
use std::io::Write;

pub struct ReportEmitter {
    config: EmitterConfig,
}

impl ReportEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    fn emit_header<W: Write>(
        &self,
        report: &AnalysisReport,
        writer: &mut W,
        context: &EmitContext,
    ) -> EmitResult {
        let verdict = match (report.status, report.severity) {
            (Status::Ok, _) => EmitHelper::paint(context, "OK", Tone::Clean),
            (Status::Infected, Some(Severity::Dangerous)) => {
                EmitHelper::paint(context, "INFECTED (DANGEROUS)", Tone::Danger)
            }
            (Status::Infected, Some(severity)) => {
                EmitHelper::paint(context, &format!("INFECTED ({})", severity), Tone::Warning)
            }
            (Status::Infected, None) => EmitHelper::paint(context, "INFECTED", Tone::Warning),
        };
        EmitHelper::write_line(writer, context, &format!("{}: {}", report.file, verdict))
    }

    fn emit_findings<W: Write>(
        &self,
        report: &AnalysisReport,
        writer: &mut W,
        context: &EmitContext,
    ) -> EmitResult {
        let nested = context.nested();

        if !report.structural_failures.is_empty() {
            EmitHelper::write_section(writer, context, "Structure")?;
            for failure in &report.structural_failures {
                EmitHelper::write_colored_line(
                    writer,
                    &nested,
                    &format!("- {} ({})", failure, failure.name()),
                    Tone::Warning,
                )?;
            }
        }

        if !report.dangerous_calls.is_empty() {
            EmitHelper::write_section(writer, context, "Dangerous calls")?;
            for call in &report.dangerous_calls {
                let text = format!("{}({})", call.name, call.arguments);
                EmitHelper::write_finding(writer, &nested, call.line, &text, Tone::Danger)?;
            }
        }

        if !report.sql_requests.is_empty() {
            EmitHelper::write_section(writer, context, "SQL")?;
            for request in &report.sql_requests {
                let (label, tone) = if request.is_safe {
                    ("safe", Tone::Clean)
                } else {
                    ("unsafe", Tone::Danger)
                };
                let text = format!("[{}] {}", label, request.text().trim());
                EmitHelper::write_finding(writer, &nested, request.line, &text, tone)?;
            }
        }

        if !report.entropy.is_empty() {
            EmitHelper::write_section(writer, context, "Entropy")?;
            for (line, finding) in &report.entropy {
                EmitHelper::write_finding(writer, &nested, *line, finding.label(), Tone::Warning)?;
            }
        }

        if !report.bad_lines.is_empty() || !report.greedy_lines.is_empty() {
            EmitHelper::write_section(writer, context, "Code style")?;
            for (line, bad) in &report.bad_lines {
                EmitHelper::write_finding(writer, &nested, *line, &bad.to_string(), Tone::Warning)?;
            }
            for line in &report.greedy_lines {
                EmitHelper::write_finding(writer, &nested, *line, "greedy token", Tone::Muted)?;
            }
        }

        if !report.folded_expressions.is_empty() {
            EmitHelper::write_section(writer, context, "Folded")?;
            EmitHelper::write_list(writer, &nested, &report.folded_expressions)?;
        }

        if !report.bad_variables.is_empty() {
            EmitHelper::write_section(writer, context, "Tainted variables")?;
            EmitHelper::write_list(writer, &nested, &report.bad_variables)?;
        }

        if !report.errors.is_empty() {
            EmitHelper::write_section(writer, context, "Errors")?;
            for error in &report.errors {
                let text = format!("- {}", error);
                EmitHelper::write_colored_line(writer, &nested, &text, Tone::Danger)?;
            }
        }

        Ok(())
    }

    fn emit_composition<W: Write>(
        &self,
        report: &AnalysisReport,
        writer: &mut W,
        context: &EmitContext,
    ) -> EmitResult {
        let composition = &report.composition;
        if composition.code_length + composition.html_length + composition.comments_length == 0 {
            return Ok(());
        }
        let nested = context.nested();
        EmitHelper::write_section(writer, context, "Composition")?;
        EmitHelper::write_line(
            writer,
            &nested,
            &format!(
                "code: {} bytes on {} lines",
                composition.code_length,
                composition.code_lines.len()
            ),
        )?;
        EmitHelper::write_line(
            writer,
            &nested,
            &format!(
                "comments: {} bytes on {} lines",
                composition.comments_length,
                composition.comment_lines.len()
            ),
        )?;
        EmitHelper::write_line(
            writer,
            &nested,
            &format!(
                "html: {} bytes on {} lines",
                composition.html_length,
                composition.html_lines.len()
            ),
        )
    }
}

impl Default for ReportEmitter {
    fn default() -> Self {
        Self::new(EmitterConfig::default())
    }
}

impl Emitter for ReportEmitter {
    type Item = AnalysisReport;

    fn emit<W: Write>(
        &self,
        report: &AnalysisReport,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult {
        self.emit_header(report, writer, context)?;

        let verbosity = self.config.verbosity;
        if verbosity == VerbosityLevel::Quiet {
            return Ok(());
        }

        context.indent();
        self.emit_findings(report, writer, context)?;

        if verbosity.should_print_composition() {
            self.emit_composition(report, writer, context)?;
        }

        if verbosity.should_print_source() {
            if let Some(source) = &report.deobfuscated {
                EmitHelper::write_section(writer, context, "Deobfuscated")?;
                writeln!(writer, "{}", source.trim_end())?;
            }
        }
        context.dedent();
        Ok(())
    }

    fn context(&self) -> EmitContext {
        EmitContext::from_config(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heurist_analysis::{BadLine, DangerousCall, EntropyFinding, StructuralFailure};
    use pretty_assertions::assert_eq;

    fn infected() -> AnalysisReport {
        let mut report = AnalysisReport::clean("shell.php");
        report.structural_failures.push(StructuralFailure::OddQuotes);
        report.dangerous_calls.push(DangerousCall {
            name: "eval".to_string(),
            line: 2,
            arguments: "base64_decode($_POST['x'])".to_string(),
        });
        report.entropy.insert(4, EntropyFinding::ArrayKey);
        report.bad_lines.insert(5, BadLine::LongLine);
        report.folded_expressions.push("3 + 4 = 7".to_string());
        report.bad_variables.push("$payload".to_string());
        report.deobfuscated = Some("<?php\neval(base64_decode($_POST['x']));\n".to_string());
        report.classify();
        report
    }

    fn emitter(verbosity: VerbosityLevel) -> ReportEmitter {
        ReportEmitter::new(EmitterConfig {
            verbosity,
            ..EmitterConfig::plain()
        })
    }

    #[test]
    fn test_clean_report_is_one_line() {
        let mut report = AnalysisReport::clean("index.php");
        report.classify();
        let output = emitter(VerbosityLevel::Normal).emit_to_string(&report).unwrap();
        assert_eq!(output, "index.php: OK\n");
    }

    #[test]
    fn test_quiet_prints_header_only() {
        let output = emitter(VerbosityLevel::Quiet).emit_to_string(&infected()).unwrap();
        assert_eq!(output, "shell.php: INFECTED (DANGEROUS)\n");
    }

    #[test]
    fn test_normal_report_sections() {
        let output = emitter(VerbosityLevel::Normal).emit_to_string(&infected()).unwrap();
        insta::assert_snapshot!(output, @r###"
        shell.php: INFECTED (DANGEROUS)
          === Structure ===
            - Quotes count is not even (check_quotes)
          === Dangerous calls ===
            - line 2: eval(base64_decode($_POST['x']))
          === Entropy ===
            - line 4: High entropy in array key
          === Code style ===
            - line 5: long line
          === Folded ===
            - 3 + 4 = 7
          === Tainted variables ===
            - $payload
        "###);
    }

    #[test]
    fn test_verbose_adds_source() {
        let output = emitter(VerbosityLevel::Verbose).emit_to_string(&infected()).unwrap();
        assert!(output.contains("=== Deobfuscated ===\n<?php\neval("));
        assert!(!output.contains("=== Composition ==="));
    }

    #[test]
    fn test_errors_section() {
        let mut report = AnalysisReport::clean("a.php");
        report.entropy.insert(3, EntropyFinding::LongIntKey);
        report.errors.push("reduction failed".to_string());
        report.classify();
        let output = emitter(VerbosityLevel::Normal).emit_to_string(&report).unwrap();
        assert!(output.ends_with("  === Errors ===\n    - reduction failed\n"));
    }

    #[test]
    fn test_suspicious_header() {
        let mut report = AnalysisReport::clean("a.php");
        report.entropy.insert(3, EntropyFinding::LongIntKey);
        report.classify();
        let output = emitter(VerbosityLevel::Quiet).emit_to_string(&report).unwrap();
        assert_eq!(output, "a.php: INFECTED (SUSPICIOUS)\n");
    }
}
