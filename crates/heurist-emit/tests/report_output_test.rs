use heurist_analysis::{find_dangerous_calls, AnalysisReport, Simplifier, Variables};
use heurist_core::TaintConfig;
use heurist_emit::{
    Emitter, EmitterConfig, JsonFormatter, ReportEmitter, SourceEmitter, VerbosityLevel,
};
use heurist_lexer::tokenize;

fn report_for(source: &str) -> AnalysisReport {
    let mut stream = tokenize(source).unwrap();
    Simplifier::simplify(&mut stream);
    let mut variables = Variables::new(TaintConfig::default());
    variables.collect(&mut stream);
    variables.concatenate();
    variables.replace_all(&mut stream);
    variables.detect_bad(&stream);

    let mut report = AnalysisReport::clean("upload.php");
    report.dangerous_calls = find_dangerous_calls(&stream, &variables);
    report.bad_variables = variables
        .tainted_variables()
        .into_iter()
        .map(str::to_string)
        .collect();
    report.deobfuscated = Some(SourceEmitter::new().emit_to_string(&stream).unwrap());
    report.classify();
    report
}

#[test]
fn test_text_report_for_eval_sink() {
    let report = report_for("<?php\n$code = $_POST['c'];\neval($code);\n");
    let emitter = ReportEmitter::new(EmitterConfig {
        verbosity: VerbosityLevel::Verbose,
        ..EmitterConfig::plain()
    });
    let output = emitter.emit_to_string(&report).unwrap();

    assert!(output.starts_with("upload.php: INFECTED (DANGEROUS)\n"));
    assert!(output.contains("=== Dangerous calls ==="));
    assert!(output.contains("- line 3: eval("));
    assert!(output.contains("=== Deobfuscated ==="));
}

#[test]
fn test_json_report_shape() {
    let report = report_for("<?php\n$code = $_POST['c'];\neval($code);\n");
    let mut buffer = Vec::new();
    JsonFormatter::write(&mut buffer, &report).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

    assert_eq!(json["file"], "upload.php");
    assert_eq!(json["status"], "INFECTED");
    assert_eq!(json["severity"], "DANGEROUS");
    assert_eq!(json["dangerous_calls"][0]["name"], "eval");
    assert_eq!(json["dangerous_calls"][0]["line"], 3);
}

#[test]
fn test_clean_file_renders_ok() {
    let report = report_for("<?php\necho 'hello';\n");
    let output = ReportEmitter::new(EmitterConfig::plain())
        .emit_to_string(&report)
        .unwrap();
    assert_eq!(output, "upload.php: OK\n");
}
