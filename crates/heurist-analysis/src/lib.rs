/*! Heuristic passes over PHP token streams.
 *
 * Each pass takes a [`TokenStream`](heurist_core::TokenStream) produced by `heurist-lexer` and
 * either rewrites it (simplification, math folding, value substitution) or reports on it
 * (structure, SQL sites, entropy, code style, dangerous calls). Passes never fail on odd input; a
 * pattern that does not match is simply skipped.
 *
 * ## Example
 *
 * ```rust,ignore
 * use heurist_analysis::{MathFolder, Simplifier, Variables};
 * use heurist_core::TaintConfig;
 *
 * let mut stream = heurist_lexer::tokenize("<?php $f = 'base' . '64_decode'; $f($x);")?;
 * Simplifier::simplify(&mut stream);
 * let mut variables = Variables::new(TaintConfig::default());
 * variables.collect(&mut stream);
 * variables.concatenate();
 * MathFolder::new().fold_to_fixed_point(&mut stream);
 * variables.replace_all(&mut stream);
 * assert!(stream.glue().contains("base64_decode($x)"));
 * ```
 */

pub mod code_style;
pub mod entropy;
pub mod math;
pub mod report;
pub mod simplifier;
pub mod sinks;
pub mod sql;
pub mod validator;
pub mod variables;

pub use code_style::{BadLine, CodeStyle, TokenComposition};
pub use entropy::{
    reduce_verdict, EntropyAnalyser, EntropyFinding, Encoder, Verdict, TiktokenEncoder,
};
pub use math::MathFolder;
pub use report::{AnalysisReport, Severity, Status};
pub use simplifier::Simplifier;
pub use sinks::{find_dangerous_calls, DangerousCall, DANGEROUS_FUNCTIONS};
pub use sql::{SqlExtractor, SqlRequest};
pub use validator::{OpenTagStatus, StructuralFailure, StructuralValidator};
pub use variables::{ArrayKey, Variables};
