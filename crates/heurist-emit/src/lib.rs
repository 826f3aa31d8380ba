/*! Turn analysis results back into text.
 *
 * A verdict is only useful if someone can check it. These emitters print the deobfuscated source
 * next to what was found in it, dump token streams for debugging the lexer and passes, and render
 * reports either for a terminal or as JSON for other tools.
 */

pub mod config;
pub mod emitter;
pub mod output;
pub mod report_emitter;
pub mod source_emitter;

pub use config::{EmitterConfig, IndentStyle, VerbosityLevel};
pub use emitter::{EmitContext, EmitHelper, EmitResult, Emitter, Tone};
pub use output::{JsonFormatter, OutputFormat};
pub use report_emitter::ReportEmitter;
pub use source_emitter::{SourceEmitter, TokenDumpEmitter};
