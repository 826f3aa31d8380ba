use crate::emitter::{EmitContext, EmitHelper, EmitResult, Emitter, Tone};
use heurist_core::TokenStream;
use std::io::Write;

/// Writes a token stream back out as source text.
#[derive(Debug, Clone, Default)]
pub struct SourceEmitter {
    pub line_numbers: bool,
}

impl SourceEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_numbers(mut self) -> Self {
        self.line_numbers = true;
        self
    }
}

impl Emitter for SourceEmitter {
    type Item = TokenStream;

    fn emit<W: Write>(
        &self,
        stream: &TokenStream,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult {
        let source = stream.glue();
        if !self.line_numbers {
            write!(writer, "{}", source)?;
            return Ok(());
        }

        for (i, line) in source.lines().enumerate() {
            let number = EmitHelper::paint(context, &format!("{:>4} |", i + 1), Tone::Muted);
            if line.is_empty() {
                EmitHelper::write_line(writer, context, &number)?;
            } else {
                EmitHelper::write_line(writer, context, &format!("{} {}", number, line))?;
            }
        }
        Ok(())
    }
}

/// One row per token: line, kind name and the quoted text.
#[derive(Debug, Clone, Default)]
pub struct TokenDumpEmitter {
    /// Leave whitespace tokens out of the dump.
    pub skip_whitespace: bool,
}

impl Emitter for TokenDumpEmitter {
    type Item = TokenStream;

    fn emit<W: Write>(
        &self,
        stream: &TokenStream,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult {
        for token in stream.iter() {
            if self.skip_whitespace && token.is_kind(heurist_core::TokenKind::Whitespace) {
                continue;
            }
            let kind = EmitHelper::paint(context, token.kind.name(), Tone::Heading);
            EmitHelper::write_line(
                writer,
                context,
                &format!("{:>4}  {:<28} {:?}", token.line, kind, token.text),
            )?;
        }
        Ok(())
    }

    fn context(&self) -> EmitContext {
        let mut context = EmitContext::new();
        context.use_colors = false;
        context
    }
}
