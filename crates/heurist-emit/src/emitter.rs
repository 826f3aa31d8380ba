use crate::config::EmitterConfig;
use anyhow::Result;
use colored::Colorize;
use std::io::Write;

pub type EmitResult = Result<()>;

#[derive(Debug, Clone)]
pub struct EmitContext {
    pub indent_level: usize,
    pub indent_chars: String,
    pub use_colors: bool,
}

impl EmitContext {
    pub fn new() -> Self {
        Self {
            indent_level: 0,
            indent_chars: "  ".to_string(),
            use_colors: true,
        }
    }

    pub fn from_config(config: &EmitterConfig) -> Self {
        Self {
            indent_level: 0,
            indent_chars: config.indent_style.unit(),
            use_colors: config.use_colors,
        }
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    pub fn get_indent(&self) -> String {
        self.indent_chars.repeat(self.indent_level)
    }

    pub fn nested(&self) -> Self {
        let mut ctx = self.clone();
        ctx.indent();
        ctx
    }
}

impl Default for EmitContext {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Emitter {
    type Item;

    fn emit<W: Write>(
        &self,
        item: &Self::Item,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult;

    /// Context used by [`Emitter::emit_to_string`].
    fn context(&self) -> EmitContext {
        EmitContext::new()
    }

    fn emit_to_string(&self, item: &Self::Item) -> Result<String> {
        let mut buffer = Vec::new();
        let mut context = self.context();
        self.emit(item, &mut buffer, &mut context)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// What a colored line means; each tone has a fixed color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Danger,
    Warning,
    Clean,
    Heading,
    Muted,
}

impl Tone {
    pub fn paint(self, text: &str) -> String {
        match self {
            Tone::Danger => text.bright_red().bold().to_string(),
            Tone::Warning => text.yellow().to_string(),
            Tone::Clean => text.green().to_string(),
            Tone::Heading => text.cyan().to_string(),
            Tone::Muted => text.dimmed().to_string(),
        }
    }
}

pub struct EmitHelper;

impl EmitHelper {
    pub fn write_line<W: Write>(writer: &mut W, context: &EmitContext, text: &str) -> EmitResult {
        writeln!(writer, "{}{}", context.get_indent(), text)?;
        Ok(())
    }

    pub fn write<W: Write>(writer: &mut W, context: &EmitContext, text: &str) -> EmitResult {
        write!(writer, "{}{}", context.get_indent(), text)?;
        Ok(())
    }

    pub fn paint(context: &EmitContext, text: &str, tone: Tone) -> String {
        if context.use_colors {
            tone.paint(text)
        } else {
            text.to_string()
        }
    }

    pub fn write_colored_line<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        text: &str,
        tone: Tone,
    ) -> EmitResult {
        Self::write_line(writer, context, &Self::paint(context, text, tone))
    }

    pub fn write_section<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        title: &str,
    ) -> EmitResult {
        Self::write_colored_line(writer, context, &format!("=== {} ===", title), Tone::Heading)
    }

    /// `- line N: text`, the line number dimmed.
    pub fn write_finding<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        line: usize,
        text: &str,
        tone: Tone,
    ) -> EmitResult {
        let location = Self::paint(context, &format!("line {}:", line), Tone::Muted);
        let text = Self::paint(context, text, tone);
        Self::write_line(writer, context, &format!("- {} {}", location, text))
    }

    pub fn write_list<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        items: &[String],
    ) -> EmitResult {
        for item in items {
            Self::write_line(writer, context, &format!("- {}", item))?;
        }
        Ok(())
    }
}
