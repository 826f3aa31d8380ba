use crate::variables::Variables;
use heurist_core::{KindGroup, TokenKind, TokenStream};
use serde::Serialize;
use tracing::trace;

/// Calls that execute or decode their argument.
pub const DANGEROUS_FUNCTIONS: &[&str] = &[
    "eval",
    "assert",
    "create_function",
    "base64_decode",
    "gzinflate",
    "gzuncompress",
    "str_rot13",
    "system",
    "exec",
    "shell_exec",
    "passthru",
    "popen",
    "proc_open",
];

/// A dangerous call whose arguments reference untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DangerousCall {
    /// Lowercased function name.
    pub name: String,
    pub line: usize,
    pub arguments: String,
}

/// Dangerous calls of a resolved stream fed by raw input or bad variables. Function names are
/// matched case-insensitively, as PHP does.
pub fn find_dangerous_calls(stream: &TokenStream, variables: &Variables) -> Vec<DangerousCall> {
    let mut calls = Vec::new();

    for token in stream.iter().filter(|t| t.kind == TokenKind::Identifier) {
        let name = token.text.trim_start_matches('\\').to_ascii_lowercase();
        if !DANGEROUS_FUNCTIONS.contains(&name.as_str()) || is_member_or_declaration(stream, token.index) {
            continue;
        }
        let Some(open) = stream.next_live(token.index) else {
            continue;
        };
        let Some(close) = stream.find_closing(open, "(", ")") else {
            continue;
        };
        let Some(arguments) = stream.next_live(open).and_then(|first| {
            let last = stream.prev_live(close)?;
            stream.range(first, last)
        }) else {
            continue;
        };

        let tainted = arguments.iter().any(|t| {
            t.kind == TokenKind::Variable && variables.bad_variables().contains(&t.text)
        });
        if tainted {
            let call = DangerousCall {
                name,
                line: token.line,
                arguments: arguments.iter().map(|t| t.text.as_str()).collect(),
            };
            trace!(name = %call.name, line = call.line, "dangerous call");
            calls.push(call);
        }
    }
    calls
}

/// `->name`, `::name` and `function name` are not calls of the global function.
fn is_member_or_declaration(stream: &TokenStream, position: usize) -> bool {
    let mut cursor = position;
    while let Some(prev) = stream.prev_live(cursor) {
        match stream.get(prev) {
            Some(t) if t.is_in(KindGroup::NonCode) => cursor = prev,
            Some(t) => {
                return matches!(t.kind, TokenKind::ObjectOperator | TokenKind::DoubleColon)
                    || (t.kind == TokenKind::Keyword && t.is("function"));
            }
            None => return false,
        }
    }
    false
}
