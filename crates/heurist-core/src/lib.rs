/*! Core data structures for heuristic analysis of PHP sources.
 *
 * Malicious PHP hides behind variable indirection, string splicing and arithmetic noise. Every
 * heuristic in this workspace works on the same substrate: a lexed token stream that passes can
 * walk with a small window, search with bounded steps, and rewrite in place while walking.
 */

pub mod config;
pub mod file_info;
pub mod pattern;
pub mod stream;
pub mod token;

pub use config::{AnalysisConfig, CodeStyleConfig, EntropyConfig, SqlConfig, TaintConfig};
pub use file_info::FileInfo;
pub use pattern::{Expect, Sequence, SequenceBuilder};
pub use stream::{Needle, Offset, TokenStream, Window};
pub use token::{KindGroup, Token, TokenKind};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeuristError {
    #[error("Lexer error: {0}")]
    Lex(String),
    #[error("Verdict reduction error: {original} findings split into {arrays} array and {other} other findings")]
    VerdictReduction {
        original: usize,
        arrays: usize,
        other: usize,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Encoder error: {0}")]
    Encoder(String),
}

pub type Result<T> = std::result::Result<T, HeuristError>;
