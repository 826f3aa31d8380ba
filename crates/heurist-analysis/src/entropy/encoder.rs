use heurist_core::{HeuristError, Result};
use tiktoken_rs::CoreBPE;

/// Splits identifiers into sub-word ids. Only the number of ids matters to the entropy ratio.
pub trait Encoder {
    fn encode(&self, text: &str) -> Vec<u32>;

    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// Byte-pair encoder over the `cl100k_base` ranks.
///
/// The ratio thresholds in [`heurist_core::EntropyConfig`] are tuned for this vocabulary: common
/// English words encode into one or two ids, while letters mixed with digits or random consonant
/// runs fall apart into nearly one id per character.
pub struct TiktokenEncoder {
    bpe: CoreBPE,
}

impl TiktokenEncoder {
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| HeuristError::Encoder(format!("failed to load cl100k_base: {}", e)))?;
        Ok(Self { bpe })
    }
}

impl Encoder for TiktokenEncoder {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|id| id as u32)
            .collect()
    }
}
