//! Model-aware token counting.
//!
//! Counts are approximate by design: they only need to agree with the
//! provider closely enough for budget enforcement, not to the byte. Encoder
//! selection goes configured override first, then the tiktoken model table,
//! then a conservative character-based approximation that is flagged in the
//! run stats so callers can see it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tiktoken_rs::CoreBPE;

/// Version tag reported for the fallback approximation.
const APPROX_TAG: &str = "approx";

/// Fallback approximation: one token per four characters, rounded up. A
/// deliberate overestimate for typical English text so budgets stay safe.
fn approx_count(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[derive(Clone)]
enum Encoder {
    Bpe { tag: String, bpe: Arc<CoreBPE> },
    Approx,
}

impl Encoder {
    fn count(&self, text: &str) -> usize {
        match self {
            Self::Bpe { bpe, .. } => bpe.encode_ordinary(text).len(),
            Self::Approx => approx_count(text),
        }
    }

    fn tag(&self) -> &str {
        match self {
            Self::Bpe { tag, .. } => tag,
            Self::Approx => APPROX_TAG,
        }
    }
}

/// Process-wide token counter with per-model encoder caching.
///
/// Construct one and share it behind an `Arc`; encoders are loaded on first
/// use per model and reused for the process lifetime.
pub struct TokenCounter {
    /// Model-name prefix to tiktoken encoding name, consulted before the
    /// built-in model table. Longest prefix wins.
    model_map: Vec<(String, String)>,
    encoders: Mutex<HashMap<String, Encoder>>,
}

impl TokenCounter {
    /// Create a counter with the given model-to-encoding overrides.
    pub fn new(model_map: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut model_map: Vec<(String, String)> = model_map.into_iter().collect();
        // Longest prefix first so `gpt-4o` beats `gpt-4`.
        model_map.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            model_map,
            encoders: Mutex::new(HashMap::new()),
        }
    }

    /// Count the tokens of `text` under the encoder selected for `model`.
    pub fn count(&self, text: &str, model: &str) -> usize {
        self.encoder_for(model).count(text)
    }

    /// Encoding name used for `model`, or `approx` when the fallback is in
    /// effect. Feeds the cache key so entries from different tokenizers never
    /// collide.
    pub fn version_tag(&self, model: &str) -> String {
        self.encoder_for(model).tag().to_string()
    }

    /// Whether counting for `model` uses the fallback approximation.
    pub fn uses_fallback(&self, model: &str) -> bool {
        matches!(self.encoder_for(model), Encoder::Approx)
    }

    fn encoder_for(&self, model: &str) -> Encoder {
        let mut encoders = self.encoders.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(encoder) = encoders.get(model) {
            return encoder.clone();
        }

        let encoder = self.load_encoder(model);
        encoders.insert(model.to_string(), encoder.clone());
        encoder
    }

    fn load_encoder(&self, model: &str) -> Encoder {
        if let Some((prefix, encoding)) = self
            .model_map
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix.as_str()))
        {
            match bpe_by_name(encoding) {
                Some(bpe) => {
                    log::debug!("tokenizer for {model}: {encoding} (configured via {prefix})");
                    return Encoder::Bpe {
                        tag: encoding.clone(),
                        bpe: Arc::new(bpe),
                    };
                }
                None => {
                    log::warn!("unknown tokenizer encoding {encoding} configured for {prefix}");
                }
            }
        }

        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Encoder::Bpe {
                tag: model_family_tag(model),
                bpe: Arc::new(bpe),
            },
            Err(err) => {
                log::warn!("no tokenizer for model {model}, using approximation: {err}");
                Encoder::Approx
            }
        }
    }
}

/// Stable tag for the encoding tiktoken picked for this model family.
fn model_family_tag(model: &str) -> String {
    if model.starts_with("gpt-4o") || model.starts_with("o1") || model.starts_with("o3") {
        "o200k_base".to_string()
    } else if model.starts_with("gpt-4") || model.starts_with("gpt-3.5") {
        "cl100k_base".to_string()
    } else {
        format!("tiktoken:{model}")
    }
}

fn bpe_by_name(name: &str) -> Option<CoreBPE> {
    match name {
        "cl100k_base" => tiktoken_rs::cl100k_base().ok(),
        "o200k_base" => tiktoken_rs::o200k_base().ok(),
        "p50k_base" => tiktoken_rs::p50k_base().ok(),
        "r50k_base" => tiktoken_rs::r50k_base().ok(),
        _ => None,
    }
}
