//! Sends chunks to the completion service.
//!
//! A failed request never escapes: token-limit failures shrink the payload to
//! its first half (by characters) and try again while attempts remain, every
//! other failure becomes an inline warning in the report.

use tracing::{debug, info, warn};

use crate::cache::{CacheKey, ParamsSnapshot, ResultCache};
use crate::completion::{CompletionRequest, CompletionService, Message};
use crate::config::Config;

/// Instruction sent with every chunk
pub const SYSTEM_PROMPT: &str = r#"
Il file .srt contiene una serie di snippet numerati, ciascuno con timestamp e testo.

Il tuo compito è individuare **gli snippet sospetti** che potrebbero contenere errori ortografici, grammaticali, sintattici o incongruenze logiche, dovuti a trascrizioni imperfette da audio di scarsa qualità.

Per ogni snippet sospetto:
- restituisci **numero**, **timestamp**, **testo originale**, **motivazione** (massimo 200 caratteri).

**Anche solo il sospetto è sufficiente** per includerlo: meglio un falso positivo che un errore ignorato.

### Formato:
Rispondi **solo** con una tabella in Markdown come questa:

| Numero | Timestamp | Testo | Motivazione |
|--------|-----------|-------|-------------|
| 437 | 00:27:33,718 --> 00:27:38,490 | in questa lezione terciaa del secondo modulo | “terciaa” sembra errore di battitura, dovrebbe essere “terza” |
"#;

const WARNING_PREFIX: &str = "⚠️ Errore durante l'elaborazione: ";

/// Request parameters in effect for a dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchParams {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub retries: u32,
}

impl DispatchParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.completion.model.clone(),
            temperature: config.completion.temperature,
            top_p: config.completion.top_p,
            max_output_tokens: config.analysis.max_tokens,
            retries: config.analysis.retries,
        }
    }

    fn snapshot(&self, retries: u32) -> ParamsSnapshot {
        ParamsSnapshot {
            model: self.model.clone(),
            temperature_bits: self.temperature.to_bits(),
            top_p_bits: self.top_p.to_bits(),
            max_output_tokens: self.max_output_tokens,
            retries,
        }
    }
}

pub struct Dispatcher {
    service: Box<dyn CompletionService>,
    params: DispatchParams,
    cache: ResultCache,
    service_calls: usize,
}

impl Dispatcher {
    pub fn new(service: Box<dyn CompletionService>, params: DispatchParams, cache: ResultCache) -> Self {
        Self {
            service,
            params,
            cache,
            service_calls: 0,
        }
    }

    /// Total requests sent to the completion service so far
    pub fn service_calls(&self) -> usize {
        self.service_calls
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    /// Analyze one chunk with the configured retry budget
    pub async fn process(&mut self, chunk: &str) -> String {
        let retries = self.params.retries;
        self.process_with_retries(chunk, retries).await
    }

    /// Analyze one chunk, allowing `retries` halve-and-retry attempts after
    /// token-limit failures. Always yields text: the service's answer or a
    /// warning describing the failure.
    pub async fn process_with_retries(&mut self, chunk: &str, retries: u32) -> String {
        if chunk.trim().is_empty() {
            return String::new();
        }

        let key = CacheKey {
            chunk: chunk.to_string(),
            params: self.params.snapshot(retries),
        };
        if let Some(cached) = self.cache.get(&key) {
            debug!("Using cached result for chunk ({} chars)", chunk.len());
            return cached.clone();
        }

        let mut payload = chunk.to_string();
        let mut retries_left = retries;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.service_calls += 1;
            debug!("Attempt {} with {} characters", attempt, payload.chars().count());

            match self.service.complete(&self.build_request(&payload)).await {
                Ok(text) => {
                    self.cache.insert(key, text.clone());
                    return text;
                }
                Err(e) => {
                    let description = e.to_string();

                    if is_token_limit(&description) && retries_left > 0 {
                        retries_left -= 1;
                        payload = halve(&payload);
                        if payload.trim().is_empty() {
                            debug!("Nothing left to send after halving, giving up on chunk");
                            return String::new();
                        }
                        info!(
                            "Token limit hit on attempt {}, retrying with {} characters",
                            attempt,
                            payload.chars().count()
                        );
                        continue;
                    }

                    warn!("Chunk failed after {} attempts: {}", attempt, description);
                    return format!("{}{}", WARNING_PREFIX, description);
                }
            }
        }
    }

    fn build_request(&self, payload: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.params.model.clone(),
            messages: vec![Message::system(SYSTEM_PROMPT), Message::user(payload)],
            temperature: self.params.temperature,
            top_p: self.params.top_p,
            max_tokens: self.params.max_output_tokens,
        }
    }
}

/// Whether a failure description points at a token limit
pub fn is_token_limit(description: &str) -> bool {
    description.to_lowercase().contains("token")
}

/// Whether a result is a failure warning rather than service output
pub fn is_warning(result: &str) -> bool {
    result.starts_with(WARNING_PREFIX)
}

/// First half of `text`, counted in characters (integer division)
fn halve(text: &str) -> String {
    let mid = text.chars().count() / 2;
    text.chars().take(mid).collect()
}
