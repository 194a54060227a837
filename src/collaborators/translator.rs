/*!
 * LLM-backed cue translation.
 *
 * Cue texts are sent in batches joined by a delimiter token. The reply is
 * split back into segments and realigned to the batch size; any segment that
 * is missing or fails validation is retried on its own, then with a fallback
 * model, and finally replaced by its source text. Whatever happens to
 * individual lines, the output has one cue per input cue with the same
 * timing.
 */

use async_trait::async_trait;
use log::{debug, info, warn};
use rand::Rng;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::Translator;
use crate::cue::Cue;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils::{contains_cjk, get_language_name, uses_cjk_script};
use crate::providers::{ChatPrompt, ChatProvider};
use crate::subtitles::layout::normalize_line;

/// Separator between segments of a batch; models practically never emit it
pub const DELIM: &str = "<<<|||>>>";

// Lowercased markers of a model declining or failing to translate
const REFUSAL_MARKERS: &[&str] = &[
    "i cannot",
    "i can't",
    "sorry",
    "unable to",
    "as an ai",
    "无法翻译",
    "翻译失败",
];

/// Behavior of the LLM translator
#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    pub source_language: String,
    pub target_language: String,

    /// Keep the source text as primary and put the translation below it
    pub bilingual: bool,

    /// Upper bound on characters per batch request
    pub batch_char_limit: usize,

    /// Retries per request on transient provider errors
    pub retry_count: u32,

    /// Base backoff, doubled on each retry
    pub retry_backoff_ms: u64,

    pub temperature: f32,

    /// Model tried for lines the main model keeps getting wrong
    pub fallback_model: Option<String>,

    /// Terms that must be kept verbatim
    pub keep_terms: Vec<String>,

    /// Translate every line on its own instead of batching
    pub line_by_line: bool,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            bilingual: true,
            batch_char_limit: 500,
            retry_count: 3,
            retry_backoff_ms: 1000,
            temperature: 0.2,
            fallback_model: None,
            keep_terms: Vec::new(),
            line_by_line: false,
        }
    }
}

/// Translator over any chat provider
pub struct LlmTranslator {
    provider: Arc<dyn ChatProvider>,
    settings: TranslatorSettings,
    source_name: String,
    target_name: String,
    target_is_cjk: bool,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn ChatProvider>, settings: TranslatorSettings) -> Self {
        let source_name =
            get_language_name(&settings.source_language).unwrap_or_else(|_| settings.source_language.clone());
        let target_name =
            get_language_name(&settings.target_language).unwrap_or_else(|_| settings.target_language.clone());
        let target_is_cjk = uses_cjk_script(&settings.target_language);
        Self {
            provider,
            settings,
            source_name,
            target_name,
            target_is_cjk,
        }
    }

    pub fn settings(&self) -> &TranslatorSettings {
        &self.settings
    }

    /// Translate plain lines, one output line per input line
    pub async fn translate_lines(&self, lines: &[String]) -> Result<Vec<String>, TranslationError> {
        let mut translated = Vec::with_capacity(lines.len());
        let batches = if self.settings.line_by_line {
            (0..lines.len()).map(|i| i..i + 1).collect()
        } else {
            split_into_batches(lines, self.settings.batch_char_limit)
        };
        debug!("Translating {} lines in {} batches", lines.len(), batches.len());

        for range in batches {
            let batch = &lines[range];
            translated.extend(self.translate_batch(batch).await?);
        }
        Ok(translated)
    }

    async fn translate_batch(&self, batch: &[String]) -> Result<Vec<String>, TranslationError> {
        if !batch.iter().any(|line| needs_translation(line)) {
            debug!("Batch of {} lines has nothing to translate", batch.len());
            return Ok(batch.to_vec());
        }

        let joined = batch.join(&format!(" {} ", DELIM));
        let prompt = ChatPrompt::new(self.batch_system_prompt(), joined.clone())
            .temperature(self.settings.temperature);
        let content = self.chat_with_retry(&prompt).await?;
        let mut segments = split_segments(&content);

        if self.target_is_cjk && !segments.iter().any(|s| contains_cjk(s)) {
            warn!("Reply contains no {} text, asking again", self.target_name);
            let stricter = ChatPrompt::new(
                format!("{}\n{}", self.batch_system_prompt(), self.script_reminder()),
                joined,
            )
            .temperature(self.settings.temperature);
            segments = split_segments(&self.chat_with_retry(&stricter).await?);
        }

        if segments.len() != batch.len() {
            warn!(
                "Reply has {} segments for {} lines, realigning and retrying missing lines",
                segments.len(),
                batch.len()
            );
            segments.resize(batch.len(), String::new());
        }

        let mut output = Vec::with_capacity(batch.len());
        for (source, candidate) in batch.iter().zip(segments) {
            if !needs_translation(source) {
                // Nothing to translate: numbers and symbols stay as they were
                output.push(source.clone());
            } else if self.is_valid(source, &candidate) {
                output.push(candidate.trim().to_string());
            } else {
                output.push(self.repair_line(source).await);
            }
        }
        Ok(output)
    }

    /// Retry one line alone, then stricter, then with the fallback model;
    /// give back the source text if nothing valid comes out
    async fn repair_line(&self, source: &str) -> String {
        let plain = self.line_system_prompt();
        let strict = format!("{}\n{}", plain, self.script_reminder());

        let mut attempts = vec![ChatPrompt::new(plain.clone(), source), ChatPrompt::new(strict, source)];
        if let Some(model) = self.settings.fallback_model.as_deref().filter(|m| !m.is_empty()) {
            attempts.push(ChatPrompt::new(plain, source).model(model));
        }

        for prompt in attempts {
            let prompt = prompt.temperature(self.settings.temperature);
            match self.request_line(&prompt).await {
                Ok(candidate) if self.is_valid(source, &candidate) => return candidate,
                Ok(candidate) => debug!("Rejected line translation '{}' for '{}'", candidate, source),
                Err(e) => debug!("Line translation failed: {}", e),
            }
        }

        info!("Keeping source text for untranslatable line: {}", source);
        source.to_string()
    }

    async fn request_line(&self, prompt: &ChatPrompt) -> Result<String, TranslationError> {
        let content = self.chat_with_retry(prompt).await?;
        if content.trim().is_empty() {
            return Err(TranslationError::EmptyResponse);
        }
        Ok(content.trim().to_string())
    }

    /// One request with bounded retries on transient errors
    async fn chat_with_retry(&self, prompt: &ChatPrompt) -> Result<String, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.provider.chat(prompt).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_transient() && attempt < self.settings.retry_count => {
                    let backoff_ms = self.settings.retry_backoff_ms.saturating_mul(1u64 << attempt.min(16));
                    let jitter_ms = if backoff_ms > 1 {
                        rand::rng().random_range(0..=backoff_ms / 2)
                    } else {
                        0
                    };
                    attempt += 1;
                    warn!(
                        "{} request failed ({}), retry {}/{} in {} ms",
                        self.provider.name(),
                        e,
                        attempt,
                        self.settings.retry_count,
                        backoff_ms + jitter_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms + jitter_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Whether `candidate` is an acceptable translation of `source`
    pub fn is_valid(&self, source: &str, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return false;
        }
        if candidate.to_lowercase() == source.trim().to_lowercase() {
            return false;
        }
        let lowered = candidate.to_lowercase();
        let source_lowered = source.to_lowercase();
        if REFUSAL_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker) && !source_lowered.contains(marker))
        {
            return false;
        }
        if self.target_is_cjk && !contains_cjk(candidate) {
            return false;
        }
        true
    }

    fn keep_terms_clause(&self) -> String {
        if self.settings.keep_terms.is_empty() {
            String::new()
        } else {
            format!(" Keep these terms exactly as-is: {}.", self.settings.keep_terms.join(" | "))
        }
    }

    fn batch_system_prompt(&self) -> String {
        format!(
            "You are a professional subtitle translator. Translate each segment from {source} into {target}. \
             Segments are separated by the token {delim}. Translate only the natural-language parts. \
             Keep inline code, file names, paths, CLI commands and common acronyms (API, SDK, GPU) as-is. \
             Preserve numbers and units. Do not add brackets, notes or explanations.{terms} \
             Return exactly the same number of segments, in the same order, separated by {delim} and nothing else.",
            source = self.source_name,
            target = self.target_name,
            delim = DELIM,
            terms = self.keep_terms_clause(),
        )
    }

    fn line_system_prompt(&self) -> String {
        format!(
            "You are a professional subtitle translator. Translate the following line from {} into {}. \
             Keep terminology, code, paths and acronyms as-is.{} Return only the translation text.",
            self.source_name,
            self.target_name,
            self.keep_terms_clause()
        )
    }

    fn script_reminder(&self) -> String {
        format!("Important: answer in {} only, with the translation text and nothing else.", self.target_name)
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, cues: &[Cue]) -> Result<Vec<Cue>, TranslationError> {
        let sources: Vec<String> = cues.iter().map(|cue| normalize_line(&cue.primary_text)).collect();
        let translations = self.translate_lines(&sources).await?;

        if translations.len() != cues.len() {
            return Err(TranslationError::CardinalityMismatch {
                expected: cues.len(),
                actual: translations.len(),
            });
        }

        Ok(cues
            .iter()
            .zip(sources)
            .zip(translations)
            .map(|((cue, source), translation)| {
                let mut out = Cue::new(cue.index, cue.start_ms, cue.end_ms, source);
                if self.settings.bilingual {
                    out.secondary_text = Some(translation);
                } else {
                    out.primary_text = translation;
                }
                out
            })
            .collect())
    }
}

/// Group consecutive lines so each group stays under `char_limit`
/// characters (counting one separator per line). A single longer line
/// gets a group of its own.
pub fn split_into_batches(lines: &[String], char_limit: usize) -> Vec<Range<usize>> {
    let mut batches = Vec::new();
    let mut start = 0;
    let mut current_len = 0;

    for (i, line) in lines.iter().enumerate() {
        let add = line.chars().count() + 1;
        if i > start && current_len + add > char_limit {
            batches.push(start..i);
            start = i;
            current_len = 0;
        }
        current_len += add;
    }
    if start < lines.len() {
        batches.push(start..lines.len());
    }
    batches
}

fn split_segments(content: &str) -> Vec<String> {
    content.split(DELIM).map(|segment| segment.trim().to_string()).collect()
}

/// Lines with no letters (numbers, punctuation, music notes) pass through
fn needs_translation(line: &str) -> bool {
    line.chars().any(char::is_alphabetic)
}
