/*!
 * Tests for the LLM translator over mock chat providers
 */

use std::sync::Arc;

use subforge::collaborators::Translator;
use subforge::collaborators::translator::{LlmTranslator, TranslatorSettings};
use subforge::cue::Cue;
use subforge::errors::TranslationError;
use subforge::providers::mock::MockProvider;

fn settings(target: &str) -> TranslatorSettings {
    TranslatorSettings {
        target_language: target.to_string(),
        retry_backoff_ms: 0,
        ..TranslatorSettings::default()
    }
}

fn cues(texts: &[&str]) -> Vec<Cue> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| Cue::new(i + 1, i as u64 * 2_000, i as u64 * 2_000 + 1_500, *text))
        .collect()
}

/// Test that a provider losing segments never changes the cue count or timing
#[tokio::test]
async fn test_translate_withDroppedSegments_shouldKeepCardinalityAndTiming() {
    let provider = MockProvider::dropping_last_segment().with_segment_response(|s| format!("中文 {}", s));
    let translator = LlmTranslator::new(
        Arc::new(provider),
        TranslatorSettings {
            batch_char_limit: 30,
            ..settings("zh")
        },
    );
    let input = cues(&[
        "The first line of the talk",
        "Second line",
        "A third, slightly longer line",
        "Four",
        "Five is the last",
    ]);

    let output = translator.translate(&input).await.unwrap();

    assert_eq!(output.len(), input.len());
    for (source, translated) in input.iter().zip(&output) {
        assert!(source.same_timing(translated));
        assert_eq!(translated.primary_text, source.primary_text);
        let secondary = translated.secondary_text.as_deref().unwrap();
        assert!(secondary.starts_with("中文"), "got {}", secondary);
    }
}

#[tokio::test]
async fn test_translate_withMonolingualMode_shouldReplacePrimaryText() {
    let translator = LlmTranslator::new(
        Arc::new(MockProvider::working()),
        TranslatorSettings {
            bilingual: false,
            ..settings("fr")
        },
    );
    let output = translator.translate(&cues(&["Hello"])).await.unwrap();
    assert_eq!(output[0].primary_text, "[TRANSLATED] Hello");
    assert_eq!(output[0].secondary_text, None);
}

/// Test that a line no attempt can translate falls back to its source text
#[tokio::test]
async fn test_translate_withEchoingProvider_shouldFallBackToSource() {
    let provider = Arc::new(MockProvider::echo());
    let translator = LlmTranslator::new(provider.clone(), settings("fr"));

    let output = translator.translate_lines(&["Hello".to_string()]).await.unwrap();

    assert_eq!(output, vec!["Hello".to_string()]);
    // One batch request, then a plain and a strict single-line attempt
    assert_eq!(provider.request_count(), 3);
}

#[tokio::test]
async fn test_translate_withFallbackModel_shouldTryOneMoreTime() {
    let provider = Arc::new(MockProvider::echo());
    let translator = LlmTranslator::new(
        provider.clone(),
        TranslatorSettings {
            fallback_model: Some("bigger-model".to_string()),
            ..settings("fr")
        },
    );
    translator.translate_lines(&["Hello".to_string()]).await.unwrap();
    assert_eq!(provider.request_count(), 4);
}

#[tokio::test]
async fn test_translate_withNonVerbalLines_shouldNotCallProvider() {
    let provider = Arc::new(MockProvider::working());
    let translator = LlmTranslator::new(provider.clone(), settings("fr"));
    let lines = vec!["1984".to_string(), "♪ ♪".to_string(), "...".to_string()];

    let output = translator.translate_lines(&lines).await.unwrap();

    assert_eq!(output, lines);
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_translate_withTransientFailures_shouldRetry() {
    // Every second request fails: the second line needs one retry
    let provider = Arc::new(MockProvider::intermittent(2));
    let translator = LlmTranslator::new(
        provider.clone(),
        TranslatorSettings {
            line_by_line: true,
            ..settings("fr")
        },
    );
    let lines = vec!["Good morning".to_string(), "Good night".to_string()];

    let output = translator.translate_lines(&lines).await.unwrap();

    assert_eq!(
        output,
        vec!["[TRANSLATED] Good morning".to_string(), "[TRANSLATED] Good night".to_string()]
    );
    assert_eq!(provider.request_count(), 3);
}

#[tokio::test]
async fn test_translate_withFailingProvider_shouldReturnProviderError() {
    let translator = LlmTranslator::new(
        Arc::new(MockProvider::failing()),
        TranslatorSettings {
            retry_count: 1,
            ..settings("fr")
        },
    );
    let err = translator.translate(&cues(&["Hello"])).await.unwrap_err();
    assert!(matches!(err, TranslationError::Provider(_)));
}

#[tokio::test]
async fn test_translate_withLineByLineMode_shouldSendOneRequestPerLine() {
    let provider = Arc::new(MockProvider::working());
    let translator = LlmTranslator::new(
        provider.clone(),
        TranslatorSettings {
            line_by_line: true,
            ..settings("fr")
        },
    );
    let lines: Vec<String> = ["one", "two", "three"].iter().map(|s| s.to_string()).collect();
    let output = translator.translate_lines(&lines).await.unwrap();
    assert_eq!(output.len(), 3);
    assert_eq!(provider.request_count(), 3);
}

/// Test that a line without letters keeps its text even when its segment is lost
#[tokio::test]
async fn test_translate_withDroppedNonVerbalSegment_shouldKeepSourceText() {
    let provider = Arc::new(MockProvider::dropping_last_segment().with_segment_response(|s| format!("译{}", s)));
    let translator = LlmTranslator::new(
        provider.clone(),
        TranslatorSettings {
            bilingual: false,
            ..settings("zh")
        },
    );
    let input = cues(&["hello", "42"]);

    let output = translator.translate(&input).await.unwrap();

    assert_eq!(output[0].primary_text, "译hello");
    assert_eq!(output[1].primary_text, "42");
    assert!(output.iter().all(|cue| !cue.is_blank()));
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test]
async fn test_translate_withMixedBatch_shouldNotReplaceNonVerbalLines() {
    let translator = LlmTranslator::new(Arc::new(MockProvider::working()), settings("fr"));
    let lines = vec!["Good morning".to_string(), "2024".to_string(), "♪ ♪".to_string()];

    let output = translator.translate_lines(&lines).await.unwrap();

    assert_eq!(
        output,
        vec!["[TRANSLATED] Good morning".to_string(), "2024".to_string(), "♪ ♪".to_string()]
    );
}
