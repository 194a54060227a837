use anyhow::{Result, anyhow};
use isolang::Language;

// @module: ISO language code handling
// Accepts ISO 639-1 (`zh`), ISO 639-2/T or /B (`zho`, `chi`) and region
// tagged forms (`zh-CN`, `pt_BR`); the region part is ignored.

// ISO 639-2/B codes that differ from their /T counterpart
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Resolve a language code to an `isolang::Language`
pub fn resolve(code: &str) -> Result<Language> {
    let normalized = code
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    let language = match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => {
            let terminological = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == normalized)
                .map(|(_, t)| *t)
                .unwrap_or(normalized.as_str());
            Language::from_639_3(terminological)
        }
        _ => None,
    };

    language.ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// English name of a language, used in translation prompts
pub fn get_language_name(code: &str) -> Result<String> {
    Ok(resolve(code)?.to_name().to_string())
}

/// Whether text in this language is expected to be written in CJK script
pub fn uses_cjk_script(code: &str) -> bool {
    matches!(
        resolve(code).map(|lang| lang.to_639_3()),
        Ok("zho") | Ok("jpn") | Ok("kor") | Ok("yue")
    )
}

/// True for Han, kana and Hangul characters
pub fn is_cjk_char(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'     // CJK unified ideographs
        | '\u{3400}'..='\u{4DBF}'   // extension A
        | '\u{F900}'..='\u{FAFF}'   // compatibility ideographs
        | '\u{3040}'..='\u{30FF}'   // hiragana, katakana
        | '\u{AC00}'..='\u{D7AF}'   // hangul syllables
        | '\u{1100}'..='\u{11FF}'   // hangul jamo
        | '\u{3000}'..='\u{303F}'   // CJK punctuation
        | '\u{FF00}'..='\u{FFEF}'   // fullwidth forms
        | '\u{20000}'..='\u{2FA1F}' // supplementary ideographs
    )
}

/// Whether the text contains at least one CJK character
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk_char)
}
