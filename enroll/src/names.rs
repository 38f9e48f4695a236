/// Leading phrases people use to introduce themselves, longest first so
/// "my name is bob" is not consumed by the shorter "is".
const INTRO_PATTERNS: &[&str] = &[
    "my name is",
    "my name's",
    "the name is",
    "they call me",
    "call me",
    "this is",
    "i am",
    "i'm",
    "it's",
];

/// Filler words that are never names.
const STOPWORDS: &[&str] = &[
    "hi", "hello", "hey", "yes", "no", "ok", "okay", "please", "um", "uh", "the", "a", "an",
    "my", "name", "is", "am", "i", "me", "mister", "miss", "so", "well", "actually",
];

/// Extracts a person's name from a self-introduction.
///
/// Tries the common introduction phrases first and takes the word that
/// follows; otherwise falls back to the first alphabetic non-stopword
/// token. Returns a title-cased name, or `None` when nothing usable is
/// present; callers re-prompt rather than failing.
pub fn extract_name(text: &str) -> Option<String> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    for pattern in INTRO_PATTERNS {
        if let Some(idx) = text.find(pattern) {
            let rest = &text[idx + pattern.len()..];
            if let Some(name) = first_name_token(rest) {
                return Some(name);
            }
        }
    }

    first_name_token(&text)
}

fn first_name_token(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphabetic()))
        .find(|word| {
            word.len() > 1
                && word.chars().all(|c| c.is_alphabetic())
                && !STOPWORDS.contains(word)
        })
        .map(title_case)
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
