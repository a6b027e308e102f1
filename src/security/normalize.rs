//! Text canonicalization.
//!
//! Folds obfuscated and clean spellings of a word onto one representation so
//! that `"س.ك.ل.ي.ف"`, `"س ك ل ي ف"` and `"سكليف"` all compare equal.
//!
//! # Pipeline
//!
//! Each pass applies, in order:
//! 1. NFKC, invisible character removal, Arabic combining mark and tatweel removal
//! 2. Arabic letter-variant folding, then Latin lookalike folding inside any
//!    whitespace group that already carries Arabic letters
//! 3. Separator collapsing between letters (`.`, `-`, `_`, runs of 2+ spaces)
//! 4. Whitespace collapsing, letter-spacing joins, lower-casing
//!
//! Folding a lookalike can turn a digit into a letter, which lets pass N+1
//! collapse a separator pass N had to keep. Passes repeat until the output is
//! stable, which is what makes `normalize` idempotent.

use unicode_normalization::UnicodeNormalization;

/// Version of the character tables below. Bump when any mapping changes,
/// since stored keyword terms were normalized with the old tables.
pub const NORMALIZATION_VERSION: u32 = 1;

/// Upper bound on pipeline passes. Real input settles in two.
const MAX_PASSES: usize = 8;

/// Characters treated as inter-letter separators.
const SEPARATORS: [char; 6] = ['.', '-', '_', '\u{00B7}', '\u{2022}', '\u{2010}'];

/// Minimum run of single-letter tokens that is read as one spaced-out word.
const MIN_SPACED_LETTERS: usize = 3;

/// Canonicalize `text`. Pure, total and idempotent.
pub fn normalize(text: &str) -> String {
    let mut current = pass(text);
    for _ in 1..MAX_PASSES {
        let next = pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn pass(text: &str) -> String {
    let stripped: String = text
        .nfkc()
        .filter(|c| !is_invisible(*c) && !is_stripped_mark(*c))
        .map(fold_variant)
        .collect();
    let folded = fold_lookalikes(&stripped);
    let collapsed = collapse_separators(&folded);
    finish(&collapsed)
}

/// Zero-width and bidi control characters used to split words invisibly.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{061C}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{FEFF}'
    )
}

/// Arabic harakat, tanween, shadda, sukun, hamza/madda marks, superscript
/// alef, Quranic annotation marks and the tatweel (kashida).
pub(crate) fn is_stripped_mark(c: char) -> bool {
    matches!(
        c,
        '\u{0610}'..='\u{061A}'
            | '\u{0640}'
            | '\u{064B}'..='\u{065F}'
            | '\u{0670}'
            | '\u{06D6}'..='\u{06DC}'
            | '\u{06DF}'..='\u{06E4}'
            | '\u{06E7}'..='\u{06E8}'
            | '\u{06EA}'..='\u{06ED}'
    )
}

/// One canonical representative per Arabic letter-variant family.
fn fold_variant(c: char) -> char {
    match c {
        // alef forms
        '\u{0622}' | '\u{0623}' | '\u{0625}' | '\u{0671}' | '\u{0672}' | '\u{0673}' => '\u{0627}',
        // teh marbuta and heh variants
        '\u{0629}' | '\u{06C0}' | '\u{06C1}' | '\u{06D5}' => '\u{0647}',
        // alef maksura, farsi yeh, yeh with hamza
        '\u{0649}' | '\u{06CC}' | '\u{0626}' | '\u{06D0}' => '\u{064A}',
        // keheh, swash kaf, gaf
        '\u{06A9}' | '\u{06AA}' | '\u{06AF}' => '\u{0643}',
        // waw with hamza, oe
        '\u{0624}' | '\u{06C6}' => '\u{0648}',
        '\u{06BA}' => '\u{0646}', // noon ghunna
        '\u{066E}' => '\u{0628}', // dotless beh
        '\u{06A4}' => '\u{0641}', // veh
        _ => c,
    }
}

/// Latin characters that stand in for Arabic letters in mixed-script spam.
fn fold_lookalike(c: char) -> Option<char> {
    match c {
        'o' | 'O' | '0' => Some('\u{0647}'),
        'l' | 'I' | '1' => Some('\u{0644}'),
        'i' => Some('\u{064A}'),
        'a' | 'A' => Some('\u{0627}'),
        'e' | 'E' => Some('\u{0639}'),
        'u' | 'U' => Some('\u{0648}'),
        _ => None,
    }
}

pub(crate) fn is_arabic_letter(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c) && c.is_alphabetic()
}

pub(crate) fn is_separator(c: char) -> bool {
    SEPARATORS.contains(&c)
}

/// Fold lookalikes inside groups that contain Arabic letters. Groups are split
/// on single whitespace characters only: a run of 2+ spaces may be collapsed
/// later, so it must not split a group either.
fn fold_lookalikes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut start = 0;

    for i in 0..=chars.len() {
        let boundary = i == chars.len()
            || (chars[i].is_whitespace()
                && !(i > 0 && chars[i - 1].is_whitespace())
                && !(i + 1 < chars.len() && chars[i + 1].is_whitespace()));
        if !boundary {
            continue;
        }

        let group = &chars[start..i];
        if group.iter().any(|c| is_arabic_letter(*c)) {
            out.extend(group.iter().map(|c| fold_lookalike(*c).unwrap_or(*c)));
        } else {
            out.extend(group.iter());
        }
        if i < chars.len() {
            out.push(chars[i]);
        }
        start = i + 1;
    }

    out
}

/// Drop separator runs that sit between two letters. A run made only of
/// punctuation always goes; a whitespace-only run goes when it is 2+ long.
/// Mixed runs such as `". "` are ordinary word boundaries and stay.
fn collapse_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !(is_separator(c) || c.is_whitespace()) {
            out.push(c);
            i += 1;
            continue;
        }

        let mut j = i;
        while j < chars.len() && (is_separator(chars[j]) || chars[j].is_whitespace()) {
            j += 1;
        }
        let run = &chars[i..j];
        let flanked = i > 0 && j < chars.len() && chars[i - 1].is_alphabetic() && chars[j].is_alphabetic();
        let spaces = run.iter().filter(|c| c.is_whitespace()).count();
        let removable = spaces == 0 || (spaces == run.len() && run.len() >= 2);

        if !(flanked && removable) {
            out.extend(run.iter());
        }
        i = j;
    }

    out
}

/// Collapse whitespace, join spaced-out letters and lower-case.
fn finish(text: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut spaced: Vec<&str> = Vec::new();

    for token in text.split_whitespace() {
        let mut chars = token.chars();
        let single_letter = matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic());
        if single_letter {
            spaced.push(token);
        } else {
            flush_spaced(&mut spaced, &mut tokens);
            tokens.push(token.to_string());
        }
    }
    flush_spaced(&mut spaced, &mut tokens);

    tokens.join(" ").to_lowercase()
}

fn flush_spaced(spaced: &mut Vec<&str>, tokens: &mut Vec<String>) {
    if spaced.len() >= MIN_SPACED_LETTERS {
        tokens.push(spaced.concat());
    } else {
        tokens.extend(spaced.iter().map(|s| s.to_string()));
    }
    spaced.clear();
}
