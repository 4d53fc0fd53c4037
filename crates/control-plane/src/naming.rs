//! Deployment slug normalization and allocation candidates.
//!
//! A display name such as `"My Blog!"` becomes the slug `my-blog`. If that
//! slug is taken the allocator tries `my-blog1`, `my-blog2`, ... in order.

use std::sync::OnceLock;

use regex::Regex;

/// Maximum length of the base slug, before any numeric suffix.
pub const MAX_SLUG_LEN: usize = 20;

/// Allocation attempts before giving up.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 100;

/// Subdomains that can never be handed out.
const RESERVED: &[&str] = &["api"];

/// Characters removed outright.
const REMOVED: &[char] = &['*', '+', '~', '.', '(', ')', '\'', '"', '!', ':', '@'];

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z](-?[a-zA-Z0-9]+((-|\s)[a-zA-Z0-9]+)*)?$")
            .expect("slug pattern compiles")
    })
}

/// ASCII spelling of a lowercase accented Latin letter.
fn fold_latin(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'ł' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'œ' => "oe",
        'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ß' => "ss",
        'ť' | 'ţ' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

/// Normalize a display name into a deployment slug.
///
/// Accented Latin letters are folded to ASCII (`"déjà vu"` becomes
/// `deja-vu`); any other non-ASCII character is dropped. Returns `None`
/// when nothing valid remains, e.g. the name is empty or starts with a
/// digit.
pub fn normalize(display_name: &str) -> Option<String> {
    let mut cleaned = String::with_capacity(display_name.len());
    for c in display_name.to_lowercase().chars() {
        if REMOVED.contains(&c) {
            continue;
        }
        if let Some(folded) = fold_latin(c) {
            cleaned.push_str(folded);
        } else if c == '-' {
            cleaned.push(' ');
        } else if c.is_ascii_alphanumeric() || c.is_whitespace() {
            cleaned.push(c);
        }
    }

    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("-");
    let truncated: String = joined.chars().take(MAX_SLUG_LEN).collect();
    let slug = truncated.trim_end_matches('-').to_string();

    if is_valid(&slug) {
        Some(slug)
    } else {
        None
    }
}

/// Whether a slug matches the allowed subdomain shape.
pub fn is_valid(slug: &str) -> bool {
    slug_pattern().is_match(slug)
}

pub fn is_reserved(candidate: &str) -> bool {
    RESERVED.contains(&candidate)
}

/// Candidate names for a base slug: the slug itself, then `slug1`, `slug2`, ...
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    (0..MAX_ALLOCATION_ATTEMPTS).map(move |attempt| {
        if attempt == 0 {
            base.to_string()
        } else {
            format!("{}{}", base, attempt)
        }
    })
}
