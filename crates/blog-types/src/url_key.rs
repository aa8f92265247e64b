//! URL keys address a post as `/{url_key}`.

const MAX_LEN: usize = 64;
const FALLBACK: &str = "post";

/// First path segments owned by fixed routes. A post keyed by one of
/// these could never be reached at `/{url_key}`.
pub const RESERVED: &[&str] = &["about", "admin", "posts", "public", "user"];

pub fn is_reserved(key: &str) -> bool {
    RESERVED.contains(&key)
}

/// Lowercase ASCII slug of `title`. Cyrillic letters are transliterated,
/// everything else that is not alphanumeric collapses into single dashes.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        let piece: Option<&str> = if c.is_ascii_alphanumeric() {
            None
        } else {
            match transliterate(c) {
                Some(t) => Some(t),
                None => {
                    pending_dash = true;
                    continue;
                }
            }
        };

        if pending_dash && !out.is_empty() {
            out.push('-');
        }
        pending_dash = false;

        match piece {
            Some(t) => out.push_str(t),
            None => out.push(c),
        }
        if out.len() >= MAX_LEN {
            break;
        }
    }

    out.truncate(MAX_LEN);
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        FALLBACK.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalizes a user-supplied key with the same rules as titles.
pub fn normalize(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        None
    } else {
        Some(slugify(raw))
    }
}

/// First of `base`, `base-2`, `base-3`, ... that is neither reserved nor
/// `taken`.
pub fn unique<F>(base: &str, mut taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !is_reserved(base) && !taken(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !is_reserved(&candidate) && !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn transliterate(c: char) -> Option<&'static str> {
    let t = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };
    Some(t)
}
