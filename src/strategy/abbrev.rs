//! Fuzzy matching between a sports feed's team abbreviation (e.g. `BCOOK`)
//! and the full team name Kalshi prints in a market title (e.g.
//! `Bethune-Cookman`). Different providers abbreviate differently, so this
//! tries several strategies in order before giving up.

/// Split a Kalshi market title of the shape `"Away at Home: Total Points"`
/// into `(away, home)`. Returns `None` if the title doesn't contain `" at "`.
pub fn parse_title(title: &str) -> Option<(String, String)> {
    let lower = title.to_lowercase();
    let idx = lower.find(" at ")?;
    let away = title[..idx].trim();
    let mut home = &title[idx + 4..];
    if let Some(colon) = home.find(':') {
        home = &home[..colon];
    }
    let home = home.trim();
    if away.is_empty() || home.is_empty() {
        return None;
    }
    Some((away.to_string(), home.to_string()))
}

fn split_words(full_name: &str) -> Vec<String> {
    full_name
        .to_uppercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '.' || c == '&')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_u_prefix(word: &str) -> String {
    let mut chars = word.chars();
    if word.len() > 2 && word.starts_with('U') {
        let second = word.chars().nth(1).unwrap_or(' ');
        if !"AEIOU".contains(second) {
            chars.next();
            return chars.as_str().to_string();
        }
    }
    word.to_string()
}

/// Return true if `abbrev` plausibly refers to a school named `full_name`,
/// trying (in order): simple word prefix, acronym, 1–3/1–5 char compound
/// (with "U"-prefix stripped word variants), shared 3-char prefix,
/// containment in the cleaned full name, and vowel-dropping subsequence.
pub fn abbrev_matches_name(abbrev: &str, full_name: &str) -> bool {
    let abbrev = abbrev.to_uppercase();
    let words = split_words(full_name);
    if words.is_empty() {
        return false;
    }

    // 1. Simple prefix of any single word, either direction.
    for word in &words {
        let shared = word.len().min(abbrev.len());
        if word.len() >= 3 && abbrev.starts_with(&word[..shared]) {
            return true;
        }
        if abbrev.len() >= 3 && word.starts_with(&abbrev[..shared]) {
            return true;
        }
    }

    // 2. Acronym: first letters of each word.
    if words.len() >= 2 {
        let acronym: String = words.iter().filter_map(|w| w.chars().next()).collect();
        if abbrev == acronym || abbrev.starts_with(&acronym) || abbrev.contains(&acronym) {
            return true;
        }
    }

    // 3. Compound: word[0][:w1] + word[-1 or 1][:w2], with a U-stripped variant.
    let stripped: Vec<String> = words.iter().map(|w| strip_u_prefix(w)).collect();
    let variants: Vec<&Vec<String>> = if stripped != words {
        vec![&words, &stripped]
    } else {
        vec![&words]
    };

    for wlist in variants {
        if wlist.len() >= 2 {
            let first = &wlist[0];
            let last = &wlist[wlist.len() - 1];
            for w1_len in 1..=3usize {
                for w2_len in 1..=5usize {
                    if first.chars().count() >= w1_len && last.chars().count() >= w2_len {
                        let candidate = format!(
                            "{}{}",
                            take_chars(first, w1_len),
                            take_chars(last, w2_len)
                        );
                        if abbrev == candidate || abbrev.starts_with(&candidate) {
                            return true;
                        }
                    }
                    if wlist.len() >= 3 {
                        let middle = &wlist[1];
                        if first.chars().count() >= w1_len && middle.chars().count() >= w2_len {
                            let candidate = format!(
                                "{}{}",
                                take_chars(first, w1_len),
                                take_chars(middle, w2_len)
                            );
                            if abbrev == candidate || abbrev.starts_with(&candidate) {
                                return true;
                            }
                        }
                    }
                }
            }
        }
    }

    // 3b. Shared 3-char prefix against any word.
    if abbrev.chars().count() >= 4 {
        for word in &words {
            if word.chars().count() >= 3 && take_chars(&abbrev, 3) == take_chars(word, 3) {
                return true;
            }
        }
    }

    // 4. Abbrev contained within the cleaned (no spaces/hyphens/dots) full name.
    let clean: String = full_name
        .to_uppercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.'))
        .collect();
    if abbrev.chars().count() >= 4 && clean.contains(&take_chars(&abbrev, 4)) {
        return true;
    }

    // 5. Vowel-dropping subsequence, first-char anchored.
    if abbrev.chars().count() >= 4 {
        for word in &words {
            if is_subsequence(&abbrev, word) {
                return true;
            }
        }
    }

    false
}

fn take_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// True if `abbrev` is a subsequence of `word` and both start with the same
/// character (e.g. `LIBRTY` is a subsequence of `LIBERTY` skipping the `E`).
fn is_subsequence(abbrev: &str, word: &str) -> bool {
    let abbrev_chars: Vec<char> = abbrev.chars().collect();
    let word_chars: Vec<char> = word.chars().collect();
    if abbrev_chars.is_empty() || word_chars.is_empty() || abbrev_chars[0] != word_chars[0] {
        return false;
    }
    let mut ai = 0;
    for &wch in &word_chars {
        if ai < abbrev_chars.len() && abbrev_chars[ai] == wch {
            ai += 1;
        }
    }
    ai == abbrev_chars.len()
}
