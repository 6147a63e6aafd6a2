//! Idempotent edits of line-oriented configuration files.
//!
//! All functions are pure `&str -> String` transforms. Applying the same edit
//! twice yields byte-identical output: settings are substituted in place,
//! list directives only gain missing members and line insertions are guarded
//! by an existence check.

/// Is `line` a comment (after leading whitespace)?
fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') || trimmed.starts_with(';')
}

/// First whitespace-separated token, ignoring a leading comment marker
fn keyword(line: &str) -> Option<&str> {
    line.trim_start()
        .trim_start_matches(['#', ';'])
        .split_whitespace()
        .next()
}

fn join_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn to_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// Index of the first active `Match` block; directives after it are scoped
fn global_end(lines: &[String]) -> usize {
    lines
        .iter()
        .position(|l| {
            !is_comment(l)
                && keyword(l).is_some_and(|k| k.eq_ignore_ascii_case("match"))
        })
        .unwrap_or(lines.len())
}

/// Find the line to rewrite for `key` in the global section
///
/// Prefers the first active occurrence, then the first commented-out one.
fn find_directive(lines: &[String], key: &str) -> Option<(usize, bool)> {
    let end = global_end(lines);
    let matches_key = |l: &String| keyword(l).is_some_and(|k| k.eq_ignore_ascii_case(key));

    if let Some(idx) = lines[..end].iter().position(|l| !is_comment(l) && matches_key(l)) {
        return Some((idx, true));
    }
    lines[..end]
        .iter()
        .position(|l| {
            // `#Key value` only, not free-text comments that happen to start with the word
            is_comment(l) && matches_key(l) && l.split_whitespace().count() <= 3
        })
        .map(|idx| (idx, false))
}

/// Set an `sshd_config`-style `Key value` directive
///
/// Rewrites the first active (or commented-out) occurrence in place; appends
/// before the first `Match` block when the key is absent.
pub fn set_directive(text: &str, key: &str, value: &str) -> String {
    let mut lines = to_lines(text);
    let wanted = format!("{} {}", key, value);

    match find_directive(&lines, key) {
        Some((idx, _)) => lines[idx] = wanted,
        None => {
            let at = global_end(&lines);
            lines.insert(at, wanted);
        }
    }

    join_lines(&lines)
}

/// Active `Include` line read before `key`'s directive
///
/// sshd keeps the first value it sees for most keywords, so a drop-in pulled
/// in here overrides the directive further down.
pub fn include_before(text: &str, key: &str) -> Option<String> {
    let lines = to_lines(text);
    let end = find_directive(&lines, key).map_or_else(|| global_end(&lines), |(idx, _)| idx);
    lines[..end]
        .iter()
        .find(|l| !is_comment(l) && keyword(l).is_some_and(|k| k.eq_ignore_ascii_case("include")))
        .map(|l| l.trim().to_string())
}

/// Split a directive's arguments, honouring double quotes
pub fn split_words(value: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in value.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn quote_word(word: &str) -> String {
    if word.chars().any(char::is_whitespace) {
        format!("\"{}\"", word)
    } else {
        word.to_string()
    }
}

/// Ensure a list directive (e.g. `AllowGroups`) contains every value
///
/// Existing members keep their order and spelling; missing ones are appended.
/// Comparison is case-insensitive.
pub fn merge_list_directive(text: &str, key: &str, values: &[String]) -> String {
    let mut lines = to_lines(text);

    let (idx, mut members) = match find_directive(&lines, key) {
        Some((idx, true)) => {
            let rest = lines[idx]
                .trim_start()
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest)
                .unwrap_or("");
            (Some(idx), split_words(rest))
        }
        Some((idx, false)) => (Some(idx), Vec::new()),
        None => (None, Vec::new()),
    };

    for value in values {
        if !members.iter().any(|m| m.eq_ignore_ascii_case(value)) {
            members.push(value.clone());
        }
    }

    let rendered: Vec<String> = members.iter().map(|m| quote_word(m)).collect();
    let line = format!("{} {}", key, rendered.join(" "));

    match idx {
        Some(idx) => {
            // Leave an already-complete line byte-for-byte untouched
            let existing = split_words(lines[idx].trim_start_matches(['#', ';']));
            let unchanged = !is_comment(&lines[idx])
                && existing.len() == members.len() + 1;
            if !unchanged {
                lines[idx] = line;
            }
        }
        None => {
            let at = global_end(&lines);
            lines.insert(at, line);
        }
    }

    join_lines(&lines)
}

/// Does any active line mention `needle`?
pub fn contains_active(text: &str, needle: &str) -> bool {
    text.lines().any(|l| !is_comment(l) && l.contains(needle))
}

/// Append `line` unless an identical (trimmed) line already exists
pub fn ensure_line(text: &str, line: &str) -> String {
    let mut lines = to_lines(text);
    if !lines.iter().any(|l| l.trim() == line.trim()) {
        lines.push(line.to_string());
    }
    join_lines(&lines)
}

fn section_header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}

fn ini_key(line: &str) -> Option<&str> {
    line.trim_start()
        .trim_start_matches(['#', ';'])
        .split_once('=')
        .map(|(k, _)| k.trim())
}

/// Set `key = value` inside `[section]` of an INI-style file (sssd.conf)
///
/// An existing or commented-out key in the section is rewritten in place;
/// otherwise the key is added after the section's last entry. A missing
/// section is appended.
pub fn set_ini_key(text: &str, section: &str, key: &str, value: &str) -> String {
    let mut lines = to_lines(text);
    let wanted = format!("{} = {}", key, value);

    let Some(start) = lines.iter().position(|l| section_header(l) == Some(section)) else {
        if lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(format!("[{}]", section));
        lines.push(wanted);
        return join_lines(&lines);
    };

    let end = lines[start + 1..]
        .iter()
        .position(|l| section_header(l).is_some())
        .map(|offset| start + 1 + offset)
        .unwrap_or(lines.len());

    let body = start + 1..end;
    let active = body
        .clone()
        .find(|&i| !is_comment(&lines[i]) && ini_key(&lines[i]) == Some(key));
    let commented = body
        .clone()
        .find(|&i| is_comment(&lines[i]) && ini_key(&lines[i]) == Some(key));

    match active.or(commented) {
        Some(idx) => {
            let current_value = lines[idx].split_once('=').map(|(_, v)| v.trim());
            if is_comment(&lines[idx]) || current_value != Some(value) {
                lines[idx] = wanted;
            }
        }
        None => {
            let last_entry = body
                .rev()
                .find(|&i| !lines[i].trim().is_empty())
                .unwrap_or(start);
            lines.insert(last_entry + 1, wanted);
        }
    }

    join_lines(&lines)
}

/// Escape a sudoers user/group name (spaces become `\ `)
pub fn sudoers_escape(name: &str) -> String {
    name.replace(' ', "\\ ")
}
