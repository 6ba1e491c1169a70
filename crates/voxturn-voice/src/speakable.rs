//! Speakable text: what a chunk sounds like once formatting is gone.
//!
//! Chunk text reaches the client verbatim. The synthesizer only gets the
//! speakable form, with markdown markup, reasoning blocks and assistant file
//! citations (`【4:0†source】`) removed. A chunk whose speakable form is
//! empty gets no audio at all.

/// Reasoning blocks that must never be read aloud: `(open prefix, close tag)`.
const HIDDEN_BLOCKS: &[(&str, &str)] = &[
    ("<think", "</think>"),
    ("<reasoning>", "</reasoning>"),
    ("<|START_THINKING|>", "<|END_THINKING|>"),
];

const CODE_PLACEHOLDER: &str = "Code omitted.";

/// Reduce chunk text to plain prose suitable for speech synthesis.
pub fn speakable(text: &str) -> String {
    let text = HIDDEN_BLOCKS
        .iter()
        .fold(text.to_string(), |acc, (open, close)| remove_blocks(&acc, open, close));
    let text = remove_citations(&text);

    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            if !in_fence {
                push_words(&mut out, CODE_PLACEHOLDER);
            }
            in_fence = !in_fence;
            continue;
        }
        if in_fence || is_rule(trimmed) {
            continue;
        }
        push_words(&mut out, &inline_plain(strip_block_markers(trimmed)));
    }

    out
}

/// Whether a chunk has anything to say.
pub fn is_speakable(text: &str) -> bool {
    !speakable(text).is_empty()
}

/// Append `words` with single-space separation, collapsing inner whitespace.
fn push_words(out: &mut String, words: &str) {
    for word in words.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
}

/// Case-insensitive removal of `open…close` spans. An unclosed block hides
/// the rest of the text, since the reasoning is still streaming.
fn remove_blocks(text: &str, open: &str, close: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let open = open.to_ascii_lowercase();
    let close = close.to_ascii_lowercase();

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(found) = lower[cursor..].find(&open) {
        let start = cursor + found;
        out.push_str(&text[cursor..start]);
        match lower[start..].find(&close) {
            Some(end) => cursor = start + end + close.len(),
            None => return out,
        }
    }
    out.push_str(&text[cursor..]);
    out
}

/// Drop `【…】` citation markers emitted by file-search assistants.
fn remove_citations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '【' => depth += 1,
            '】' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_rule(line: &str) -> bool {
    let mut chars = line.chars().filter(|c| !c.is_whitespace());
    let Some(first) = chars.next() else {
        return false;
    };
    matches!(first, '-' | '*' | '_') && {
        let rest: Vec<char> = chars.collect();
        rest.len() >= 2 && rest.iter().all(|&c| c == first)
    }
}

/// Strip heading, blockquote and list markers from the start of a line.
fn strip_block_markers(line: &str) -> &str {
    let mut line = line;
    loop {
        let before = line;
        line = line.trim_start_matches('>').trim_start();
        line = line.trim_start_matches('#').trim_start();
        if line.len() == before.len() {
            break;
        }
    }

    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest;
        }
    }

    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest;
        }
    }
    line
}

/// Unwrap links and images, inline code, emphasis markers and HTML tags.
fn inline_plain(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '!' if chars.get(i + 1) == Some(&'[') => {
                if let Some((label, next)) = link_at(&chars, i + 1) {
                    if !label.is_empty() {
                        out.push_str("image: ");
                        out.push_str(&label);
                    }
                    i = next;
                } else {
                    out.push('!');
                    i += 1;
                }
            }
            '[' => {
                if let Some((label, next)) = link_at(&chars, i) {
                    out.push_str(&label);
                    i = next;
                } else {
                    out.push('[');
                    i += 1;
                }
            }
            '<' if opens_tag(&chars, i) => {
                match chars[i..].iter().position(|&c| c == '>') {
                    Some(len) => i += len + 1,
                    None => {
                        out.push('<');
                        i += 1;
                    }
                }
            }
            '`' | '*' | '~' => i += 1,
            '_' if is_emphasis_underscore(&chars, i) => i += 1,
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Parse `[label](target)` starting at `open`. Returns the label and the
/// index just past the closing parenthesis.
fn link_at(chars: &[char], open: usize) -> Option<(String, usize)> {
    let close = open + chars[open..].iter().position(|&c| c == ']')?;
    if chars.get(close + 1) != Some(&'(') {
        return None;
    }
    let end = close + 1 + chars[close + 1..].iter().position(|&c| c == ')')?;
    Some((chars[open + 1..close].iter().collect(), end + 1))
}

fn opens_tag(chars: &[char], i: usize) -> bool {
    chars
        .get(i + 1)
        .is_some_and(|c| c.is_ascii_alphabetic() || *c == '/')
}

/// `_` is emphasis only at a word edge; `snake_case` keeps its underscore.
fn is_emphasis_underscore(chars: &[char], i: usize) -> bool {
    let before = i.checked_sub(1).and_then(|p| chars.get(p)).is_some_and(|c| c.is_alphanumeric());
    let after = chars.get(i + 1).is_some_and(|c| c.is_alphanumeric());
    !(before && after)
}
