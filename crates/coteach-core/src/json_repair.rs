//! Lenient JSON parsing for model output.
//!
//! Classification replies are usually almost-valid JSON: wrapped in
//! markdown fences, surrounded by prose, carrying a trailing comma, or cut
//! off before the closing brace. [`parse_with_repair`] tries a strict parse
//! first and only then applies [`repair_json`].

/// Repair common defects in model-produced JSON.
///
/// 1. Strip markdown fences.
/// 2. Drop prose before the first `{`/`[` and after the matching close.
/// 3. Remove trailing commas before `}` and `]`.
/// 4. Close structures left open by truncation.
pub fn repair_json(input: &str) -> String {
    let unfenced = strip_fences(input);
    let sliced = slice_to_value(unfenced);
    let no_trailing = drop_trailing_commas(sliced);
    close_open_structures(&no_trailing)
}

/// Parse `input` as JSON, repairing it if the strict parse fails.
pub fn parse_with_repair(input: &str) -> Result<serde_json::Value, serde_json::Error> {
    if let Ok(value) = serde_json::from_str(input) {
        return Ok(value);
    }
    serde_json::from_str(&repair_json(input))
}

fn strip_fences(input: &str) -> &str {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string ("json", "JSON", ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// From the first opening bracket to the last closing bracket of the same
/// kind. Returns the input unchanged when there is no opening bracket.
fn slice_to_value(input: &str) -> &str {
    let Some(start) = input.find(['{', '[']) else {
        return input;
    };
    let close = if input[start..].starts_with('{') { '}' } else { ']' };
    match input.rfind(close) {
        Some(end) if end > start => &input[start..=end],
        _ => &input[start..],
    }
}

/// Commas inside string literals are left alone.
fn drop_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn close_open_structures(input: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = input.trim_end().to_string();
    if in_string {
        out.push('"');
    }
    if out.ends_with(',') {
        out.pop();
    }
    while let Some(close) = stack.pop() {
        out.push(close);
    }
    out
}
