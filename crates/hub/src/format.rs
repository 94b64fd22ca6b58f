//! Display formatting helpers.

/// `{i}` substitution with Java-style `{i,choice,v1#s1|v2#s2}` selection.
/// A choice picks the segment with the largest threshold not above the
/// argument's numeric value; below the first threshold the first segment
/// wins. Unknown or out-of-range indexes render as empty.
pub fn format_message(pattern: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push('{');
            rest = after;
            continue;
        };
        let spec = &after[..end];
        out.push_str(&render_spec(spec, args));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn render_spec(spec: &str, args: &[&str]) -> String {
    let mut parts = spec.splitn(3, ',');
    let index: usize = match parts.next().and_then(|s| s.trim().parse().ok()) {
        Some(i) => i,
        None => return String::new(),
    };
    let arg = args.get(index).copied().unwrap_or("");
    match (parts.next().map(str::trim), parts.next()) {
        (Some("choice"), Some(choices)) => {
            let value: f64 = arg.parse().unwrap_or(0.0);
            choose(choices, value)
        }
        _ => arg.to_string(),
    }
}

fn choose(choices: &str, value: f64) -> String {
    let mut selected = String::new();
    let mut first = true;
    for segment in choices.split('|') {
        let Some((threshold, text)) = segment.split_once('#') else {
            continue;
        };
        let threshold: f64 = threshold.trim().parse().unwrap_or(f64::MAX);
        if first || value >= threshold {
            selected = text.to_string();
            first = false;
        }
    }
    selected
}

/// Tolerant numeric parse for displayed weights: comma decimals, grouping
/// spaces, and the dash placeholder all normalize; garbage is zero.
pub fn parse_formatted_number(s: &str) -> f64 {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{00A0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return 0.0;
    }
    cleaned.parse().unwrap_or(0.0)
}

/// Super-heavy categories print with a plus: `>109` becomes `+109`.
pub fn format_category_display(s: &str) -> String {
    match s.strip_prefix('>') {
        Some(rest) => format!("+{rest}"),
        None => s.to_string(),
    }
}
