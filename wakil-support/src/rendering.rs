//! Text rendering utilities for human-friendly error messages.
//!
//! Formats resolution chains, type names and suggestions shown by
//! container errors.

/// Renders a resolution chain as a readable string.
///
/// # Examples
/// ```
/// use wakil_support::rendering::render_chain;
///
/// let chain = vec!["Mailer", "SmtpPool", "Settings", "Mailer"];
/// assert_eq!(render_chain(&chain), "Mailer → SmtpPool → Settings → Mailer");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use wakil_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("shop::billing::Invoicer"), "Invoicer");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn shop::billing::Gateway>"),
///     "Arc<dyn Gateway>",
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    let mut start = 0;
    for (at, ch) in full_name.char_indices() {
        if is_delimiter(ch) {
            out.push_str(last_segment(&full_name[start..at]));
            out.push(ch);
            start = at + ch.len_utf8();
        }
    }
    out.push_str(last_segment(&full_name[start..]));
    out
}

fn is_delimiter(ch: char) -> bool {
    matches!(ch, '<' | '>' | ',' | ' ' | '[' | ']' | '(' | ')' | '&' | ';')
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Suggests registered type names that look like `requested`.
///
/// Substring matches on the full path rank first, then matches on the
/// short name, then names sharing a prefix of at least three characters.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let wanted = Lowered::new(requested);

    let mut ranked: Vec<(usize, &str)> = available
        .iter()
        .copied()
        .filter(|&name| name != requested)
        .filter_map(|name| Some((similarity(&wanted, &Lowered::new(name))?, name)))
        .collect();

    ranked.sort_by(|(a_score, a_name), (b_score, b_name)| b_score.cmp(a_score).then_with(|| a_name.cmp(b_name)));
    ranked.truncate(max_suggestions);
    ranked.into_iter().map(|(_, name)| name.to_owned()).collect()
}

struct Lowered {
    full: String,
    short: String,
}

impl Lowered {
    fn new(name: &str) -> Self {
        Self {
            full: name.to_lowercase(),
            short: shorten_type_name(name).to_lowercase(),
        }
    }
}

fn similarity(wanted: &Lowered, candidate: &Lowered) -> Option<usize> {
    let overlaps = |a: &str, b: &str| a.contains(b) || b.contains(a);
    if overlaps(&candidate.full, &wanted.full) {
        return Some(100);
    }
    if overlaps(&candidate.short, &wanted.short) {
        return Some(80);
    }

    let prefix = candidate
        .short
        .chars()
        .zip(wanted.short.chars())
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| candidate.short.len().min(wanted.short.len()));
    (prefix >= 3).then_some(prefix * 10)
}
