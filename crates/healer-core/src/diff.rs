//! Line-based diff between original and fixed file content.
//!
//! Single-hunk diff by common prefix/suffix trimming. Every fix this system
//! produces is a localized line edit, so one hunk is always sufficient and
//! the output stays stable for commit and review-request bodies.

/// Render a line diff of `original` vs `fixed`.
///
/// Unchanged context is limited to `context` lines on each side of the hunk.
/// Returns an empty string when the contents are identical.
pub fn line_diff(original: &str, fixed: &str, context: usize) -> String {
    if original == fixed {
        return String::new();
    }

    let old: Vec<&str> = original.lines().collect();
    let new: Vec<&str> = fixed.lines().collect();

    let mut prefix = 0;
    while prefix < old.len() && prefix < new.len() && old[prefix] == new[prefix] {
        prefix += 1;
    }

    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < new.len() - prefix
        && old[old.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mut out = String::new();
    let hunk_start = prefix.saturating_sub(context);

    for line in &old[hunk_start..prefix] {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    for line in &old[prefix..old.len() - suffix] {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
    for line in &new[prefix..new.len() - suffix] {
        out.push_str("+ ");
        out.push_str(line);
        out.push('\n');
    }

    let tail_end = (old.len() - suffix + context).min(old.len());
    for line in &old[old.len() - suffix..tail_end] {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }

    out
}

/// Count of lines that differ between the two contents, position-wise.
pub fn changed_line_count(original: &str, fixed: &str) -> usize {
    let old: Vec<&str> = original.lines().collect();
    let new: Vec<&str> = fixed.lines().collect();
    let max = old.len().max(new.len());

    (0..max)
        .filter(|&i| old.get(i) != new.get(i))
        .count()
}

/// Truncate a diff to at most `max_lines` lines for review descriptions.
pub fn excerpt(diff: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = diff.lines().collect();
    if lines.len() <= max_lines {
        return diff.trim_end().to_string();
    }
    let mut out = lines[..max_lines].join("\n");
    out.push_str(&format!("\n  ... ({} more lines)", lines.len() - max_lines));
    out
}
