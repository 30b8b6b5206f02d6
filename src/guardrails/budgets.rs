//! Prompt budget limits

use crate::types::Passage;

/// Default ceiling for top_k
pub const DEFAULT_MAX_TOP_K: usize = 4;

/// Default character budget for retrieved context
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 6000;

/// Default minimum number of passages kept by the budget trim
pub const DEFAULT_MIN_CHUNKS: usize = 2;

/// Default per-line cap for memory lines
pub const DEFAULT_MAX_LINE_CHARS: usize = 200;

/// Clamp a requested top_k into `[1, max_k]`
pub fn clamp_top_k(requested: i64, max_k: usize) -> usize {
    let max_k = max_k.max(1);
    if requested < 1 {
        return 1;
    }
    (requested as u64).min(max_k as u64) as usize
}

/// Clamp untyped input; anything that does not parse as an integer yields `max_k`
pub fn clamp_top_k_str(requested: &str, max_k: usize) -> usize {
    match requested.trim().parse::<i64>() {
        Ok(k) => clamp_top_k(k, max_k),
        Err(_) => max_k.max(1),
    }
}

/// Keep the first `max_lines` lines, trimmed and capped at `max_line_chars`
///
/// Over-long lines are cut at a character boundary and get a trailing `…`.
pub fn trim_memory_lines<S: AsRef<str>>(lines: &[S], max_lines: usize, max_line_chars: usize) -> Vec<String> {
    lines
        .iter()
        .take(max_lines)
        .map(|line| {
            let line = line.as_ref().trim();
            if line.chars().count() > max_line_chars {
                let mut cut: String = line.chars().take(max_line_chars).collect();
                cut.push('…');
                cut
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// Keep passages in order until the character budget is spent
///
/// # Contract
///
/// ```text
/// kept = longest prefix such that, for every passage p after the first
///        min_chunks, total(kept before p) + len(p) <= max_total_chars
/// |kept| >= min(min_chunks, |chunks|)
/// ```
///
/// The first `min_chunks` passages are always kept, even if they alone blow
/// the budget.
pub fn trim_chunks_by_budget(chunks: Vec<Passage>, max_total_chars: usize, min_chunks: usize) -> Vec<Passage> {
    let mut total = 0usize;
    let mut kept = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let len = chunk.char_len();
        if !kept.is_empty() && total + len > max_total_chars && kept.len() >= min_chunks {
            break;
        }
        total += len;
        kept.push(chunk);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassageMetadata;

    fn passage(len: usize) -> Passage {
        Passage::new("x".repeat(len), 1.0, PassageMetadata::default())
    }

    #[test]
    fn test_clamp_top_k_bounds() {
        assert_eq!(clamp_top_k(0, 4), 1);
        assert_eq!(clamp_top_k(-3, 4), 1);
        assert_eq!(clamp_top_k(3, 4), 3);
        assert_eq!(clamp_top_k(99, 4), 4);
    }

    #[test]
    fn test_clamp_top_k_str_non_numeric() {
        assert_eq!(clamp_top_k_str("abc", 4), 4);
        assert_eq!(clamp_top_k_str("", 4), 4);
        assert_eq!(clamp_top_k_str(" 2 ", 4), 2);
        assert_eq!(clamp_top_k_str("-1", 4), 1);
    }

    #[test]
    fn test_trim_memory_lines() {
        let long = "y".repeat(250);
        let lines = vec!["  first  ".to_string(), long, "third".to_string()];
        let out = trim_memory_lines(&lines, 2, 200);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], "first");
        assert_eq!(out[1].chars().count(), 201);
        assert!(out[1].ends_with('…'));
    }

    #[test]
    fn test_trim_memory_lines_multibyte() {
        let line = "é".repeat(10);
        let out = trim_memory_lines(&[line], 5, 4);
        assert_eq!(out[0], "éééé…");
    }

    #[test]
    fn test_budget_keeps_minimum() {
        let kept = trim_chunks_by_budget(vec![passage(5000), passage(5000), passage(10)], 6000, 2);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_budget_stops_when_exceeded() {
        let kept = trim_chunks_by_budget(
            vec![passage(2000), passage(2000), passage(1500), passage(1000)],
            6000,
            2,
        );
        // 2000 + 2000 + 1500 = 5500; adding 1000 would exceed
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_budget_empty() {
        assert!(trim_chunks_by_budget(Vec::new(), 6000, 2).is_empty());
    }
}
