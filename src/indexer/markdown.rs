/// Heading-aware markdown chunker.
///
/// Walks the document line by line, keeps a stack of the active markdown
/// headings and prefixes every emitted chunk with the heading path, so a
/// chunk read in isolation still knows which chapter and section it came
/// from. Consecutive chunks share the last few lines for continuity.
use tracing::debug;

/// Literal prefix of the section annotation. Search logs and evidence text
/// expose it to users verbatim.
pub const SECTION_PREFIX: &str = "[Section: ";

/// Splits `text` into heading-annotated chunks.
///
/// A chunk is flushed once the accumulated body exceeds `chunk_size`
/// characters (counted as `char`s). After a flush only the last
/// `overlap_lines` lines are carried into the next chunk.
pub fn split_smart(text: &str, chunk_size: usize, overlap_lines: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    let mut headers: Vec<String> = Vec::new();

    for line in text.split('\n') {
        let stripped = line.trim();

        if stripped.starts_with('#') {
            let level = stripped.len() - stripped.trim_start_matches('#').len();
            let title = stripped.trim_matches('#').trim();

            // A heading replaces its own level and everything below it.
            if headers.len() >= level {
                headers.truncate(level - 1);
            }
            headers.push(title.to_string());

            // The heading line stays in the body too.
            current.push(line);
            current_len += line.chars().count();
            continue;
        }

        current.push(line);
        current_len += line.chars().count();

        if current_len > chunk_size {
            chunks.push(render_chunk(&headers, &current));

            let keep_from = current.len().saturating_sub(overlap_lines);
            current.drain(..keep_from);
            current_len = current.iter().map(|l| l.chars().count()).sum();
        }
    }

    if current.iter().any(|l| !l.trim().is_empty()) {
        chunks.push(render_chunk(&headers, &current));
    }

    debug!("Document split into {} chunks", chunks.len());
    chunks
}

fn render_chunk(headers: &[String], lines: &[&str]) -> String {
    format!(
        "{SECTION_PREFIX}{}]\n{}",
        headers.join(" > "),
        lines.join("\n")
    )
}

/// Returns the heading path of a rendered chunk, e.g. `"A > C"`.
pub fn section_path(chunk: &str) -> Option<&str> {
    let first_line = chunk.lines().next()?;
    first_line
        .strip_prefix(SECTION_PREFIX)
        .and_then(|rest| rest.strip_suffix(']'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_empty_text() {
        assert!(split_smart("", 600, 3).is_empty());
    }

    #[test]
    fn test_whitespace_only() {
        assert!(split_smart("   \n\n   \n", 600, 3).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_smart("# Title\n\nShort body.", 600, 3);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "[Section: Title]\n# Title\n\nShort body.");
    }

    #[test]
    fn test_no_headings_keeps_empty_section_literal() {
        let chunks = split_smart("plain text line", 600, 3);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("[Section: ]\n"));
        assert_eq!(section_path(&chunks[0]), Some(""));
    }

    #[test]
    fn test_sibling_heading_replaces_previous() {
        let text = "# A\n## B\nbody under b\n## C\nbody under c";
        let chunks = split_smart(text, 5, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(section_path(&chunks[0]), Some("A > B"));
        assert_eq!(section_path(&chunks[1]), Some("A > C"));
        assert!(chunks[1].contains("body under c"));
        assert!(!chunks[1].contains("body under b"));
    }

    #[test]
    fn test_deeper_heading_keeps_ancestors() {
        let text = "# Cardiology\n## Arrhythmia\n### Atrial fibrillation\nirregularly irregular rhythm";
        let chunks = split_smart(text, 10, 0);
        assert_eq!(
            section_path(&chunks[0]),
            Some("Cardiology > Arrhythmia > Atrial fibrillation")
        );
    }

    #[test]
    fn test_overlap_lines_carried_forward() {
        let text = "line one aaaa\nline two bbbb\nline three cc\nline four dddd";
        // Every body line exceeds the budget together with one carried line.
        let chunks = split_smart(text, 20, 1);
        assert!(chunks.len() >= 2);
        // The second chunk starts with the last line of the first one.
        let first_body: Vec<&str> = chunks[0].lines().skip(1).collect();
        let second_body: Vec<&str> = chunks[1].lines().skip(1).collect();
        assert_eq!(first_body.last(), second_body.first());
    }

    #[test]
    fn test_zero_overlap_resets_buffer() {
        let text = "aaaaaaaaaa\nbbbbbbbbbb\ncccccccccc";
        let chunks = split_smart(text, 5, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], "[Section: ]\nbbbbbbbbbb");
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        // 6 CJK chars are 18 bytes but only 6 chars
        let chunks = split_smart("发热伴寒战咳", 10, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "[Section: ]\n发热伴寒战咳");
    }

    #[test]
    fn test_all_non_empty_lines_preserved() {
        let mut text = String::new();
        for section in ["Fever", "Cough", "Chest pain"] {
            text.push_str(&format!("# {section}\n"));
            for i in 0..15 {
                text.push_str(&format!("{section} detail line number {i}\n"));
            }
        }

        let chunks = split_smart(&text, 120, 2);
        let bodies: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.lines().skip(1))
            .collect();

        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            assert!(bodies.contains(&line), "line lost: {line}");
        }
    }
}
