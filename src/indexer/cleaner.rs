/// Markdown cleanup for PDF-converted textbooks.
///
/// PDF-to-markdown output is full of page numbers, running headers, image
/// placeholders and paragraphs broken at every line end. Cleaning before
/// ingestion gives the chunker real headings to build section paths from.
use regex::Regex;
use tracing::{debug, info};

/// Running headers/footers commonly found in scanned Chinese textbooks.
pub const DEFAULT_REMOVE_KEYWORDS: &[&str] = &[
    "诊断学",
    "第.篇",
    "第.章",
    "Page",
    "仅供学习交流",
    "扫描全能王",
];

pub struct MarkdownCleaner {
    remove_patterns: Vec<Regex>,
    page_number: Regex,
    image: Regex,
    broken_paragraph: Regex,
    excess_newlines: Regex,
    bold_header: Regex,
    numbered_header: Regex,
    broken_list: Regex,
    decorative: Regex,
}

impl MarkdownCleaner {
    /// Build a cleaner. Each keyword is a regex; any line matching one is
    /// dropped (case-insensitive).
    pub fn new<S: AsRef<str>>(remove_keywords: &[S]) -> Result<Self, regex::Error> {
        let remove_patterns = remove_keywords
            .iter()
            .map(|k| Regex::new(&format!("(?mi)^.*{}.*$", k.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            remove_patterns,
            page_number: Regex::new(r"(?m)^\s*\d+\s*$")?,
            image: Regex::new(r"(?s)!\[.*?\]\(.*?\)")?,
            // CJK char + non-terminal char, line break, CJK char
            broken_paragraph: Regex::new(
                r"([\x{4e00}-\x{9fa5}][^。！？：；\n])\n\s*([\x{4e00}-\x{9fa5}])",
            )?,
            excess_newlines: Regex::new(r"\n{3,}")?,
            bold_header: Regex::new(r"(?m)^\s*\*\*(.*?)\*\*\s*$")?,
            numbered_header: Regex::new(r"(?m)^\s*(\d+(\.\d+)+)\s+(.{2,20})\s*$")?,
            broken_list: Regex::new(r"(?m)^\s*(\d+)\s+\.\s+")?,
            decorative: Regex::new(r"(?m)^[_\-=]{3,}$")?,
        })
    }

    /// Run the full cleanup pipeline.
    pub fn clean(&self, text: &str) -> String {
        let original_len = text.chars().count();

        let text = self.page_number.replace_all(text, "");
        let text = self.remove_headers_footers(&text);
        let text = self.image.replace_all(&text, "");
        let text = self.fix_broken_paragraphs(&text);
        let text = self.optimize_structure(&text);
        let text = self.excess_newlines.replace_all(&text, "\n\n");
        let cleaned = text.trim().to_string();

        let cleaned_len = cleaned.chars().count();
        info!(
            "Cleaning finished: {original_len} -> {cleaned_len} chars (removed {})",
            original_len.saturating_sub(cleaned_len)
        );
        cleaned
    }

    fn remove_headers_footers(&self, text: &str) -> String {
        let mut text = text.to_string();
        for pattern in &self.remove_patterns {
            text = pattern.replace_all(&text, "").into_owned();
        }
        text
    }

    fn fix_broken_paragraphs(&self, text: &str) -> String {
        // Matches consume the next line's first char, so a second pass
        // catches breaks adjacent to the ones joined in the first.
        let once = self.broken_paragraph.replace_all(text, "${1}${2}");
        self.broken_paragraph
            .replace_all(&once, "${1}${2}")
            .into_owned()
    }

    fn optimize_structure(&self, text: &str) -> String {
        debug!("Promoting pseudo-headings to markdown headings");
        let text = self.bold_header.replace_all(text, "## ${1}");
        let text = self.numbered_header.replace_all(&text, "## ${1} ${3}");
        let text = self.broken_list.replace_all(&text, "${1}. ");
        self.decorative.replace_all(&text, "").into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> MarkdownCleaner {
        MarkdownCleaner::new::<&str>(&[]).unwrap()
    }

    #[test]
    fn test_removes_page_numbers() {
        let out = cleaner().clean("first paragraph\n 42 \nsecond paragraph");
        assert!(!out.contains("42"));
        assert!(out.contains("first paragraph"));
        assert!(out.contains("second paragraph"));
    }

    #[test]
    fn test_removes_images() {
        let out = cleaner().clean("before ![figure 1](img/fig1.png) after");
        assert_eq!(out, "before  after");
    }

    #[test]
    fn test_joins_broken_cjk_paragraphs() {
        let out = cleaner().clean("这是一段被\n打断的文字");
        assert_eq!(out, "这是一段被打断的文字");
    }

    #[test]
    fn test_keeps_sentence_end_breaks() {
        let out = cleaner().clean("第一句结束。\n新段落开始");
        assert_eq!(out, "第一句结束。\n新段落开始");
    }

    #[test]
    fn test_promotes_bold_and_numbered_headers() {
        let out = cleaner().clean("**诊断要点**\n1.1 病史采集\nbody");
        assert!(out.contains("## 诊断要点"));
        assert!(out.contains("## 1.1 病史采集"));
    }

    #[test]
    fn test_repairs_broken_lists() {
        let out = cleaner().clean("1 . first item");
        assert_eq!(out, "1. first item");
    }

    #[test]
    fn test_drops_decorative_lines_and_collapses_newlines() {
        let out = cleaner().clean("top\n-----\n\n\n\n\nbottom");
        assert_eq!(out, "top\n\nbottom");
    }

    #[test]
    fn test_keyword_lines_removed_case_insensitive() {
        let c = MarkdownCleaner::new(&["page", "第.章"]).unwrap();
        let out = c.clean("PAGE 12 header\n第三章 发热\nclinical content");
        assert_eq!(out, "clinical content");
    }

    #[test]
    fn test_invalid_keyword_regex_rejected() {
        assert!(MarkdownCleaner::new(&["("]).is_err());
    }
}
