//! Code extraction from model responses.
//!
//! Generative oracles wrap code in markdown fences, sometimes with prose
//! around them. [`extract_code_block`] is the one routine that turns such a
//! response into artifact text; artifact resolution and the repair adapter
//! both go through it.

use std::sync::OnceLock;

use regex::Regex;

/// Result of extracting code from a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeExtraction {
    Code(String),
    /// Nothing but whitespace was left after extraction.
    Malformed,
}

impl CodeExtraction {
    pub fn into_code(self) -> Option<String> {
        match self {
            Self::Code(code) => Some(code),
            Self::Malformed => None,
        }
    }
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```([^\n`]*)\r?\n(.*?)```").expect("fenced block pattern is valid")
    })
}

fn inline_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(.*?)```").expect("inline block pattern is valid"))
}

fn is_hdl_tag(info: &str) -> bool {
    matches!(
        info.trim().to_ascii_lowercase().as_str(),
        "verilog" | "systemverilog" | "v" | "sv"
    )
}

/// Extract the code an oracle response carries.
///
/// Preference: first fence tagged as Verilog/SystemVerilog, then the first
/// fence of any kind, then the whole text. A response cut off before its
/// closing fence keeps everything after the opening fence line.
pub fn extract_code_block(text: &str) -> CodeExtraction {
    let blocks: Vec<(&str, &str)> = fenced_block_re()
        .captures_iter(text)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .collect();

    let code = if let Some((_, body)) = blocks.iter().find(|(info, _)| is_hdl_tag(info)) {
        body.to_string()
    } else if let Some((_, body)) = blocks.first() {
        body.to_string()
    } else if let Some(body) = inline_block_re().captures(text).and_then(|c| c.get(1)) {
        strip_inline_tag(body.as_str()).to_string()
    } else {
        strip_unterminated_fence(text).to_string()
    };

    let trimmed = code.trim();
    if trimmed.is_empty() {
        CodeExtraction::Malformed
    } else {
        CodeExtraction::Code(trimmed.to_string())
    }
}

/// Drop a leading `verilog ` style tag from a single-line fence body.
fn strip_inline_tag(body: &str) -> &str {
    let trimmed = body.trim_start();
    match trimmed.split_once(char::is_whitespace) {
        Some((tag, rest)) if is_hdl_tag(tag) => rest,
        _ => body,
    }
}

fn strip_unterminated_fence(text: &str) -> &str {
    let trimmed = text.trim_start();
    if !trimmed.starts_with("```") {
        return text;
    }
    match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_code() {
        let out = extract_code_block("  module m; endmodule \n");
        assert_eq!(out, CodeExtraction::Code("module m; endmodule".to_string()));
    }

    #[test]
    fn test_first_generic_fence() {
        let text = "Sure:\n```\nmodule a; endmodule\n```\nand\n```\nmodule b; endmodule\n```";
        assert_eq!(
            extract_code_block(text).into_code().as_deref(),
            Some("module a; endmodule")
        );
    }

    #[test]
    fn test_verilog_fence_preferred_over_earlier_generic() {
        let text = "```text\nnotes\n```\n```Verilog\n// CWE: CWE-1234\nmodule a; endmodule\n```";
        assert_eq!(
            extract_code_block(text).into_code().as_deref(),
            Some("// CWE: CWE-1234\nmodule a; endmodule")
        );
    }

    #[test]
    fn test_language_tag_not_leaked_into_code() {
        let text = "```systemverilog\nmodule s; endmodule\n```";
        assert_eq!(
            extract_code_block(text).into_code().as_deref(),
            Some("module s; endmodule")
        );
    }

    #[test]
    fn test_inline_fence() {
        assert_eq!(
            extract_code_block("```module i; endmodule```").into_code().as_deref(),
            Some("module i; endmodule")
        );
    }

    #[test]
    fn test_inline_fence_drops_language_tag() {
        assert_eq!(
            extract_code_block("```verilog module m; endmodule```")
                .into_code()
                .as_deref(),
            Some("module m; endmodule")
        );
        assert_eq!(
            extract_code_block("Fixed: ```SV module m; endmodule``` done")
                .into_code()
                .as_deref(),
            Some("module m; endmodule")
        );
    }

    #[test]
    fn test_unterminated_fence() {
        let text = "```verilog\nmodule cut;\n  wire a;\n";
        assert_eq!(
            extract_code_block(text).into_code().as_deref(),
            Some("module cut;\n  wire a;")
        );
    }

    #[test]
    fn test_whitespace_only_is_malformed() {
        assert_eq!(extract_code_block("   \n\t"), CodeExtraction::Malformed);
        assert_eq!(extract_code_block("```verilog\n  \n```"), CodeExtraction::Malformed);
        assert_eq!(extract_code_block(""), CodeExtraction::Malformed);
    }
}
