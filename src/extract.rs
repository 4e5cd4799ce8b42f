//! Fenced code block extraction from model replies.
//!
//! The raw (`with_comments`) form is what the caller shows to users. The
//! normalized form strips comments and line breaks into one logical line and
//! is only ever fed to the policy scans.

use crate::error::EngineError;
use regex::Regex;

const TAGGED_FENCE: &str = "```javascript";

/// Extract the body of the first fenced JavaScript block in a reply.
///
/// A block tagged `javascript` wins; otherwise the first untagged fence is
/// taken. Line breaks and comments are preserved.
pub fn with_comments(reply: &str) -> Result<String, EngineError> {
    let pattern = if reply.contains(TAGGED_FENCE) {
        r"(?s)```javascript\n(.*?)\n```"
    } else {
        r"(?s)```\n(.*?)\n```"
    };
    let re = Regex::new(pattern).unwrap_or_else(|_| Regex::new("$^").unwrap());
    re.captures(reply)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str().to_string())
        .ok_or(EngineError::NoCodeBlockFound)
}

/// Collapse extracted source into a single scannable line.
///
/// Comments are stripped first, then every line-break character is dropped.
pub fn normalized(source: &str) -> String {
    strip_comments(source)
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r'))
        .collect()
}

/// Remove `//` line comments and `/*…*/` block comments in one pass.
///
/// A `//` immediately preceded by `:` is not a comment opener, so URLs such
/// as `http://…` inside string literals survive. An unterminated block
/// comment is left in place.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '/' {
            let next = source[i + 1..].chars().next();
            let after_colon = i > 0 && source.as_bytes()[i - 1] == b':';
            if next == Some('/') && !after_colon {
                // Drop to end of line; the newline itself stays.
                let skip_to = source[i..].find('\n').map(|p| i + p).unwrap_or(source.len());
                while chars.peek().is_some_and(|&(j, _)| j < skip_to) {
                    chars.next();
                }
                continue;
            }
            if next == Some('*') {
                if let Some(p) = source[i + 2..].find("*/") {
                    let skip_to = i + 2 + p + 2;
                    while chars.peek().is_some_and(|&(j, _)| j < skip_to) {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{normalized, with_comments};
    use crate::error::EngineError;

    #[test]
    fn extracts_tagged_block() {
        let reply = "Here you go:\n```javascript\nimport x from 'y';\nconsole.log(1);\n```\nEnjoy!";
        let body = with_comments(reply).unwrap();
        assert_eq!(body, "import x from 'y';\nconsole.log(1);");
    }

    #[test]
    fn tagged_block_wins_over_untagged() {
        let reply = "```\nplain\n```\n```javascript\ntagged\n```";
        assert_eq!(with_comments(reply).unwrap(), "tagged");
    }

    #[test]
    fn falls_back_to_untagged_block() {
        let reply = "```\nconst a = 1;\n```";
        assert_eq!(with_comments(reply).unwrap(), "const a = 1;");
    }

    #[test]
    fn missing_block_is_an_error() {
        let err = with_comments("no code here, sorry").unwrap_err();
        assert!(matches!(err, EngineError::NoCodeBlockFound));
    }

    #[test]
    fn normalized_drops_comments_and_line_breaks() {
        let source = "import x from 'y'; // pull in x\n/* block\ncomment */\nconsole.log(1);\n";
        assert_eq!(normalized(source), "import x from 'y'; console.log(1);");
    }

    #[test]
    fn normalized_preserves_protocol_slashes() {
        let source = "const url = 'https://example.com/a.png'; // texture\n";
        assert_eq!(normalized(source), "const url = 'https://example.com/a.png'; ");
    }

    #[test]
    fn line_comment_swallows_block_opener() {
        // The `/*` sits inside a line comment, so the next line survives.
        let source = "// see /*\ncode();\n*/ tail\n";
        assert_eq!(normalized(source), "code();*/ tail");
    }

    #[test]
    fn unterminated_block_comment_is_kept() {
        let source = "a();\n/* dangling\nb();\n";
        assert_eq!(normalized(source), "a();/* danglingb();");
    }

    #[test]
    fn single_line_body_survives_both_variants() {
        let reply = "```javascript\nimport x from 'y'; console.log(1);\n```";
        let body = with_comments(reply).unwrap();
        assert_eq!(body, "import x from 'y'; console.log(1);");
        assert_eq!(normalized(&body), "import x from 'y'; console.log(1);");
    }
}
