//! Output handling for command execution.
//!
//! Keeps subprocess output short enough to embed in error messages.

const MAX_LINE_CHARS: usize = 200;
const MAX_TOTAL_CHARS: usize = 1000;

/// Trim command output for inclusion in an error message.
///
/// Keeps at most `max_lines` non-empty lines, each cut to 200 characters,
/// and stops once the summary reaches 1000 characters. Truncation is marked
/// so the reader knows to look at the full output in the journal.
pub fn sanitize_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = String::new();
    let mut total = 0;

    for line in lines.iter().take(max_lines) {
        let truncated: String = if line.chars().count() > MAX_LINE_CHARS {
            let head: String = line.chars().take(MAX_LINE_CHARS).collect();
            format!("{}...", head)
        } else {
            line.to_string()
        };

        let len = truncated.chars().count();
        if total + len > MAX_TOTAL_CHARS {
            result.push_str("...[truncated]");
            return result;
        }

        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&truncated);
        total += len;
    }

    if lines.len() > max_lines {
        result.push_str("\n...[additional output truncated]");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_output_short() {
        let output = "Failed to start lumo-agent.service\nUnit not found.";
        assert_eq!(sanitize_output(output, 10), output);
    }

    #[test]
    fn test_sanitize_output_skips_blank_lines() {
        let output = "\n\nJob failed.\n\n";
        assert_eq!(sanitize_output(output, 10), "Job failed.");
    }

    #[test]
    fn test_sanitize_output_truncates_lines() {
        let output = "Line 1\nLine 2\nLine 3\nLine 4\nLine 5";
        let sanitized = sanitize_output(output, 3);
        assert!(sanitized.contains("Line 3"));
        assert!(!sanitized.contains("Line 4"));
        assert!(sanitized.contains("[additional output truncated]"));
    }

    #[test]
    fn test_sanitize_output_truncates_long_lines() {
        let long_line = "x".repeat(300);
        let sanitized = sanitize_output(&long_line, 10);
        assert!(sanitized.len() < 300);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn test_sanitize_output_multibyte() {
        let long_line = "é".repeat(300);
        let sanitized = sanitize_output(&long_line, 10);
        assert!(sanitized.ends_with("..."));
    }
}
