use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 8 * 1024;

/// Read a stream to EOF, keeping only the last `limit` bytes.
///
/// Read errors end the capture early; whatever was collected is returned.
pub(crate) async fn capture_tail<R>(mut reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                kept.extend_from_slice(&chunk[..n]);
                if kept.len() > limit {
                    let excess = kept.len() - limit;
                    kept.drain(..excess);
                }
            }
            Err(e) => {
                tracing::debug!("Stopped capturing hook output: {e}");
                break;
            }
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}

/// Return the last non-empty line from the given text, or `""` if none.
pub fn last_non_empty_line(text: &str) -> &str {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}

/// Truncate a line to `max_chars` characters, appending "..." if truncated.
pub fn truncate_line(line: &str, max_chars: usize) -> String {
    if line.chars().nth(max_chars).is_none() {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// One-line summary of a failed process: stderr tail, then stdout tail.
pub fn failure_summary(stdout: &str, stderr: &str) -> Option<String> {
    [stderr, stdout]
        .into_iter()
        .map(last_non_empty_line)
        .find(|line| !line.is_empty())
        .map(|line| truncate_line(line, 200))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capture_tail_under_limit() {
        let data: &[u8] = b"hello\nworld\n";
        assert_eq!(capture_tail(data, 1024).await, "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_capture_tail_keeps_last_bytes() {
        let data = "a".repeat(100) + "TAIL";
        let captured = capture_tail(data.as_bytes(), 6).await;
        assert_eq!(captured, "aaTAIL");
    }

    #[tokio::test]
    async fn test_capture_tail_zero_limit() {
        let data: &[u8] = b"discarded";
        assert_eq!(capture_tail(data, 0).await, "");
    }

    #[test]
    fn test_last_non_empty_line() {
        assert_eq!(last_non_empty_line("first\nsecond\n\n  \n"), "second");
        assert_eq!(last_non_empty_line(""), "");
    }

    #[test]
    fn test_truncate_line_multibyte() {
        let mut line = "a".repeat(196);
        for _ in 0..10 {
            line.push('🔥');
        }
        let summary = truncate_line(&line, 200);
        assert_eq!(summary.chars().count(), 200);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_failure_summary_prefers_stderr() {
        assert_eq!(
            failure_summary("out line\n", "bad args\n"),
            Some("bad args".to_string())
        );
        assert_eq!(
            failure_summary("only stdout\n", ""),
            Some("only stdout".to_string())
        );
        assert_eq!(failure_summary("", "\n"), None);
    }
}
