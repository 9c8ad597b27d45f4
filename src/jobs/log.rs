use std::collections::VecDeque;

/// Number of log lines retained per job
pub const LOG_CAPACITY: usize = 200;

/// Bounded, drop-oldest log buffer
///
/// The ring itself is not synchronized; it lives inside the job state and is
/// guarded by the job lock together with the other mutable fields.
#[derive(Debug, Clone)]
pub struct LogRing {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogRing {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a line; trailing whitespace is trimmed and blank lines are dropped
    pub fn append(&mut self, line: &str) -> bool {
        let line = line.trim_end();
        if line.is_empty() {
            return false;
        }

        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// Last `n` lines, oldest first
    pub fn tail(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut ring = LogRing::new();
        ring.append("first");
        ring.append("second");
        assert_eq!(ring.snapshot(), vec!["first", "second"]);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut ring = LogRing::new();
        for i in 0..250 {
            ring.append(&format!("line {i}"));
        }

        let lines = ring.snapshot();
        assert_eq!(lines.len(), LOG_CAPACITY);
        assert_eq!(lines.first().map(String::as_str), Some("line 50"));
        assert_eq!(lines.last().map(String::as_str), Some("line 249"));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut ring = LogRing::new();
        ring.append("   ");
        ring.append("");
        ring.append("data\r\n");
        assert_eq!(ring.snapshot(), vec!["data"]);
    }

    #[test]
    fn test_tail() {
        let mut ring = LogRing::with_capacity(5);
        for i in 0..5 {
            ring.append(&i.to_string());
        }
        assert_eq!(ring.tail(2), vec!["3", "4"]);
        assert_eq!(ring.tail(10).len(), 5);
    }
}
