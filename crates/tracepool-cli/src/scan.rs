use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracepool_core::{hash_bytes, PoolStats, StringPool};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub file: String,
    pub lines: u64,
    pub tokens: u64,
    /// Share of tokens served without storing anything new.
    pub dedup_ratio: f64,
    pub elapsed_ms: u128,
    pub pool: PoolStats,
}

/// ftrace punctuation that separates tokens in addition to whitespace.
const SEPARATORS: &[u8] = b"[]:(),=";

#[inline]
fn is_separator(b: &u8) -> bool {
    b.is_ascii_whitespace() || SEPARATORS.contains(b)
}

/// Split one trace line into the tokens a parser would intern. Whitespace
/// and ftrace punctuation both separate; empty pieces are dropped.
pub fn tokenize(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    line.split(is_separator).filter(|token| !token.is_empty())
}

/// Intern every token of the file at `path` into `pool`.
pub fn scan_file(pool: &mut StringPool, path: &Path) -> Result<ScanReport> {
    let file = File::open(path).with_context(|| format!("opening trace file {:?}", path))?;
    let mut reader = BufReader::new(file);
    let started = Instant::now();
    let mut line = Vec::new();
    let mut lines = 0u64;
    let mut tokens = 0u64;

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .with_context(|| format!("reading {:?} at line {}", path, lines + 1))?;
        if read == 0 {
            break;
        }
        lines += 1;
        for token in tokenize(&line) {
            pool.intern(token, hash_bytes(token))
                .with_context(|| format!("interning tokens of line {}", lines))?;
            tokens += 1;
        }
        if lines % 1_000_000 == 0 {
            debug!(lines, tokens, distinct = pool.len(), "scan progress");
        }
    }

    let stats = pool.stats();
    let dedup_ratio = if tokens == 0 {
        0.0
    } else {
        stats.dedup_hits as f64 / tokens as f64
    };
    info!(lines, tokens, distinct = stats.distinct, "scan finished");
    Ok(ScanReport {
        file: path.display().to_string(),
        lines,
        tokens,
        dedup_ratio,
        elapsed_ms: started.elapsed().as_millis(),
        pool: stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tracepool_core::PoolConfig;

    fn words(line: &str) -> Vec<&str> {
        tokenize(line.as_bytes())
            .map(|t| std::str::from_utf8(t).unwrap())
            .collect()
    }

    #[test]
    fn tokenizes_ftrace_line() {
        let line = "  kworker/0:1-123   [000] d..2  1234.567890: sched_switch: prev_comm=foo prev_pid=12\n";
        assert_eq!(
            words(line),
            vec![
                "kworker/0",
                "1-123",
                "000",
                "d..2",
                "1234.567890",
                "sched_switch",
                "prev_comm",
                "foo",
                "prev_pid",
                "12",
            ]
        );
    }

    #[test]
    fn empty_and_separator_only_words_are_dropped() {
        assert!(words("  \t\n").is_empty());
        assert_eq!(words("[] : x= =y"), vec!["x", "y"]);
    }

    #[test]
    fn punctuation_inside_a_word_splits_it() {
        assert_eq!(words("x=y=z"), vec!["x", "y", "z"]);
        assert_eq!(words("a:b"), vec!["a", "b"]);
        assert_eq!(words("irq(eth0,rx)"), vec!["irq", "eth0", "rx"]);
        assert_eq!(words("1234.567890"), vec!["1234.567890"]);
    }

    #[test]
    fn scan_counts_tokens_and_dedups() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bash-42 [001] sched_wakeup: comm=bash").unwrap();
        writeln!(file, "bash-42 [001] sched_wakeup: comm=sshd").unwrap();
        let mut pool = StringPool::new(PoolConfig::default()).unwrap();

        let report = scan_file(&mut pool, file.path()).unwrap();
        assert_eq!(report.lines, 2);
        assert_eq!(report.tokens, 10);
        // the first four tokens of the second line repeat the first line
        assert_eq!(report.pool.distinct, 6);
        assert_eq!(report.pool.dedup_hits, 4);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut pool = StringPool::default();
        let err = scan_file(&mut pool, Path::new("/nonexistent/trace.dat")).unwrap_err();
        assert!(err.to_string().contains("opening trace file"));
    }
}
