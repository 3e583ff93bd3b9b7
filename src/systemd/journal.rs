// Journalctl tail for failed-unit diagnostics

use crate::error::{Result, SvcguardError};
use crate::systemd::ServiceName;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct JournalReader {
    program: String,
}

impl Default for JournalReader {
    fn default() -> Self {
        Self {
            program: "journalctl".to_string(),
        }
    }
}

impl JournalReader {
    /// Use a different journalctl binary (tests, non-standard installs)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Last `lines` journal entries for a unit
    pub async fn recent(&self, unit: &ServiceName, lines: usize) -> Result<Vec<LogLine>> {
        if lines == 0 {
            return Ok(Vec::new());
        }

        let output = Command::new(&self.program)
            .arg("-u")
            .arg(unit.as_str())
            .arg("--output=short-precise")
            .arg("--no-pager")
            .arg("-n")
            .arg(lines.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(SvcguardError::Io)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter(|line| !line.starts_with("-- "))
            .map(parse_log_line)
            .collect())
    }
}

pub(crate) fn parse_log_line(line: &str) -> LogLine {
    // short-precise format: "Dec 25 10:30:15.123456 server nginx[1234]: Server started"
    let parts: Vec<&str> = line.splitn(5, ' ').collect();
    if parts.len() >= 5 {
        LogLine {
            timestamp: format!("{} {} {}", parts[0], parts[1], parts[2]),
            message: parts[4].to_string(),
        }
    } else {
        LogLine {
            timestamp: String::new(),
            message: line.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_precise_line() {
        let line = parse_log_line("Dec 25 10:30:15.123456 server nginx[1234]: Server started");
        assert_eq!(line.timestamp, "Dec 25 10:30:15.123456");
        assert_eq!(line.message, "nginx[1234]: Server started");
    }

    #[test]
    fn test_parse_short_line_keeps_raw_text() {
        let line = parse_log_line("garbage");
        assert!(line.timestamp.is_empty());
        assert_eq!(line.message, "garbage");
    }

    #[tokio::test]
    async fn test_missing_journalctl_is_an_error() {
        let reader = JournalReader::with_program("/nonexistent/journalctl");
        let unit = ServiceName::parse("cron").unwrap();
        assert!(reader.recent(&unit, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_lines_skips_spawn() {
        let reader = JournalReader::with_program("/nonexistent/journalctl");
        let unit = ServiceName::parse("cron").unwrap();
        assert!(reader.recent(&unit, 0).await.unwrap().is_empty());
    }
}
