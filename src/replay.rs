//! Replays recorded key transitions through a tracker
//!
//! Input is line oriented: each line is either a JSON [`KeyTransition`] or
//! the word `read`, which emits a snapshot of the measure values. Release
//! actions that fire are written out as they happen.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::events::KeyTransition;
use crate::tracker::Tracker;

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayLine {
    Transition(KeyTransition),
    Read,
}

/// Parse an input line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<ReplayLine>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.eq_ignore_ascii_case("read") {
        return Ok(Some(ReplayLine::Read));
    }
    let transition = serde_json::from_str(line).context("invalid key transition")?;
    Ok(Some(ReplayLine::Transition(transition)))
}

/// Measure values at the time of a `read`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub value: f64,
    pub text: String,
}

#[derive(Serialize)]
struct ActionRecord<'a> {
    action: &'a str,
}

/// Counters for a finished replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub transitions: usize,
    pub reads: usize,
    pub actions: usize,
    pub skipped: usize,
}

async fn write_json<W, T>(output: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    output.write_all(&line).await.context("failed to write output")?;
    Ok(())
}

/// Feed every line of `input` to `tracker`, writing results to `output`
pub async fn run<R, W>(tracker: &mut Tracker, input: R, output: &mut W) -> Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = ReplayStats::default();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        let parsed = match parse_line(&line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(e) => {
                warn!(%line, error = %e, "skipping malformed line");
                stats.skipped += 1;
                continue;
            }
        };

        match parsed {
            ReplayLine::Transition(transition) => {
                debug!(%transition, "replaying");
                stats.transitions += 1;
                if let Some(action) = tracker.apply(transition) {
                    stats.actions += 1;
                    write_json(output, &ActionRecord { action: &action }).await?;
                }
            }
            ReplayLine::Read => {
                stats.reads += 1;
                let snapshot = Snapshot {
                    value: tracker.numeric_value(),
                    text: tracker.display_string(),
                };
                write_json(output, &snapshot).await?;
            }
        }
    }

    output.flush().await.context("failed to flush output")?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::io::BufReader;

    use crate::config::{Config, DisplayMode};
    use crate::keys::{KeyEvent, NoKeyNames};

    fn tracker(mode: DisplayMode, action: &str) -> Tracker {
        let config = Config {
            display_mode: mode,
            clear_on_read: true,
            on_release_action: action.to_string(),
        };
        Tracker::new(config, Arc::new(NoKeyNames))
    }

    fn output_lines(output: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(output)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("READ").unwrap(), Some(ReplayLine::Read));
        assert_eq!(
            parse_line(r#"{"type":"key_down","vk_code":65}"#).unwrap(),
            Some(ReplayLine::Transition(KeyTransition::KeyDown(KeyEvent::from_vk(65))))
        );
        assert!(parse_line("{not json").is_err());
    }

    #[tokio::test]
    async fn test_replay_combination() {
        let input = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"key_down\",\"vk_code\":65}\n")
            .read(b"{\"type\":\"key_down\",\"vk_code\":66}\nread\n")
            .read(b"{\"type\":\"key_up\",\"vk_code\":65}\n")
            .read(b"{\"type\":\"key_up\",\"vk_code\":66}\n")
            .build();

        let mut tracker = tracker(DisplayMode::Combination, "!Refresh");
        let mut output = Vec::new();
        let stats = run(&mut tracker, BufReader::new(input), &mut output)
            .await
            .unwrap();

        assert_eq!(
            stats,
            ReplayStats {
                transitions: 4,
                reads: 1,
                actions: 1,
                skipped: 0,
            }
        );

        let lines = output_lines(&output);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["text"], "A + B");
        assert_eq!(lines[0]["value"], 66.0);
        assert_eq!(lines[1]["action"], "!Refresh");
    }

    #[tokio::test]
    async fn test_replay_skips_malformed_lines() {
        let input = tokio_test::io::Builder::new()
            .read(b"garbage\n\n{\"type\":\"key_down\",\"vk_code\":10}\nread\nread\n")
            .build();

        let mut tracker = tracker(DisplayMode::Hex, "");
        let mut output = Vec::new();
        let stats = run(&mut tracker, BufReader::new(input), &mut output)
            .await
            .unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.reads, 2);

        let lines = output_lines(&output);
        assert_eq!(lines[0]["text"], "0x0A");
        assert_eq!(lines[1]["text"], "");
    }
}
