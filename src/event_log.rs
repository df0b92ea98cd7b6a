use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};

use crate::constants::{LOG_DELIMITER, LOG_TIMESTAMP_FORMAT};
use crate::error::{GameError, GameResult};
use crate::maze::MapSpec;
use crate::types::{Coord, EntityId};

const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Post-tick state of one entity that changed during the tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogRecord {
    Player {
        at: Coord,
        score: u32,
        lives: u32,
        /// The field the player left this tick still had its point.
        left_point: bool,
    },
    Ghost {
        index: usize,
        at: Coord,
        eatable: bool,
    },
}

impl LogRecord {
    pub fn entity(&self) -> EntityId {
        match self {
            Self::Player { .. } => EntityId::Player,
            Self::Ghost { index, .. } => EntityId::Ghost(*index),
        }
    }

    pub fn at(&self) -> Coord {
        match self {
            Self::Player { at, .. } | Self::Ghost { at, .. } => *at,
        }
    }

    pub fn parse(line: &str, line_no: usize) -> GameResult<Self> {
        let malformed = |reason: String| GameError::MalformedLogRecord {
            line: line_no,
            reason,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(tag) = parts.first() else {
            return Err(malformed("empty record".to_string()));
        };
        let at = parts
            .get(1)
            .and_then(|raw| Coord::parse(raw))
            .ok_or_else(|| malformed(format!("bad coordinates in `{line}`")))?;

        if *tag == "P" {
            if parts.len() != 5 {
                return Err(malformed(format!("player record needs 5 fields: `{line}`")));
            }
            let score = parts[2]
                .parse()
                .map_err(|_| malformed(format!("bad score `{}`", parts[2])))?;
            let lives = parts[3]
                .parse()
                .map_err(|_| malformed(format!("bad lives `{}`", parts[3])))?;
            return Ok(Self::Player {
                at,
                score,
                lives,
                left_point: parts[4].contains('p'),
            });
        }

        if let Some(index) = tag.strip_prefix('G') {
            let index = index
                .parse()
                .map_err(|_| malformed(format!("bad ghost tag `{tag}`")))?;
            if parts.len() != 3 {
                return Err(malformed(format!("ghost record needs 3 fields: `{line}`")));
            }
            let eatable = parts[2]
                .parse()
                .map_err(|_| malformed(format!("bad eatable flag `{}`", parts[2])))?;
            return Ok(Self::Ghost { index, at, eatable });
        }

        Err(malformed(format!("unknown record tag `{tag}`")))
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player {
                at,
                score,
                lives,
                left_point,
            } => write!(
                f,
                "P {at} {score} {lives} {}",
                if *left_point { "p" } else { "-" }
            ),
            Self::Ghost { index, at, eatable } => write!(f, "G{index} {at} {eatable}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub line: usize,
    pub record: LogRecord,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogTick {
    pub at: NaiveDateTime,
    pub entries: Vec<LogEntry>,
}

/// A recorded session: the map it was played on and its ticks in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventLog {
    pub map: MapSpec,
    pub ticks: Vec<LogTick>,
}

impl EventLog {
    pub fn load(path: &Path) -> GameResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> GameResult<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let Some(delimiter) = lines
            .iter()
            .position(|line| line.trim_end() == LOG_DELIMITER)
        else {
            return Err(GameError::MalformedLogRecord {
                line: lines.len() + 1,
                reason: format!("missing `{LOG_DELIMITER}` delimiter"),
            });
        };
        let map = MapSpec::parse_lines(&lines[..delimiter])?;

        let mut ticks: Vec<LogTick> = Vec::new();
        for (idx, raw) in lines.iter().enumerate().skip(delimiter + 1) {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(stamp) = line.strip_prefix('#') {
                let at = parse_timestamp(stamp.trim()).ok_or_else(|| {
                    GameError::MalformedLogRecord {
                        line: line_no,
                        reason: format!("bad timestamp `{}`", stamp.trim()),
                    }
                })?;
                ticks.push(LogTick {
                    at,
                    entries: Vec::new(),
                });
                continue;
            }
            let record = LogRecord::parse(line, line_no)?;
            let Some(tick) = ticks.last_mut() else {
                return Err(GameError::MalformedLogRecord {
                    line: line_no,
                    reason: "record before the first timestamp".to_string(),
                });
            };
            tick.entries.push(LogEntry {
                line: line_no,
                record,
            });
        }
        Ok(Self { map, ticks })
    }

    /// Delay before each tick when played forward; the first tick has none.
    pub fn forward_delays(&self) -> Vec<Duration> {
        let mut delays = Vec::with_capacity(self.ticks.len());
        let mut previous: Option<NaiveDateTime> = None;
        for tick in &self.ticks {
            delays.push(previous.map(|prev| elapsed(prev, tick.at)).unwrap_or_default());
            previous = Some(tick.at);
        }
        delays
    }

    /// Delay before undoing each tick, last tick first.
    pub fn backward_delays(&self) -> Vec<Duration> {
        let mut delays = Vec::with_capacity(self.ticks.len());
        let mut later: Option<NaiveDateTime> = None;
        for tick in self.ticks.iter().rev() {
            delays.push(later.map(|next| elapsed(tick.at, next)).unwrap_or_default());
            later = Some(tick.at);
        }
        delays
    }
}

fn elapsed(from: NaiveDateTime, to: NaiveDateTime) -> Duration {
    (to - from).to_std().unwrap_or_default()
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(LOG_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_PARSE_FORMAT).ok()
}

/// Append-only writer for the session log.
///
/// The header stays buffered until the first tick or flush; every appended
/// tick is flushed before `append` returns.
pub struct LogWriter {
    out: BufWriter<File>,
    last_stamp: Option<NaiveDateTime>,
}

impl LogWriter {
    pub fn create(path: &Path, map: &MapSpec) -> GameResult<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        for line in map.header_lines() {
            writeln!(out, "{line}")?;
        }
        writeln!(out, "{LOG_DELIMITER}")?;
        Ok(Self {
            out,
            last_stamp: None,
        })
    }

    pub fn append(&mut self, records: &[LogRecord]) -> GameResult<()> {
        self.append_at(Local::now().naive_local(), records)
    }

    /// Writes one tick. Stamps never go backwards, even if the wall clock does.
    pub fn append_at(&mut self, at: NaiveDateTime, records: &[LogRecord]) -> GameResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let at = match self.last_stamp {
            Some(last) if at < last => last,
            _ => at,
        };
        self.last_stamp = Some(at);
        writeln!(self.out, "# {}", format_timestamp(at))?;
        for record in records {
            writeln!(self.out, "{record}")?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) -> GameResult<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn close(mut self) -> GameResult<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Timelike};

    use super::*;

    fn stamp(ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|day| day.and_hms_nano_opt(12, 0, 0, ms * 1_000_000))
            .expect("valid timestamp")
    }

    fn map() -> MapSpec {
        MapSpec::parse("1 3\nS.G\n").expect("map parses")
    }

    #[test]
    fn records_use_the_textual_format() {
        let player = LogRecord::Player {
            at: Coord::new(1, 2),
            score: 100,
            lives: 2,
            left_point: true,
        };
        let ghost = LogRecord::Ghost {
            index: 3,
            at: Coord::new(4, 5),
            eatable: false,
        };
        assert_eq!(player.to_string(), "P 1/2 100 2 p");
        assert_eq!(ghost.to_string(), "G3 4/5 false");
        assert_eq!(LogRecord::parse("P 1/2 100 2 p", 1).expect("parses"), player);
        assert_eq!(LogRecord::parse("G3 4/5 false", 1).expect("parses"), ghost);
        assert!(matches!(
            LogRecord::parse("P 1/2 0 3 -", 1),
            Ok(LogRecord::Player { left_point: false, .. })
        ));
    }

    #[test]
    fn malformed_records_name_their_line() {
        for bad in ["X 1/1", "P 1-1 0 3 p", "P 1/1 zero 3 p", "Gx 1/1 true", "G0 1/1 maybe", "P 1/1 0"] {
            match LogRecord::parse(bad, 42) {
                Err(GameError::MalformedLogRecord { line, .. }) => assert_eq!(line, 42),
                other => panic!("expected malformed record for `{bad}`, got {other:?}"),
            }
        }
    }

    #[test]
    fn timestamps_keep_nanoseconds() {
        let at = stamp(250)
            .with_nanosecond(250_000_123)
            .expect("valid nanos");
        let text = format_timestamp(at);
        assert_eq!(text, "2024-05-01T12:00:00.250000123");
        assert_eq!(parse_timestamp(&text), Some(at));
    }

    #[test]
    fn writer_output_parses_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("log.save");
        let mut writer = LogWriter::create(&path, &map()).expect("writer opens");
        writer
            .append_at(
                stamp(0),
                &[LogRecord::Player {
                    at: Coord::new(1, 2),
                    score: 0,
                    lives: 3,
                    left_point: true,
                }],
            )
            .expect("append");
        writer.append_at(stamp(100), &[]).expect("empty ticks are skipped");
        writer
            .append_at(
                stamp(500),
                &[LogRecord::Ghost {
                    index: 0,
                    at: Coord::new(1, 2),
                    eatable: false,
                }],
            )
            .expect("append");
        writer.close().expect("close");

        let text = fs::read_to_string(&path).expect("log readable");
        assert!(text.starts_with("1 3\nS.G\n--- LOG\n# 2024-05-01T12:00:00.000000000\nP 1/2 0 3 p\n"));

        let log = EventLog::load(&path).expect("log parses");
        assert_eq!(log.map, map());
        assert_eq!(log.ticks.len(), 2);
        assert_eq!(log.ticks[1].entries[0].line, 7);
        assert_eq!(
            log.forward_delays(),
            vec![Duration::ZERO, Duration::from_millis(500)]
        );
        assert_eq!(
            log.backward_delays(),
            vec![Duration::ZERO, Duration::from_millis(500)]
        );
    }

    #[test]
    fn appended_ticks_reach_disk_before_close() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("log.save");
        let mut writer = LogWriter::create(&path, &map()).expect("writer opens");
        let record = LogRecord::Ghost {
            index: 0,
            at: Coord::new(1, 2),
            eatable: true,
        };
        writer.append_at(stamp(0), &[record]).expect("append");

        let text = fs::read_to_string(&path).expect("log readable");
        assert!(text.ends_with("--- LOG\n# 2024-05-01T12:00:00.000000000\nG0 1/2 true\n"));
        drop(writer);
    }

    #[test]
    fn stamps_never_run_backwards() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("log.save");
        let mut writer = LogWriter::create(&path, &map()).expect("writer opens");
        let record = LogRecord::Ghost {
            index: 0,
            at: Coord::new(1, 2),
            eatable: true,
        };
        writer.append_at(stamp(300), &[record.clone()]).expect("append");
        writer.append_at(stamp(100), &[record]).expect("append");
        writer.close().expect("close");

        let log = EventLog::load(&path).expect("log parses");
        assert_eq!(log.ticks[0].at, log.ticks[1].at);
    }

    #[test]
    fn delays_follow_consecutive_stamps() {
        let text = "1 3\nS.G\n--- LOG\n\
                    # 2024-05-01T12:00:00.000000000\nG0 1/2 false\n\
                    # 2024-05-01T12:00:00.200000000\nG0 1/1 false\n\
                    # 2024-05-01T12:00:00.900000000\nG0 1/2 false\n";
        let log = EventLog::parse(text).expect("log parses");
        assert_eq!(
            log.forward_delays(),
            vec![Duration::ZERO, Duration::from_millis(200), Duration::from_millis(700)]
        );
        assert_eq!(
            log.backward_delays(),
            vec![Duration::ZERO, Duration::from_millis(700), Duration::from_millis(200)]
        );
    }

    #[test]
    fn log_structure_errors_are_reported() {
        assert!(matches!(
            EventLog::parse("1 3\nS.G\n"),
            Err(GameError::MalformedLogRecord { line: 3, .. })
        ));
        assert!(matches!(
            EventLog::parse("1 3\nS.G\n--- LOG\nG0 1/2 false\n"),
            Err(GameError::MalformedLogRecord { line: 4, .. })
        ));
        assert!(matches!(
            EventLog::parse("1 3\nS.G\n--- LOG\n# yesterday\n"),
            Err(GameError::MalformedLogRecord { line: 4, .. })
        ));
        assert!(matches!(
            EventLog::parse("2 3\nS.G\n--- LOG\n"),
            Err(GameError::MapFormat(_))
        ));
    }
}
