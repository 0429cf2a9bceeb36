use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};

use crate::{collector::CollectError, table::Row};

/// One process as seen in a single snapshot.
///
/// Derived fields (`elapsed`, `started`, the integer ids) are parsed once when the
/// record is built, the rest is kept as `ps` printed it.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessRecord {
    pub pid: i64,
    /// equal to `pid` for processes the OS reports as their own parent
    pub ppid: i64,
    pub pgid: Option<i64>,
    pub user: String,
    pub elapsed: Option<Duration>,
    pub rss: String,
    pub started: Option<NaiveDateTime>,
    pub command: String,
}

impl ProcessRecord {
    pub fn from_row(row: &Row) -> Result<Self, CollectError> {
        let pid = required_id(row, "pid")?;
        let ppid = required_id(row, "ppid")?;
        let text = |name: &str| row.get(name).cloned().unwrap_or_default();

        Ok(Self {
            pid,
            ppid,
            pgid: row.get("pgid").and_then(|s| s.parse().ok()),
            user: text("user"),
            elapsed: row.get("etime").and_then(|s| parse_elapsed(s)),
            rss: text("rss"),
            started: row.get("lstart").and_then(|s| parse_start(s)),
            command: text("args"),
        })
    }

    pub fn is_self_parented(&self) -> bool {
        self.pid == self.ppid
    }

    ///absolute start if known, otherwise `now - elapsed`, otherwise the epoch
    pub fn start_time(&self, now: NaiveDateTime) -> NaiveDateTime {
        if let Some(started) = self.started {
            return started;
        }
        self.elapsed
            .and_then(|e| TimeDelta::from_std(e).ok())
            .and_then(|e| now.checked_sub_signed(e))
            .unwrap_or_default()
    }
}

fn required_id(row: &Row, name: &str) -> Result<i64, CollectError> {
    let value = row
        .get(name)
        .ok_or_else(|| CollectError::Shape(format!("row has no {name} column")))?;
    value
        .parse()
        .map_err(|_| CollectError::Shape(format!("{name} is not an integer: {value:?}")))
}

/// Parses `ps` elapsed time: `[[DD-]HH:]MM:SS` or plain seconds.
pub fn parse_elapsed(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (days, clock) = match text.split_once('-') {
        Some((d, rest)) => (Some(number(d)?), rest),
        None => (None, text),
    };

    let parts = clock
        .split(':')
        .map(number)
        .collect::<Option<Vec<u64>>>()?;
    let (hours, minutes, seconds) = match parts[..] {
        [s] => (0, 0, s),
        [m, s] => (0, m, s),
        [h, m, s] => (h, m, s),
        _ => return None,
    };
    if parts.len() > 1 && seconds >= 60 {
        return None;
    }
    if parts.len() > 2 && minutes >= 60 {
        return None;
    }
    if days.is_some() && hours >= 24 {
        return None;
    }

    let total = days
        .unwrap_or(0)
        .checked_mul(86_400)?
        .checked_add(hours.checked_mul(3_600)?)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    Some(Duration::from_secs(total))
}

/// Replaces control characters with `?`, the way `ps` prints them, so one
/// process always stays on one row.
pub fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { '?' } else { c })
        .collect()
}

fn number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parses `ps -o lstart` in the C locale, e.g. `Sat Oct 18 20:58:01 2026`.
pub fn parse_start(text: &str) -> Option<NaiveDateTime> {
    //days below 10 are space padded
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, "%a %b %d %H:%M:%S %Y").ok()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rstest::rstest;

    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[rstest]
    #[case("42", 42)]
    #[case("07", 7)]
    #[case("05:30", 5 * 60 + 30)]
    #[case("01:02:03", 3600 + 2 * 60 + 3)]
    #[case("3-04:05:06", 3 * 86_400 + 4 * 3600 + 5 * 60 + 6)]
    #[case("  12:00 ", 12 * 60)]
    fn parses_elapsed(#[case] text: &str, #[case] secs: u64) {
        assert_eq!(parse_elapsed(text), Some(Duration::from_secs(secs)));
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("1:2:3:4")]
    #[case("5:")]
    #[case("-10")]
    #[case("1-25:00:00")]
    #[case("10:75")]
    #[case("+3")]
    #[case("999999999999999999-00:00:00")]
    #[case("9999999999999999:00:00")]
    fn rejects_bad_elapsed(#[case] text: &str) {
        assert_eq!(parse_elapsed(text), None);
    }

    #[test]
    fn control_characters_become_question_marks() {
        assert_eq!(printable("sh -c echo\nrm\x1b[31m"), "sh -c echo?rm?[31m");
        assert_eq!(printable("vim  ünïcode.txt"), "vim  ünïcode.txt");
    }

    #[test]
    fn parses_lstart_with_padded_day() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 8)
            .and_then(|d| d.and_hms_opt(9, 5, 1))
            .unwrap();
        assert_eq!(parse_start("Thu Oct  8 09:05:01 2026"), Some(expected));
        assert_eq!(parse_start("yesterday"), None);
    }

    #[test]
    fn start_time_falls_back_to_elapsed_then_epoch() {
        let now = NaiveDate::from_ymd_opt(2026, 10, 18)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        let mut rec = ProcessRecord::from_row(&row(&[
            ("pid", "10"),
            ("ppid", "1"),
            ("etime", "01:00"),
        ]))
        .unwrap();
        assert_eq!(
            rec.start_time(now),
            now - TimeDelta::try_seconds(60).unwrap()
        );

        rec.elapsed = None;
        assert_eq!(rec.start_time(now), NaiveDateTime::default());
    }

    #[test]
    fn bad_optional_fields_degrade() {
        let rec = ProcessRecord::from_row(&row(&[
            ("pid", "10"),
            ("ppid", "10"),
            ("pgid", "-"),
            ("etime", "??"),
            ("lstart", "garbage"),
            ("args", "/usr/bin/env  a   b"),
        ]))
        .unwrap();
        assert!(rec.is_self_parented());
        assert_eq!(rec.pgid, None);
        assert_eq!(rec.elapsed, None);
        assert_eq!(rec.started, None);
        assert_eq!(rec.command, "/usr/bin/env  a   b");
    }

    #[test]
    fn missing_pid_is_a_shape_error() {
        let err = ProcessRecord::from_row(&row(&[("ppid", "1")])).unwrap_err();
        assert!(matches!(err, CollectError::Shape(_)));
        let err = ProcessRecord::from_row(&row(&[("pid", "x"), ("ppid", "1")])).unwrap_err();
        assert!(matches!(err, CollectError::Shape(_)));
    }
}
