//! Sleep history view.

use chrono::Local;

use circadia_core::{HistorySummary, SleepSession, format_hours_minutes};
use circadia_store::Store;

use crate::error::ClientResult;

pub fn show(store: &Store, days: u32) -> ClientResult<()> {
    let sessions = store.history(days, Local::now())?;
    println!("{}", render_history(&sessions, days));
    Ok(())
}

pub fn render_history(sessions: &[SleepSession], days: u32) -> String {
    let Some(summary) = HistorySummary::from_sessions(sessions) else {
        return format!("No sleep sessions in the last {} days.", days);
    };

    let mut lines = vec![format!("Sleep history, last {} days", days), String::new()];
    lines.extend(sessions.iter().map(|s| {
        format!(
            "  {}  {} - {}  {:>7}  {}",
            s.start.format("%a %d %b"),
            s.start.format("%H:%M"),
            s.end.format("%H:%M"),
            format_hours_minutes(s.duration()),
            snoozes(s.snooze_count),
        )
    }));
    lines.push(String::new());
    lines.push(format!(
        "Average: {} over {} nights, {:.1} snoozes per night",
        format_hours_minutes(summary.average_duration),
        summary.sessions,
        summary.average_snoozes,
    ));
    lines.join("\n")
}

fn snoozes(count: u32) -> String {
    match count {
        0 => "no snooze".to_string(),
        1 => "1 snooze".to_string(),
        n => format!("{} snoozes", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};

    fn at(day: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 6, day, h, m, 0).unwrap()
    }

    fn session(start: DateTime<Local>, end: DateTime<Local>, snooze_count: u32) -> SleepSession {
        SleepSession {
            id: 0,
            start,
            end,
            snooze_count,
        }
    }

    #[test]
    fn renders_sessions_and_averages() {
        let sessions = vec![
            session(at(10, 23, 10), at(11, 6, 55), 2),
            session(at(11, 22, 30), at(12, 6, 30), 0),
            session(at(12, 23, 45), at(13, 6, 0), 1),
        ];

        insta::assert_snapshot!(render_history(&sessions, 7), @r"
        Sleep history, last 7 days

          Wed 10 Jun  23:10 - 06:55   7h 45m  2 snoozes
          Thu 11 Jun  22:30 - 06:30   8h 00m  no snooze
          Fri 12 Jun  23:45 - 06:00   6h 15m  1 snooze

        Average: 7h 20m over 3 nights, 1.0 snoozes per night
        ");
    }

    #[test]
    fn empty_history() {
        assert_eq!(
            render_history(&[], 30),
            "No sleep sessions in the last 30 days."
        );
    }

    #[test]
    fn reads_from_the_store() {
        let store = Store::open_in_memory().unwrap();
        let end = Local::now();
        let start = end - chrono::Duration::hours(7);
        store.add_sleep_session(start, end, 1, end).unwrap();

        let sessions = store.history(7, end).unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(render_history(&sessions, 7).contains("7h 00m  1 snooze"));
    }
}
