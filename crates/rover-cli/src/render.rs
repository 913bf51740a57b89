//! Plain-text output for the operator loop.

use rover_console::{ConsoleError, HistoryEntry, MissionTimer, Response, ScanEnd, ScanReport};
use rover_console::router::HELP;
use rover_proto::{DetectedObject, Decoded};

/// Objects at or beyond this range are treated as noise.
const MAX_RANGE_CM: u16 = 100;
/// Anything narrower than this is one of the goal posts.
const GOAL_POST_CM: f32 = 6.0;
const CLOSE_CM: u16 = 20;

const PLOT_COLS: usize = 72;
const PLOT_LINES: usize = 22;

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRow {
    pub number: usize,
    pub distance_cm: u16,
    pub center_deg: u8,
    pub size_deg: u8,
    pub size_cm: f32,
    pub start_deg: u8,
    pub end_deg: u8,
}

impl ObjectRow {
    pub fn is_goal_post(&self) -> bool {
        self.size_cm < GOAL_POST_CM
    }

    pub fn is_close(&self) -> bool {
        self.distance_cm < CLOSE_CM
    }
}

/// Objects worth drawing, numbered in order with outliers skipped.
pub fn object_rows(objects: &[DetectedObject]) -> Vec<ObjectRow> {
    objects
        .iter()
        .filter(|o| {
            let c = o.center_angle();
            o.distance_cm > 0 && o.distance_cm < MAX_RANGE_CM && c > 0 && c < 180
        })
        .enumerate()
        .map(|(i, o)| ObjectRow {
            number: i + 1,
            distance_cm: o.distance_cm,
            center_deg: o.center_angle(),
            size_deg: o.size_deg(),
            size_cm: o.size_cm(),
            start_deg: o.start_angle,
            end_deg: o.end_angle,
        })
        .collect()
}

pub fn format_row(row: &ObjectRow) -> String {
    let mut s = format!(
        "#{}, Dist:{} Ang:{} Size:{} Size(cm):{:.1} Start:{} End:{}",
        row.number, row.distance_cm, row.center_deg, row.size_deg, row.size_cm, row.start_deg, row.end_deg
    );
    if row.is_goal_post() {
        s.push_str("  <- goal post");
    } else if row.is_close() {
        s.push_str("  (close)");
    }
    s
}

/// Top-down view: the rover sits at the bottom centre (`$`), 0 degrees to the
/// right, rings every 15 cm out to 90 cm.
pub fn plot(rows: &[ObjectRow]) -> String {
    let mut grid = vec![vec![' '; PLOT_COLS]; PLOT_LINES];
    let project = |distance: f32, deg: f32| -> Option<(usize, usize)> {
        let rad = deg.to_radians();
        let r = distance / 100.0;
        let y = PLOT_LINES as f32 - 1.0 - r * (PLOT_LINES as f32 - 2.0) * rad.sin();
        let x = PLOT_COLS as f32 / 2.0 * (1.0 + r * rad.cos());
        let (y, x) = (y.round(), x.round());
        (y >= 0.0 && x >= 0.0 && (y as usize) < PLOT_LINES && (x as usize) < PLOT_COLS).then_some((y as usize, x as usize))
    };

    for ring in (15..=90).step_by(15) {
        for deg in (0..=180).step_by(15) {
            if let Some((y, x)) = project(ring as f32, deg as f32) {
                grid[y][x] = '.';
            }
        }
    }
    if let Some((y, x)) = project(0.0, 90.0) {
        grid[y][x] = '$';
    }
    for row in rows {
        if let Some((y, x)) = project(f32::from(row.distance_cm), f32::from(row.center_deg)) {
            let label = format!("#{}", row.number);
            for (i, ch) in label.chars().enumerate() {
                if let Some(cell) = grid[y].get_mut(x + i) {
                    *cell = ch;
                }
            }
        }
    }

    grid.into_iter().map(|line| line.into_iter().collect::<String>().trim_end().to_string()).collect::<Vec<_>>().join("\n")
}

pub fn decoded(d: &Decoded) -> String {
    let rows = object_rows(d.objects.as_slice());
    let mut out = plot(&rows);
    out.push('\n');
    if rows.is_empty() {
        out.push_str("no objects in range\n");
    }
    for row in &rows {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    if !d.errors.is_empty() {
        out.push_str(&format!("{} malformed record(s) dropped\n", d.errors.len()));
    }
    out
}

fn scan(report: &ScanReport) -> String {
    let mut out = decoded(&report.decoded);
    match report.end {
        ScanEnd::Terminator => {}
        ScanEnd::IdleTimeout => out.push_str("rover went quiet before the end of the scan\n"),
        ScanEnd::TotalTimeout => out.push_str("scan took too long, showing what arrived\n"),
        ScanEnd::LinkClosed => out.push_str("link closed during the scan\n"),
    }
    if let Some(entry) = report.entry {
        out.push_str(&format!("stored as history entry {}\n", entry));
    }
    out
}

fn history(entries: &[HistoryEntry]) -> String {
    entries.iter().rev().map(|e| format!("{} [{}] {}", e.index, e.stamp(), e.text)).collect::<Vec<_>>().join("\n")
}

pub fn response(resp: &Response, timer: &MissionTimer) -> String {
    let body = match resp {
        Response::Connected => "Rover connected!".to_string(),
        Response::Sent(msg) => format!("sent {:?}", msg),
        Response::Moved { outcome, .. } if outcome.is_success() => "Command complete".to_string(),
        Response::Moved { outcome, .. } => format!("** {} **", outcome.label()),
        Response::Scan(report) => scan(report),
        Response::Replay { entry, decoded: d } => format!("replaying entry {}\n{}", entry, decoded(d)),
        Response::History(entries) => history(entries),
        Response::Flushed(n) => format!("discarded {} byte(s)", n),
        Response::TimerStarted => "mission timer started".to_string(),
        Response::Clear => "\x1b[2J\x1b[H".to_string(),
        Response::Help => HELP.to_string(),
        Response::Quit => "bye".to_string(),
    };
    if timer.is_running() {
        format!("{}\n[{}]", body.trim_end(), timer)
    } else {
        body.trim_end().to_string()
    }
}

pub fn error(e: &ConsoleError) -> String {
    match e {
        ConsoleError::Transport { .. } => format!("Serial error: {}", e),
        ConsoleError::Handshake { .. } => format!("Connected without acknowledgement: {}", e),
        other => format!("error: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(id: u8, start: u8, end: u8, d: u16) -> DetectedObject {
        DetectedObject::new(id, start, end, d).unwrap()
    }

    #[test]
    fn outliers_are_skipped_and_numbering_closes_up() {
        let objects = [obj(1, 10, 20, 150), obj(2, 30, 40, 50), obj(3, 0, 0, 50), obj(4, 100, 104, 0), obj(5, 120, 130, 40)];
        let rows = object_rows(&objects);
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].number, rows[0].center_deg), (1, 35));
        assert_eq!((rows[1].number, rows[1].center_deg), (2, 125));
    }

    #[test]
    fn thin_objects_are_goal_posts() {
        // 5 degrees at 40 cm is about 3.5 cm across
        let rows = object_rows(&[obj(1, 60, 65, 40), obj(2, 90, 110, 40)]);
        assert!(rows[0].is_goal_post());
        assert!(!rows[1].is_goal_post());
        assert!(format_row(&rows[0]).ends_with("goal post"));
        assert!(format_row(&rows[1]).starts_with("#2, Dist:40 Ang:100 Size:20 Size(cm):14.1 Start:90 End:110"));
    }

    #[test]
    fn decoded_lists_rows_and_counts_bad_records() {
        let out = decoded(&rover_proto::decode(b"o1d40s30e40qo2dqz"));
        assert!(out.contains("#1, Dist:40 Ang:35 Size:10"), "{out}");
        assert!(out.ends_with("malformed record(s) dropped\n"), "{out}");
        assert!(decoded(&rover_proto::decode(b"z")).contains("no objects in range\n"));
    }

    #[test]
    fn plot_marks_rover_and_objects() {
        let rows = object_rows(&[obj(1, 85, 95, 50)]);
        let p = plot(&rows);
        assert!(p.contains('$'));
        assert!(p.contains("#1"));
        assert_eq!(p.lines().count(), PLOT_LINES);
    }
}
