//! Weekly calendar engine.
//!
//! Projects tasks and meetings onto a Monday-to-Sunday window and an hour grid,
//! and flags meetings whose time slots overlap. Conflicts are advisory: nothing
//! here refuses to schedule anything.

use chrono::{Datelike, Duration, NaiveDate, Timelike};

use crate::meeting::{Meeting, TimeSlot};
use crate::task::Task;

/// Fixed weekly capacity used for the "available hours" figure.
pub const DEFAULT_WEEKLY_CAPACITY_HOURS: f64 = 40.0;

/// The seven dates of the Monday-start week containing `anchor`.
///
/// Sunday belongs to the week that started the previous Monday.
pub fn week_window(anchor: NaiveDate) -> [NaiveDate; 7] {
    let dow = anchor.weekday().num_days_from_sunday() as i64;
    let offset = if dow == 0 { -6 } else { 1 - dow };
    let start = anchor + Duration::days(offset);
    std::array::from_fn(|i| start + Duration::days(i as i64))
}

/// Move `anchor` by whole weeks. `None` when the resulting week would not fit
/// in the calendar range.
pub fn shift_weeks(anchor: NaiveDate, weeks: i64) -> Option<NaiveDate> {
    let shifted = anchor.checked_add_signed(Duration::try_weeks(weeks)?)?;
    shifted.checked_sub_signed(Duration::days(6))?;
    shifted.checked_add_signed(Duration::days(6))?;
    Some(shifted)
}

pub fn next_week(anchor: NaiveDate) -> Option<NaiveDate> {
    shift_weeks(anchor, 1)
}

pub fn previous_week(anchor: NaiveDate) -> Option<NaiveDate> {
    shift_weeks(anchor, -1)
}

/// Something that sits on a single calendar date.
pub trait Dated {
    fn calendar_date(&self) -> NaiveDate;
}

impl Dated for Task {
    fn calendar_date(&self) -> NaiveDate {
        self.start_date
    }
}

impl Dated for Meeting {
    fn calendar_date(&self) -> NaiveDate {
        self.date
    }
}

/// Items whose date is exactly `date`.
pub fn bucket_by_date<'a, T: Dated>(items: impl IntoIterator<Item = &'a T>, date: NaiveDate) -> Vec<&'a T>
where
    T: 'a,
{
    items.into_iter().filter(|i| i.calendar_date() == date).collect()
}

/// Vertical position of an item in the hour grid, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPlacement {
    /// May be negative for items starting before the grid.
    pub top: f64,
    pub height: f64,
}

impl GridPlacement {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Hour grid geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarGrid {
    pub start_hour: u32,
    /// Number of hour rows displayed.
    pub hours: u32,
    pub hour_height: f64,
}

impl Default for CalendarGrid {
    fn default() -> Self {
        CalendarGrid {
            start_hour: 8,
            hours: 14,
            hour_height: 80.0,
        }
    }
}

impl CalendarGrid {
    fn offset_for(&self, hour: u32) -> f64 {
        (hour as f64 - self.start_hour as f64) * self.hour_height
    }

    /// Tasks span `estimated_hours` rows from the hour they start in.
    pub fn place_task(&self, task: &Task) -> GridPlacement {
        GridPlacement {
            top: self.offset_for(task.start_time.hour()),
            height: task.estimated_hours * self.hour_height,
        }
    }

    /// Meetings always take a single slot.
    pub fn place_meeting(&self, meeting: &Meeting) -> GridPlacement {
        GridPlacement {
            top: self.offset_for(meeting.start_time.hour()),
            height: self.hour_height,
        }
    }

    /// Total grid height in pixels.
    pub fn height(&self) -> f64 {
        self.hours as f64 * self.hour_height
    }

    /// Whether a placement lies fully inside the displayed hours. Placements are
    /// never clipped; callers decide what to do with off-grid items.
    pub fn is_within(&self, placement: &GridPlacement) -> bool {
        placement.top >= 0.0 && placement.bottom() <= self.height()
    }

    /// Row labels, "08:00" onwards.
    pub fn hour_labels(&self) -> Vec<String> {
        (self.start_hour..self.start_hour + self.hours)
            .map(|h| format!("{h:02}:00"))
            .collect()
    }
}

/// Existing meetings that overlap `candidate`.
pub fn conflicts<'a>(candidate: &TimeSlot, existing: impl IntoIterator<Item = &'a Meeting>) -> Vec<&'a Meeting> {
    existing.into_iter().filter(|m| candidate.overlaps(&m.slot())).collect()
}

/// True if any existing meeting on the same date overlaps `candidate` using
/// half-open intervals, so back-to-back meetings do not conflict.
pub fn detect_conflict<'a>(candidate: &TimeSlot, existing: impl IntoIterator<Item = &'a Meeting>) -> bool {
    existing.into_iter().any(|m| candidate.overlaps(&m.slot()))
}

/// One column of the weekly view.
#[derive(Debug, Clone)]
pub struct DaySchedule<'a> {
    pub date: NaiveDate,
    pub tasks: Vec<(&'a Task, GridPlacement)>,
    pub meetings: Vec<(&'a Meeting, GridPlacement)>,
}

/// The seven columns of a week with every item placed.
#[derive(Debug, Clone)]
pub struct WeekSchedule<'a> {
    pub grid: CalendarGrid,
    pub days: Vec<DaySchedule<'a>>,
}

impl<'a> WeekSchedule<'a> {
    pub fn build(anchor: NaiveDate, tasks: &'a [Task], meetings: &'a [Meeting], grid: CalendarGrid) -> Self {
        let days = week_window(anchor)
            .into_iter()
            .map(|date| {
                let mut day_tasks: Vec<(&Task, GridPlacement)> = bucket_by_date(tasks, date)
                    .into_iter()
                    .map(|t| (t, grid.place_task(t)))
                    .collect();
                day_tasks.sort_by_key(|(t, _)| t.start_time);
                let mut day_meetings: Vec<(&Meeting, GridPlacement)> = bucket_by_date(meetings, date)
                    .into_iter()
                    .map(|m| (m, grid.place_meeting(m)))
                    .collect();
                day_meetings.sort_by_key(|(m, _)| m.start_time);
                DaySchedule {
                    date,
                    tasks: day_tasks,
                    meetings: day_meetings,
                }
            })
            .collect();
        WeekSchedule { grid, days }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.days.first().map(|d| d.date)
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.days.last().map(|d| d.date)
    }
}

/// Derived figures for one week. Recomputed from the collections on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeeklyStats {
    pub planned_hours: f64,
    pub available_hours: f64,
    pub delayed: usize,
    /// Meetings in the window that overlap at least one other meeting.
    pub conflicts: usize,
}

impl WeeklyStats {
    pub fn compute(
        window: &[NaiveDate; 7],
        tasks: &[Task],
        meetings: &[Meeting],
        today: NaiveDate,
        capacity_hours: f64,
    ) -> Self {
        let (start, end) = (window[0], window[6]);
        let in_window = |d: NaiveDate| d >= start && d <= end;

        let week_tasks: Vec<&Task> = tasks.iter().filter(|t| in_window(t.start_date)).collect();
        let planned_hours: f64 = week_tasks.iter().map(|t| t.estimated_hours).sum();
        let delayed = week_tasks.iter().filter(|t| t.is_delayed(today)).count();

        let week_meetings: Vec<&Meeting> = meetings.iter().filter(|m| in_window(m.date)).collect();
        let conflicts = week_meetings
            .iter()
            .filter(|m| {
                let others = week_meetings.iter().copied().filter(|o| o.id != m.id);
                detect_conflict(&m.slot(), others)
            })
            .count();

        WeeklyStats {
            planned_hours,
            available_hours: (capacity_hours - planned_hours).max(0.0),
            delayed,
            conflicts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::*;
    use crate::fields::TaskStatus;
    use chrono::Weekday;

    #[test]
    fn test_week_window_starts_monday() {
        // Wednesday.
        let window = week_window(date("2024-05-15"));
        assert_eq!(window[0], date("2024-05-13"));
        assert_eq!(window[6], date("2024-05-19"));
        assert_eq!(window[0].weekday(), Weekday::Mon);
        assert!(window.windows(2).all(|w| w[1] - w[0] == Duration::days(1)));
    }

    #[test]
    fn test_sunday_closes_previous_week() {
        let sunday = date("2024-05-19");
        let window = week_window(sunday);
        assert_eq!(window[0], date("2024-05-13"));
        assert_eq!(window[6], sunday);
    }

    #[test]
    fn test_every_anchor_in_a_month_gets_a_monday_window() {
        let mut day = date("2024-02-20");
        for _ in 0..40 {
            let window = week_window(day);
            assert_eq!(window[0].weekday(), Weekday::Mon);
            assert!(window.contains(&day));
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_week_navigation() {
        let anchor = date("2024-05-15");
        assert_eq!(week_window(next_week(anchor).unwrap())[0], date("2024-05-20"));
        assert_eq!(week_window(previous_week(anchor).unwrap())[0], date("2024-05-06"));
        assert_eq!(shift_weeks(anchor, -52), Some(date("2023-05-17")));
    }

    #[test]
    fn test_week_shift_past_calendar_range_is_none() {
        let anchor = date("2024-05-15");
        assert_eq!(shift_weeks(anchor, 2_000_000_000), None);
        assert_eq!(shift_weeks(anchor, i64::MIN), None);
        assert_eq!(next_week(NaiveDate::MAX), None);
        assert_eq!(shift_weeks(NaiveDate::MAX, 0), None);
        assert_eq!(previous_week(NaiveDate::MIN), None);
    }

    #[test]
    fn test_bucket_by_date_exact_match() {
        let tasks = vec![
            task("t1", "p1", "f1", "2024-05-15", "10:00", 1.0),
            task("t2", "p1", "f1", "2024-05-16", "10:00", 1.0),
        ];
        let hits = bucket_by_date(&tasks, date("2024-05-15"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "t1");
        assert!(bucket_by_date(&tasks, date("2024-05-17")).is_empty());
    }

    #[test]
    fn test_task_placement() {
        let grid = CalendarGrid { start_hour: 8, hours: 14, hour_height: 80.0 };
        let t = task("t1", "p1", "f1", "2024-05-15", "10:00", 4.0);
        let placement = grid.place_task(&t);
        assert_eq!(placement, GridPlacement { top: 160.0, height: 320.0 });
        assert!(grid.is_within(&placement));
    }

    #[test]
    fn test_placement_uses_start_hour_only() {
        let grid = CalendarGrid::default();
        let t = task("t1", "p1", "f1", "2024-05-15", "10:45", 1.5);
        assert_eq!(grid.place_task(&t), GridPlacement { top: 160.0, height: 120.0 });
    }

    #[test]
    fn test_meeting_takes_one_slot_and_early_items_are_not_clipped() {
        let grid = CalendarGrid { start_hour: 8, hours: 14, hour_height: 64.0 };
        let m = meeting("m1", "p1", "2024-05-15", "07:00", "09:30");
        let placement = grid.place_meeting(&m);
        assert_eq!(placement, GridPlacement { top: -64.0, height: 64.0 });
        assert!(!grid.is_within(&placement));

        let late = task("t1", "p1", "f1", "2024-05-15", "20:00", 3.0);
        assert!(!grid.is_within(&grid.place_task(&late)));
    }

    #[test]
    fn test_hour_labels() {
        let labels = CalendarGrid::default().hour_labels();
        assert_eq!(labels.len(), 14);
        assert_eq!(labels.first().map(String::as_str), Some("08:00"));
        assert_eq!(labels.last().map(String::as_str), Some("21:00"));
    }

    #[test]
    fn test_overlap_and_back_to_back() {
        let existing = vec![meeting("m1", "p1", "2024-05-15", "10:00", "11:00")];
        let overlapping = TimeSlot::new(date("2024-05-15"), time("10:30"), time("11:30"));
        let adjacent = TimeSlot::new(date("2024-05-15"), time("11:00"), time("12:00"));
        assert!(detect_conflict(&overlapping, &existing));
        assert!(!detect_conflict(&adjacent, &existing));
    }

    #[test]
    fn test_conflict_is_symmetric() {
        let pairs = [
            (("10:00", "11:00"), ("10:30", "11:30")),
            (("09:00", "12:00"), ("10:00", "10:15")),
            (("10:00", "11:00"), ("11:00", "12:00")),
            (("08:00", "09:00"), ("13:00", "14:00")),
        ];
        for ((a_start, a_end), (b_start, b_end)) in pairs {
            let a = meeting("a", "p1", "2024-05-15", a_start, a_end);
            let b = meeting("b", "p1", "2024-05-15", b_start, b_end);
            assert_eq!(
                detect_conflict(&a.slot(), [&b]),
                detect_conflict(&b.slot(), [&a]),
                "{a_start}-{a_end} vs {b_start}-{b_end}"
            );
        }
    }

    #[test]
    fn test_different_dates_never_conflict() {
        let a = meeting("a", "p1", "2024-05-15", "10:00", "11:00");
        let b = meeting("b", "p1", "2024-05-16", "10:00", "11:00");
        assert!(!detect_conflict(&a.slot(), [&b]));
        assert!(!detect_conflict(&a.slot(), std::iter::empty::<&Meeting>()));
    }

    #[test]
    fn test_conflicts_lists_offenders() {
        let existing = vec![
            meeting("m1", "p1", "2024-05-15", "09:00", "10:00"),
            meeting("m2", "p1", "2024-05-15", "10:00", "11:00"),
            meeting("m3", "p1", "2024-05-15", "10:30", "12:00"),
        ];
        let candidate = TimeSlot::new(date("2024-05-15"), time("10:15"), time("10:45"));
        let ids: Vec<&str> = conflicts(&candidate, &existing).iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m2", "m3"]);
    }

    #[test]
    fn test_week_schedule_buckets_items() {
        let tasks = vec![
            task("t2", "p1", "f1", "2024-05-15", "14:00", 1.0),
            task("t1", "p1", "f1", "2024-05-15", "10:00", 4.0),
            task("t3", "p1", "f1", "2024-05-21", "10:00", 4.0),
        ];
        let meetings = vec![meeting("m1", "p1", "2024-05-19", "10:00", "11:00")];
        let week = WeekSchedule::build(date("2024-05-15"), &tasks, &meetings, CalendarGrid::default());

        assert_eq!(week.days.len(), 7);
        assert_eq!(week.start(), Some(date("2024-05-13")));
        assert_eq!(week.end(), Some(date("2024-05-19")));
        let wednesday = &week.days[2];
        let ids: Vec<&str> = wednesday.tasks.iter().map(|(t, _)| t.id.as_str()).collect();
        assert_eq!(ids, ["t1", "t2"]);
        assert_eq!(week.days[6].meetings.len(), 1);
        assert!(week.days.iter().all(|d| d.tasks.iter().all(|(t, _)| t.id != "t3")));
    }

    #[test]
    fn test_weekly_stats() {
        let today = date("2024-05-17");
        let mut late = task("t1", "p1", "f1", "2024-05-13", "10:00", 4.0);
        late.end_date = date("2024-05-14");
        let mut done_late = task("t2", "p1", "f1", "2024-05-13", "14:00", 2.0);
        done_late.end_date = date("2024-05-14");
        done_late.status = TaskStatus::Completed;
        let on_time = task("t3", "p1", "f1", "2024-05-18", "10:00", 3.5);
        let other_week = task("t4", "p1", "f1", "2024-05-20", "10:00", 8.0);
        let tasks = vec![late, done_late, on_time, other_week];
        let meetings = vec![
            meeting("m1", "p1", "2024-05-15", "10:00", "11:00"),
            meeting("m2", "p1", "2024-05-15", "10:30", "11:30"),
            meeting("m3", "p1", "2024-05-15", "11:30", "12:00"),
        ];

        let window = week_window(today);
        let stats = WeeklyStats::compute(&window, &tasks, &meetings, today, DEFAULT_WEEKLY_CAPACITY_HOURS);
        assert_eq!(stats.planned_hours, 9.5);
        assert_eq!(stats.available_hours, 30.5);
        assert_eq!(stats.delayed, 1);
        assert_eq!(stats.conflicts, 2);

        let busy = WeeklyStats::compute(&window, &tasks, &[], today, 5.0);
        assert_eq!(busy.available_hours, 0.0);
    }
}
