//! Read-only derived metrics for the dashboard and project views.
//!
//! Nothing here is cached; every figure is recomputed from the collections it
//! is handed.

use chrono::NaiveDate;

use crate::db::Database;
use crate::fields::{MeetingStatus, ProjectStatus};
use crate::meeting::Meeting;
use crate::task::Task;

/// How many tasks the "execute now" list shows by default.
pub const EXECUTE_NOW_LIMIT: usize = 5;

/// `round(100 * completed / total)`, 0 for an empty set.
pub fn completion_rate<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> u32 {
    let (total, completed) = tasks.into_iter().fold((0usize, 0usize), |(total, done), t| {
        (total + 1, done + usize::from(t.is_completed()))
    });
    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u32
}

pub fn phase_progress(db: &Database, phase_id: &str) -> u32 {
    completion_rate(db.tasks.iter().filter(|t| t.phase_id == phase_id))
}

pub fn project_progress(db: &Database, project_id: &str) -> u32 {
    completion_rate(db.tasks.iter().filter(|t| t.project_id == project_id))
}

/// Tasks not completed whose end date is before `today`.
pub fn delayed_count<'a>(tasks: impl IntoIterator<Item = &'a Task>, today: NaiveDate) -> usize {
    tasks.into_iter().filter(|t| t.is_delayed(today)).count()
}

pub fn hours_planned<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> f64 {
    tasks.into_iter().map(|t| t.estimated_hours).sum()
}

/// Hours of completed tasks.
pub fn hours_executed<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> f64 {
    tasks
        .into_iter()
        .filter(|t| t.is_completed())
        .map(|t| t.estimated_hours)
        .sum()
}

/// Headline figures of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardStats {
    pub today_tasks: usize,
    pub completion_rate: u32,
    pub active_projects: usize,
    pub delayed_tasks: usize,
    pub hours_planned: f64,
    pub hours_executed: f64,
}

impl DashboardStats {
    pub fn compute(db: &Database, today: NaiveDate) -> Self {
        DashboardStats {
            today_tasks: db.tasks.iter().filter(|t| t.start_date == today).count(),
            completion_rate: completion_rate(&db.tasks),
            active_projects: db.projects.iter().filter(|p| p.status == ProjectStatus::Active).count(),
            delayed_tasks: delayed_count(&db.tasks, today),
            hours_planned: hours_planned(&db.tasks),
            hours_executed: hours_executed(&db.tasks),
        }
    }
}

/// Pending, in-progress and waiting tasks, in collection order.
pub fn execute_now(db: &Database, limit: usize) -> Vec<&Task> {
    db.tasks.iter().filter(|t| t.status.is_actionable()).take(limit).collect()
}

/// Scheduled meetings from `today` on, soonest first.
pub fn upcoming_meetings(db: &Database, today: NaiveDate) -> Vec<&Meeting> {
    let mut meetings: Vec<&Meeting> = db
        .meetings
        .iter()
        .filter(|m| m.status == MeetingStatus::Scheduled && m.date >= today)
        .collect();
    meetings.sort_by_key(|m| (m.date, m.start_time));
    meetings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::*;
    use crate::fields::TaskStatus;
    use crate::lifecycle::apply_status_change;

    #[test]
    fn test_empty_sets_are_zero() {
        let db = seeded();
        assert_eq!(completion_rate(&db.tasks), 0);
        assert_eq!(phase_progress(&db, "f1"), 0);
        assert_eq!(project_progress(&db, "p1"), 0);
        assert_eq!(hours_planned(&db.tasks), 0.0);
    }

    #[test]
    fn test_project_progress_scenario() {
        let mut db = seeded();
        assert_eq!(project_progress(&db, "p1"), 0);
        for i in 0..4 {
            db.tasks.push(task(&format!("t{i}"), "p1", "f1", "2024-05-15", "10:00", 1.0));
        }
        apply_status_change(&mut db.tasks[0], TaskStatus::Completed, Some("shipped"));
        assert_eq!(project_progress(&db, "p1"), 25);
        assert_eq!(phase_progress(&db, "f1"), 25);
        assert_eq!(phase_progress(&db, "f2"), 0);
    }

    #[test]
    fn test_all_completed_is_hundred() {
        let mut db = seeded();
        for i in 0..3 {
            let mut t = task(&format!("t{i}"), "p1", "f2", "2024-05-15", "10:00", 1.0);
            t.status = TaskStatus::Completed;
            db.tasks.push(t);
        }
        assert_eq!(completion_rate(&db.tasks), 100);
        assert_eq!(phase_progress(&db, "f2"), 100);
    }

    #[test]
    fn test_rounding() {
        let mut db = seeded();
        for i in 0..3 {
            db.tasks.push(task(&format!("t{i}"), "p1", "f1", "2024-05-15", "10:00", 1.0));
        }
        db.tasks[0].status = TaskStatus::Completed;
        assert_eq!(project_progress(&db, "p1"), 33);
        db.tasks[1].status = TaskStatus::Completed;
        assert_eq!(project_progress(&db, "p1"), 67);
    }

    #[test]
    fn test_dashboard_stats() {
        let today = date("2024-05-15");
        let mut db = seeded();
        let mut done = task("t1", "p1", "f1", "2024-05-01", "09:00", 3.0);
        done.status = TaskStatus::Completed;
        let mut late = task("t2", "p1", "f2", "2024-05-10", "10:00", 4.0);
        late.status = TaskStatus::InProgress;
        let today_task = task("t3", "p1", "f2", "2024-05-15", "10:00", 2.5);
        db.tasks = vec![done, late, today_task];

        let stats = DashboardStats::compute(&db, today);
        assert_eq!(
            stats,
            DashboardStats {
                today_tasks: 1,
                completion_rate: 33,
                active_projects: 1,
                delayed_tasks: 1,
                hours_planned: 9.5,
                hours_executed: 3.0,
            }
        );
    }

    #[test]
    fn test_execute_now_and_upcoming() {
        let mut db = seeded();
        let statuses = [
            TaskStatus::Completed,
            TaskStatus::Blocked,
            TaskStatus::Pending,
            TaskStatus::WaitingInfo,
            TaskStatus::InProgress,
            TaskStatus::Paused,
        ];
        for (i, s) in statuses.into_iter().enumerate() {
            let mut t = task(&format!("t{i}"), "p1", "f1", "2024-05-15", "10:00", 1.0);
            t.status = s;
            db.tasks.push(t);
        }
        let ids: Vec<&str> = execute_now(&db, EXECUTE_NOW_LIMIT).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["t2", "t3", "t4"]);
        assert_eq!(execute_now(&db, 1).len(), 1);

        let mut cancelled = meeting("m0", "p1", "2024-05-20", "09:00", "10:00");
        cancelled.status = MeetingStatus::Cancelled;
        db.meetings = vec![
            meeting("m2", "p1", "2024-05-21", "09:00", "10:00"),
            meeting("m1", "p1", "2024-05-20", "15:00", "16:00"),
            meeting("past", "p1", "2024-05-01", "09:00", "10:00"),
            cancelled,
        ];
        let ids: Vec<&str> = upcoming_meetings(&db, date("2024-05-15")).iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2"]);
    }
}
