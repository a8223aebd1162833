//! Plain-text rendering for the command line.

use chrono::NaiveDate;

use crate::client::Client;
use crate::dates::{format_relative, format_time};
use crate::db::{Database, OrphanReport};
use crate::meeting::Meeting;
use crate::project::{format_file_size, Project, ProjectFile};
use crate::schedule::{WeekSchedule, WeeklyStats};
use crate::stats::{phase_progress, project_progress, DashboardStats};
use crate::task::Task;

/// Width of the id column. Ids may be given abbreviated to any unique prefix.
pub const SHORT_ID: usize = 8;

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// `3h`, `2.5h`.
pub fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{}h", hours as i64)
    } else {
        format!("{hours:.1}h")
    }
}

pub fn print_clients(clients: &[&Client]) {
    println!("{:<8} {:<8} {:<22} {:<20} {}", "ID", "Status", "Name", "Company", "Email");
    for c in clients {
        println!(
            "{:<8} {:<8} {:<22} {:<20} {}",
            short_id(&c.id),
            c.status.as_str(),
            truncate(&c.name, 22),
            truncate(&c.company, 20),
            c.email
        );
    }
}

pub fn print_projects(projects: &[&Project], db: &Database) {
    println!(
        "{:<8} {:<9} {:>5} {:<11} {:<20} {}",
        "ID", "Status", "Done", "Due", "Client", "Name"
    );
    for p in projects {
        let client = db.get::<Client>(&p.client_id).map_or("-", |c| c.name.as_str());
        println!(
            "{:<8} {:<9} {:>4}% {:<11} {:<20} {}",
            short_id(&p.id),
            p.status.as_str(),
            project_progress(db, &p.id),
            p.due_date,
            truncate(client, 20),
            p.name
        );
    }
}

pub fn print_project_detail(project: &Project, db: &Database, today: NaiveDate) {
    let client = db.get::<Client>(&project.client_id).map_or("-", |c| c.name.as_str());
    println!("{} ({})", project.name, project.id);
    println!("  client:   {client}");
    println!("  status:   {}", project.status.as_str());
    println!("  value:    {:.2}", project.value);
    println!("  dates:    {} .. {}", project.start_date, project.due_date);
    println!("  progress: {}%", project_progress(db, &project.id));
    if !project.description.is_empty() {
        println!("  {}", project.description);
    }

    for phase in db.phases_for_project(&project.id) {
        let current = if project.current_phase_id.as_deref() == Some(phase.id.as_str()) {
            " *"
        } else {
            ""
        };
        println!(
            "\n{}. {} [{}] {}%{current}  ({})",
            phase.order,
            phase.name,
            phase.status.as_str(),
            phase_progress(db, &phase.id),
            short_id(&phase.id)
        );
        let tasks = db.tasks_for_phase(&phase.id);
        if !tasks.is_empty() {
            print_tasks(&tasks, today);
        }
    }

    let meetings = db.meetings_for_project(&project.id);
    if !meetings.is_empty() {
        println!("\nMeetings");
        print_meetings(&meetings);
    }
    if !project.files.is_empty() {
        println!("\nFiles");
        print_files(&project.files);
    }
}

pub fn print_tasks(tasks: &[&Task], today: NaiveDate) {
    println!(
        "{:<8} {:<12} {:<6} {:>5} {:<17} {:<10} {}",
        "ID", "Status", "Pri", "Hours", "Start", "End", "Title"
    );
    for t in tasks {
        let end = if t.is_delayed(today) {
            format_relative(t.end_date, today)
        } else {
            t.end_date.to_string()
        };
        println!(
            "{:<8} {:<12} {:<6} {:>5} {:<17} {:<10} {}",
            short_id(&t.id),
            t.status.as_str(),
            t.priority.as_str(),
            format_hours(t.estimated_hours),
            format!("{} {}", t.start_date, format_time(t.start_time)),
            end,
            t.title
        );
    }
}

pub fn print_history(task: &Task) {
    println!("{} [{}]", task.title, task.status);
    if task.history.is_empty() {
        println!("  no status changes recorded");
    }
    for entry in &task.history {
        println!(
            "  {}  {:<12} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.status.as_str(),
            entry.observation
        );
    }
}

pub fn print_meetings(meetings: &[&Meeting]) {
    println!("{:<8} {:<10} {:<11} {:<11} {}", "ID", "Status", "Date", "Time", "Title");
    for m in meetings {
        println!(
            "{:<8} {:<10} {:<11} {:<11} {}",
            short_id(&m.id),
            m.status.as_str(),
            m.date,
            format!("{}-{}", format_time(m.start_time), format_time(m.end_time)),
            m.title
        );
    }
}

pub fn print_files(files: &[ProjectFile]) {
    for f in files {
        println!(
            "{:<8} {:>8}  {}  {}",
            short_id(&f.id),
            format_file_size(f.size),
            f.uploaded_at.format("%Y-%m-%d"),
            f.name
        );
    }
}

/// One line per placed item, grouped by day. Items that fall outside the
/// displayed hours are flagged rather than dropped.
pub fn week_lines(week: &WeekSchedule) -> Vec<String> {
    let mut lines = Vec::new();
    for day in &week.days {
        lines.push(day.date.format("%a %Y-%m-%d").to_string());
        if day.tasks.is_empty() && day.meetings.is_empty() {
            lines.push("  -".to_string());
            continue;
        }
        for (m, placement) in &day.meetings {
            let flag = if week.grid.is_within(placement) { "" } else { "  (off grid)" };
            lines.push(format!(
                "  {}-{}  meeting  {}{flag}",
                format_time(m.start_time),
                format_time(m.end_time),
                m.title
            ));
        }
        for (t, placement) in &day.tasks {
            let flag = if week.grid.is_within(placement) { "" } else { "  (off grid)" };
            lines.push(format!(
                "  {}  {:>5}  {} [{}]{flag}",
                format_time(t.start_time),
                format_hours(t.estimated_hours),
                t.title,
                t.status
            ));
        }
    }
    lines
}

pub fn print_week(week: &WeekSchedule, stats: &WeeklyStats) {
    if let (Some(start), Some(end)) = (week.start(), week.end()) {
        println!("Week {start} .. {end}");
    }
    for line in week_lines(week) {
        println!("{line}");
    }
    println!(
        "\nplanned {}  available {}  delayed {}  conflicts {}",
        format_hours(stats.planned_hours),
        format_hours(stats.available_hours),
        stats.delayed,
        stats.conflicts
    );
}

pub fn print_dashboard(stats: &DashboardStats, execute_now: &[&Task], upcoming: &[&Meeting], today: NaiveDate) {
    println!("Today's tasks:    {}", stats.today_tasks);
    println!("Completion:       {}%", stats.completion_rate);
    println!("Active projects:  {}", stats.active_projects);
    println!("Delayed tasks:    {}", stats.delayed_tasks);
    println!(
        "Hours:            {} executed of {} planned",
        format_hours(stats.hours_executed),
        format_hours(stats.hours_planned)
    );
    if !execute_now.is_empty() {
        println!("\nExecute now");
        print_tasks(execute_now, today);
    }
    if !upcoming.is_empty() {
        println!("\nUpcoming meetings");
        print_meetings(upcoming);
    }
}

pub fn print_orphans(report: &OrphanReport) {
    if report.is_empty() {
        println!("No orphaned records.");
        return;
    }
    let groups = [
        ("projects", &report.projects),
        ("phases", &report.phases),
        ("tasks", &report.tasks),
        ("meetings", &report.meetings),
    ];
    for (label, ids) in groups {
        if !ids.is_empty() {
            println!("{label}: {}", ids.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::*;
    use crate::schedule::CalendarGrid;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Website E-commerce", 8), "Website…");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("3f2a9c1e-7b44-4d0e-9c55-1a2b3c4d5e6f"), "3f2a9c1e");
        assert_eq!(short_id("t1"), "t1");
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(3.0), "3h");
        assert_eq!(format_hours(2.5), "2.5h");
        assert_eq!(format_hours(0.0), "0h");
    }

    #[test]
    fn test_week_lines_flag_off_grid_items() {
        let tasks = vec![
            task("t1", "p1", "f1", "2024-05-15", "10:00", 2.0),
            task("t2", "p1", "f1", "2024-05-15", "06:00", 1.0),
        ];
        let meetings = vec![meeting("m1", "p1", "2024-05-13", "09:00", "10:00")];
        let week = WeekSchedule::build(date("2024-05-15"), &tasks, &meetings, CalendarGrid::default());
        let lines = week_lines(&week);

        assert_eq!(lines[0], "Mon 2024-05-13");
        assert_eq!(lines[1], "  09:00-10:00  meeting  Meeting m1");
        assert_eq!(lines[2], "Tue 2024-05-14");
        assert_eq!(lines[3], "  -");
        let wednesday: Vec<&String> = lines.iter().filter(|l| l.contains("Task t")).collect();
        assert_eq!(wednesday.len(), 2);
        assert!(wednesday[0].contains("06:00") && wednesday[0].ends_with("(off grid)"));
        assert!(!wednesday[1].ends_with("(off grid)"));
    }
}
