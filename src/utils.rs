///! Some utility functions

use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use crate::registry::Registry;
use crate::task::Task;

/// Format a duration in minutes as `HH:MM`
pub fn pretty_time(minutes: i64) -> String {
    let sign = if minutes < 0 { "-" } else { "" };
    let minutes = minutes.abs();
    format!("{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
}

/// Convert minutes into hours, rounded to two decimals (e.g. 45 minutes are 0.75 hours)
pub fn hours_from_minutes(minutes: i64) -> f64 {
    (minutes as f64 / 60.0 * 100.0).round() / 100.0
}

/// Convert hours into minutes, rounded to the nearest minute
pub fn minutes_from_hours(hours: f64) -> i64 {
    (hours * 60.0).round() as i64
}

/// Turn CRLF and lone CR line breaks into LF, the only line break a storage file can hold
pub fn normalize_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}


/// A debug utility that pretty-prints a whole registry
pub fn print_registry<W: Write>(registry: &Registry, out: &mut W) -> std::io::Result<()> {
    for root in registry.roots() {
        print_task(root, 0, out)?;
    }
    Ok(())
}

/// Pretty-print a task and its subtree
pub fn print_task<W: Write>(task: &Task, depth: usize, out: &mut W) -> std::io::Result<()> {
    let completion = if task.is_completed() { "✓" } else { " " };
    let total = task.total_minutes().map(pretty_time).unwrap_or_else(|| "--:--".to_string());
    writeln!(out, "{}{} {}\t[{}] {}\tsession {}, total {}",
        "    ".repeat(depth),
        completion,
        task.title(),
        task.id(),
        task.kind(),
        pretty_time(task.session_minutes()),
        total,
    )?;
    for child in task.children() {
        print_task(child, depth + 1, out)?;
    }
    Ok(())
}


/// Compare keys of two maps for equality
pub fn keys_are_the_same<T, U, V>(left: &BTreeMap<T, U>, right: &BTreeMap<T, V>) -> bool
where
    T: std::hash::Hash + Eq + Clone + std::fmt::Display,
{
    if left.len() != right.len() {
        log::debug!("Count of keys mismatch: {} and {}", left.len(), right.len());
        return false;
    }

    let keys_l: HashSet<T> = left.keys().cloned().collect();
    let keys_r: HashSet<T> = right.keys().cloned().collect();
    let result = keys_l == keys_r;
    if !result {
        log::debug!("Keys of a map mismatch");
        for key in keys_l {
            log::debug!("   left: {}", key);
        }
        for key in keys_r {
            log::debug!("  right: {}", key);
        }
    }
    result
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    #[test]
    fn time_conversions() {
        assert_eq!(pretty_time(0), "00:00");
        assert_eq!(pretty_time(75), "01:15");
        assert_eq!(pretty_time(-30), "-00:30");
        assert_eq!(pretty_time(6005), "100:05");

        assert_eq!(hours_from_minutes(45), 0.75);
        assert_eq!(hours_from_minutes(50), 0.83);
        assert_eq!(hours_from_minutes(120), 2.0);

        assert_eq!(minutes_from_hours(1.5), 90);
        assert_eq!(minutes_from_hours(0.33), 20);
    }

    #[test]
    fn line_breaks() {
        assert_eq!(normalize_line_breaks("a\r\nb\rc\nd"), "a\nb\nc\nd");
        assert_eq!(normalize_line_breaks("plain"), "plain");
    }

    #[test]
    fn tree_printout() {
        let mut project = Task::new("1", "Project", TaskKind::Project);
        project.set_session_minutes(75);
        project.add(Task::new("2", "List", TaskKind::TaskList)).unwrap();

        let mut out = Vec::new();
        print_task(&project, 0, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "  Project\t[1] project\tsession 01:15, total --:--\n      List\t[2] task list\tsession 00:00, total --:--\n");
    }
}
