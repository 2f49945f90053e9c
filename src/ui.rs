use colored::{ColoredString, Colorize};
use deployplan::{PhaseName, Task, TaskStatus};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a final pass/fail line; failures go to stderr
pub fn outcome(ok: bool, msg: &str) {
    if ok {
        println!("{} {}", check_mark(true), msg);
    } else {
        eprintln!("{} {}", check_mark(false), msg);
    }
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// `✓` or `✗`
pub fn check_mark(ok: bool) -> ColoredString {
    if ok { "✓".green() } else { "✗".red() }
}

/// Symbol for a task status
pub fn status_symbol(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Pending => "○".dimmed(),
        TaskStatus::Simulated => "◌".cyan(),
        TaskStatus::Running => "●".blue(),
        TaskStatus::Completed => check_mark(true),
        TaskStatus::Failed => check_mark(false),
    }
}

/// `installation (3 tasks): Install components in dependency order`
pub fn phase_title(phase: PhaseName, tasks: usize) -> String {
    let count = match tasks {
        1 => "1 task".to_string(),
        n => format!("{n} tasks"),
    };
    format!(
        "{} {}: {}",
        phase.as_str().cyan().bold(),
        format!("({count})").dimmed(),
        phase.description()
    )
}

/// Print a phase heading
pub fn phase(phase: PhaseName, tasks: usize) {
    println!();
    println!("{}", phase_title(phase, tasks));
}

/// Status symbol, id and name of a task on one line
pub fn task_line(task: &Task) -> String {
    format!("  {} {} {}", status_symbol(task.status), task.id.dimmed(), task.name)
}

/// Print a task line, with its error underneath when it failed
pub fn task(task: &Task) {
    println!("{}", task_line(task));
    if task.status == TaskStatus::Failed {
        if let Some(error) = &task.error {
            println!("      {}", error.red());
        }
    }
}

/// Print a value as pretty JSON
pub fn json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
