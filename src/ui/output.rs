use crate::output::is_quiet;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn banner(title: &str, subtitle: &str) {
    if is_quiet() {
        return;
    }
    println!();
    println!("{} {}", Icons::ROCKET, title);
    println!("   {}", subtitle.style(theme().dim.clone()));
    println!();
}

pub fn header(text: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn section(title: &str) {
    if is_quiet() {
        return;
    }
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

/// One line per table in a load summary
pub fn table_loaded(table: &str, written: usize, skipped: usize) {
    if is_quiet() {
        return;
    }
    let skipped = if skipped > 0 {
        dim(&format!(" ({} skipped)", skipped))
    } else {
        String::new()
    };
    println!(
        "{} {} {} rows{}",
        Icons::CHECK.style(theme().success.clone()),
        table,
        written,
        skipped
    );
}

pub fn table_unchanged(table: &str) {
    if is_quiet() {
        return;
    }
    println!(
        "{} {} {}",
        Icons::SKIP,
        table.style(theme().dim.clone()),
        dim("unchanged")
    );
}

pub fn table_failed(table: &str, reason: &str) {
    eprintln!(
        "{} {} {}",
        Icons::CROSS.style(theme().error.clone()),
        table.style(theme().error.clone()),
        reason
    );
}
