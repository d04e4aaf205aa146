// Terminal output for the subcommands

use colored::{ColoredString, Colorize};

use crate::domain::Stage;

fn stage_colored(text: &str, stage: Option<Stage>) -> ColoredString {
    match stage {
        Some(Stage::Production) => text.bright_red().bold(),
        Some(Stage::Beta) => text.bright_blue(),
        None => text.bright_white(),
    }
}

fn header_lines(title: &str, stage: Option<Stage>) -> [String; 3] {
    let title = match stage {
        Some(stage) => format!("{}  [{}]", title, stage),
        None => title.to_string(),
    };
    let rule = "─".repeat(title.chars().count() + 4);
    [
        format!("┌{}┐", rule),
        format!("│  {}  │", title),
        format!("└{}┘", rule),
    ]
}

/// Boxed title. Production output is red so it can't be mistaken for beta.
pub fn print_header(title: &str, stage: Option<Stage>) {
    println!();
    for line in header_lines(title, stage) {
        println!("{}", stage_colored(&line, stage));
    }
    println!();
}

/// One stack of an assembly, with a short trailing note
pub fn print_stack(name: &str, note: &str) {
    println!("  {} {} {}", "•".bright_blue(), name.bold(), note.dimmed());
}

pub fn print_detail(label: &str, value: &str) {
    println!("  {} {}", format!("{}:", label).dimmed(), value);
}

pub fn print_success(message: &str) {
    println!("{}", format!("✅ {}", message).bright_green().bold());
}

pub fn print_error(message: &str) {
    eprintln!("{}", format!("❌ {}", message).bright_red().bold());
}

pub fn print_warning(message: &str) {
    eprintln!("{}", format!("⚠️  {}", message).bright_yellow());
}
