use colored::{ColoredString, Colorize};

fn marked(mark: ColoredString, msg: &str) -> String {
    format!("  {mark} {msg}")
}

/// Confirmation line on stdout.
pub fn success(msg: &str) {
    println!("{}", marked("✓".green(), msg));
}

/// Non-fatal notice on stdout, e.g. an empty result or a skipped event.
pub fn warning(msg: &str) {
    println!("{}", marked("⚠".yellow(), msg));
}

/// Errors and integrity violations go to stderr.
pub fn error(msg: &str) {
    eprintln!("{}", marked("✗".red(), msg));
}

/// Title of a command's output.
pub fn header(title: &str) {
    println!("\n{}", title.bold());
}

/// Indented `label: value` line under a status line.
pub fn detail(label: &str, value: &str) {
    println!("    {} {value}", format!("{label}:").dimmed());
}
