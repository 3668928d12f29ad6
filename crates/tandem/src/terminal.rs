//! Styled terminal output.

use console::style;

/// Width of section rules.
const RULE_WIDTH: usize = 69;

/// Green `PASSED` or red `FAILED <n>`. Always colored.
pub fn banner(outcome: i32) -> String {
    if outcome == 0 {
        style("PASSED").green().force_styling(true).to_string()
    } else {
        style(format!("FAILED {outcome}"))
            .red()
            .force_styling(true)
            .to_string()
    }
}

/// `---- <title>: ---...` padded to a fixed width.
pub fn section(title: &str) -> String {
    format!("{:-<RULE_WIDTH$}", format!("---- {title}: "))
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold().for_stderr(), message);
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    eprintln!("{} {}", style("!").yellow().bold().for_stderr(), message);
}
