//! Command-line construction for the shell pipe mode.
//!
//! Shell mode only escapes double quotes. Backticks, `$` and other
//! metacharacters in the command text still reach the shell, so this path is
//! an injection surface and is kept for parity with callers that depend on
//! shell expansion. The configured program and arguments are single-quoted
//! word by word, so only the command text is exposed. Direct mode never
//! builds a shell line.

/// Escape every `"` as `\"` so the text stays inside one double-quoted word.
pub fn escape_double_quotes(text: &str) -> String {
    text.replace('"', "\\\"")
}

/// Quote one word for `sh`. Words made only of safe characters are left
/// as they are; anything else is wrapped in single quotes.
pub fn quote_word(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// Join a program and its arguments as shell words. Used for the shell
/// pipe line and for log lines and failure messages.
pub fn tool_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(quote_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `echo "<escaped command>" | <tool line>`
pub fn pipe_line(command: &str, program: &str, args: &[String]) -> String {
    format!(
        "echo \"{}\" | {}",
        escape_double_quotes(command),
        tool_line(program, args)
    )
}
