/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    // Characters that require quoting
    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote and join multiple arguments into one shell command line.
pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a command part needs a shell to run (operators, redirects,
/// subshells). Parts without these can be executed directly.
pub fn requires_shell(part: &str) -> bool {
    const SHELL_OPERATORS: &[&str] = &[
        "&&", "||", ";", "|", ">", ">>", "<", "<<", "&", "`", "$(", "EOF",
    ];

    SHELL_OPERATORS.iter().any(|op| part.contains(op))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_arg_simple() {
        assert_eq!(quote_arg("status"), "status");
        assert_eq!(quote_arg("--force"), "--force");
    }

    #[test]
    fn quote_arg_with_spaces() {
        assert_eq!(quote_arg("release notes"), "'release notes'");
    }

    #[test]
    fn quote_arg_with_single_quote() {
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
    }

    #[test]
    fn quote_arg_empty() {
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn quote_args_mixed() {
        let args = vec!["tag".to_string(), "-am release".to_string()];
        assert_eq!(quote_args(&args), "tag '-am release'");
    }

    #[test]
    fn requires_shell_detects_operators() {
        assert!(requires_shell("a && b"));
        assert!(requires_shell("tail -f log | grep error"));
        assert!(!requires_shell("git"));
        assert!(!requires_shell("--tag=v1.2.3"));
    }
}
