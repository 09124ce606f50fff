//! Splitting of a command line into words.

/// Split `line` into blank-separated words.
///
/// Runs of spaces and tabs act as a single separator; there is no quoting and
/// no expansion. A blank line yields no words.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    line.split([' ', '\t', '\r', '\n'])
        .filter(|word| !word.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_words() {
        assert_eq!(
            split_into_tokens("run /bin/ls -l /tmp"),
            vec!["run", "/bin/ls", "-l", "/tmp"]
        );
    }

    #[test]
    fn test_repeated_and_trailing_blanks() {
        assert_eq!(
            split_into_tokens("  repeat   3\t/bin/true  \r\n"),
            vec!["repeat", "3", "/bin/true"]
        );
    }

    #[test]
    fn test_blank_line() {
        assert!(split_into_tokens("").is_empty());
        assert!(split_into_tokens("   \t ").is_empty());
    }

    #[test]
    fn test_no_quote_or_variable_handling() {
        assert_eq!(
            split_into_tokens("run /bin/echo \"a b\" $HOME"),
            vec!["run", "/bin/echo", "\"a", "b\"", "$HOME"]
        );
    }
}
