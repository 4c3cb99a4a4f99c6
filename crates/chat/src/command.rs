//! The `help` command.

use std::num::NonZeroU32;

use backseat_annotations::{AnnotationRequest, Severity, is_workspace_relative};

/// Keyword that opens every annotation command.
pub const HELP_KEYWORD: &str = "help";

/// Parse one chat line as a `help` command.
///
/// Grammar: `help <filePath> <line> <severity> <message…>`, tokens separated
/// by any run of whitespace. The keyword must match exactly, `filePath` must
/// stay inside the workspace, `line` is a positive 1-based integer,
/// `severity` is one of `err`, `warn`, `info`, `hint`, and the message is
/// every remaining token rejoined with single spaces.
///
/// Anything that does not fit comes back as `None`. Chat is mostly ordinary
/// lines, so rejection is the common case and stays silent.
#[must_use]
pub fn parse_help(line: &str) -> Option<AnnotationRequest> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != HELP_KEYWORD {
        return None;
    }
    let file_path = tokens.next()?;
    if !is_workspace_relative(file_path) {
        return None;
    }
    let line_number: NonZeroU32 = tokens.next()?.parse().ok()?;
    let severity = Severity::from_token(tokens.next()?)?;
    let message = tokens.collect::<Vec<_>>().join(" ");
    if message.is_empty() {
        return None;
    }
    Some(AnnotationRequest {
        file_path: file_path.to_owned(),
        line: line_number,
        severity,
        message,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("")]
    #[case("lol nice stream")]
    #[case("Help src/a.rs 3 err broken")]
    #[case("helper src/a.rs 3 err broken")]
    #[case("help")]
    #[case("help src/a.rs")]
    #[case("help src/a.rs 3")]
    #[case("help src/a.rs 3 err")]
    #[case("help src/a.rs three err broken")]
    #[case("help src/a.rs 0 err broken")]
    #[case("help src/a.rs -2 err broken")]
    #[case("help src/a.rs 3.5 err broken")]
    #[case("help src/a.rs 3 fatal broken")]
    #[case("help src/a.rs 3 ERR broken")]
    #[case("help src/a.rs 3 error broken")]
    fn rejects_lines_that_are_not_commands(#[case] line: &str) {
        assert_eq!(parse_help(line), None);
    }

    #[rstest]
    #[case("help ../secrets.env 3 err leaked")]
    #[case("help .. 3 err leaked")]
    #[case("help src/../../etc/passwd 3 err leaked")]
    #[case("help notes/a..b.md 3 err leaked")]
    #[case("help /etc/passwd 3 err leaked")]
    #[case("help /src/main.rs 3 err leaked")]
    fn rejects_paths_leaving_the_workspace(#[case] line: &str) {
        assert_eq!(parse_help(line), None);
    }

    #[test]
    fn parses_a_well_formed_command() {
        let request = parse_help("help src/parser.rs 41 warn this loop never ends").unwrap();
        assert_eq!(request.file_path, "src/parser.rs");
        assert_eq!(request.line.get(), 41);
        assert_eq!(request.severity, Severity::Warning);
        assert_eq!(request.message, "this loop never ends");
    }

    #[test]
    fn message_whitespace_collapses() {
        let request = parse_help("help  src/a.rs\t7 hint   look \t at   this").unwrap();
        assert_eq!(request.line.get(), 7);
        assert_eq!(request.message, "look at this");
    }

    #[rstest]
    #[case("err", Severity::Error)]
    #[case("warn", Severity::Warning)]
    #[case("info", Severity::Info)]
    #[case("hint", Severity::Hint)]
    fn maps_each_severity_token(#[case] token: &str, #[case] expected: Severity) {
        let line = format!("help src/a.rs 1 {token} text");
        assert_eq!(parse_help(&line).unwrap().severity, expected);
    }
}
