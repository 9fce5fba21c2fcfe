//! Outgoing MI commands

use std::fmt::Write as _;

/// An MI input command, rendered as `token-operation arg arg...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiCommand {
    operation: &'static str,
    args: Vec<String>,
}

impl MiCommand {
    /// `operation` is the MI name without the leading dash
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Render the wire line, including the trailing newline
    ///
    /// Arguments containing whitespace or quotes are wrapped in a c-string.
    pub fn render(&self, token: u64) -> String {
        let mut line = format!("{}-{}", token, self.operation);
        for arg in &self.args {
            line.push(' ');
            if needs_quoting(arg) {
                line.push('"');
                for c in arg.chars() {
                    match c {
                        '"' | '\\' => {
                            line.push('\\');
                            line.push(c);
                        }
                        '\n' => line.push_str("\\n"),
                        _ => line.push(c),
                    }
                }
                line.push('"');
            } else {
                let _ = write!(line, "{}", arg);
            }
        }
        line.push('\n');
        line
    }
}

fn needs_quoting(arg: &str) -> bool {
    arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '"' || c == '\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_plain_command() {
        let cmd = MiCommand::new("exec-run");
        assert_eq!(cmd.render(5), "5-exec-run\n");
    }

    #[test]
    fn renders_plain_args_unquoted() {
        let cmd = MiCommand::new("break-insert").arg("/box/u1/main.c:10");
        assert_eq!(cmd.render(1), "1-break-insert /box/u1/main.c:10\n");
    }

    #[test]
    fn quotes_args_with_spaces() {
        let cmd = MiCommand::new("var-create")
            .arg("watch")
            .arg("*")
            .arg("(*(struct node *)0x1000)");
        assert_eq!(
            cmd.render(2),
            "2-var-create watch * \"(*(struct node *)0x1000)\"\n"
        );
    }

    #[test]
    fn escapes_quotes_inside_quoted_arg() {
        let cmd = MiCommand::new("interpreter-exec")
            .arg("console")
            .arg(r#"print "hi""#);
        assert_eq!(
            cmd.render(3),
            "3-interpreter-exec console \"print \\\"hi\\\"\"\n"
        );
    }
}
