// ============================================================
// Layer 3 — CommandLine
// ============================================================
// A fully assembled process invocation: the program, its
// arguments, and the extra environment variables the child
// should see. Nothing is spawned here; the infra layer's
// CommandRunner turns this into a real process.
//
// Display renders a copy-pasteable shell line, used by
// --dry-run and by the launch record:
//
//   CUDA_VISIBLE_DEVICES=1,2 torchx run -s local_cwd ...

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,

    /// Variables added to the child's environment only
    pub env: Vec<(String, String)>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `--flag value`.
    pub fn flag(self, name: &str, value: impl Into<String>) -> Self {
        self.arg(name).arg(value)
    }

    /// Append `--flag` only when `on` is true.
    pub fn switch(self, name: &str, on: bool) -> Self {
        if on {
            self.arg(name)
        } else {
            self
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Look up a child environment variable set on this command.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value following `name` in the argument list, if present.
    #[cfg(test)]
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == name)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.env {
            write!(f, "{}={} ", k, shell_quote(v))?;
        }
        f.write_str(&shell_quote(&self.program))?;
        for a in &self.args {
            write!(f, " {}", shell_quote(a))?;
        }
        Ok(())
    }
}

/// Quote `s` for a POSIX shell when it contains anything unusual.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ',' | '=' | ':' | '+' | '@')
        });
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_env_and_quoting() {
        let cmd = CommandLine::new("docker")
            .arg("run")
            .flag("--gpus", "\"device=0,1\"")
            .env("CUDA_VISIBLE_DEVICES", "0,1");
        assert_eq!(
            cmd.to_string(),
            r#"CUDA_VISIBLE_DEVICES=0,1 docker run --gpus '"device=0,1"'"#
        );
    }

    #[test]
    fn test_switch_and_flag_value() {
        let cmd = CommandLine::new("t")
            .switch("--kaggle", true)
            .switch("--pin_memory", false)
            .flag("--batch_size", "16384");
        assert_eq!(cmd.args, vec!["--kaggle", "--batch_size", "16384"]);
        assert_eq!(cmd.flag_value("--batch_size"), Some("16384"));
        assert_eq!(cmd.flag_value("--pin_memory"), None);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain/path_1.txt"), "plain/path_1.txt");
        assert_eq!(shell_quote("two words"), "'two words'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
