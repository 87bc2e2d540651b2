//! Secure Terminal Input
//!
//! Secure flags prompt for their value on the terminal after the main parse,
//! with echo disabled. The reader is injectable so tests and embedded hosts
//! never touch a real terminal. Echo state is restored through an RAII guard
//! on every exit path.

use std::io::{self, BufRead, Write};

/// Source of secret values. The parser prompts through this after parsing.
pub trait SecureReader {
    fn read_secret(&mut self, prompt: &str) -> io::Result<String>;
}

/// A request queued during validation for a required secure flag that was
/// not supplied on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureRequest {
    pub flag_key: String,
    pub prompt: String,
}

/// Reads from the controlling terminal with echo disabled.
#[derive(Debug, Default)]
pub struct TerminalReader;

#[cfg(unix)]
mod echo {
    /// Disables terminal echo for the lifetime of the guard.
    pub struct EchoGuard {
        fd: i32,
        saved: Option<libc::termios>,
    }

    impl EchoGuard {
        pub fn disable(fd: i32) -> Self {
            // SAFETY: tcgetattr/tcsetattr on a file descriptor we own for the
            // duration of the call; the struct is zero-initialized first.
            unsafe {
                let mut term: libc::termios = std::mem::zeroed();
                if libc::isatty(fd) == 0 || libc::tcgetattr(fd, &mut term) != 0 {
                    return Self { fd, saved: None };
                }
                let saved = term;
                term.c_lflag &= !libc::ECHO;
                if libc::tcsetattr(fd, libc::TCSANOW, &term) != 0 {
                    return Self { fd, saved: None };
                }
                Self {
                    fd,
                    saved: Some(saved),
                }
            }
        }
    }

    impl Drop for EchoGuard {
        fn drop(&mut self) {
            if let Some(saved) = self.saved.take() {
                // SAFETY: restoring the attributes captured above.
                unsafe {
                    libc::tcsetattr(self.fd, libc::TCSANOW, &saved);
                }
            }
        }
    }
}

impl SecureReader for TerminalReader {
    fn read_secret(&mut self, prompt: &str) -> io::Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{}", prompt)?;
        stderr.flush()?;

        #[cfg(unix)]
        let _guard = echo::EchoGuard::disable(libc::STDIN_FILENO);

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        writeln!(stderr)?;

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

/// Canned reader for tests and non-interactive hosts: hands out the queued
/// values in order.
#[derive(Debug, Default)]
pub struct QueuedReader {
    values: std::collections::VecDeque<String>,
    pub prompts: Vec<String>,
}

impl QueuedReader {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }
}

impl SecureReader for QueuedReader {
    fn read_secret(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        self.values.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no more queued secrets")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_reader_hands_out_in_order() {
        let mut reader = QueuedReader::new(["first", "second"]);
        assert_eq!(reader.read_secret("a: ").unwrap(), "first");
        assert_eq!(reader.read_secret("b: ").unwrap(), "second");
        assert!(reader.read_secret("c: ").is_err());
        assert_eq!(reader.prompts, vec!["a: ", "b: ", "c: "]);
    }
}
