//! Confirmation prompts for destructive CLI actions.

use anyhow::{Context, Result};

use super::RealRuntime;

use std::io::{self, BufRead, Write};

/// Asks `prompt` on `output` and reads one answer line from `input`.
///
/// Only "y" and "yes" (any case, surrounding whitespace ignored) confirm.
/// End of input counts as "no".
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{} [y/N] ", prompt).context("Failed to write prompt")?;
    output.flush().context("Failed to flush prompt")?;

    let mut answer = String::new();
    if input.read_line(&mut answer).context("Failed to read answer")? == 0 {
        return Ok(false);
    }

    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

impl RealRuntime {
    pub(crate) fn confirm_impl(&self, prompt: &str) -> Result<bool> {
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        confirm_with_io(prompt, &mut stdin.lock(), &mut stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::confirm_with_io;
    use std::io::Cursor;

    fn answer(input: &str) -> (bool, String) {
        let mut reader = Cursor::new(input.as_bytes());
        let mut written = Vec::new();
        let confirmed = confirm_with_io("Uninstall requests?", &mut reader, &mut written).unwrap();
        (confirmed, String::from_utf8(written).unwrap())
    }

    #[test]
    fn accepts_yes_variants() {
        for input in ["y\n", "Y\n", "yes\n", "  YES \n"] {
            assert!(answer(input).0, "{:?} should confirm", input);
        }
    }

    #[test]
    fn rejects_everything_else() {
        for input in ["n\n", "\n", "yep\n", "no\n"] {
            assert!(!answer(input).0, "{:?} should not confirm", input);
        }
    }

    #[test]
    fn end_of_input_is_no() {
        assert!(!answer("").0);
    }

    #[test]
    fn prompt_is_written() {
        assert_eq!(answer("n\n").1, "Uninstall requests? [y/N] ");
    }
}
