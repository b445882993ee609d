//! Pre-flight confirmation before executing generated code.

use std::io::{BufRead, Write};

use tracing::{info, warn};

/// Asks the user to confirm the run.
///
/// Returns `true` to proceed. Re-prompts on anything other than y, n, yes,
/// or no (case-insensitive). End of input counts as "no".
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> std::io::Result<bool> {
    loop {
        write!(output, "Continue? [y/n] ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}

/// Warns about executing untrusted code and, unless bypassed, asks for
/// confirmation on the given streams.
pub fn gate<R: BufRead, W: Write>(
    yes_to_all: bool,
    input: &mut R,
    output: &mut W,
) -> std::io::Result<bool> {
    warn!(
        "This will compile and run code generated by an LLM. \
         It is recommended that you run it in a sandboxed environment."
    );
    if yes_to_all {
        return Ok(true);
    }
    let proceed = confirm(input, output)?;
    if !proceed {
        info!("Exiting.");
    }
    Ok(proceed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(answers: &str) -> (bool, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = confirm(&mut input, &mut output).unwrap();
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_accepts_yes_variants() {
        assert!(ask("y\n").0);
        assert!(ask("YES\n").0);
        assert!(ask("  Yes  \n").0);
    }

    #[test]
    fn test_accepts_no_variants() {
        assert!(!ask("n\n").0);
        assert!(!ask("No\n").0);
    }

    #[test]
    fn test_reprompts_on_unrecognized_input() {
        let (result, printed) = ask("maybe\n\nyes\n");
        assert!(result);
        assert_eq!(printed.matches("Continue? [y/n]").count(), 3);
    }

    #[test]
    fn test_eof_is_no() {
        let (result, _) = ask("");
        assert!(!result);
        let (result, _) = ask("what\n");
        assert!(!result);
    }

    #[test]
    fn test_gate_bypass_does_not_read() {
        let mut input = Cursor::new(b"n\n".to_vec());
        let mut output = Vec::new();
        assert!(gate(true, &mut input, &mut output).unwrap());
        assert!(output.is_empty());
    }
}
