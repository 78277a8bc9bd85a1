use std::io::{self, BufRead, IsTerminal, Write};

/// Refuse to prompt when stdin is not a terminal.
pub(crate) fn require_interactive(
    what: &str,
    flag: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if io::stdin().is_terminal() {
        return Ok(());
    }
    Err(format!(
        "refusing to {what} without confirmation in non-interactive mode; use {flag} to skip the prompt"
    )
    .into())
}

/// Numbered menu on stderr. Returns the index of the chosen entry; an empty
/// answer picks `default`.
pub(crate) fn select(
    title: &str,
    choices: &[String],
    default: usize,
) -> Result<usize, Box<dyn std::error::Error>> {
    if choices.is_empty() {
        return Err(format!("nothing to choose from for: {title}").into());
    }
    eprintln!("{title}");
    for (i, choice) in choices.iter().enumerate() {
        eprintln!("  [{}] {choice}", i + 1);
    }
    eprint!("Choice [{}]: ", default + 1);
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    parse_choice(input.trim(), choices.len(), default)
}

fn parse_choice(
    input: &str,
    len: usize,
    default: usize,
) -> Result<usize, Box<dyn std::error::Error>> {
    if input.is_empty() {
        return Ok(default);
    }
    let n: usize = input
        .parse()
        .map_err(|_| format!("invalid choice: '{input}'"))?;
    if n == 0 || n > len {
        return Err(format!("choice out of range: {n}").into());
    }
    Ok(n - 1)
}

/// Ask a yes/no question; anything but `y`/`yes` is a no.
pub(crate) fn confirm(question: &str) -> Result<bool, Box<dyn std::error::Error>> {
    eprint!("{question} [y/N]: ");
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
