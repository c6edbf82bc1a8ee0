use anyhow::Result;
use std::io::{self, BufRead, Write};

fn read_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

pub fn prompt_secret(label: &str) -> Result<String> {
    // Plain stdin; the key is echoed.
    read_line(label)
}

/// `[y/N]` question; anything but y/yes is a no.
pub fn confirm(question: &str) -> Result<bool> {
    let answer = read_line(&format!("{question} [y/N]"))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// All of stdin, for piped backups.
pub fn read_stdin() -> Result<String> {
    let mut out = String::new();
    for line in io::stdin().lock().lines() {
        out.push_str(&line?);
        out.push('\n');
    }
    Ok(out)
}
