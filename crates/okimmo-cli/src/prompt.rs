use std::io::{self, Write};

use anyhow::Result;

/// Read one line from stdin after printing `label: `
pub fn line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Like [`line`], falling back to `default` on empty input
pub fn line_with_default(label: &str, default: Option<&str>) -> Result<String> {
    let Some(default) = default else {
        return line(label);
    };
    let input = line(&format!("{} [{}]", label, default))?;
    Ok(if input.is_empty() {
        default.to_string()
    } else {
        input
    })
}

pub fn password(prompt: &str) -> Result<String> {
    Ok(rpassword::prompt_password(prompt)?)
}
