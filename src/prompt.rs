use anyhow::Result;
use std::io::{self, BufRead, Write};

/// Прочитать строку без завершающего перевода строки
pub fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let mut s = String::new();
    io::stdin().lock().read_line(&mut s)?;
    let trimmed = s.trim_end_matches(['\r', '\n']).len();
    s.truncate(trimmed);
    Ok(s)
}

/// Скрытый ввод (базовый пароль не должен попадать на экран)
pub fn prompt_secret(prompt: &str) -> Result<String> {
    Ok(rpassword::prompt_password(prompt)?)
}

pub fn confirm(prompt: &str) -> Result<bool> {
    let answer = prompt_line(&format!("{prompt} [y/N]: "))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
