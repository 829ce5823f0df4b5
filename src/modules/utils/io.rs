use std::io::{self, Write};

/// Read one trimmed line from stdin; `None` once input is exhausted
pub fn read_line() -> io::Result<Option<String>> {
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Print a prompt without a newline and read the answer
pub fn prompt(label: &str) -> io::Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;
    read_line()
}

/// Basic shape check for an email address
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
        && !domain.contains('@')
        && email.len() >= 5
}

/// Split a shell line into words, honouring double quotes
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("user+tag@example.co.uk"));

        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user example.com"));
        assert!(!is_valid_email("user"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@.com"));
    }

    #[test]
    fn test_split_words_keeps_quoted_phrases() {
        assert_eq!(
            split_words(r#"register alice Secr3t! "Alice A" a@x.com"#),
            vec!["register", "alice", "Secr3t!", "Alice A", "a@x.com"]
        );
        assert!(split_words("   ").is_empty());
    }
}
