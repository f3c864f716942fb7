//! POSIX shell helpers

use crate::{error::Result, run::run};

/// Run `cmd` through `/bin/sh -c`, output forwarded to the host
pub async fn sh(cmd: &str) -> Result<()> {
    run(["/bin/sh", "-c", cmd]).await
}

/// Quote `s` as a single shell word
pub fn sh_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sh_quote() {
        assert_eq!(sh_quote(""), "''");
        assert_eq!(sh_quote("plain"), "'plain'");
        assert_eq!(sh_quote("it's"), r#"'it'"'"'s'"#);
        assert_eq!(sh_quote("$HOME; rm -rf /"), "'$HOME; rm -rf /'");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_quoted_word_survives_shell() {
        let word = "a 'tricky' $word \"here\"";
        let script = format!("printf %s {}", sh_quote(word));
        let out = crate::run_get(["/bin/sh", "-c", script.as_str()])
            .await
            .unwrap();
        assert_eq!(out, word.as_bytes());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sh() {
        sh("exit 0").await.unwrap();
        assert_eq!(sh("exit 5").await.unwrap_err().exit_code(), Some(5));
    }
}
