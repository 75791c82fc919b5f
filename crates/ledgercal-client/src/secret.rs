//! Secret references in `config.toml`.
//!
//! A value such as the Google access token may name where the secret lives
//! instead of holding it:
//!
//! - `pass::path/in/store`: first line of `pass show path/in/store`
//! - `env::VAR_NAME`: the value of `$VAR_NAME`
//! - anything else is used verbatim

/// Expands a possibly indirect secret value.
pub fn resolve(value: &str) -> Result<String, String> {
    match value.split_once("::") {
        Some(("pass", path)) => from_pass(path),
        Some(("env", var)) => {
            std::env::var(var).map_err(|_| format!("environment variable `{var}` is not set"))
        }
        _ => Ok(value.to_string()),
    }
}

/// True if `value` points elsewhere rather than holding the secret.
pub fn is_reference(value: &str) -> bool {
    value.starts_with("pass::") || value.starts_with("env::")
}

fn from_pass(path: &str) -> Result<String, String> {
    let output = std::process::Command::new("pass")
        .args(["show", path])
        .output()
        .map_err(|e| format!("failed to run `pass show {path}`: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "`pass show {path}` exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("`pass show {path}` printed nothing"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(resolve("ya29.token").unwrap(), "ya29.token");
        assert_eq!(resolve("").unwrap(), "");
        // only known schemes are references
        assert_eq!(resolve("vault::x").unwrap(), "vault::x");
        assert!(!is_reference("vault::x"));
    }

    #[test]
    fn env_reference() {
        unsafe {
            std::env::set_var("_LEDGERCAL_TEST_TOKEN", "from-env");
        }
        assert!(is_reference("env::_LEDGERCAL_TEST_TOKEN"));
        assert_eq!(resolve("env::_LEDGERCAL_TEST_TOKEN").unwrap(), "from-env");
        unsafe {
            std::env::remove_var("_LEDGERCAL_TEST_TOKEN");
        }
    }

    #[test]
    fn missing_env_var() {
        let err = resolve("env::_LEDGERCAL_UNSET_VAR_12345").unwrap_err();
        assert!(err.contains("not set"));
    }

    #[test]
    fn failing_pass_lookup() {
        assert!(resolve("pass::ledgercal/does/not/exist/12345").is_err());
    }
}
