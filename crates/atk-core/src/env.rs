// ATK Core - Environment variable expansion for configuration values

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static pattern is valid"))
}

/// Expand `${VAR_NAME}` patterns from the process environment.
///
/// Unset variables are left as written so a missing credential is visible
/// in validation errors rather than silently becoming empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut result = value.to_string();

    for cap in pattern().captures_iter(value) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(var_value) => result = result.replace(&cap[0], &var_value),
            Err(_) => debug!(var = %var_name, "Environment variable not set, leaving pattern"),
        }
    }

    result
}
