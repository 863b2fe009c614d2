//! Runtime configuration.
//!
//! Values come from the environment (a `.env` file is loaded first by the
//! binary through `dotenvy`). Every variable is optional.
//!
//! | Variable                  | Default | Meaning                                 |
//! |---------------------------|---------|-----------------------------------------|
//! | `CONVERSOR_OUTPUT_DIR`    | `tmp`   | Where generated workbooks are written   |
//! | `CONVERSOR_PREVIEW_ROWS`  | `10`    | Rows returned as preview (header incl.) |
//! | `CONVERSOR_STRICT_DATES`  | `false` | Report dates that could not be parsed   |
//! | `CONVERSOR_MAX_UPLOAD_MB` | `20`    | Upload size limit for the HTTP server   |

use std::env;
use std::path::PathBuf;

use crate::transform::pipeline::ConvertOptions;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub preview_rows: usize,
    pub strict_dates: bool,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("tmp"),
            preview_rows: 10,
            strict_dates: false,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let output_dir = lookup("CONVERSOR_OUTPUT_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let preview_rows = lookup("CONVERSOR_PREVIEW_ROWS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.preview_rows);

        let strict_dates = lookup("CONVERSOR_STRICT_DATES")
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.strict_dates);

        let max_upload_bytes = lookup("CONVERSOR_MAX_UPLOAD_MB")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|mb| mb.checked_mul(1024 * 1024))
            .unwrap_or(defaults.max_upload_bytes);

        Self {
            output_dir,
            preview_rows,
            strict_dates,
            max_upload_bytes,
        }
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            preview_rows: self.preview_rows,
            strict_dates: self.strict_dates,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.output_dir, PathBuf::from("tmp"));
        assert_eq!(cfg.preview_rows, 10);
        assert!(!cfg.strict_dates);
        assert_eq!(cfg.max_upload_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("CONVERSOR_OUTPUT_DIR", "/var/conversor"),
            ("CONVERSOR_PREVIEW_ROWS", "25"),
            ("CONVERSOR_STRICT_DATES", "Yes"),
            ("CONVERSOR_MAX_UPLOAD_MB", "5"),
        ]);
        assert_eq!(cfg.output_dir, PathBuf::from("/var/conversor"));
        assert_eq!(cfg.preview_rows, 25);
        assert!(cfg.strict_dates);
        assert_eq!(cfg.max_upload_bytes, 5 * 1024 * 1024);

        let options = cfg.convert_options();
        assert_eq!(options.preview_rows, 25);
        assert!(options.strict_dates);
    }

    #[test]
    fn test_oversized_upload_limit_falls_back() {
        let huge = (usize::MAX / 2).to_string();
        let cfg = config(&[("CONVERSOR_MAX_UPLOAD_MB", huge.as_str())]);
        assert_eq!(cfg.max_upload_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let cfg = config(&[("CONVERSOR_PREVIEW_ROWS", "many"), ("CONVERSOR_STRICT_DATES", "nope")]);
        assert_eq!(cfg.preview_rows, 10);
        assert!(!cfg.strict_dates);
    }
}
