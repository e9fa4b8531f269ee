use anyhow::{Result, bail};
use cartsync_core::SyncError;
use regex::Regex;

use crate::settings::{MAX_DEBOUNCE_MS, Settings};

/// Compile `ignore_list` entries into regexes, failing on the first bad one.
pub fn compile_ignore_list(patterns: &[String]) -> Result<Vec<Regex>, SyncError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| SyncError::InvalidIgnorePattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Validate merged settings before a session uses them.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    compile_ignore_list(&settings.upload.ignore_list)?;
    if settings.upload.debounce_ms > MAX_DEBOUNCE_MS {
        bail!("upload.debounce_ms must be at most {MAX_DEBOUNCE_MS}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        validate_settings(&Settings::default()).unwrap();
    }

    #[test]
    fn test_default_ignore_list_matches_expected_paths() {
        let regexes = compile_ignore_list(&Settings::default().upload.ignore_list).unwrap();
        let ignored = |path: &str| regexes.iter().any(|r| r.is_match(path));

        assert!(ignored("node_modules/lodash/index.js"));
        assert!(ignored(".git/HEAD"));
        assert!(ignored("static/bundle.zip"));
        assert!(!ignored("cartridge/scripts/app.js"));
        assert!(!ignored("static/archive.zip.bak"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let mut settings = Settings::default();
        settings.upload.ignore_list.push("(unclosed".to_string());

        let err = validate_settings(&settings).unwrap_err();
        let sync_err = err.downcast_ref::<SyncError>().unwrap();
        assert!(matches!(
            sync_err,
            SyncError::InvalidIgnorePattern { pattern, .. } if pattern == "(unclosed"
        ));
    }

    #[test]
    fn test_oversized_debounce_is_rejected() {
        let mut settings = Settings::default();
        settings.upload.debounce_ms = MAX_DEBOUNCE_MS + 1;
        assert!(validate_settings(&settings).is_err());
        settings.upload.debounce_ms = 0;
        assert!(validate_settings(&settings).is_ok());
    }
}
