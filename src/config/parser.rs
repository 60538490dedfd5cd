use crate::config::types::GrabSettings;
use crate::ConfigResult;
use std::fs;
use std::path::Path;

/// Loads default settings from a TOML file.
///
/// A missing file is not an error; built-in defaults are returned so a bare
/// installation works without any configuration.
pub fn load_settings(path: &Path) -> ConfigResult<GrabSettings> {
    if !path.exists() {
        tracing::debug!("No settings file at {}, using defaults", path.display());
        return Ok(GrabSettings::default());
    }

    let content = fs::read_to_string(path)?;
    let settings: GrabSettings = toml::from_str(&content)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = load_settings(Path::new("/nonexistent/markgrab.toml")).unwrap();
        assert_eq!(settings.user_agent, "MarkGrabBot/1.0");
        assert_eq!(settings.max_pages, 100);
    }

    #[test]
    fn test_load_settings_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markgrab.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
user-agent = "CustomBot/3.0"
markdown-folder = "out"
max-pages = 7
"#
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.user_agent, "CustomBot/3.0");
        assert_eq!(settings.markdown_folder, "out");
        assert_eq!(settings.max_pages, 7);
        // unspecified fields keep defaults
        assert_eq!(settings.crawl_limit, 500);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "user-agent = [broken").unwrap();
        assert!(load_settings(&path).is_err());
    }
}
