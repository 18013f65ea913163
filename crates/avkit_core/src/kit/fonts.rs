//! Font directory registration through a generated fontconfig file.
//!
//! Subtitle rendering filters find fonts through fontconfig. Registering
//! directories writes a `fonts.conf` listing them, plus optional family
//! name mappings, and points `FONTCONFIG_PATH` at it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::session::{SessionError, SessionResult};

/// Environment variable read by fontconfig.
pub const FONTCONFIG_PATH: &str = "FONTCONFIG_PATH";

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Contents of a `fonts.conf` for `dirs` and `mapping` (requested family to
/// substitute family).
pub fn render_fonts_conf(dirs: &[PathBuf], mapping: &BTreeMap<String, String>) -> String {
    let mut conf = String::from(
        "<?xml version=\"1.0\"?>\n<!DOCTYPE fontconfig SYSTEM \"fonts.dtd\">\n<fontconfig>\n    <dir prefix=\"cwd\">.</dir>\n",
    );
    for dir in dirs {
        conf.push_str(&format!(
            "    <dir>{}</dir>\n",
            escape_xml(&dir.display().to_string())
        ));
    }
    for (from, to) in mapping {
        conf.push_str(&format!(
            "    <match target=\"pattern\">\n        <test qual=\"any\" name=\"family\">\n            <string>{}</string>\n        </test>\n        <edit name=\"family\" mode=\"assign\" binding=\"same\">\n            <string>{}</string>\n        </edit>\n    </match>\n",
            escape_xml(from),
            escape_xml(to)
        ));
    }
    conf.push_str("</fontconfig>\n");
    conf
}

/// Write `fonts.conf` into `config_dir` and return the directory to use as
/// `FONTCONFIG_PATH`.
///
/// Directories that do not exist are skipped with a warning; an empty
/// remaining list is an error.
pub fn write_fonts_conf(
    config_dir: &Path,
    dirs: &[PathBuf],
    mapping: &BTreeMap<String, String>,
) -> SessionResult<PathBuf> {
    let existing: Vec<PathBuf> = dirs
        .iter()
        .filter(|dir| {
            let ok = dir.is_dir();
            if !ok {
                tracing::warn!("Font directory {} does not exist", dir.display());
            }
            ok
        })
        .cloned()
        .collect();
    if existing.is_empty() {
        return Err(SessionError::invalid("No valid font directory given"));
    }

    fs::create_dir_all(config_dir)
        .map_err(|e| SessionError::io(format!("creating {}", config_dir.display()), e))?;
    let conf_path = config_dir.join("fonts.conf");
    let tmp_path = config_dir.join("fonts.conf.tmp");
    fs::write(&tmp_path, render_fonts_conf(&existing, mapping))
        .map_err(|e| SessionError::io(format!("writing {}", tmp_path.display()), e))?;
    fs::rename(&tmp_path, &conf_path)
        .map_err(|e| SessionError::io(format!("replacing {}", conf_path.display()), e))?;

    tracing::debug!(
        "Registered {} font directories in {}",
        existing.len(),
        conf_path.display()
    );
    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn renders_dirs_and_mappings() {
        let mut mapping = BTreeMap::new();
        mapping.insert("Arial".to_string(), "Liberation Sans".to_string());
        let conf = render_fonts_conf(&[PathBuf::from("/fonts/a&b")], &mapping);
        assert!(conf.contains("<dir>/fonts/a&amp;b</dir>"));
        assert!(conf.contains("<string>Arial</string>"));
        assert!(conf.contains("<string>Liberation Sans</string>"));
        assert!(conf.trim_end().ends_with("</fontconfig>"));
    }

    #[test]
    fn writes_conf_for_existing_dirs() {
        let fonts = tempdir().unwrap();
        let target = tempdir().unwrap();
        let out = write_fonts_conf(
            &target.path().join("fontconfig"),
            &[fonts.path().to_path_buf(), PathBuf::from("/no/such/fonts")],
            &BTreeMap::new(),
        )
        .unwrap();
        let conf = fs::read_to_string(out.join("fonts.conf")).unwrap();
        assert!(conf.contains(&fonts.path().display().to_string()));
        assert!(!conf.contains("/no/such/fonts"));
    }

    #[test]
    fn no_valid_dir_is_rejected() {
        let target = tempdir().unwrap();
        let err = write_fonts_conf(target.path(), &[PathBuf::from("/no/such")], &BTreeMap::new())
            .unwrap_err();
        assert_eq!(err.code(), crate::error_code::EINVAL);
    }
}
