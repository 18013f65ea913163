//! Loading and saving the settings file.
//!
//! Writes go to a sibling temp file that is then renamed over the target.
//! Section updates re-read the file and swap one table, keeping everything
//! else on disk (including comments) untouched.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

/// Errors from reading or writing the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid settings in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Cannot edit {path}: {source}")]
    Edit {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },

    #[error("No settings file at {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

const HEADER: &str = "# avkit settings\n# Rewritten by avkit; comments inside a section survive section updates.\n";

/// Owns the settings file and the settings loaded from it.
pub struct ConfigManager {
    path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Nothing is read until [`load`](Self::load) or
    /// [`load_or_create`](Self::load_or_create).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory only until [`save`](Self::save) or
    /// [`update_section`](Self::update_section).
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    fn io_error(&self, source: io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn edit_error(&self, source: toml_edit::TomlError) -> ConfigError {
        ConfigError::Edit {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> ConfigResult<String> {
        fs::read_to_string(&self.path).map_err(|e| self.io_error(e))
    }

    /// Read the file; a missing file is an error.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.path.is_file() {
            return Err(ConfigError::NotFound(self.path.clone()));
        }
        let text = self.read()?;
        self.settings = toml::from_str(&text).map_err(|source| ConfigError::Invalid {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Read the file, or write one with defaults when there is none.
    ///
    /// Unknown sections are dropped and missing keys filled in; the cleaned
    /// file is written back.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if !self.path.is_file() {
            self.settings = Settings::default();
            self.save()?;
            tracing::info!("Wrote default settings to {}", self.path.display());
            return Ok(());
        }

        let text = self.read()?;
        let (settings, dirty) = self.normalize(&text)?;
        self.settings = settings;
        if dirty {
            tracing::debug!("Normalizing {}", self.path.display());
            self.save()?;
        }
        Ok(())
    }

    /// Create the session log folder when file logging is on.
    pub fn create_log_folder(&self) -> ConfigResult<()> {
        match self.settings.logging.log_folder() {
            Some(folder) => fs::create_dir_all(&folder).map_err(|source| ConfigError::Io {
                path: folder,
                source,
            }),
            None => Ok(()),
        }
    }

    /// Parse `text`, reporting whether it differs in shape from a complete
    /// settings file.
    fn normalize(&self, text: &str) -> ConfigResult<(Settings, bool)> {
        let on_disk: DocumentMut = text.parse().map_err(|e| self.edit_error(e))?;
        let settings: Settings = toml::from_str(text).map_err(|source| ConfigError::Invalid {
            path: self.path.clone(),
            source,
        })?;

        let unknown: Vec<&str> = on_disk
            .iter()
            .map(|(key, _)| key)
            .filter(|key| ConfigSection::ALL.iter().all(|s| s.table_name() != *key))
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(
                "Dropping unknown sections {:?} from {}",
                unknown,
                self.path.display()
            );
        }

        let complete: DocumentMut = toml::to_string(&settings)?
            .parse()
            .map_err(|e| self.edit_error(e))?;
        let incomplete = ConfigSection::ALL.iter().any(|section| {
            let name = section.table_name();
            let Some(full) = complete.get(name).and_then(Item::as_table) else {
                return false;
            };
            match on_disk.get(name).and_then(Item::as_table) {
                Some(current) => full.iter().any(|(key, _)| !current.contains_key(key)),
                None => true,
            }
        });

        Ok((settings, !unknown.is_empty() || incomplete))
    }

    /// Write every section.
    pub fn save(&self) -> ConfigResult<()> {
        let mut text = String::from(HEADER);
        for section in ConfigSection::ALL {
            text.push_str(&format!("\n# {}\n", section.description()));
            text.push_str(&self.section_toml(section)?);
        }
        self.write(&text)
    }

    /// Replace one section on disk with the in-memory values.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let mut doc = if self.path.is_file() {
            self.read()?.parse::<DocumentMut>().map_err(|e| self.edit_error(e))?
        } else {
            DocumentMut::new()
        };

        let name = section.table_name();
        let mut fresh: DocumentMut = self
            .section_toml(section)?
            .parse()
            .map_err(|e| self.edit_error(e))?;
        let Some(mut item) = fresh.remove(name) else {
            return Ok(());
        };
        // Keep the comment above the section header.
        if let (Some(old), Some(new)) = (doc.get(name).and_then(Item::as_table), item.as_table_mut()) {
            *new.decor_mut() = old.decor().clone();
        }
        doc.insert(name, item);

        self.write(&doc.to_string())
    }

    /// `[name]` table for one section, sub-tables included.
    fn section_toml(&self, section: ConfigSection) -> ConfigResult<String> {
        fn table_of<T: Serialize>(name: &str, value: &T) -> ConfigResult<String> {
            let mut root = toml::Table::new();
            root.insert(name.to_string(), toml::Value::try_from(value)?);
            Ok(toml::to_string_pretty(&root)?)
        }

        let settings = &self.settings;
        let name = section.table_name();
        match section {
            ConfigSection::Engine => table_of(name, &settings.engine),
            ConfigSection::Logging => table_of(name, &settings.logging),
            ConfigSection::Sessions => table_of(name, &settings.sessions),
            ConfigSection::Presets => table_of(name, &settings.presets),
            ConfigSection::Environment => table_of(name, &settings.environment),
        }
    }

    fn write(&self, text: &str) -> ConfigResult<()> {
        let staged = self.path.with_extension("toml.tmp");
        let result = (|| -> io::Result<()> {
            if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            let mut file = fs::File::create(&staged)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
            fs::rename(&staged, &self.path)
        })();
        result.map_err(|e| self.io_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use tempfile::tempdir;

    fn manager_in(dir: &Path) -> ConfigManager {
        ConfigManager::new(dir.join("avkit").join("settings.toml"))
    }

    #[test]
    fn first_load_writes_commented_defaults() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        manager.load_or_create().unwrap();

        let text = fs::read_to_string(manager.path()).unwrap();
        assert!(text.starts_with("# avkit settings"));
        for section in ConfigSection::ALL {
            assert!(text.contains(&format!("# {}", section.description())));
            assert!(text.contains(&format!("[{}]", section.table_name())));
        }

        let mut again = manager_in(dir.path());
        again.load().unwrap();
        assert_eq!(again.settings(), &Settings::default());
    }

    #[test]
    fn unknown_sections_dropped_and_missing_keys_filled() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        fs::create_dir_all(manager.path().parent().unwrap()).unwrap();
        fs::write(
            manager.path(),
            "[sessions]\nhistory_size = 4\n\n[legacy]\nwidth = 3\n",
        )
        .unwrap();

        manager.load_or_create().unwrap();
        assert_eq!(manager.settings().sessions.history_size, 4);

        let text = fs::read_to_string(manager.path()).unwrap();
        assert!(!text.contains("[legacy]"));
        assert!(text.contains("async_concurrency_limit = 10"));
        assert!(text.contains("history_size = 4"));
    }

    #[test]
    fn complete_file_is_left_alone() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        manager.load_or_create().unwrap();
        let path = manager.path().to_path_buf();
        let edited = fs::read_to_string(&path).unwrap() + "# trailing note\n";
        fs::write(&path, &edited).unwrap();

        manager_in(dir.path()).load_or_create().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), edited);
    }

    #[test]
    fn section_update_keeps_disk_edits_elsewhere() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        manager.load_or_create().unwrap();

        let path = manager.path().to_path_buf();
        let text = fs::read_to_string(&path).unwrap().replace(
            "ffmpeg_path = \"ffmpeg\"",
            "ffmpeg_path = \"/opt/ffmpeg/bin/ffmpeg\" # static build",
        );
        fs::write(&path, text).unwrap();

        manager.settings_mut().logging.level = LogLevel::Verbose;
        manager
            .settings_mut()
            .environment
            .font_mapping
            .insert("Arial".into(), "Liberation Sans".into());
        manager.update_section(ConfigSection::Logging).unwrap();
        manager.update_section(ConfigSection::Environment).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"/opt/ffmpeg/bin/ffmpeg\" # static build"));
        assert!(text.contains("level = \"verbose\""));
        assert!(text.contains("# Logging configuration"));

        let mut reloaded = ConfigManager::new(&path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings().engine.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(reloaded.settings().logging.level, LogLevel::Verbose);
        assert_eq!(
            reloaded.settings().environment.font_mapping.get("Arial").map(String::as_str),
            Some("Liberation Sans")
        );
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn invalid_file_names_its_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();
        let err = ConfigManager::new(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("settings.toml"));
    }
}
