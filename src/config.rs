use std::path::{Path, PathBuf};

use crate::components::tools::{BrushSettings, EdgePolicy, QueuePolicy};

/// Persistent user settings, stored as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub brush_radius: u32,
    /// 0.0–1.0
    pub brush_strength: f32,
    pub queue_policy: QueuePolicy,
    pub edge_policy: EdgePolicy,
    pub max_undo_steps: usize,
    /// Default severity for the near-colour merge pass.
    pub merge_severity: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brush_radius: 1,
            brush_strength: 1.0,
            queue_policy: QueuePolicy::Unbounded,
            edge_policy: EdgePolicy::Linear,
            max_undo_steps: 50,
            merge_severity: 0,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/maplegend/maplegend_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\MapLegend\maplegend_settings.cfg
    /// On macOS:   ~/Library/Application Support/MapLegend/maplegend_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("maplegend");
            return Some(config_dir.join("maplegend_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("MapLegend").join("maplegend_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("MapLegend")
                    .join("maplegend_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("maplegend_settings.cfg")))
        }
    }

    pub fn brush(&self) -> BrushSettings {
        BrushSettings {
            radius: self.brush_radius,
            strength: self.brush_strength,
            edge: self.edge_policy,
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "brush_radius={}\n\
             brush_strength={}\n\
             queue_policy={}\n\
             edge_policy={}\n\
             max_undo_steps={}\n\
             merge_severity={}\n",
            self.brush_radius,
            self.brush_strength,
            self.queue_policy.name(),
            self.edge_policy.name(),
            self.max_undo_steps,
            self.merge_severity,
        )
    }

    /// Parse settings text. Unknown keys and bad values fall back to defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "brush_radius" => {
                    s.brush_radius = val.parse().unwrap_or(s.brush_radius);
                }
                "brush_strength" => {
                    s.brush_strength = val
                        .parse::<f32>()
                        .map(|v| v.clamp(0.0, 1.0))
                        .unwrap_or(s.brush_strength);
                }
                "queue_policy" => {
                    s.queue_policy = QueuePolicy::from_name(val).unwrap_or(s.queue_policy);
                }
                "edge_policy" => {
                    s.edge_policy = EdgePolicy::from_name(val).unwrap_or(s.edge_policy);
                }
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().unwrap_or(s.max_undo_steps);
                }
                "merge_severity" => {
                    s.merge_severity = val.parse().unwrap_or(s.merge_severity);
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to the per-user settings file. Returns where they went.
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let path = Self::settings_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no settings directory")
        })?;
        if let Err(e) = self.save_to(&path) {
            log_warn!("Could not write settings to {}: {}", path.display(), e);
            return Err(e);
        }
        log_info!("Saved settings to {}", path.display());
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_text() {
        let s = Settings {
            brush_radius: 7,
            brush_strength: 0.25,
            queue_policy: QueuePolicy::Coalesce,
            edge_policy: EdgePolicy::Clipped,
            max_undo_steps: 12,
            merge_severity: 3,
        };
        assert_eq!(Settings::from_config_str(&s.to_config_string()), s);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let s = Settings::from_config_str(
            "brush_radius=abc\nbrush_strength=9\nqueue_policy=weird\nnot a line\nmerge_severity=4\n",
        );
        assert_eq!(s.brush_radius, 1);
        assert_eq!(s.brush_strength, 1.0);
        assert_eq!(s.queue_policy, QueuePolicy::Unbounded);
        assert_eq!(s.merge_severity, 4);
    }

    #[test]
    fn test_save_to_creates_directory() {
        let dir = std::env::temp_dir().join(format!("maplegend_cfg_{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("maplegend_settings.cfg");
        let s = Settings {
            merge_severity: 9,
            ..Settings::default()
        };
        s.save_to(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(Settings::from_config_str(&text), s);
    }
}
