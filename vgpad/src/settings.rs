use vgpad_core::CoreSettings;

const DOCUMENTATION: &str = r"# vgpad settings. You may edit this file, but be aware that formatting and comments will not
# be preserved. Missing keys take their default values.

# undo_limit       - steps of undo history kept, 0 for unlimited.
# hit_tolerance    - pick distance, in display pixels.
# snap_tolerance   - distance under which new points snap onto existing vertices, in display pixels.
# pretty_json      - indent saved documents and recordings.
# playback_speed   - multiplier on the recorded frame timing during playback.
# test_shape_count - shapes added by the test grid.

";

#[must_use]
pub fn preferences_dir() -> Option<std::path::PathBuf> {
    let mut base_dir = dirs::preference_dir()?;
    base_dir.push(env!("CARGO_PKG_NAME"));
    Some(base_dir)
}

pub struct Settings {
    failed_to_load: bool,
    pub core: CoreSettings,
}
impl Settings {
    const FILENAME: &'static str = "settings.toml";
    /// Settings from the preferences file, read on first use. Defaults if the file is missing or unusable.
    #[must_use]
    pub fn get() -> &'static Self {
        static GLOBAL_SETTINGS: std::sync::OnceLock<Settings> = std::sync::OnceLock::new();

        GLOBAL_SETTINGS.get_or_init(|| {
            let mut dir = preferences_dir();
            match dir.as_mut() {
                None => Self::defaulted(),
                Some(dir) => {
                    dir.push(Self::FILENAME);
                    Self::load_or_default(dir)
                }
            }
        })
    }
    #[must_use]
    fn defaulted() -> Self {
        log::warn!("Settings weren't available, defaulting.");
        Self {
            failed_to_load: true,
            core: CoreSettings::default(),
        }
    }
    #[must_use]
    fn load_or_default(path: &std::path::Path) -> Self {
        let core: anyhow::Result<CoreSettings> = try_block::try_block! {
            let string = std::fs::read_to_string(path)?;
            let core : CoreSettings = toml::from_str(&string)?;
            core.validate()?;

            Ok(core)
        };

        match core {
            Ok(core) => Self {
                failed_to_load: false,
                core,
            },
            Err(e) => {
                log::debug!("{}: {e}", path.display());
                Self::defaulted()
            }
        }
    }
    /// Whether defaults are in use because the file couldn't be read.
    #[must_use]
    pub fn did_fail_to_load(&self) -> bool {
        self.failed_to_load
    }
    pub fn save(&self) -> anyhow::Result<()> {
        let mut preferences =
            preferences_dir().ok_or_else(|| anyhow::anyhow!("No preferences dir found"))?;
        // Only our own directory is created, never the preferences root. An existing directory is fine,
        // real failures surface at the write.
        let _ = std::fs::DirBuilder::new().create(&preferences);

        preferences.push(Self::FILENAME);
        let string = DOCUMENTATION.to_owned() + &toml::ser::to_string_pretty(&self.core)?;
        std::fs::write(preferences, string)?;
        Ok(())
    }
}
