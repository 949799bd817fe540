//! Tuning values for a [`crate::view::CoreView`]. Hosts decide where these come from.

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CoreSettings {
    /// Steps of undo history kept. Zero keeps everything.
    pub undo_limit: usize,
    /// Pick distance, in display pixels.
    pub hit_tolerance: f32,
    /// Distance under which points snap to existing vertices, in display pixels.
    pub snap_tolerance: f32,
    /// Indent saved content.
    pub pretty_json: bool,
    /// Multiplier on the recorded tick rate during playback.
    pub playback_speed: f32,
    /// How many shapes [`crate::view::CoreView::add_shapes_for_test`] creates.
    pub test_shape_count: usize,
}
impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            undo_limit: 100,
            hit_tolerance: 8.0,
            snap_tolerance: 4.0,
            pretty_json: true,
            playback_speed: 1.0,
            test_shape_count: 100,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
    #[error("{field} must be {requirement}, got {value}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: f32,
    },
}

impl CoreSettings {
    #[must_use]
    pub fn undo_limit(&self) -> Option<usize> {
        (self.undo_limit != 0).then_some(self.undo_limit)
    }
    /// Check values a file may have gotten wrong.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let checks = [
            ("hit_tolerance", "positive", self.hit_tolerance, self.hit_tolerance > 0.0),
            ("snap_tolerance", "zero or more", self.snap_tolerance, self.snap_tolerance >= 0.0),
            ("playback_speed", "positive", self.playback_speed, self.playback_speed > 0.0),
        ];
        // NaN fails every comparison, so it's caught here too.
        match checks.into_iter().find(|&(.., ok)| !ok) {
            Some((field, requirement, value, _)) => Err(SettingsError::OutOfRange {
                field,
                requirement,
                value,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partial_files_fill_in_defaults() {
        let settings: CoreSettings = serde_json::from_str(r#"{ "undo_limit": 0, "playback_speed": 2.0 }"#).unwrap();
        assert_eq!(settings.undo_limit(), None);
        assert_eq!(settings.playback_speed, 2.0);
        assert_eq!(settings.hit_tolerance, CoreSettings::default().hit_tolerance);
        assert_eq!(settings.validate(), Ok(()));
    }
    #[test]
    fn bad_values_are_named() {
        let settings = CoreSettings {
            playback_speed: f32::NAN,
            ..CoreSettings::default()
        };
        let Err(SettingsError::OutOfRange { field, .. }) = settings.validate() else {
            panic!("NaN speed accepted");
        };
        assert_eq!(field, "playback_speed");
    }
}
