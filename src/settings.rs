use serde::{Deserialize, Serialize};

/// Resolutions the generation upstream accepts, as "WxH" strings.
#[allow(dead_code)]
pub const VALID_IMAGE_SIZES: [&str; 4] = ["1024x1024", "1280x720", "720x1280", "1280x1280"];

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid image size '{0}'. Valid sizes are: 1024x1024, 1280x720, 720x1280, 1280x1280")]
    InvalidSize(String),
    #[error("Steps must be between 1 and 50, got {0}")]
    StepsOutOfRange(u32),
    #[error("Guidance must be between 1.0 and 20.0, got {0}")]
    GuidanceOutOfRange(f64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1024x1024")]
    Square1024,
    #[serde(rename = "1280x720")]
    Landscape720p,
    #[serde(rename = "720x1280")]
    Portrait720p,
    #[serde(rename = "1280x1280")]
    Square1280,
}

impl ImageSize {
    pub fn parse(value: &str) -> Result<Self, SettingsError> {
        match value {
            "1024x1024" => Ok(ImageSize::Square1024),
            "1280x720" => Ok(ImageSize::Landscape720p),
            "720x1280" => Ok(ImageSize::Portrait720p),
            "1280x1280" => Ok(ImageSize::Square1280),
            other => Err(SettingsError::InvalidSize(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square1024 => "1024x1024",
            ImageSize::Landscape720p => "1280x720",
            ImageSize::Portrait720p => "720x1280",
            ImageSize::Square1280 => "1280x1280",
        }
    }

    /// Width and height in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ImageSize::Square1024 => (1024, 1024),
            ImageSize::Landscape720p => (1280, 720),
            ImageSize::Portrait720p => (720, 1280),
            ImageSize::Square1280 => (1280, 1280),
        }
    }
}

/// Generation parameters as chosen in the client. Replaced wholesale on any
/// change, never partially mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "imageSize", default)]
    pub image_size: ImageSize,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance")]
    pub guidance: f64,
}

fn default_steps() -> u32 {
    4
}

fn default_guidance() -> f64 {
    7.5
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            image_size: ImageSize::default(),
            steps: default_steps(),
            guidance: default_guidance(),
        }
    }
}

impl Settings {
    /// Parses and validates the raw values a request carries. Malformed sizes
    /// and out-of-range values are rejected here so they can never reach the
    /// upstream request shape.
    pub fn from_parts(image_size: &str, steps: u32, guidance: f64) -> Result<Self, SettingsError> {
        let settings = Settings {
            image_size: ImageSize::parse(image_size)?,
            steps,
            guidance,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(1..=50).contains(&self.steps) {
            return Err(SettingsError::StepsOutOfRange(self.steps));
        }
        if !(1.0..=20.0).contains(&self.guidance) {
            return Err(SettingsError::GuidanceOutOfRange(self.guidance));
        }
        Ok(())
    }
}
