use crate::geometry::{Point, Size};
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Straight run out of a left/right handle before the first turn.
    pub clearance: f32,
    /// How far a blocked mid-lane is pushed down per retry.
    pub lane_step: f32,
    pub lane_attempts: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            clearance: 50.0,
            lane_step: 50.0,
            lane_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub column_spacing: f32,
    pub row_spacing: f32,
    pub course_size: Size,
    pub header_size: Size,
    pub header_y: f32,
    pub title_position: Point,
    pub years: u8,
    pub semesters_per_year: u8,
}

impl LayoutConfig {
    /// Empty band between two stacked course rows.
    pub fn row_gap(&self) -> f32 {
        (self.row_spacing - self.course_size.height).max(0.0)
    }

    /// Empty band between two adjacent term columns.
    pub fn column_gap(&self) -> f32 {
        (self.column_spacing - self.course_size.width).max(0.0)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            column_spacing: 300.0,
            row_spacing: 150.0,
            course_size: Size::new(200.0, 100.0),
            header_size: Size::new(200.0, 50.0),
            header_y: -100.0,
            title_position: Point::new(1050.0, -180.0),
            years: 4,
            semesters_per_year: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SizeLimits {
    pub min: Size,
    pub max: Size,
}

impl SizeLimits {
    pub fn clamp(&self, size: Size) -> Size {
        Size::new(
            size.width.clamp(self.min.width, self.max.width.max(self.min.width)),
            size.height.clamp(self.min.height, self.max.height.max(self.min.height)),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingConfig {
    pub grid_size: f32,
    pub history_capacity: usize,
    pub course_limits: SizeLimits,
    pub header_limits: SizeLimits,
    pub text_limits: SizeLimits,
    pub new_text: String,
    pub new_text_font_size: f32,
    pub new_text_color: String,
    pub new_text_spawn: Point,
    pub new_text_size: Size,
    pub font_size_presets: Vec<f32>,
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            grid_size: 50.0,
            history_capacity: 20,
            course_limits: SizeLimits {
                min: Size::new(150.0, 60.0),
                max: Size::new(300.0, 200.0),
            },
            header_limits: SizeLimits {
                min: Size::new(150.0, 40.0),
                max: Size::new(300.0, 60.0),
            },
            text_limits: SizeLimits {
                min: Size::new(50.0, 30.0),
                max: Size::new(f32::MAX, f32::MAX),
            },
            new_text: "New Text".to_string(),
            new_text_font_size: 16.0,
            new_text_color: "#000000".to_string(),
            new_text_spawn: Point::new(500.0, 100.0),
            new_text_size: Size::new(100.0, 30.0),
            font_size_presets: vec![12.0, 16.0, 20.0, 24.0],
        }
    }
}

impl EditingConfig {
    /// Whether the font size menu offers `size`. An empty preset list allows any size.
    pub fn is_font_size_preset(&self, size: f32) -> bool {
        self.font_size_presets.is_empty()
            || self
                .font_size_presets
                .iter()
                .any(|preset| (preset - size).abs() < f32::EPSILON)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub padding: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { padding: 80.0 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub routing: RoutingConfig,
    pub editing: EditingConfig,
    pub export: ExportConfig,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };

    let contents = std::fs::read_to_string(path)?;
    let is_json5 = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json5"))
        .unwrap_or(false);
    let config: EditorConfig = if is_json5 {
        json5::from_str(&contents)?
    } else {
        serde_json::from_str(&contents)?
    };
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}
