use serde::{Deserialize, Serialize};

const EDGE_PALETTE: [&str; 10] = [
    "#3b82f6", "#ef4444", "#10b981", "#f59e0b", "#8b5cf6", "#ec4899", "#06b6d4", "#f97316",
    "#6366f1", "#14b8a6",
];

const PRESET_COLORS: [&str; 7] = [
    "#3b82f6", "#ef4444", "#10b981", "#f59e0b", "#8b5cf6", "#ec4899", "#06b6d4",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePalette {
    pub fill: String,
    pub border: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub course: NodePalette,
    pub major_elective: NodePalette,
    pub free_elective: NodePalette,
    pub header_text: String,
    pub title_text: String,
    pub or_badge_fill: String,
    pub or_badge_text: String,
    pub selection_highlight: String,
    pub handle_fill: String,
    pub edge_palette: Vec<String>,
    pub preset_colors: Vec<String>,
}

impl Theme {
    pub fn study_plan() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 14.0,
            background: "#FAFAFA".to_string(),
            course: NodePalette {
                fill: "#FFFFFF".to_string(),
                border: "#E2E8F0".to_string(),
                text: "#1C2430".to_string(),
            },
            major_elective: NodePalette {
                fill: "#EBF4FF".to_string(),
                border: "#93C5FD".to_string(),
                text: "#1E40AF".to_string(),
            },
            free_elective: NodePalette {
                fill: "#ECFDF5".to_string(),
                border: "#6EE7B7".to_string(),
                text: "#065F46".to_string(),
            },
            header_text: "#1F2A5A".to_string(),
            title_text: "#000000".to_string(),
            or_badge_fill: "#C8102E".to_string(),
            or_badge_text: "#FFFFFF".to_string(),
            selection_highlight: "#fbbf24".to_string(),
            handle_fill: "#3b82f6".to_string(),
            edge_palette: EDGE_PALETTE.iter().map(|c| c.to_string()).collect(),
            preset_colors: PRESET_COLORS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Default stroke for an edge without a custom color, stable per edge id.
    pub fn edge_color(&self, edge_id: &str) -> &str {
        if self.edge_palette.is_empty() {
            return "#3b82f6";
        }
        let idx = (edge_id_hash(edge_id).unsigned_abs() as usize) % self.edge_palette.len();
        &self.edge_palette[idx]
    }

    /// Whether the color picker offers `color`. An empty preset list allows any color.
    pub fn is_preset_color(&self, color: &str) -> bool {
        self.preset_colors.is_empty()
            || self
                .preset_colors
                .iter()
                .any(|preset| preset.eq_ignore_ascii_case(color.trim()))
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::study_plan()
    }
}

/// `h = h * 31 + c` over UTF-16 code units, wrapping at 32 bits.
fn edge_id_hash(id: &str) -> i32 {
    id.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32)
    })
}
