use crate::config::ExportConfig;
use crate::geometry::Rect;
use crate::model::{Graph, NodeKind};
use crate::router::RoutedEdge;
use crate::theme::Theme;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Final laid-out geometry handed to a rasterizer. Carries no editing
/// decorations: no handles, grips or selection state.
#[derive(Debug, Serialize)]
pub struct DiagramExport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
}

#[derive(Debug, Serialize)]
pub struct NodeExport {
    pub id: String,
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub label_lines: Vec<String>,
    pub or_badge: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EdgeExport {
    pub id: String,
    pub sources: Vec<String>,
    pub target: String,
    pub color: String,
    pub custom_color: bool,
    /// One polyline per source, in source order.
    pub paths: Vec<Vec<[f32; 2]>>,
}

impl DiagramExport {
    pub fn from_graph(graph: &Graph, routes: &[RoutedEdge], theme: &Theme, config: &ExportConfig) -> Self {
        let bounds = graph
            .bounds()
            .unwrap_or_default()
            .padded(config.padding.max(0.0));

        let nodes = graph
            .nodes()
            .iter()
            .map(|node| {
                let (font_size, color) = match &node.kind {
                    NodeKind::FreeText(info) => (Some(info.font_size), Some(info.color.clone())),
                    _ => (None, None),
                };
                NodeExport {
                    id: node.id.to_string(),
                    kind: node.kind.name().to_string(),
                    x: node.position.x,
                    y: node.position.y,
                    width: node.size.width,
                    height: node.size.height,
                    label_lines: node.kind.label_lines(),
                    or_badge: graph.shows_or_badge(&node.id),
                    font_size,
                    color,
                }
            })
            .collect();

        let edges = graph
            .edges()
            .iter()
            .map(|edge| {
                let paths = routes
                    .iter()
                    .find(|r| r.edge == edge.id)
                    .map(|r| {
                        r.branches
                            .iter()
                            .map(|line| line.points.iter().map(|p| [p.x, p.y]).collect())
                            .collect()
                    })
                    .unwrap_or_default();
                EdgeExport {
                    id: edge.id.to_string(),
                    sources: edge.source_ids().iter().map(ToString::to_string).collect(),
                    target: edge.target.to_string(),
                    color: edge
                        .color
                        .clone()
                        .unwrap_or_else(|| theme.edge_color(edge.id.as_str()).to_string()),
                    custom_color: edge.color.is_some(),
                    paths,
                }
            })
            .collect();

        let Rect {
            x,
            y,
            width,
            height,
        } = bounds;
        DiagramExport {
            x,
            y,
            width,
            height,
            background: theme.background.clone(),
            nodes,
            edges,
        }
    }
}

pub fn write_export(path: Option<&Path>, export: &DiagramExport) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, export)?;
        }
        None => {
            let stdout = std::io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), export)?;
            println!();
        }
    }
    Ok(())
}
