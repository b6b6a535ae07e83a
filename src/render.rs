use crate::config::ExportConfig;
use crate::geometry::{Point, Rect, Side};
use crate::model::{Graph, Node, NodeKind};
use crate::router::RoutedEdge;
use crate::theme::{NodePalette, Theme};
use anyhow::Result;
use std::path::Path;

const LINE_HEIGHT: f32 = 1.3;
const HANDLE_RADIUS: f32 = 4.0;
const GRIP_RADIUS: f32 = 5.0;
const RESIZE_HANDLE: f32 = 8.0;

/// Draws the diagram. Handles, waypoint grips, resize squares and the
/// selected-edge highlight only appear when `edit_mode` is set.
pub fn render_svg(
    graph: &Graph,
    routes: &[RoutedEdge],
    theme: &Theme,
    config: &ExportConfig,
    edit_mode: bool,
) -> String {
    let mut svg = String::new();
    let view = graph
        .bounds()
        .unwrap_or_default()
        .padded(config.padding.max(0.0));
    let width = view.width.max(200.0);
    let height = view.height.max(200.0);

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"{:.2} {:.2} {width:.2} {height:.2}\">",
        view.x, view.y
    ));
    svg.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        view.x, view.y, theme.background
    ));

    let colors: Vec<String> = graph
        .edges()
        .iter()
        .map(|edge| {
            edge.color
                .clone()
                .unwrap_or_else(|| theme.edge_color(edge.id.as_str()).to_string())
        })
        .collect();
    let mut markers: Vec<&str> = Vec::new();
    for color in &colors {
        if !markers.contains(&color.as_str()) {
            markers.push(color);
        }
    }

    svg.push_str("<defs>");
    for (idx, color) in markers.iter().enumerate() {
        svg.push_str(&format!(
            "<marker id=\"arrow-{idx}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
            escape_xml(color)
        ));
    }
    svg.push_str("</defs>");

    for (edge, color) in graph.edges().iter().zip(&colors) {
        let Some(routed) = routes.iter().find(|r| r.edge == edge.id) else {
            continue;
        };
        let marker = markers.iter().position(|m| *m == color.as_str()).unwrap_or(0);
        for line in &routed.branches {
            let d = line.to_svg_path();
            if edit_mode && edge.selected {
                svg.push_str(&format!(
                    "<path d=\"{d}\" fill=\"none\" stroke=\"{}\" stroke-width=\"6\" stroke-opacity=\"0.5\"/>",
                    theme.selection_highlight
                ));
            }
            svg.push_str(&format!(
                "<path class=\"edge\" data-edge=\"{}\" d=\"{d}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\" marker-end=\"url(#arrow-{marker})\"/>",
                escape_xml(edge.id.as_str()),
                escape_xml(color)
            ));
        }
        if edit_mode {
            for line in &routed.branches {
                for p in line.interior() {
                    svg.push_str(&format!(
                        "<circle class=\"grip\" cx=\"{:.2}\" cy=\"{:.2}\" r=\"{GRIP_RADIUS}\" fill=\"#FFFFFF\" stroke=\"{}\" stroke-width=\"1.5\"/>",
                        p.x,
                        p.y,
                        escape_xml(color)
                    ));
                }
            }
        }
    }

    for node in graph.nodes() {
        svg.push_str(&node_svg(node, graph, theme, edit_mode));
    }

    svg.push_str("</svg>");
    svg
}

fn node_svg(node: &Node, graph: &Graph, theme: &Theme, edit_mode: bool) -> String {
    let rect = node.rect();
    let center = rect.center();
    let lines = node.kind.label_lines();
    let mut out = String::new();

    match &node.kind {
        NodeKind::Course(_) => course_svg(&mut out, &rect, &lines, &theme.course, theme),
        NodeKind::MajorElective(_) => course_svg(&mut out, &rect, &lines, &theme.major_elective, theme),
        NodeKind::FreeElective(_) => course_svg(&mut out, &rect, &lines, &theme.free_elective, theme),
        NodeKind::ColumnHeader { .. } => {
            out.push_str(&text_block_svg(
                center,
                &lines,
                &theme.font_family,
                theme.font_size + 2.0,
                &theme.header_text,
                "600",
            ));
        }
        NodeKind::ProgramTitle { .. } => {
            out.push_str(&text_block_svg(
                center,
                &lines,
                &theme.font_family,
                theme.font_size * 1.7,
                &theme.title_text,
                "700",
            ));
        }
        NodeKind::FreeText(info) => {
            if edit_mode {
                out.push_str(&format!(
                    "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"none\" stroke=\"{}\" stroke-dasharray=\"4 3\" stroke-width=\"1\"/>",
                    rect.x, rect.y, rect.width, rect.height, theme.handle_fill
                ));
            }
            out.push_str(&text_block_svg(
                center,
                &lines,
                &theme.font_family,
                info.font_size,
                &info.color,
                "400",
            ));
        }
    }

    if graph.shows_or_badge(&node.id) {
        let x = rect.right() - 30.0;
        let y = rect.y - 9.0;
        out.push_str(&format!(
            "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"26\" height=\"18\" rx=\"9\" ry=\"9\" fill=\"{}\"/>",
            theme.or_badge_fill
        ));
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"11\" font-weight=\"700\" fill=\"{}\">OR</text>",
            x + 13.0,
            y + 13.0,
            theme.font_family,
            theme.or_badge_text
        ));
    }

    if edit_mode {
        if node.kind.is_course_like() {
            for side in Side::ALL {
                let p = rect.anchor(side);
                out.push_str(&format!(
                    "<circle class=\"handle\" data-side=\"{}\" cx=\"{:.2}\" cy=\"{:.2}\" r=\"{HANDLE_RADIUS}\" fill=\"{}\"/>",
                    side.as_str(),
                    p.x,
                    p.y,
                    theme.handle_fill
                ));
            }
        }
        if node.kind.is_resizable() {
            out.push_str(&format!(
                "<rect class=\"resize\" x=\"{:.2}\" y=\"{:.2}\" width=\"{RESIZE_HANDLE}\" height=\"{RESIZE_HANDLE}\" fill=\"{}\"/>",
                rect.right() - RESIZE_HANDLE / 2.0,
                rect.bottom() - RESIZE_HANDLE / 2.0,
                theme.handle_fill
            ));
        }
    }
    out
}

fn course_svg(out: &mut String, rect: &Rect, lines: &[String], palette: &NodePalette, theme: &Theme) {
    out.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.4\"/>",
        rect.x, rect.y, rect.width, rect.height, palette.fill, palette.border
    ));
    out.push_str(&text_block_svg(
        rect.center(),
        lines,
        &theme.font_family,
        theme.font_size,
        &palette.text,
        "600",
    ));
}

fn text_block_svg(
    center: Point,
    lines: &[String],
    font_family: &str,
    font_size: f32,
    fill: &str,
    weight: &str,
) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let total_height = lines.len() as f32 * font_size * LINE_HEIGHT;
    let x = center.x;
    let start_y = center.y - total_height / 2.0 + font_size;
    let mut text = String::new();

    text.push_str(&format!(
        "<text x=\"{x:.2}\" y=\"{start_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{font_size}\" font-weight=\"{weight}\" fill=\"{}\">",
        font_family,
        escape_xml(fill)
    ));
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { font_size * LINE_HEIGHT };
        text.push_str(&format!("<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>", escape_xml(line)));
    }
    text.push_str("</text>");
    text
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::geometry::Size;
    use crate::model::{CourseInfo, TextInfo};
    use crate::router::route_graph;

    fn sample() -> Graph {
        let mut graph = Graph::new();
        for (code, x, y) in [("CSX3001", 300.0, 0.0), ("CSX3002", 600.0, 0.0)] {
            graph
                .insert_node(Node::new(
                    code,
                    NodeKind::Course(CourseInfo {
                        code: code.to_string(),
                        title: "Programming & Design".to_string(),
                        credits: 3,
                        year: 1,
                        semester: 1,
                        or_group: Some("Y1S1-OR".to_string()),
                    }),
                    Point::new(x, y),
                    Size::new(200.0, 100.0),
                ))
                .unwrap();
        }
        graph
            .insert_node(Node::new(
                "text-0",
                NodeKind::FreeText(TextInfo {
                    text: "Track A".to_string(),
                    font_size: 20.0,
                    color: "#ef4444".to_string(),
                }),
                Point::new(300.0, 300.0),
                Size::new(100.0, 30.0),
            ))
            .unwrap();
        graph
            .insert_edge(vec!["CSX3001".into()], "CSX3002".into())
            .unwrap();
        graph
    }

    fn render(graph: &Graph, edit_mode: bool) -> String {
        let config = EditorConfig::default();
        let routes = route_graph(graph, &config.layout, &config.routing);
        render_svg(graph, &routes, &config.theme, &config.export, edit_mode)
    }

    #[test]
    fn render_svg_basic() {
        let svg = render(&sample(), false);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("CSX3001"));
        assert!(svg.contains("Programming &amp; Design (3)"));
        assert!(svg.contains(">OR</text>"));
        assert!(svg.contains("font-size=\"20\""));
        assert!(svg.contains("marker-end=\"url(#arrow-0)\""));
    }

    #[test]
    fn editing_decorations_only_in_edit_mode() {
        let graph = sample();
        let viewing = render(&graph, false);
        assert!(!viewing.contains("class=\"handle\""));
        assert!(!viewing.contains("class=\"resize\""));
        assert!(!viewing.contains("stroke-dasharray"));

        let editing = render(&graph, true);
        assert!(editing.contains("class=\"handle\""));
        assert!(editing.contains("class=\"resize\""));
    }

    #[test]
    fn one_marker_per_distinct_color() {
        let graph = sample();
        let (graph, _) = graph
            .connect(vec!["CSX3001".into()], "CSX3002".into())
            .unwrap();
        let id = graph.edges()[0].id.clone();
        let graph = graph.set_edge_color(&id, Some("#123456")).unwrap();
        let svg = render(&graph, false);
        assert!(svg.contains("fill=\"#123456\"/></marker>"));
        assert!(svg.contains("id=\"arrow-1\""));
    }
}
