//! Orthogonal ("Manhattan") prerequisite routing.
//!
//! A path leaves its source handle perpendicular to the handle's side and
//! enters the target the same way. Left/right handles get a straight
//! clearance run before the first turn. The router first tries the natural
//! two-leg path, then detours through the horizontal lane between layout
//! rows, then through the gutter between term columns. It never fails: if
//! every candidate still crosses a box, the least-bad mid-lane is kept.

use serde::Serialize;
use tracing::debug;

use crate::config::{LayoutConfig, RoutingConfig};
use crate::geometry::{
    Point, Rect, Side, compress_path, offset_from, polyline_obstacle_hits,
};
use crate::model::{Edge, EdgeId, Graph, Node, SideBinding};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    pub points: Vec<Point>,
}

impl Polyline {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn first(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Points between the two endpoints; these are the draggable grips.
    pub fn interior(&self) -> &[Point] {
        if self.points.len() <= 2 {
            return &[];
        }
        &self.points[1..self.points.len() - 1]
    }

    pub fn to_svg_path(&self) -> String {
        let mut d = String::new();
        for (idx, p) in self.points.iter().enumerate() {
            if idx == 0 {
                d.push_str(&format!("M {:.2} {:.2}", p.x, p.y));
            } else {
                d.push_str(&format!(" L {:.2} {:.2}", p.x, p.y));
            }
        }
        d
    }
}

/// Everything a single path computation reads besides its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub obstacles: &'a [Rect],
    pub layout: &'a LayoutConfig,
    pub routing: &'a RoutingConfig,
}

/// Routed geometry of one edge: one polyline per source, in source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedEdge {
    pub edge: EdgeId,
    pub branches: Vec<Polyline>,
    pub manual: Vec<bool>,
}

/// Picks the facing sides of two boxes from the offset between their centers:
/// mostly-horizontal offsets use left/right, everything else top/bottom.
pub fn select_sides(from: &Rect, to: &Rect) -> SideBinding {
    let a = from.center();
    let b = to.center();
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if dx.abs() > dy.abs() {
        if dx > 0.0 {
            SideBinding {
                source: Side::Right,
                target: Side::Left,
            }
        } else {
            SideBinding {
                source: Side::Left,
                target: Side::Right,
            }
        }
    } else if dy > 0.0 {
        SideBinding {
            source: Side::Bottom,
            target: Side::Top,
        }
    } else {
        SideBinding {
            source: Side::Top,
            target: Side::Bottom,
        }
    }
}

fn lane_offset(spacing: f32, gap: f32) -> f32 {
    spacing - gap / 2.0
}

/// Horizontal corridor in the gap under the row that holds the midpoint of
/// `y1` and `y2`: the row boundary minus half the inter-row gap.
pub fn mid_lane_y(y1: f32, y2: f32, layout: &LayoutConfig) -> f32 {
    let spacing = layout.row_spacing;
    let avg = (y1 + y2) / 2.0;
    if spacing <= 0.0 || !spacing.is_finite() {
        return avg;
    }
    let row = (avg / spacing).floor();
    row * spacing + lane_offset(spacing, layout.row_gap())
}

/// Nearest row lane at or below `y` (`downward`) or at or above it.
fn row_lane_near(y: f32, downward: bool, layout: &LayoutConfig) -> f32 {
    let spacing = layout.row_spacing;
    if spacing <= 0.0 || !spacing.is_finite() {
        return y;
    }
    let off = lane_offset(spacing, layout.row_gap());
    let k = (y - off) / spacing;
    let k = if downward { k.ceil() } else { k.floor() };
    k * spacing + off
}

/// Nearest column gutter at or right of `x` (`rightward`) or at or left of it.
fn column_gutter_near(x: f32, rightward: bool, layout: &LayoutConfig) -> f32 {
    let spacing = layout.column_spacing;
    if spacing <= 0.0 || !spacing.is_finite() {
        return x;
    }
    let off = lane_offset(spacing, layout.column_gap());
    let k = (x - off) / spacing;
    let k = if rightward { k.ceil() } else { k.floor() };
    k * spacing + off
}

fn leaves_perpendicular(points: &[Point], side: Side) -> bool {
    let Some(seg) = points.windows(2).next() else {
        return true;
    };
    travels_along(seg[0], seg[1], side.outward())
}

fn enters_perpendicular(points: &[Point], side: Side) -> bool {
    let Some(seg) = points.windows(2).last() else {
        return true;
    };
    let (dx, dy) = side.outward();
    travels_along(seg[0], seg[1], (-dx, -dy))
}

fn travels_along(a: Point, b: Point, dir: (f32, f32)) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if dir.0 != 0.0 {
        dy.abs() <= 1e-4 && dx * dir.0 > 0.0
    } else {
        dx.abs() <= 1e-4 && dy * dir.1 > 0.0
    }
}

#[derive(Debug)]
struct Candidate {
    points: Vec<Point>,
    hits: usize,
    perpendicular: bool,
}

impl Candidate {
    fn new(raw: &[Point], source_side: Side, target_side: Side, obstacles: &[Rect]) -> Self {
        let points = compress_path(raw);
        let hits = polyline_obstacle_hits(&points, obstacles);
        let perpendicular =
            leaves_perpendicular(&points, source_side) && enters_perpendicular(&points, target_side);
        Self {
            points,
            hits,
            perpendicular,
        }
    }

    fn is_clean(&self) -> bool {
        self.hits == 0 && self.perpendicular
    }

    fn badness(&self) -> (usize, bool) {
        (self.hits, !self.perpendicular)
    }
}

/// Orthogonal path from `source` to `target`.
///
/// Pure: the same endpoints, sides and obstacles always give the same points.
pub fn compute_path(
    source: Point,
    target: Point,
    source_side: Side,
    target_side: Side,
    ctx: &RouteContext<'_>,
) -> Polyline {
    if !source.is_finite() || !target.is_finite() || source.approx_eq(target) {
        return Polyline::new(vec![source, target]);
    }

    let clearance = ctx.routing.clearance.max(0.0);
    let s1 = if source_side.is_horizontal() {
        offset_from(source, source_side, clearance)
    } else {
        source
    };
    let t1 = if target_side.is_horizontal() {
        offset_from(target, target_side, clearance)
    } else {
        target
    };

    let dx = target.x - source.x;
    let dy = target.y - source.y;
    let direct_raw = if source_side.is_horizontal() {
        vec![source, s1, Point::new(s1.x, t1.y), t1, target]
    } else if dx.abs() > dy.abs() {
        vec![source, Point::new(t1.x, source.y), t1, target]
    } else {
        vec![source, Point::new(source.x, t1.y), t1, target]
    };
    let direct = Candidate::new(&direct_raw, source_side, target_side, ctx.obstacles);
    if direct.is_clean() {
        return Polyline::new(direct.points);
    }

    let mut fallback: Vec<Candidate> = Vec::new();

    let mut lane = mid_lane_y(source.y, target.y, ctx.layout);
    let step = ctx.routing.lane_step.max(0.0);
    for attempt in 0..=ctx.routing.lane_attempts {
        let raw = [
            source,
            s1,
            Point::new(s1.x, lane),
            Point::new(t1.x, lane),
            t1,
            target,
        ];
        let candidate = Candidate::new(&raw, source_side, target_side, ctx.obstacles);
        if candidate.is_clean() {
            debug!(attempt, lane, "routed through mid-lane");
            return Polyline::new(candidate.points);
        }
        fallback.push(candidate);
        if step <= 0.0 {
            break;
        }
        lane += step;
    }

    let downward = target.y >= source.y;
    let lane_out = row_lane_near(s1.y, downward, ctx.layout);
    let lane_in = row_lane_near(t1.y, !downward, ctx.layout);
    for rightward in [true, false] {
        let gutter = column_gutter_near(s1.x, rightward, ctx.layout);
        let raw = [
            source,
            s1,
            Point::new(s1.x, lane_out),
            Point::new(gutter, lane_out),
            Point::new(gutter, lane_in),
            Point::new(t1.x, lane_in),
            t1,
            target,
        ];
        let candidate = Candidate::new(&raw, source_side, target_side, ctx.obstacles);
        if candidate.is_clean() {
            debug!(gutter, lane_out, lane_in, "routed through column gutter");
            return Polyline::new(candidate.points);
        }
    }

    // Nothing clean: keep the mid-lane attempt that crosses the fewest boxes.
    let best = fallback
        .into_iter()
        .min_by_key(Candidate::badness)
        .map(|c| c.points)
        .unwrap_or(direct.points);
    debug!(
        source = ?source,
        target = ?target,
        "no obstacle-free route, keeping best mid-lane"
    );
    Polyline::new(best)
}

/// Boxes edges should steer around.
pub fn obstacles(graph: &Graph) -> Vec<Rect> {
    graph
        .nodes()
        .iter()
        .filter(|n| n.kind.is_obstacle())
        .map(Node::rect)
        .filter(|r| !r.is_degenerate())
        .collect()
}

/// Routes every branch of `edge`. Branches that carry waypoints are drawn
/// straight through them; the rest go through [`compute_path`].
pub fn route_edge(graph: &Graph, edge: &Edge, ctx: &RouteContext<'_>) -> RoutedEdge {
    let mut branches = Vec::with_capacity(edge.branch_count());
    let mut manual = Vec::with_capacity(edge.branch_count());
    let Some(target) = graph.node(&edge.target).map(Node::rect) else {
        return RoutedEdge {
            edge: edge.id.clone(),
            branches,
            manual,
        };
    };
    for (idx, source_id) in edge.source_ids().iter().enumerate() {
        let Some(source) = graph.node(source_id).map(Node::rect) else {
            continue;
        };
        let binding = edge
            .binding(idx)
            .unwrap_or_else(|| select_sides(&source, &target));
        let start = source.anchor(binding.source);
        let end = target.anchor(binding.target);
        let waypoints = edge.waypoints(idx);
        if !waypoints.is_empty() {
            let mut points = Vec::with_capacity(waypoints.len() + 2);
            points.push(start);
            points.extend_from_slice(waypoints);
            points.push(end);
            branches.push(Polyline::new(points));
            manual.push(true);
            continue;
        }
        if source.is_degenerate() || target.is_degenerate() || source == target {
            branches.push(Polyline::new(vec![start, end]));
            manual.push(false);
            continue;
        }
        branches.push(compute_path(start, end, binding.source, binding.target, ctx));
        manual.push(false);
    }
    RoutedEdge {
        edge: edge.id.clone(),
        branches,
        manual,
    }
}

pub fn route_graph(graph: &Graph, layout: &LayoutConfig, routing: &RoutingConfig) -> Vec<RoutedEdge> {
    let obstacles = obstacles(graph);
    let ctx = RouteContext {
        obstacles: &obstacles,
        layout,
        routing,
    };
    graph
        .edges()
        .iter()
        .map(|edge| route_edge(graph, edge, &ctx))
        .collect()
}
