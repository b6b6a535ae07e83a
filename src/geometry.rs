use serde::{Deserialize, Serialize};

const EPS: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn approx_eq(self, other: Point) -> bool {
        (self.x - other.x).abs() <= EPS && (self.y - other.y).abs() <= EPS
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Rounds both coordinates to the nearest multiple of `step`.
    pub fn snapped(self, step: f32) -> Point {
        Point::new(snap(self.x, step), snap(self.y, step))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn snapped(self, step: f32) -> Size {
        Size::new(snap(self.width, step), snap(self.height, step))
    }
}

/// Rounds `value` to the nearest multiple of `step`; a non-positive step leaves it untouched.
pub fn snap(value: f32, step: f32) -> f32 {
    if step <= 0.0 || !step.is_finite() {
        return value;
    }
    (value / step).round() * step
}

/// Axis-aligned box, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_parts(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Zero, negative or non-finite extents.
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
            || !self.x.is_finite()
            || !self.y.is_finite()
            || !self.width.is_finite()
            || !self.height.is_finite()
    }

    /// Center of the boundary on `side`.
    pub fn anchor(&self, side: Side) -> Point {
        let c = self.center();
        match side {
            Side::Top => Point::new(c.x, self.y),
            Side::Bottom => Point::new(c.x, self.bottom()),
            Side::Left => Point::new(self.x, c.y),
            Side::Right => Point::new(self.right(), c.y),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    pub fn padded(&self, pad: f32) -> Rect {
        Rect::new(
            self.x - pad,
            self.y - pad,
            self.width + pad * 2.0,
            self.height + pad * 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

    /// Left and right handles leave the box horizontally.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }

    /// Unit step pointing away from the box.
    pub fn outward(self) -> (f32, f32) {
        match self {
            Side::Top => (0.0, -1.0),
            Side::Bottom => (0.0, 1.0),
            Side::Left => (-1.0, 0.0),
            Side::Right => (1.0, 0.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Bottom => "bottom",
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Moves `point` `distance` units away from its box along `side`.
pub fn offset_from(point: Point, side: Side, distance: f32) -> Point {
    let (dx, dy) = side.outward();
    Point::new(point.x + dx * distance, point.y + dy * distance)
}

fn ranges_overlap(a1: f32, a2: f32, lo: f32, hi: f32) -> bool {
    let min = a1.min(a2);
    let max = a1.max(a2);
    max > lo + EPS && min < hi - EPS
}

/// True when segment `a`-`b` passes through the interior of `rect`.
///
/// Axis-aligned segments are tested band-wise: the fixed coordinate must lie
/// strictly inside the box span on that axis and the travelled range must
/// overlap the other span. Touching a boundary is not an intersection.
/// Diagonal segments fall back to a conservative bounding-box test.
pub fn segment_crosses_rect(a: Point, b: Point, rect: &Rect) -> bool {
    if rect.is_degenerate() {
        return false;
    }
    if (a.y - b.y).abs() <= EPS {
        let y = a.y;
        return y > rect.y + EPS && y < rect.bottom() - EPS && ranges_overlap(a.x, b.x, rect.x, rect.right());
    }
    if (a.x - b.x).abs() <= EPS {
        let x = a.x;
        return x > rect.x + EPS && x < rect.right() - EPS && ranges_overlap(a.y, b.y, rect.y, rect.bottom());
    }
    ranges_overlap(a.x, b.x, rect.x, rect.right()) && ranges_overlap(a.y, b.y, rect.y, rect.bottom())
}

pub fn polyline_crosses_rect(points: &[Point], rect: &Rect) -> bool {
    points
        .windows(2)
        .any(|seg| segment_crosses_rect(seg[0], seg[1], rect))
}

/// Number of `obstacles` the polyline passes through.
pub fn polyline_obstacle_hits(points: &[Point], obstacles: &[Rect]) -> usize {
    obstacles
        .iter()
        .filter(|rect| polyline_crosses_rect(points, rect))
        .count()
}

/// Drops repeated points and interior points lying on a straight run.
pub fn compress_path(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &curr in points {
        if let Some(&prev) = out.last() {
            if prev.approx_eq(curr) {
                continue;
            }
        }
        if out.len() >= 2 {
            let prev = out[out.len() - 1];
            let before = out[out.len() - 2];
            let vertical = (before.x - prev.x).abs() <= EPS && (prev.x - curr.x).abs() <= EPS;
            let horizontal = (before.y - prev.y).abs() <= EPS && (prev.y - curr.y).abs() <= EPS;
            let reverses = (vertical && (prev.y - before.y).signum() != (curr.y - prev.y).signum())
                || (horizontal && (prev.x - before.x).signum() != (curr.x - prev.x).signum());
            if (vertical || horizontal) && !reverses {
                out.pop();
            }
        }
        out.push(curr);
    }
    out
}

pub fn path_length(points: &[Point]) -> f32 {
    points
        .windows(2)
        .map(|seg| ((seg[1].x - seg[0].x).powi(2) + (seg[1].y - seg[0].y).powi(2)).sqrt())
        .sum()
}

pub fn is_orthogonal(points: &[Point]) -> bool {
    points
        .windows(2)
        .all(|seg| (seg[0].x - seg[1].x).abs() <= EPS || (seg[0].y - seg[1].y).abs() <= EPS)
}
