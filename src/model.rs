//! Study-plan graph: positioned nodes and prerequisite edges.
//!
//! Every mutation is a pure function from `(&Graph, args)` to a new `Graph`,
//! so the history stack can keep whole-graph snapshots without any structural
//! sharing. Nodes and edges live in two flat vectors in insertion order; ids
//! are stable strings.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Point, Rect, Side, Size};
use crate::router::select_sides;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("unknown node `{0}`")]
    UnknownNode(NodeId),
    #[error("unknown edge `{0}`")]
    UnknownEdge(EdgeId),
    #[error("node `{0}` already exists")]
    DuplicateNode(NodeId),
    #[error("an edge needs at least one source")]
    EmptySources,
    #[error("node `{0}` cannot be connected to itself")]
    SelfLoop(NodeId),
    #[error("node `{0}` is not a course and cannot take part in a prerequisite")]
    NotConnectable(NodeId),
    #[error("node `{0}` cannot be deleted")]
    NotDeletable(NodeId),
    #[error("node `{node}` has no `{field}` text")]
    NoSuchField { node: NodeId, field: TextField },
    #[error("edge `{edge}` has no branch {branch}")]
    NoSuchBranch { edge: EdgeId, branch: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub code: String,
    pub title: String,
    pub credits: u32,
    pub year: u8,
    pub semester: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextInfo {
    pub text: String,
    pub font_size: f32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Course(CourseInfo),
    MajorElective(CourseInfo),
    FreeElective(CourseInfo),
    ColumnHeader { year: u8, semester: u8 },
    ProgramTitle { title: String, credits: u32 },
    FreeText(TextInfo),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Course(_) => "course",
            NodeKind::MajorElective(_) => "major_elective",
            NodeKind::FreeElective(_) => "free_elective",
            NodeKind::ColumnHeader { .. } => "column_header",
            NodeKind::ProgramTitle { .. } => "program_title",
            NodeKind::FreeText(_) => "free_text",
        }
    }

    pub fn course(&self) -> Option<&CourseInfo> {
        match self {
            NodeKind::Course(info) | NodeKind::MajorElective(info) | NodeKind::FreeElective(info) => {
                Some(info)
            }
            _ => None,
        }
    }

    fn course_mut(&mut self) -> Option<&mut CourseInfo> {
        match self {
            NodeKind::Course(info) | NodeKind::MajorElective(info) | NodeKind::FreeElective(info) => {
                Some(info)
            }
            _ => None,
        }
    }

    pub fn is_course_like(&self) -> bool {
        self.course().is_some()
    }

    /// Only user-added text can be removed from the diagram.
    pub fn is_deletable(&self) -> bool {
        matches!(self, NodeKind::FreeText(_))
    }

    pub fn is_draggable(&self) -> bool {
        !matches!(self, NodeKind::ProgramTitle { .. })
    }

    pub fn is_resizable(&self) -> bool {
        !matches!(self, NodeKind::ProgramTitle { .. })
    }

    /// Course boxes are the only shapes edges are routed around.
    pub fn is_obstacle(&self) -> bool {
        self.is_course_like()
    }

    pub fn has_field(&self, field: TextField) -> bool {
        match field {
            TextField::Code | TextField::Title => self.is_course_like(),
            TextField::Text => matches!(self, NodeKind::FreeText(_)),
        }
    }

    /// Display lines, top to bottom.
    pub fn label_lines(&self) -> Vec<String> {
        match self {
            NodeKind::Course(info) | NodeKind::MajorElective(info) | NodeKind::FreeElective(info) => {
                let heading = if info.code.is_empty() {
                    self.name().replacen('_', " ", 1).to_uppercase()
                } else {
                    info.code.clone()
                };
                let mut lines = vec![heading];
                if !info.code.is_empty() && !info.title.is_empty() {
                    lines.push(format!("{} ({})", info.title, info.credits));
                }
                lines
            }
            NodeKind::ColumnHeader { year, semester } => vec![format!(
                "{year}{} Year {semester}{} Semester",
                ordinal_suffix(*year as u32),
                ordinal_suffix(*semester as u32)
            )],
            NodeKind::ProgramTitle { title, credits } => vec![format!("{title} ({credits} Credits)")],
            NodeKind::FreeText(info) => info.text.lines().map(str::to_string).collect(),
        }
    }
}

pub fn ordinal_suffix(n: u32) -> &'static str {
    let v = n % 100;
    if (11..=13).contains(&v) {
        return "th";
    }
    match v % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    Code,
    Title,
    Text,
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TextField::Code => "code",
            TextField::Title => "title",
            TextField::Text => "text",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub position: Point,
    pub size: Size,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, position: Point, size: Size) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            size,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_parts(self.position, self.size)
    }

    pub fn text(&self, field: TextField) -> Option<&str> {
        match (field, &self.kind) {
            (TextField::Text, NodeKind::FreeText(info)) => Some(&info.text),
            (TextField::Code, kind) => kind.course().map(|c| c.code.as_str()),
            (TextField::Title, kind) => kind.course().map(|c| c.title.as_str()),
            _ => None,
        }
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Prerequisite origin: one course, or several that are all required.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeSources {
    Simple(NodeId),
    Branching(Vec<NodeId>),
}

impl EdgeSources {
    /// One id becomes a simple edge, several a branching one.
    pub fn from_ids(ids: Vec<NodeId>) -> Result<Self, GraphError> {
        match ids.len() {
            0 => Err(GraphError::EmptySources),
            1 => Ok(EdgeSources::Simple(ids.into_iter().next().ok_or(GraphError::EmptySources)?)),
            _ => Ok(EdgeSources::Branching(ids)),
        }
    }

    pub fn ids(&self) -> &[NodeId] {
        match self {
            EdgeSources::Simple(id) => std::slice::from_ref(id),
            EdgeSources::Branching(ids) => ids,
        }
    }

    pub fn is_branching(&self) -> bool {
        matches!(self, EdgeSources::Branching(_))
    }
}

/// Handle sides chosen for one source→target branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideBinding {
    pub source: Side,
    pub target: Side,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    sources: EdgeSources,
    pub target: NodeId,
    bindings: Vec<SideBinding>,
    pub color: Option<String>,
    waypoints: Vec<Vec<Point>>,
    pub selected: bool,
}

impl Edge {
    pub fn sources(&self) -> &EdgeSources {
        &self.sources
    }

    pub fn source_ids(&self) -> &[NodeId] {
        self.sources.ids()
    }

    pub fn branch_count(&self) -> usize {
        self.sources.ids().len()
    }

    pub fn binding(&self, branch: usize) -> Option<SideBinding> {
        self.bindings.get(branch).copied()
    }

    /// User-placed points for one branch; empty when the router owns the path.
    pub fn waypoints(&self, branch: usize) -> &[Point] {
        self.waypoints.get(branch).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_waypoints(&self) -> bool {
        self.waypoints.iter().any(|w| !w.is_empty())
    }

    pub fn touches(&self, node: &NodeId) -> bool {
        self.target == *node || self.source_ids().contains(node)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == *id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == *id)
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node, GraphError> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == *id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))
    }

    fn edge_mut(&mut self, id: &EdgeId) -> Result<&mut Edge, GraphError> {
        self.edges
            .iter_mut()
            .find(|e| e.id == *id)
            .ok_or_else(|| GraphError::UnknownEdge(id.clone()))
    }

    /// Builder step used while assembling a graph from imported data.
    pub fn insert_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.node(&node.id).is_some() {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Builder counterpart of [`Graph::connect`]; returns the new edge id.
    pub fn insert_edge(&mut self, sources: Vec<NodeId>, target: NodeId) -> Result<EdgeId, GraphError> {
        let sources = EdgeSources::from_ids(sources)?;
        let target_node = self
            .node(&target)
            .ok_or_else(|| GraphError::UnknownNode(target.clone()))?;
        if !target_node.kind.is_course_like() {
            return Err(GraphError::NotConnectable(target));
        }
        for id in sources.ids() {
            let node = self
                .node(id)
                .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;
            if !node.kind.is_course_like() {
                return Err(GraphError::NotConnectable(id.clone()));
            }
            if *id == target {
                return Err(GraphError::SelfLoop(target));
            }
        }
        let id = self.unique_edge_id(&sources, &target);
        let branches = sources.ids().len();
        let mut edge = Edge {
            id: id.clone(),
            sources,
            target,
            bindings: Vec::new(),
            color: None,
            waypoints: vec![Vec::new(); branches],
            selected: false,
        };
        edge.bindings = self.bind_sides(&edge);
        self.edges.push(edge);
        Ok(id)
    }

    fn unique_edge_id(&self, sources: &EdgeSources, target: &NodeId) -> EdgeId {
        let base = match sources {
            EdgeSources::Simple(from) => format!("{from}-{target}"),
            EdgeSources::Branching(ids) => {
                let joined: Vec<&str> = ids.iter().map(NodeId::as_str).collect();
                format!("{}-{target}", joined.join("+"))
            }
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while self.edge(&EdgeId::new(candidate.as_str())).is_some() {
            n += 1;
            candidate = format!("{base}#{n}");
        }
        EdgeId::new(candidate)
    }

    /// Handle sides from the current node centers, chosen per branch. Sources
    /// on the same side of the target end on the same anchor.
    fn bind_sides(&self, edge: &Edge) -> Vec<SideBinding> {
        let Some(target) = self.node(&edge.target).map(Node::rect) else {
            return Vec::new();
        };
        edge.source_ids()
            .iter()
            .filter_map(|id| self.node(id).map(Node::rect))
            .map(|source| select_sides(&source, &target))
            .collect()
    }

    pub fn move_node(&self, id: &NodeId, position: Point) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        next.node_mut(id)?.position = position;
        Ok(next)
    }

    pub fn resize_node(&self, id: &NodeId, size: Size) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        next.node_mut(id)?.size = size;
        Ok(next)
    }

    pub fn set_node_text(&self, id: &NodeId, field: TextField, value: &str) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        let node = next.node_mut(id)?;
        let no_field = || GraphError::NoSuchField {
            node: id.clone(),
            field,
        };
        match field {
            TextField::Code => node.kind.course_mut().ok_or_else(no_field)?.code = value.to_string(),
            TextField::Title => node.kind.course_mut().ok_or_else(no_field)?.title = value.to_string(),
            TextField::Text => match &mut node.kind {
                NodeKind::FreeText(info) => info.text = value.to_string(),
                _ => return Err(no_field()),
            },
        }
        Ok(next)
    }

    pub fn set_text_style(
        &self,
        id: &NodeId,
        font_size: Option<f32>,
        color: Option<&str>,
    ) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        let node = next.node_mut(id)?;
        let NodeKind::FreeText(info) = &mut node.kind else {
            return Err(GraphError::NoSuchField {
                node: id.clone(),
                field: TextField::Text,
            });
        };
        if let Some(size) = font_size {
            info.font_size = size;
        }
        if let Some(color) = color {
            info.color = color.to_string();
        }
        Ok(next)
    }

    pub fn add_free_text(
        &self,
        id: &NodeId,
        position: Point,
        size: Size,
        text: TextInfo,
    ) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        next.insert_node(Node::new(id.clone(), NodeKind::FreeText(text), position, size))?;
        Ok(next)
    }

    pub fn remove_free_text(&self, id: &NodeId) -> Result<Graph, GraphError> {
        let node = self
            .node(id)
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))?;
        if !node.kind.is_deletable() {
            return Err(GraphError::NotDeletable(id.clone()));
        }
        let mut next = self.clone();
        next.nodes.retain(|n| n.id != *id);
        next.edges.retain(|e| !e.touches(id));
        Ok(next)
    }

    /// `None` restores the hash-derived default color.
    pub fn set_edge_color(&self, id: &EdgeId, color: Option<&str>) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        next.edge_mut(id)?.color = color.map(str::to_string);
        Ok(next)
    }

    /// Replaces the manual route of one branch; an empty list hands the branch
    /// back to the router.
    pub fn set_edge_waypoints(
        &self,
        id: &EdgeId,
        branch: usize,
        waypoints: Vec<Point>,
    ) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        let edge = next.edge_mut(id)?;
        let slot = edge
            .waypoints
            .get_mut(branch)
            .ok_or_else(|| GraphError::NoSuchBranch {
                edge: id.clone(),
                branch,
            })?;
        *slot = waypoints;
        Ok(next)
    }

    pub fn clear_edge_waypoints(&self, id: &EdgeId) -> Result<Graph, GraphError> {
        let mut next = self.clone();
        for slot in &mut next.edge_mut(id)?.waypoints {
            slot.clear();
        }
        Ok(next)
    }

    pub fn connect(&self, sources: Vec<NodeId>, target: NodeId) -> Result<(Graph, EdgeId), GraphError> {
        let mut next = self.clone();
        let id = next.insert_edge(sources, target)?;
        Ok((next, id))
    }

    pub fn disconnect(&self, id: &EdgeId) -> Result<Graph, GraphError> {
        if self.edge(id).is_none() {
            return Err(GraphError::UnknownEdge(id.clone()));
        }
        let mut next = self.clone();
        next.edges.retain(|e| e.id != *id);
        Ok(next)
    }

    /// Marks at most one edge as the color-picker target.
    pub fn select_edge(&self, id: Option<&EdgeId>) -> Graph {
        let mut next = self.clone();
        for edge in &mut next.edges {
            edge.selected = Some(&edge.id) == id;
        }
        next
    }

    /// Re-chooses handle sides for every edge from current node positions.
    pub fn rebind_edges(&self) -> Graph {
        let mut next = self.clone();
        let bindings: Vec<Vec<SideBinding>> = next.edges.iter().map(|e| next.bind_sides(e)).collect();
        for (edge, binding) in next.edges.iter_mut().zip(bindings) {
            edge.bindings = binding;
        }
        next
    }

    /// Whether the node's OR tag is shared with another node of the same term.
    /// A lone tag draws no badge.
    pub fn shows_or_badge(&self, id: &NodeId) -> bool {
        let Some(info) = self.node(id).and_then(|n| n.kind.course()) else {
            return false;
        };
        let Some(group) = info.or_group.as_deref() else {
            return false;
        };
        self.nodes.iter().any(|other| {
            other.id != *id
                && other.kind.course().is_some_and(|o| {
                    o.or_group.as_deref() == Some(group)
                        && o.year == info.year
                        && o.semester == info.semester
                })
        })
    }

    pub fn or_groups(&self) -> BTreeSet<String> {
        self.nodes
            .iter()
            .filter_map(|n| n.kind.course().and_then(|c| c.or_group.clone()))
            .collect()
    }

    /// Bounding box of every node, `None` for an empty graph.
    pub fn bounds(&self) -> Option<Rect> {
        self.nodes
            .iter()
            .map(Node::rect)
            .reduce(|acc, rect| acc.union(&rect))
    }
}
