//! Edit-mode state machine.
//!
//! Pointer and keyboard input arrives as discrete [`Input`] events. The
//! controller owns the live [`Graph`], the current [`State`] and the undo
//! [`History`]. A gesture keeps a copy of the graph as it was on pointer-down;
//! pointer-up commits against that copy, `Escape` restores it. Rejected model
//! operations are logged and leave the graph unchanged.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{EditorConfig, SizeLimits};
use crate::export::DiagramExport;
use crate::geometry::{Point, Size};
use crate::history::History;
use crate::model::{EdgeId, Graph, GraphError, NodeId, NodeKind, TextField, TextInfo};
use crate::router::{RouteContext, RoutedEdge, obstacles, route_edge, route_graph};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
}

/// What the pointer went down on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Canvas,
    Node { id: NodeId },
    ResizeHandle { id: NodeId },
    Edge { id: EdgeId },
    Grip { edge: EdgeId, branch: usize, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Escape,
    Enter,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Input {
    SetEditMode {
        enabled: bool,
    },
    ToggleEditMode,
    PointerDown {
        target: Target,
        at: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerMove {
        at: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerUp {
        at: Point,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Double click on a node's code, title or text.
    StartTextEdit {
        node: NodeId,
        field: TextField,
    },
    TypeText {
        text: String,
    },
    Blur,
    Key {
        key: Key,
    },
    /// `None` resets the edge to its default color.
    PickColor {
        color: Option<String>,
    },
    SetTextStyle {
        #[serde(default)]
        font_size: Option<f32>,
        #[serde(default)]
        color: Option<String>,
    },
    AddText,
    ResetRoute {
        edge: EdgeId,
    },
    Undo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum State {
    Viewing,
    EditingEnabled,
    DraggingNode {
        node: NodeId,
        /// Pointer offset from the node origin at pointer-down.
        grab: Point,
    },
    ResizingNode {
        node: NodeId,
        origin: Point,
        start: Size,
    },
    DraggingWaypoint {
        edge: EdgeId,
        branch: usize,
        index: usize,
    },
    EditingText {
        node: NodeId,
        field: TextField,
        draft: String,
    },
    PickingColor {
        edge: EdgeId,
    },
    PlacingNewText {
        node: NodeId,
    },
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Viewing => "viewing",
            State::EditingEnabled => "editing_enabled",
            State::DraggingNode { .. } => "dragging_node",
            State::ResizingNode { .. } => "resizing_node",
            State::DraggingWaypoint { .. } => "dragging_waypoint",
            State::EditingText { .. } => "editing_text",
            State::PickingColor { .. } => "picking_color",
            State::PlacingNewText { .. } => "placing_new_text",
        }
    }

    fn is_gesture(&self) -> bool {
        matches!(
            self,
            State::DraggingNode { .. }
                | State::ResizingNode { .. }
                | State::DraggingWaypoint { .. }
                | State::PlacingNewText { .. }
        )
    }
}

/// A draggable bend point of one routed branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grip {
    pub edge: EdgeId,
    pub branch: usize,
    pub index: usize,
    pub at: Point,
}

#[derive(Debug, Clone)]
pub struct Controller {
    config: EditorConfig,
    graph: Graph,
    state: State,
    history: History<Graph>,
    gesture_start: Option<Graph>,
    selected_node: Option<NodeId>,
    next_text_id: usize,
}

impl Controller {
    pub fn new(graph: Graph, config: EditorConfig) -> Self {
        let history = History::new(config.editing.history_capacity);
        Self {
            config,
            graph,
            state: State::Viewing,
            history,
            gesture_start: None,
            selected_node: None,
            next_text_id: 0,
        }
    }

    /// Replaces the whole document. Edit mode and history start over.
    pub fn load(&mut self, graph: Graph) {
        self.graph = graph;
        self.state = State::Viewing;
        self.history.clear();
        self.gesture_start = None;
        self.selected_node = None;
        self.next_text_id = 0;
        info!(nodes = self.graph.nodes().len(), "loaded graph");
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn edit_mode(&self) -> bool {
        !matches!(self.state, State::Viewing)
    }

    pub fn history(&self) -> &History<Graph> {
        &self.history
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn selected_node(&self) -> Option<&NodeId> {
        self.selected_node.as_ref()
    }

    pub fn replay(&mut self, inputs: impl IntoIterator<Item = Input>) {
        for input in inputs {
            self.handle(input);
        }
    }

    pub fn handle(&mut self, input: Input) {
        debug!(state = self.state.name(), ?input, "input");
        match input {
            Input::SetEditMode { enabled } => self.set_edit_mode(enabled),
            Input::ToggleEditMode => self.set_edit_mode(!self.edit_mode()),
            Input::PointerDown {
                target,
                at,
                modifiers,
            } => self.pointer_down(target, at, modifiers),
            Input::PointerMove { at, modifiers } => self.pointer_move(at, modifiers),
            Input::PointerUp { at, modifiers } => self.pointer_up(at, modifiers),
            Input::StartTextEdit { node, field } => self.start_text_edit(node, field),
            Input::TypeText { text } => {
                if let State::EditingText { draft, .. } = &mut self.state {
                    *draft = text;
                }
            }
            Input::Blur => self.finish_text_edit(true),
            Input::Key { key } => self.key(key),
            Input::PickColor { color } => self.pick_color(color.as_deref()),
            Input::SetTextStyle { font_size, color } => self.set_text_style(font_size, color.as_deref()),
            Input::AddText => self.add_text(),
            Input::ResetRoute { edge } => self.reset_route(&edge),
            Input::Undo => self.undo(),
        }
    }

    pub fn routes(&self) -> Vec<RoutedEdge> {
        route_graph(&self.graph, &self.config.layout, &self.config.routing)
    }

    /// Bend points the user can drag; empty outside edit mode.
    pub fn grips(&self) -> Vec<Grip> {
        if !self.edit_mode() {
            return Vec::new();
        }
        grips_of(&self.routes())
    }

    /// Laid-out geometry for a rasterizer. Leaves edit mode first so no
    /// handle, grip or open editor ends up in the artifact.
    pub fn export(&mut self) -> DiagramExport {
        self.set_edit_mode(false);
        DiagramExport::from_graph(
            &self.graph,
            &self.routes(),
            &self.config.theme,
            &self.config.export,
        )
    }

    fn set_edit_mode(&mut self, enabled: bool) {
        if enabled {
            if !self.edit_mode() {
                self.state = State::EditingEnabled;
                info!("edit mode on");
            }
            return;
        }
        if !self.edit_mode() {
            return;
        }
        // Open text edits are dropped, not committed.
        self.abandon();
        self.state = State::Viewing;
        info!("edit mode off");
    }

    /// Drops whatever is in progress without committing it.
    fn abandon(&mut self) {
        if let Some(before) = self.gesture_start.take() {
            self.graph = before;
        }
        self.clear_edge_selection();
        if self.edit_mode() {
            self.state = State::EditingEnabled;
        }
    }

    /// Leaves the current sub-state the way a click elsewhere would: open text
    /// is committed, the color picker closes.
    fn exit_sub_state(&mut self) {
        if matches!(self.state, State::EditingText { .. }) {
            self.finish_text_edit(true);
        } else if matches!(self.state, State::PickingColor { .. }) {
            self.clear_edge_selection();
            self.state = State::EditingEnabled;
        } else if self.state.is_gesture() {
            self.abandon();
        }
    }

    fn clear_edge_selection(&mut self) {
        if self.graph.edges().iter().any(|e| e.selected) {
            self.graph = self.graph.select_edge(None);
        }
    }

    /// Pushes `before` and installs `after`, unless nothing changed.
    fn commit(&mut self, before: Graph, after: Graph, action: &'static str) {
        if before == after {
            debug!(action, "unchanged, nothing to commit");
            self.graph = after;
            return;
        }
        self.history.save(before);
        self.graph = after;
        info!(action, snapshots = self.history.len(), "committed");
    }

    fn rejected(&self, action: &'static str, err: GraphError) {
        warn!(action, error = %err, "rejected edit");
    }

    fn pointer_down(&mut self, target: Target, at: Point, modifiers: Modifiers) {
        if let State::PlacingNewText { node } = &self.state {
            let node = node.clone();
            self.place_text(node, at);
            return;
        }
        match target {
            Target::Canvas => {
                self.selected_node = None;
                self.exit_sub_state();
            }
            Target::Node { id } => {
                // Clicking stays available for inspection outside edit mode.
                self.selected_node = Some(id.clone());
                if !self.edit_mode() {
                    return;
                }
                self.exit_sub_state();
                let Some(node) = self.graph.node(&id) else {
                    self.rejected("drag", GraphError::UnknownNode(id));
                    return;
                };
                if !node.kind.is_draggable() {
                    return;
                }
                let grab = Point::new(at.x - node.position.x, at.y - node.position.y);
                self.gesture_start = Some(self.graph.clone());
                self.state = State::DraggingNode { node: id, grab };
            }
            Target::ResizeHandle { id } => {
                if !self.edit_mode() {
                    return;
                }
                self.exit_sub_state();
                let Some(node) = self.graph.node(&id) else {
                    self.rejected("resize", GraphError::UnknownNode(id));
                    return;
                };
                if !node.kind.is_resizable() {
                    return;
                }
                let start = node.size;
                self.gesture_start = Some(self.graph.clone());
                self.state = State::ResizingNode {
                    node: id,
                    origin: at,
                    start,
                };
            }
            Target::Grip {
                edge,
                branch,
                index,
            } => {
                if !self.edit_mode() {
                    return;
                }
                self.exit_sub_state();
                self.start_waypoint_drag(edge, branch, index, at, modifiers);
            }
            Target::Edge { id } => {
                if !self.edit_mode() {
                    return;
                }
                if matches!(&self.state, State::PickingColor { edge } if *edge == id) {
                    // Second click on the same edge closes the picker.
                    self.exit_sub_state();
                    return;
                }
                self.exit_sub_state();
                if self.graph.edge(&id).is_none() {
                    self.rejected("pick color", GraphError::UnknownEdge(id));
                    return;
                }
                self.graph = self.graph.select_edge(Some(&id));
                self.state = State::PickingColor { edge: id };
            }
        }
    }

    /// Turns the routed bend points of an un-routed branch into waypoints so
    /// the dragged one can move on its own.
    fn start_waypoint_drag(&mut self, edge_id: EdgeId, branch: usize, index: usize, at: Point, modifiers: Modifiers) {
        let Some(edge) = self.graph.edge(&edge_id) else {
            self.rejected("drag waypoint", GraphError::UnknownEdge(edge_id));
            return;
        };
        let mut waypoints = edge.waypoints(branch).to_vec();
        if waypoints.is_empty() {
            let obstacles = obstacles(&self.graph);
            let ctx = RouteContext {
                obstacles: &obstacles,
                layout: &self.config.layout,
                routing: &self.config.routing,
            };
            let routed = route_edge(&self.graph, edge, &ctx);
            waypoints = routed
                .branches
                .get(branch)
                .map(|line| line.interior().to_vec())
                .unwrap_or_default();
        }
        if index >= waypoints.len() {
            debug!(edge = %edge_id, branch, index, "no grip at index");
            return;
        }
        let before = self.graph.clone();
        match before.set_edge_waypoints(&edge_id, branch, waypoints) {
            Ok(graph) => self.graph = graph,
            Err(err) => {
                self.rejected("drag waypoint", err);
                return;
            }
        }
        self.gesture_start = Some(before);
        self.state = State::DraggingWaypoint {
            edge: edge_id,
            branch,
            index,
        };
        self.pointer_move(at, modifiers);
    }

    fn pointer_move(&mut self, at: Point, modifiers: Modifiers) {
        let next = match &self.state {
            State::DraggingNode { node, grab } => {
                self.graph.move_node(node, Point::new(at.x - grab.x, at.y - grab.y))
            }
            State::ResizingNode {
                node,
                origin,
                start,
            } => match self.resized(node, *start, *origin, at, modifiers.shift) {
                Some(size) => self.graph.resize_node(node, size),
                None => return,
            },
            State::DraggingWaypoint {
                edge,
                branch,
                index,
            } => self.moved_waypoint(&self.graph, edge, *branch, *index, at, modifiers.shift),
            State::PlacingNewText { node } => self.graph.move_node(node, at),
            _ => return,
        };
        match next {
            Ok(graph) => self.graph = graph,
            Err(err) => self.rejected("pointer move", err),
        }
    }

    fn pointer_up(&mut self, at: Point, modifiers: Modifiers) {
        if !matches!(
            self.state,
            State::DraggingNode { .. } | State::ResizingNode { .. } | State::DraggingWaypoint { .. }
        ) {
            return;
        }
        let Some(before) = self.gesture_start.take() else {
            self.state = State::EditingEnabled;
            return;
        };
        let state = std::mem::replace(&mut self.state, State::EditingEnabled);
        let (after, action) = match state {
            State::DraggingNode { node, grab } => {
                let dropped = Point::new(at.x - grab.x, at.y - grab.y).snapped(self.config.editing.grid_size);
                (
                    before.move_node(&node, dropped).map(|g| g.rebind_edges()),
                    "move node",
                )
            }
            State::ResizingNode {
                node,
                origin,
                start,
            } => match self.resized(&node, start, origin, at, modifiers.shift) {
                Some(size) => (
                    before.resize_node(&node, size).map(|g| g.rebind_edges()),
                    "resize node",
                ),
                None => (Ok(before.clone()), "resize node"),
            },
            State::DraggingWaypoint {
                edge,
                branch,
                index,
            } => (
                self.moved_waypoint(&self.graph, &edge, branch, index, at, modifiers.shift),
                "move waypoint",
            ),
            _ => return,
        };
        match after {
            Ok(after) => self.commit(before, after, action),
            Err(err) => {
                self.rejected(action, err);
                self.graph = before;
            }
        }
    }

    fn size_limits(&self, kind: &NodeKind) -> SizeLimits {
        let editing = &self.config.editing;
        match kind {
            NodeKind::Course(_) | NodeKind::MajorElective(_) | NodeKind::FreeElective(_) => {
                editing.course_limits
            }
            NodeKind::ColumnHeader { .. } => editing.header_limits,
            NodeKind::ProgramTitle { .. } | NodeKind::FreeText(_) => editing.text_limits,
        }
    }

    /// Size under the pointer, grid-snapped when `snap` is held, then
    /// clamped to the node kind's limits.
    fn resized(&self, node: &NodeId, start: Size, origin: Point, at: Point, snap: bool) -> Option<Size> {
        let kind = &self.graph.node(node)?.kind;
        let raw = Size::new(start.width + at.x - origin.x, start.height + at.y - origin.y);
        let raw = if snap {
            raw.snapped(self.config.editing.grid_size)
        } else {
            raw
        };
        Some(self.size_limits(kind).clamp(raw))
    }

    fn moved_waypoint(
        &self,
        graph: &Graph,
        edge: &EdgeId,
        branch: usize,
        index: usize,
        at: Point,
        snap: bool,
    ) -> Result<Graph, GraphError> {
        let current = graph
            .edge(edge)
            .ok_or_else(|| GraphError::UnknownEdge(edge.clone()))?;
        let mut waypoints = current.waypoints(branch).to_vec();
        let point = if snap {
            at.snapped(self.config.editing.grid_size)
        } else {
            at
        };
        if let Some(slot) = waypoints.get_mut(index) {
            *slot = point;
        }
        graph.set_edge_waypoints(edge, branch, waypoints)
    }

    fn start_text_edit(&mut self, node: NodeId, field: TextField) {
        if !self.edit_mode() {
            return;
        }
        if matches!(&self.state, State::EditingText { node: n, field: f, .. } if *n == node && *f == field) {
            return;
        }
        self.exit_sub_state();
        let Some(draft) = self.graph.node(&node).and_then(|n| n.text(field)) else {
            self.rejected("edit text", GraphError::NoSuchField { node, field });
            return;
        };
        let draft = draft.to_string();
        self.selected_node = Some(node.clone());
        self.state = State::EditingText { node, field, draft };
    }

    fn finish_text_edit(&mut self, keep: bool) {
        if !matches!(self.state, State::EditingText { .. }) {
            return;
        }
        let State::EditingText { node, field, draft } =
            std::mem::replace(&mut self.state, State::EditingEnabled)
        else {
            return;
        };
        if !keep {
            debug!(node = %node, "text edit discarded");
            return;
        }
        let before = self.graph.clone();
        match before.set_node_text(&node, field, &draft) {
            Ok(after) => self.commit(before, after, "edit text"),
            Err(err) => self.rejected("edit text", err),
        }
    }

    fn key(&mut self, key: Key) {
        match key {
            Key::Escape => {
                if matches!(self.state, State::EditingText { .. }) {
                    self.finish_text_edit(false);
                } else if !matches!(self.state, State::Viewing | State::EditingEnabled) {
                    self.abandon();
                }
            }
            Key::Enter => self.finish_text_edit(true),
            Key::Delete => self.delete_selected(),
        }
    }

    fn delete_selected(&mut self) {
        if !matches!(self.state, State::EditingEnabled) {
            return;
        }
        let Some(id) = self.selected_node.clone() else {
            return;
        };
        let deletable = self
            .graph
            .node(&id)
            .is_some_and(|n| n.kind.is_deletable());
        if !deletable {
            debug!(node = %id, "only free text can be deleted");
            return;
        }
        let before = self.graph.clone();
        match before.remove_free_text(&id) {
            Ok(after) => {
                self.commit(before, after, "delete text");
                self.selected_node = None;
            }
            Err(err) => self.rejected("delete text", err),
        }
    }

    fn pick_color(&mut self, color: Option<&str>) {
        let State::PickingColor { edge } = &self.state else {
            return;
        };
        if let Some(color) = color.filter(|c| !self.config.theme.is_preset_color(c)) {
            warn!(color, "color is not one of the picker presets");
            return;
        }
        let edge = edge.clone();
        let before = self.graph.select_edge(None);
        match before.set_edge_color(&edge, color) {
            Ok(after) => self.commit(before, after, "edge color"),
            Err(err) => {
                self.rejected("edge color", err);
                self.graph = before;
            }
        }
        self.state = State::EditingEnabled;
    }

    /// Styles the free text being edited, or else the selected one.
    fn set_text_style(&mut self, font_size: Option<f32>, color: Option<&str>) {
        if !self.edit_mode() {
            return;
        }
        if let Some(size) = font_size.filter(|s| !self.config.editing.is_font_size_preset(*s)) {
            warn!(size, "font size is not one of the presets");
            return;
        }
        if !matches!(self.state, State::EditingText { .. }) {
            self.exit_sub_state();
        }
        let target = match &self.state {
            State::EditingText { node, .. } => Some(node.clone()),
            _ => self.selected_node.clone(),
        };
        let Some(target) = target else {
            return;
        };
        let before = self.graph.clone();
        match before.set_text_style(&target, font_size, color) {
            Ok(after) => self.commit(before, after, "text style"),
            Err(err) => self.rejected("text style", err),
        }
    }

    fn add_text(&mut self) {
        if !self.edit_mode() {
            return;
        }
        self.exit_sub_state();
        let id = loop {
            let candidate = NodeId::new(format!("text-{}", self.next_text_id));
            self.next_text_id += 1;
            if self.graph.node(&candidate).is_none() {
                break candidate;
            }
        };
        let editing = &self.config.editing;
        let text = TextInfo {
            text: editing.new_text.clone(),
            font_size: editing.new_text_font_size,
            color: editing.new_text_color.clone(),
        };
        let before = self.graph.clone();
        match before.add_free_text(&id, editing.new_text_spawn, editing.new_text_size, text) {
            Ok(graph) => {
                self.graph = graph;
                self.gesture_start = Some(before);
                self.selected_node = Some(id.clone());
                self.state = State::PlacingNewText { node: id };
            }
            Err(err) => self.rejected("add text", err),
        }
    }

    /// Drops the following text node and opens its editor.
    fn place_text(&mut self, node: NodeId, at: Point) {
        let Some(before) = self.gesture_start.take() else {
            self.state = State::EditingEnabled;
            return;
        };
        match self.graph.move_node(&node, at) {
            Ok(after) => self.commit(before, after, "add text"),
            Err(err) => {
                self.rejected("add text", err);
                self.graph = before;
                self.state = State::EditingEnabled;
                return;
            }
        }
        let draft = self
            .graph
            .node(&node)
            .and_then(|n| n.text(TextField::Text))
            .unwrap_or_default()
            .to_string();
        self.state = State::EditingText {
            node,
            field: TextField::Text,
            draft,
        };
    }

    fn reset_route(&mut self, edge: &EdgeId) {
        if !self.edit_mode() {
            return;
        }
        self.exit_sub_state();
        let before = self.graph.clone();
        match before.clear_edge_waypoints(edge) {
            Ok(after) => self.commit(before, after, "reset route"),
            Err(err) => self.rejected("reset route", err),
        }
    }

    fn undo(&mut self) {
        if let State::EditingText { .. } = self.state {
            self.finish_text_edit(false);
        }
        self.abandon();
        match self.history.undo() {
            Some(snapshot) => {
                self.graph = snapshot;
                info!(cursor = self.history.cursor(), "undo");
            }
            None => debug!("nothing to undo"),
        }
        if self
            .selected_node
            .as_ref()
            .is_some_and(|id| self.graph.node(id).is_none())
        {
            self.selected_node = None;
        }
    }
}

/// Grips of every branch: its waypoints when set, else the routed bends.
pub fn grips_of(routes: &[RoutedEdge]) -> Vec<Grip> {
    let mut grips = Vec::new();
    for routed in routes {
        for (branch, line) in routed.branches.iter().enumerate() {
            for (index, at) in line.interior().iter().enumerate() {
                grips.push(Grip {
                    edge: routed.edge.clone(),
                    branch,
                    index,
                    at: *at,
                });
            }
        }
    }
    grips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseInfo, Node};

    fn course(code: &str, x: f32, y: f32) -> Node {
        Node::new(
            code,
            NodeKind::Course(CourseInfo {
                code: code.to_string(),
                title: format!("{code} title"),
                credits: 3,
                year: 1,
                semester: 1,
                or_group: None,
            }),
            Point::new(x, y),
            Size::new(200.0, 100.0),
        )
    }

    fn controller() -> Controller {
        let mut graph = Graph::new();
        graph.insert_node(course("MATH101", 300.0, 0.0)).unwrap();
        graph.insert_node(course("MATH201", 300.0, 150.0)).unwrap();
        graph.insert_node(course("PHYS101", 600.0, 450.0)).unwrap();
        graph.insert_edge(vec!["MATH101".into()], "MATH201".into()).unwrap();
        graph.insert_edge(vec!["MATH101".into()], "PHYS101".into()).unwrap();
        Controller::new(graph, EditorConfig::default())
    }

    fn down(target: Target, x: f32, y: f32) -> Input {
        Input::PointerDown {
            target,
            at: Point::new(x, y),
            modifiers: Modifiers::default(),
        }
    }

    fn mv(x: f32, y: f32) -> Input {
        Input::PointerMove {
            at: Point::new(x, y),
            modifiers: Modifiers::default(),
        }
    }

    fn up(x: f32, y: f32, shift: bool) -> Input {
        Input::PointerUp {
            at: Point::new(x, y),
            modifiers: Modifiers { shift },
        }
    }

    fn node_target(id: &str) -> Target {
        Target::Node { id: id.into() }
    }

    fn position(c: &Controller, id: &str) -> Point {
        c.graph().node(&id.into()).unwrap().position
    }

    #[test]
    fn starts_in_viewing_and_ignores_drags() {
        let mut c = controller();
        assert_eq!(c.state(), &State::Viewing);
        c.replay([down(node_target("MATH101"), 310.0, 10.0), mv(500.0, 500.0), up(500.0, 500.0, false)]);
        assert_eq!(position(&c, "MATH101"), Point::new(300.0, 0.0));
        assert_eq!(c.selected_node(), Some(&NodeId::from("MATH101")));
        assert!(c.history().is_empty());
        assert!(c.grips().is_empty());
    }

    #[test]
    fn drop_snaps_to_grid_and_pushes_one_snapshot() {
        let mut c = controller();
        let original = c.graph().clone();
        c.replay([
            Input::SetEditMode { enabled: true },
            down(node_target("MATH101"), 310.0, 10.0),
            mv(400.0, 90.0),
        ]);
        assert_eq!(position(&c, "MATH101"), Point::new(390.0, 80.0));
        assert!(c.history().is_empty());
        c.handle(up(437.0, 180.0, false));
        let p = position(&c, "MATH101");
        assert_eq!(p, Point::new(450.0, 150.0));
        assert_eq!(p.x % 50.0, 0.0);
        assert_eq!(p.y % 50.0, 0.0);
        assert_eq!(c.history().len(), 1);
        assert_eq!(c.state(), &State::EditingEnabled);
        c.handle(Input::Undo);
        assert_eq!(c.graph(), &original);
    }

    #[test]
    fn escape_cancels_a_drag() {
        let mut c = controller();
        c.replay([
            Input::ToggleEditMode,
            down(node_target("MATH101"), 310.0, 10.0),
            mv(800.0, 800.0),
            Input::Key { key: Key::Escape },
        ]);
        assert_eq!(position(&c, "MATH101"), Point::new(300.0, 0.0));
        assert!(c.history().is_empty());
        assert_eq!(c.state(), &State::EditingEnabled);
    }

    #[test]
    fn drop_in_place_does_not_push_a_snapshot() {
        let mut c = controller();
        c.replay([
            Input::SetEditMode { enabled: true },
            down(node_target("MATH101"), 310.0, 10.0),
            up(320.0, 20.0, false),
        ]);
        assert_eq!(position(&c, "MATH101"), Point::new(300.0, 0.0));
        assert!(c.history().is_empty());
    }

    #[test]
    fn resize_snaps_only_with_shift_and_respects_limits() {
        let mut c = controller();
        c.replay([
            Input::SetEditMode { enabled: true },
            down(Target::ResizeHandle { id: "MATH101".into() }, 500.0, 100.0),
            up(537.0, 112.0, false),
        ]);
        let size = c.graph().node(&"MATH101".into()).unwrap().size;
        assert_eq!(size, Size::new(237.0, 112.0));

        c.replay([
            down(Target::ResizeHandle { id: "MATH101".into() }, 537.0, 112.0),
            up(540.0, 130.0, true),
        ]);
        let size = c.graph().node(&"MATH101".into()).unwrap().size;
        assert_eq!(size, Size::new(250.0, 150.0));

        c.replay([
            down(Target::ResizeHandle { id: "MATH101".into() }, 550.0, 150.0),
            up(100.0, 900.0, false),
        ]);
        let size = c.graph().node(&"MATH101".into()).unwrap().size;
        assert_eq!(size, Size::new(150.0, 200.0));
        assert_eq!(c.history().len(), 3);
    }

    #[test]
    fn leaving_edit_mode_discards_open_text() {
        let mut c = controller();
        c.replay([
            Input::SetEditMode { enabled: true },
            Input::StartTextEdit {
                node: "MATH101".into(),
                field: TextField::Title,
            },
            Input::TypeText {
                text: "Changed".to_string(),
            },
            Input::SetEditMode { enabled: false },
        ]);
        assert_eq!(c.state(), &State::Viewing);
        assert_eq!(
            c.graph().node(&"MATH101".into()).unwrap().text(TextField::Title),
            Some("MATH101 title")
        );
        assert!(c.history().is_empty());
    }

    #[test]
    fn enter_commits_and_escape_discards_text() {
        let mut c = controller();
        c.replay([
            Input::SetEditMode { enabled: true },
            Input::StartTextEdit {
                node: "MATH101".into(),
                field: TextField::Code,
            },
            Input::TypeText {
                text: "MTH1001".to_string(),
            },
            Input::Key { key: Key::Enter },
        ]);
        let text = |c: &Controller| {
            c.graph()
                .node(&"MATH101".into())
                .unwrap()
                .text(TextField::Code)
                .map(str::to_string)
        };
        assert_eq!(text(&c).as_deref(), Some("MTH1001"));
        assert_eq!(c.history().len(), 1);

        c.replay([
            Input::StartTextEdit {
                node: "MATH101".into(),
                field: TextField::Code,
            },
            Input::TypeText {
                text: "oops".to_string(),
            },
            Input::Key { key: Key::Escape },
        ]);
        assert_eq!(text(&c).as_deref(), Some("MTH1001"));
        assert_eq!(c.history().len(), 1);

        // blur with the value untouched is not a commit
        c.replay([
            Input::StartTextEdit {
                node: "MATH101".into(),
                field: TextField::Code,
            },
            Input::Blur,
        ]);
        assert_eq!(c.history().len(), 1);
    }

    #[test]
    fn opening_a_second_editor_commits_the_first() {
        let mut c = controller();
        c.replay([
            Input::SetEditMode { enabled: true },
            Input::StartTextEdit {
                node: "MATH101".into(),
                field: TextField::Title,
            },
            Input::TypeText {
                text: "Calculus I".to_string(),
            },
            Input::StartTextEdit {
                node: "MATH201".into(),
                field: TextField::Title,
            },
        ]);
        assert_eq!(
            c.graph().node(&"MATH101".into()).unwrap().text(TextField::Title),
            Some("Calculus I")
        );
        assert!(matches!(c.state(), State::EditingText { node, .. } if node.as_str() == "MATH201"));
    }

    #[test]
    fn color_picker_toggles_and_commits() {
        let mut c = controller();
        let edge: EdgeId = "MATH101-MATH201".into();
        c.replay([
            Input::SetEditMode { enabled: true },
            down(Target::Edge { id: edge.clone() }, 400.0, 120.0),
        ]);
        assert_eq!(c.state(), &State::PickingColor { edge: edge.clone() });
        assert!(c.graph().edge(&edge).unwrap().selected);

        c.handle(down(Target::Edge { id: edge.clone() }, 400.0, 120.0));
        assert_eq!(c.state(), &State::EditingEnabled);
        assert!(!c.graph().edge(&edge).unwrap().selected);
        assert!(c.history().is_empty());

        c.replay([
            down(Target::Edge { id: edge.clone() }, 400.0, 120.0),
            Input::PickColor {
                color: Some("#10b981".to_string()),
            },
        ]);
        let stored = c.graph().edge(&edge).unwrap();
        assert_eq!(stored.color.as_deref(), Some("#10b981"));
        assert!(!stored.selected);
        assert_eq!(c.history().len(), 1);
    }

    #[test]
    fn colors_outside_the_presets_are_ignored() {
        let mut c = controller();
        let edge: EdgeId = "MATH101-MATH201".into();
        c.replay([
            Input::SetEditMode { enabled: true },
            down(Target::Edge { id: edge.clone() }, 400.0, 120.0),
            Input::PickColor {
                color: Some("#123456".to_string()),
            },
        ]);
        assert_eq!(c.graph().edge(&edge).unwrap().color, None);
        assert_eq!(c.state(), &State::PickingColor { edge: edge.clone() });
        assert!(c.history().is_empty());

        c.handle(Input::PickColor { color: None });
        assert_eq!(c.state(), &State::EditingEnabled);
        assert!(c.history().is_empty());
    }

    #[test]
    fn styling_text_closes_the_color_picker_first() {
        let mut c = controller();
        let edge: EdgeId = "MATH101-MATH201".into();
        c.replay([
            Input::SetEditMode { enabled: true },
            Input::AddText,
            down(Target::Canvas, 700.0, 40.0),
            Input::Blur,
            down(Target::Edge { id: edge.clone() }, 400.0, 120.0),
        ]);
        assert_eq!(c.selected_node(), Some(&NodeId::from("text-0")));
        assert_eq!(c.history().len(), 1);

        c.handle(Input::SetTextStyle {
            font_size: Some(20.0),
            color: None,
        });
        assert_eq!(c.state(), &State::EditingEnabled);
        assert_eq!(c.history().len(), 2);
        assert!(c.graph().edges().iter().all(|e| !e.selected));

        c.handle(Input::Undo);
        assert!(c.graph().edges().iter().all(|e| !e.selected));
        match &c.graph().node(&"text-0".into()).unwrap().kind {
            NodeKind::FreeText(info) => assert_eq!(info.font_size, 16.0),
            other => panic!("unexpected kind {other:?}"),
        }

        // sizes off the menu are ignored
        c.handle(Input::SetTextStyle {
            font_size: Some(18.0),
            color: None,
        });
        assert_eq!(c.history().len(), 2);
    }

    #[test]
    fn color_picking_is_disabled_outside_edit_mode() {
        let mut c = controller();
        c.handle(down(Target::Edge { id: "MATH101-MATH201".into() }, 0.0, 0.0));
        assert_eq!(c.state(), &State::Viewing);
    }

    #[test]
    fn dragging_a_grip_materializes_waypoints() {
        let mut c = controller();
        c.handle(Input::SetEditMode { enabled: true });
        let edge: EdgeId = "MATH101-PHYS101".into();
        let grips: Vec<Grip> = c.grips().into_iter().filter(|g| g.edge == edge).collect();
        // routed through the column gutter: four bends
        assert_eq!(grips.len(), 4);
        let mut expected = vec![Point::new(400.0, 300.0)];
        expected.extend(grips[1..].iter().map(|g| g.at));
        c.replay([
            down(
                Target::Grip {
                    edge: edge.clone(),
                    branch: 0,
                    index: 0,
                },
                grips[0].at.x,
                grips[0].at.y,
            ),
            mv(380.0, 311.0),
            up(380.0, 311.0, true),
        ]);
        let stored = c.graph().edge(&edge).unwrap();
        assert_eq!(stored.waypoints(0), expected.as_slice());
        assert_eq!(c.history().len(), 1);

        c.handle(Input::ResetRoute { edge: edge.clone() });
        assert!(!c.graph().edge(&edge).unwrap().has_waypoints());
        assert_eq!(c.history().len(), 2);
    }

    #[test]
    fn placing_text_then_editing_and_deleting() {
        let mut c = controller();
        c.replay([Input::SetEditMode { enabled: true }, Input::AddText]);
        let id: NodeId = "text-0".into();
        assert_eq!(c.state(), &State::PlacingNewText { node: id.clone() });
        assert_eq!(position(&c, "text-0"), Point::new(500.0, 100.0));

        c.replay([mv(720.0, 40.0), down(Target::Canvas, 730.0, 45.0)]);
        assert_eq!(position(&c, "text-0"), Point::new(730.0, 45.0));
        assert!(matches!(c.state(), State::EditingText { field: TextField::Text, .. }));
        assert_eq!(c.history().len(), 1);

        c.replay([
            Input::TypeText {
                text: "Capstone track".to_string(),
            },
            Input::SetTextStyle {
                font_size: Some(24.0),
                color: Some("#ef4444".to_string()),
            },
            Input::Blur,
        ]);
        let node = c.graph().node(&id).unwrap();
        match &node.kind {
            NodeKind::FreeText(info) => {
                assert_eq!(info.text, "Capstone track");
                assert_eq!(info.font_size, 24.0);
                assert_eq!(info.color, "#ef4444");
            }
            other => panic!("unexpected kind {other:?}"),
        }

        // Delete is ignored while a text editor is open
        c.replay([
            Input::StartTextEdit {
                node: id.clone(),
                field: TextField::Text,
            },
            Input::Key { key: Key::Delete },
        ]);
        assert!(c.graph().node(&id).is_some());
        c.replay([Input::Key { key: Key::Escape }, Input::Key { key: Key::Delete }]);
        assert!(c.graph().node(&id).is_none());
        assert_eq!(c.selected_node(), None);
    }

    #[test]
    fn escape_while_placing_removes_the_new_text() {
        let mut c = controller();
        c.replay([
            Input::SetEditMode { enabled: true },
            Input::AddText,
            Input::Key { key: Key::Escape },
        ]);
        assert!(c.graph().node(&"text-0".into()).is_none());
        assert!(c.history().is_empty());
    }

    #[test]
    fn courses_cannot_be_deleted() {
        let mut c = controller();
        c.replay([
            Input::SetEditMode { enabled: true },
            down(node_target("MATH101"), 310.0, 10.0),
            up(310.0, 10.0, false),
            Input::Key { key: Key::Delete },
        ]);
        assert!(c.graph().node(&"MATH101".into()).is_some());
    }

    #[test]
    fn undo_without_history_is_silent() {
        let mut c = controller();
        let before = c.graph().clone();
        c.handle(Input::Undo);
        c.handle(Input::Undo);
        assert_eq!(c.graph(), &before);
    }

    #[test]
    fn export_forces_edit_mode_off() {
        let mut c = controller();
        c.replay([
            Input::SetEditMode { enabled: true },
            down(Target::Edge { id: "MATH101-MATH201".into() }, 0.0, 0.0),
        ]);
        let export = c.export();
        assert!(!c.edit_mode());
        assert!(!c.graph().edges().iter().any(|e| e.selected));
        assert_eq!(export.edges.len(), 2);
    }

    #[test]
    fn inputs_round_trip_through_json() {
        let json = r#"[
            {"type": "set_edit_mode", "enabled": true},
            {"type": "pointer_down", "target": {"kind": "node", "id": "MATH101"}, "at": {"x": 310, "y": 10}},
            {"type": "pointer_up", "at": {"x": 612, "y": 24}, "modifiers": {"shift": false}},
            {"type": "key", "key": "escape"}
        ]"#;
        let inputs: Vec<Input> = serde_json::from_str(json).unwrap();
        let mut c = controller();
        c.replay(inputs);
        assert_eq!(position(&c, "MATH101"), Point::new(600.0, 0.0));
    }

    #[test]
    fn load_resets_edit_mode_and_history() {
        let mut c = controller();
        c.replay([
            Input::SetEditMode { enabled: true },
            down(node_target("MATH101"), 310.0, 10.0),
            up(612.0, 10.0, false),
        ]);
        assert_eq!(c.history().len(), 1);
        let graph = c.graph().clone();
        c.load(graph);
        assert!(!c.edit_mode());
        assert!(c.history().is_empty());
    }
}
