//! Conversion of extracted study-plan data into a [`Graph`].
//!
//! The extraction service hands over either a flat list of course records
//! with raw prerequisite strings, or a pre-built `{nodes, edges}` graph. Both
//! end up as the same model: decorative column headers and an optional
//! program title first, then one node per course, then prerequisite edges.
//! Edges that reference unknown courses are skipped, never fatal.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LayoutConfig;
use crate::geometry::{Point, Size};
use crate::model::{CourseInfo, Graph, Node, NodeId, NodeKind};

static COURSE_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z]{2,4}\s*\d{4})").unwrap());

pub const PROGRAM_TITLE_ID: &str = "program-title";

const TITLE_SIZE: Size = Size::new(600.0, 40.0);

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid plan document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramInfo {
    #[serde(default)]
    pub program_code: String,
    pub program_title: String,
    pub total_credits: u32,
}

/// The "or" marker arrives either as a boolean or as the literal string `"or"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrFlag {
    Flag(bool),
    Text(String),
}

impl OrFlag {
    pub fn is_set(&self) -> bool {
        match self {
            OrFlag::Flag(flag) => *flag,
            OrFlag::Text(text) => text.trim().eq_ignore_ascii_case("or"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub year: u8,
    pub semester: u8,
    #[serde(default, alias = "course_code")]
    pub code: String,
    #[serde(default, alias = "course_title")]
    pub title: String,
    #[serde(default = "default_credits")]
    pub credits: u32,
    #[serde(default)]
    pub prerequisite: String,
    #[serde(default)]
    pub or_flag: Option<OrFlag>,
}

fn default_credits() -> u32 {
    3
}

impl CourseRecord {
    fn is_or(&self) -> bool {
        self.or_flag.as_ref().is_some_and(OrFlag::is_set)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedNode {
    pub id: String,
    pub year: u8,
    pub semester: u8,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_credits")]
    pub credits: u32,
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    #[serde(default)]
    pub or_group: Option<String>,
    #[serde(default)]
    pub position: Option<Point>,
}

fn default_node_type() -> String {
    "course".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEdge {
    pub from_id: String,
    pub to_id: String,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

impl ExtractedEdge {
    /// Branching sources when more than one is listed, otherwise `from_id`.
    pub fn source_ids(&self) -> Vec<NodeId> {
        match &self.sources {
            Some(sources) if sources.len() > 1 => {
                sources.iter().map(|s| NodeId::new(s.as_str())).collect()
            }
            _ => vec![NodeId::new(self.from_id.as_str())],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedGraph {
    #[serde(default)]
    pub nodes: Vec<ExtractedNode>,
    #[serde(default)]
    pub edges: Vec<ExtractedEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    #[serde(default, alias = "program_info")]
    pub program: Option<ProgramInfo>,
    #[serde(default)]
    pub courses: Vec<CourseRecord>,
    #[serde(default)]
    pub graph: Option<ExtractedGraph>,
}

impl PlanDocument {
    /// A pre-built graph wins over the raw course list.
    pub fn to_graph(&self, layout: &LayoutConfig) -> Graph {
        match &self.graph {
            Some(graph) if !graph.nodes.is_empty() => {
                graph_from_extracted(graph, self.program.as_ref(), layout)
            }
            _ => build_graph(&self.courses, self.program.as_ref(), layout),
        }
    }
}

pub fn load_plan(input: &str) -> Result<PlanDocument, ImportError> {
    let doc: PlanDocument = serde_json::from_str(input)?;
    debug!(
        courses = doc.courses.len(),
        prebuilt = doc.graph.is_some(),
        "parsed plan document"
    );
    Ok(doc)
}

/// Column-major term index, 1-based: year 1 semester 1 is column 1.
fn term_column(year: u8, semester: u8, layout: &LayoutConfig) -> f32 {
    let per_year = layout.semesters_per_year.max(1) as f32;
    (year.max(1) as f32 - 1.0) * per_year + semester as f32
}

fn detect_kind(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    if lower.contains("major elective") {
        "major_elective"
    } else if lower.contains("free elective") {
        "free_elective"
    } else {
        "course"
    }
}

fn course_kind(kind: &str, info: CourseInfo) -> NodeKind {
    match kind {
        "major_elective" => NodeKind::MajorElective(info),
        "free_elective" => NodeKind::FreeElective(info),
        _ => NodeKind::Course(info),
    }
}

fn decorations(program: Option<&ProgramInfo>, layout: &LayoutConfig) -> Vec<Node> {
    let mut nodes = Vec::new();
    if let Some(program) = program {
        nodes.push(Node::new(
            PROGRAM_TITLE_ID,
            NodeKind::ProgramTitle {
                title: program.program_title.clone(),
                credits: program.total_credits,
            },
            layout.title_position,
            TITLE_SIZE,
        ));
    }
    let mut index = 0;
    for year in 1..=layout.years {
        for semester in 1..=layout.semesters_per_year {
            index += 1;
            nodes.push(Node::new(
                format!("header-{year}-{semester}"),
                NodeKind::ColumnHeader { year, semester },
                Point::new(index as f32 * layout.column_spacing, layout.header_y),
                layout.header_size,
            ));
        }
    }
    nodes
}

fn insert_all(graph: &mut Graph, nodes: impl IntoIterator<Item = Node>) {
    for node in nodes {
        let id = node.id.clone();
        if let Err(err) = graph.insert_node(node) {
            warn!(node = %id, error = %err, "skipping node");
        }
    }
}

fn connect_all(graph: &mut Graph, edges: impl IntoIterator<Item = (Vec<NodeId>, NodeId)>) {
    for (sources, target) in edges {
        if let Err(err) = graph.insert_edge(sources, target.clone()) {
            warn!(target = %target, error = %err, "skipping prerequisite");
        }
    }
}

/// Code at the start of a prerequisite entry, spaces removed.
pub fn prerequisite_code(entry: &str) -> String {
    let entry = entry.trim();
    let code = COURSE_CODE_RE
        .captures(entry)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(entry);
    code.split_whitespace().collect()
}

/// Builds the graph from raw course records: grid layout, elective ids,
/// OR tags and prerequisite edges.
pub fn build_graph(courses: &[CourseRecord], program: Option<&ProgramInfo>, layout: &LayoutConfig) -> Graph {
    let mut sorted: Vec<&CourseRecord> = courses.iter().collect();
    sorted.sort_by_key(|c| (c.year, c.semester));

    let mut graph = Graph::new();
    insert_all(&mut graph, decorations(program, layout));

    let mut code_to_id: HashMap<String, NodeId> = HashMap::new();
    let mut elective_counter: HashMap<(u8, u8), usize> = HashMap::new();
    let mut rows: HashMap<(u8, u8), usize> = HashMap::new();
    let mut nodes = Vec::with_capacity(sorted.len());

    for record in &sorted {
        let term = (record.year, record.semester);
        let kind = detect_kind(&record.title);
        let id = if record.code.is_empty() {
            let n = elective_counter.entry(term).or_insert(0);
            *n += 1;
            NodeId::new(format!(
                "Y{}S{}-{}-{}",
                record.year,
                record.semester,
                kind.to_uppercase(),
                n
            ))
        } else {
            let id = NodeId::new(record.code.as_str());
            code_to_id.insert(record.code.clone(), id.clone());
            code_to_id.insert(record.code.split_whitespace().collect(), id.clone());
            id
        };

        let row = rows.entry(term).or_insert(0);
        let position = Point::new(
            term_column(record.year, record.semester, layout) * layout.column_spacing,
            *row as f32 * layout.row_spacing,
        );
        *row += 1;

        let info = CourseInfo {
            code: record.code.clone(),
            title: record.title.clone(),
            credits: record.credits,
            year: record.year,
            semester: record.semester,
            or_group: record
                .is_or()
                .then(|| format!("Y{}S{}-OR", record.year, record.semester)),
        };
        nodes.push(Node::new(id, course_kind(kind, info), position, layout.course_size));
    }
    insert_all(&mut graph, nodes);

    // Grouped by target course, first mention keeps its place.
    let mut prerequisites: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
    for record in &sorted {
        let raw = record.prerequisite.trim();
        if record.code.is_empty() || raw.is_empty() || raw == "-" {
            continue;
        }
        let mut sources: Vec<NodeId> = Vec::new();
        for entry in raw.split(',') {
            if entry.trim().is_empty() {
                continue;
            }
            let code = prerequisite_code(entry);
            match code_to_id.get(&code) {
                Some(id) if !sources.contains(id) => sources.push(id.clone()),
                Some(_) => {}
                None => debug!(course = %record.code, prerequisite = %code, "prerequisite not in plan"),
            }
        }
        if sources.is_empty() {
            continue;
        }
        let Some(target) = code_to_id.get(&record.code).cloned() else {
            continue;
        };
        match prerequisites.iter_mut().find(|(t, _)| *t == target) {
            Some(slot) => slot.1 = sources,
            None => prerequisites.push((target, sources)),
        }
    }
    connect_all(
        &mut graph,
        prerequisites.into_iter().map(|(target, sources)| (sources, target)),
    );

    debug!(
        nodes = graph.nodes().len(),
        edges = graph.edges().len(),
        "built study plan graph"
    );
    graph
}

/// Converts a graph the extraction service already laid out.
pub fn graph_from_extracted(
    extracted: &ExtractedGraph,
    program: Option<&ProgramInfo>,
    layout: &LayoutConfig,
) -> Graph {
    let mut graph = Graph::new();
    insert_all(&mut graph, decorations(program, layout));
    insert_all(
        &mut graph,
        extracted.nodes.iter().map(|node| {
            let info = CourseInfo {
                code: node.code.clone(),
                title: node.title.clone(),
                credits: node.credits,
                year: node.year,
                semester: node.semester,
                or_group: node.or_group.clone(),
            };
            Node::new(
                node.id.as_str(),
                course_kind(&node.node_type, info),
                node.position.unwrap_or_default(),
                layout.course_size,
            )
        }),
    );
    connect_all(
        &mut graph,
        extracted
            .edges
            .iter()
            .map(|edge| (edge.source_ids(), NodeId::new(edge.to_id.as_str()))),
    );
    graph
}
