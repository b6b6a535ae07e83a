use std::fs;
use std::path::{Path, PathBuf};

use study_plan_graph::config::EditorConfig;
use study_plan_graph::controller::{Controller, Input, Modifiers, State, Target};
use study_plan_graph::geometry::{Point, Side, is_orthogonal};
use study_plan_graph::import::{PROGRAM_TITLE_ID, load_plan};
use study_plan_graph::model::{EdgeId, Graph, NodeId, NodeKind, TextField};
use study_plan_graph::render::render_svg;
use study_plan_graph::router::{RoutedEdge, route_graph};

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    fs::read_to_string(&path).unwrap_or_else(|err| panic!("failed to read {}: {err}", path.display()))
}

fn fixture_graph(config: &EditorConfig) -> Graph {
    let plan = load_plan(&read_fixture("plan.json")).expect("fixture parses");
    plan.to_graph(&config.layout)
}

fn position(graph: &Graph, id: &str) -> Point {
    graph
        .node(&NodeId::from(id))
        .unwrap_or_else(|| panic!("missing node {id}"))
        .position
}

fn route_of<'a>(routes: &'a [RoutedEdge], id: &str) -> &'a RoutedEdge {
    routes
        .iter()
        .find(|r| r.edge.as_str() == id)
        .unwrap_or_else(|| panic!("missing route {id}"))
}

fn assert_attached(graph: &Graph, routes: &[RoutedEdge]) {
    for edge in graph.edges() {
        let routed = route_of(routes, edge.id.as_str());
        assert_eq!(routed.branches.len(), edge.branch_count(), "{}", edge.id);
        let target = graph.node(&edge.target).expect("target exists").rect();
        for (branch, line) in routed.branches.iter().enumerate() {
            let binding = edge.binding(branch).expect("binding per branch");
            let source = graph
                .node(&edge.source_ids()[branch])
                .expect("source exists")
                .rect();
            assert_eq!(line.first(), Some(source.anchor(binding.source)), "{}", edge.id);
            assert_eq!(line.last(), Some(target.anchor(binding.target)), "{}", edge.id);
            assert!(is_orthogonal(&line.points), "{} is not orthogonal", edge.id);
        }
    }
}

#[test]
fn fixture_builds_the_term_grid() {
    let config = EditorConfig::default();
    let graph = fixture_graph(&config);

    let courses = graph
        .nodes()
        .iter()
        .filter(|n| n.kind.is_course_like())
        .count();
    assert_eq!(courses, 15);
    assert_eq!(graph.nodes().len(), 15 + 8 + 1);

    let title = graph.node(&PROGRAM_TITLE_ID.into()).expect("title node");
    assert!(matches!(title.kind, NodeKind::ProgramTitle { credits: 132, .. }));
    assert_eq!(position(&graph, "header-1-1"), Point::new(300.0, -100.0));
    assert_eq!(position(&graph, "header-4-2"), Point::new(2400.0, -100.0));

    assert_eq!(position(&graph, "CSX3001"), Point::new(300.0, 0.0));
    assert_eq!(position(&graph, "GE1401"), Point::new(300.0, 300.0));
    assert_eq!(position(&graph, "CSX3005"), Point::new(900.0, 300.0));
    assert_eq!(position(&graph, "Y3S2-FREE_ELECTIVE-1"), Point::new(1800.0, 150.0));
    assert!(matches!(
        graph.node(&"Y3S1-MAJOR_ELECTIVE-1".into()).map(|n| &n.kind),
        Some(NodeKind::MajorElective(_))
    ));
}

#[test]
fn fixture_prerequisites_become_edges() {
    let config = EditorConfig::default();
    let graph = fixture_graph(&config);

    let ids: Vec<&str> = graph.edges().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "CSX3001-CSX3002",
            "MTH1001-MTH1002",
            "CSX3002+MTH1002-CSX3003",
            "CSX3002-CSX3004",
            "CSX3002-CSX3005",
            "CSX3003-CSX3006",
            "CSX3003-CSX3008",
            "CSX3006+CSX3008-CSX4001",
            "CSX4001-CSX4002",
        ]
    );

    // the unknown ENG9999 entry is dropped, the rest stays branching
    let capstone = graph.edge(&"CSX3006+CSX3008-CSX4001".into()).expect("edge");
    assert_eq!(capstone.branch_count(), 2);

    assert!(graph.shows_or_badge(&"CSX3004".into()));
    assert!(graph.shows_or_badge(&"CSX3005".into()));
    assert!(!graph.shows_or_badge(&"CSX3003".into()));
}

#[test]
fn fixture_routes_attach_to_handles() {
    let config = EditorConfig::default();
    let graph = fixture_graph(&config);
    let routes = route_graph(&graph, &config.layout, &config.routing);
    assert_eq!(routes.len(), graph.edges().len());
    assert_attached(&graph, &routes);

    // same row, adjacent terms: one straight run through the column gap
    let simple = route_of(&routes, "CSX3001-CSX3002");
    assert_eq!(
        simple.branches[0].points,
        vec![Point::new(500.0, 50.0), Point::new(600.0, 50.0)]
    );

    let branching = route_of(&routes, "CSX3002+MTH1002-CSX3003");
    let ends: Vec<Option<Point>> = branching.branches.iter().map(|b| b.last()).collect();
    assert_eq!(ends[0], ends[1]);
    let edge = graph.edge(&"CSX3002+MTH1002-CSX3003".into()).expect("edge");
    assert_eq!(edge.binding(0).map(|b| b.target), Some(Side::Left));
}

#[test]
fn fixture_routing_is_deterministic() {
    let config = EditorConfig::default();
    let graph = fixture_graph(&config);
    let first = route_graph(&graph, &config.layout, &config.routing);
    let second = route_graph(&graph, &config.layout, &config.routing);
    assert_eq!(first, second);

    let svg_a = render_svg(&graph, &first, &config.theme, &config.export, false);
    let svg_b = render_svg(&graph, &second, &config.theme, &config.export, false);
    assert_eq!(svg_a, svg_b);
}

#[test]
fn fixture_export_covers_the_whole_plan() {
    let config = EditorConfig::default();
    let mut controller = Controller::new(fixture_graph(&config), config);
    let export = controller.export();

    assert_eq!(export.nodes.len(), 24);
    assert_eq!(export.edges.len(), 9);
    // headers start at x=300, the title sits highest at y=-180
    assert_eq!(export.x, 220.0);
    assert_eq!(export.y, -260.0);
    assert_eq!(export.width, 2600.0 - 300.0 + 160.0);

    let json = serde_json::to_value(&export).expect("export serializes");
    assert_eq!(json["edges"][0]["id"], "CSX3001-CSX3002");
    assert_eq!(json["edges"][0]["custom_color"], false);
    assert!(json["nodes"][0].get("font_size").is_none());
}

#[test]
fn replayed_session_edits_the_plan() {
    let config = EditorConfig::default();
    let mut controller = Controller::new(fixture_graph(&config), config);
    let inputs: Vec<Input> =
        serde_json::from_str(&read_fixture("replay.json")).expect("replay parses");
    controller.replay(inputs);

    assert_eq!(controller.state(), &State::Viewing);
    let graph = controller.graph();

    // dropped at (392, 458), snapped to the 50 grid
    assert_eq!(position(graph, "GE1401"), Point::new(400.0, 450.0));

    let recolored = graph.edge(&EdgeId::from("CSX3001-CSX3002")).expect("edge");
    assert_eq!(recolored.color.as_deref(), Some("#ec4899"));
    assert!(graph.edges().iter().all(|e| !e.selected));

    assert_eq!(
        graph.node(&"MTH1001".into()).and_then(|n| n.text(TextField::Title)),
        Some("Calculus for Computing")
    );

    let note = graph.node(&"text-0".into()).expect("placed text");
    assert_eq!(note.position, Point::new(1500.0, 620.0));
    assert_eq!(note.text(TextField::Text), Some("Capstone"));

    // move, color, title, placement, text content
    assert_eq!(controller.history().len(), 5);

    let export = controller.export();
    let edge = export
        .edges
        .iter()
        .find(|e| e.id == "CSX3001-CSX3002")
        .expect("exported edge");
    assert!(edge.custom_color);
    assert_eq!(edge.color, "#ec4899");
}

#[test]
fn history_keeps_the_twenty_newest_snapshots() {
    let config = EditorConfig::default();
    let mut controller = Controller::new(fixture_graph(&config), config);
    controller.handle(Input::SetEditMode { enabled: true });

    let mut before_each = Vec::new();
    for step in 0..25 {
        before_each.push(controller.graph().clone());
        let x = 310.0 + 50.0 * (step + 1) as f32;
        controller.replay([
            Input::PointerDown {
                target: Target::Node { id: "CSX3001".into() },
                at: Point::new(310.0, 10.0),
                modifiers: Modifiers::default(),
            },
            Input::PointerUp {
                at: Point::new(x, 10.0),
                modifiers: Modifiers::default(),
            },
        ]);
        let expected = Point::new(300.0 + 50.0 * (step + 1) as f32, 0.0);
        assert_eq!(position(controller.graph(), "CSX3001"), expected);
    }
    assert_eq!(controller.history().len(), 20);

    for _ in 0..20 {
        controller.handle(Input::Undo);
    }
    assert_eq!(controller.graph(), &before_each[5]);

    // past the oldest snapshot the oldest stays put
    controller.handle(Input::Undo);
    assert_eq!(controller.graph(), &before_each[5]);
}

#[test]
fn edit_decorations_never_reach_the_export() {
    let config = EditorConfig::default();
    let mut controller = Controller::new(fixture_graph(&config), config);
    controller.replay([
        Input::SetEditMode { enabled: true },
        Input::PointerDown {
            target: Target::Edge {
                id: "CSX4001-CSX4002".into(),
            },
            at: Point::new(2350.0, 50.0),
            modifiers: Modifiers::default(),
        },
    ]);
    assert!(matches!(controller.state(), State::PickingColor { .. }));

    let editing = {
        let config = controller.config();
        render_svg(
            controller.graph(),
            &controller.routes(),
            &config.theme,
            &config.export,
            true,
        )
    };
    assert!(editing.contains("class=\"handle\""));

    let export = controller.export();
    assert!(!controller.edit_mode());
    assert!(controller.grips().is_empty());
    assert_eq!(export.edges.len(), 9);
    assert!(controller.graph().edges().iter().all(|e| !e.selected));
}
