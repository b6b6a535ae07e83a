fn main() {
    if let Err(err) = study_plan_graph::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
