//! Snapshot tests
//!
//! Extracts each fixture cookbook in /tests/cookbooks/ and compares if the fact document
//! changes.

#[test]
fn snapshots() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CHEF_FACTS_LOG"))
        .with_writer(std::io::stderr)
        .init();

    insta::glob!("cookbooks/*", |path| {
        let cookbook = chef_facts::extract(path).expect("fixture must be a cookbook");
        insta::assert_yaml_snapshot!(cookbook);
    });
}
