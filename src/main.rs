use anyhow::{Context, Result};
use graphvault::graph::{EdgeTypeId, Element, GraphStore, PropertyId};
use graphvault::index::{PropertyIndex, PropertyIndexFactory};
use graphvault::{GraphConfig, PropertyValue};
use std::path::PathBuf;

const NAME: PropertyId = PropertyId(1);
const AGE: PropertyId = PropertyId(2);
const KNOWS: EdgeTypeId = EdgeTypeId(7);
const FOLLOWS: EdgeTypeId = EdgeTypeId(8);

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Graphvault v{}", graphvault::version());
    println!("==========================================");
    println!();

    let config = match std::env::args().nth(1) {
        Some(path) => GraphConfig::from_file(&path).with_context(|| format!("loading config {}", path))?,
        None => GraphConfig::default(),
    };

    let store = build_graph(config.clone())?;
    let snapshot_dir = std::env::temp_dir().join(format!("graphvault-demo-{}", std::process::id()));
    std::fs::create_dir_all(&snapshot_dir)?;

    let result = save_and_restore(&store, snapshot_dir.join("graph"), config);
    let _ = std::fs::remove_dir_all(&snapshot_dir);
    result
}

fn build_graph(config: GraphConfig) -> Result<GraphStore> {
    println!("=== Building graph ===");
    let mut store = GraphStore::with_config(config);

    let mut people = Vec::new();
    for (name, age) in [("Alice", 30i64), ("Bob", 25), ("Charlie", 35)] {
        let id = store.create_vertex()?;
        let vertex = store.vertex(id).context("vertex just created")?;
        vertex.set_property(NAME, name)?;
        vertex.set_property(AGE, age)?;
        println!("✓ Created vertex {} ({}, age {})", id, name, age);
        people.push(id);
    }

    let edges = [
        (people[0], people[1], KNOWS),
        (people[1], people[2], KNOWS),
        (people[0], people[2], FOLLOWS),
    ];
    for (source, target, edge_type) in edges {
        let id = store.create_edge(source, target, edge_type)?;
        println!("✓ {} -[{}]-> {} as edge {}", source, edge_type, target, id);
    }

    let removed = store.create_vertex()?;
    store.remove_element(removed)?;
    println!("✓ Removed vertex {} (leaves a hole)", removed);

    let by_name = PropertyIndex::build(NAME, store.elements())?;
    store.add_index("by_name", Box::new(by_name));

    println!("\nGraph Statistics:");
    println!("{}", serde_json::to_string_pretty(&store.statistics())?);
    Ok(store)
}

fn save_and_restore(store: &GraphStore, path: PathBuf, config: GraphConfig) -> Result<()> {
    println!("\n=== Snapshot ===");
    let report = store.save(&path)?;
    println!(
        "✓ Saved {} partition(s) and {} index file(s) to {:?} in {:?}",
        report.partition_files.len(),
        report.index_files.len(),
        report.manifest_path,
        report.elapsed
    );

    let restored = GraphStore::restore(&report.manifest_path, &PropertyIndexFactory, config)?;
    println!("✓ Restored graph:");
    println!("{}", serde_json::to_string_pretty(&restored.statistics())?);

    if let Some(index) = restored
        .index("by_name")
        .and_then(|index| index.as_any().downcast_ref::<PropertyIndex>())
    {
        let hits = index.get(&PropertyValue::from("Alice"));
        println!("✓ by_name[\"Alice\"] = {:?}", hits);
    }
    Ok(())
}
