// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command line tool for Tessera graph records.
//!
//! # Usage
//!
//! ```bash
//! tessera demo chain.ron
//! tessera inspect chain.ron
//! tessera validate chain.ron --strict
//! tessera resave chain.ron normalised.ron
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tessera_graph::kinds::container::{ConnectableContainer, ImageChain};
use tessera_graph::kinds::create_raster_registry;
use tessera_graph::kinds::raster::{ImageFileWriter, ImageHandler, ImageMosaic, ImageResampler};
use tessera_graph::persistence::{read_record, write_record};
use tessera_graph::{ConnectOptions, Graph, GraphSettings, KeywordList, LoadOptions, LoadReport, NodeId};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Inspect and rewrite connection graph records", long_about = None)]
struct Cli {
    /// Settings file (RON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the containment tree and wiring of a record
    Inspect {
        /// Record file
        record: PathBuf,
    },

    /// Load a record and report anything that could not be restored
    Validate {
        /// Record file
        record: PathBuf,

        /// Fail on unresolved references
        #[arg(long)]
        strict: bool,
    },

    /// Load a record and save it again with fresh numbering
    Resave {
        /// Record file to read
        input: PathBuf,

        /// Record file to write
        output: PathBuf,
    },

    /// Write a sample processing chain
    Demo {
        /// Record file to write
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = GraphSettings::load_or_default(cli.config.as_deref())
        .with_context(|| format!("Failed to read settings {:?}", cli.config))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Inspect { record } => inspect(&record, &settings),
        Commands::Validate { record, strict } => validate(&record, &settings, strict),
        Commands::Resave { input, output } => resave(&input, &output, &settings),
        Commands::Demo { output } => demo(&output, &settings),
    }
}

fn load(path: &Path, settings: &GraphSettings, options: LoadOptions) -> Result<(Graph, NodeId, LoadReport)> {
    let record = read_record(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut graph = Graph::new(path.display().to_string());
    let registry = create_raster_registry();
    let (root, report) = graph
        .load_graph(&record, &settings.persistence.root_prefix, &registry, options)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok((graph, root, report))
}

fn inspect(path: &Path, settings: &GraphSettings) -> Result<()> {
    let (graph, root, _) = load(path, settings, settings.persistence.load_options())?;
    println!("{}", graph.name);
    print_node(&graph, root, 1);
    Ok(())
}

fn print_node(graph: &Graph, id: NodeId, depth: usize) {
    let Some(node) = graph.node(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    if node.description().is_empty() {
        println!("{indent}{} #{}", node.kind_name(), id);
    } else {
        println!("{indent}{} #{} \"{}\"", node.kind_name(), id, node.description());
    }
    for (index, slot) in node.inputs().slots().iter().enumerate() {
        match slot {
            Some(neighbour) => println!("{indent}  in[{index}] <- #{neighbour}"),
            None => println!("{indent}  in[{index}] (empty)"),
        }
    }
    for child in graph.children(id) {
        print_node(graph, child, depth + 1);
    }
}

fn validate(path: &Path, settings: &GraphSettings, strict: bool) -> Result<()> {
    let mut options = settings.persistence.load_options();
    options.strict_references |= strict;
    let (graph, root, report) = load(path, settings, options)?;

    println!(
        "{}: {} nodes, {} skipped, {} dropped edges",
        path.display(),
        graph.child_count(root, true) + 1,
        report.skipped.len(),
        report.dropped_edges.len()
    );
    for prefix in &report.skipped {
        println!("  skipped {prefix}");
    }
    for edge in &report.dropped_edges {
        println!(
            "  dropped input {} of #{}: unknown node {}",
            edge.index, edge.owner, edge.reference
        );
    }
    if !report.skipped.is_empty() || !report.dropped_edges.is_empty() {
        bail!("{} did not load cleanly", path.display());
    }
    Ok(())
}

fn resave(input: &Path, output: &Path, settings: &GraphSettings) -> Result<()> {
    let (graph, root, _) = load(input, settings, settings.persistence.load_options())?;
    let mut record = KeywordList::new();
    graph.save_state(root, &mut record, &settings.persistence.root_prefix)?;
    write_record(&record, output).with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!("Wrote {} keywords to {}", record.len(), output.display());
    Ok(())
}

fn demo(output: &Path, settings: &GraphSettings) -> Result<()> {
    let mut graph = Graph::new("Demo");
    let root = graph.add(ConnectableContainer);
    let chain = graph.add(ImageChain);
    let north = graph.add(ImageHandler {
        filename: "north.tif".to_string(),
    });
    let south = graph.add(ImageHandler {
        filename: "south.tif".to_string(),
    });
    let mosaic = graph.add(ImageMosaic);
    let resampler = graph.add(ImageResampler { scale: 0.5 });
    let writer = graph.add(ImageFileWriter {
        filename: "mosaic.tif".to_string(),
        output_type: "tiff".to_string(),
    });

    graph.accept(root, chain)?;
    for id in [north, south, mosaic, resampler] {
        graph.accept(chain, id)?;
    }
    graph.accept(root, writer)?;

    let options = ConnectOptions::default();
    graph.connect_input_to(mosaic, north, options)?;
    graph.connect_input_to(mosaic, south, options)?;
    graph.connect_input_to(resampler, mosaic, options)?;
    graph.connect_input_to(writer, resampler, options)?;
    graph.set_description(resampler, "Half resolution")?;

    let mut record = KeywordList::new();
    graph.save_state(root, &mut record, &settings.persistence.root_prefix)?;
    write_record(&record, output).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote demo chain to {}", output.display());
    Ok(())
}
