use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storymap::config::Workspace;
use storymap::models::{NodeKind, Placement};
use storymap::tree_render::{render_subtree, render_tree};
use storymap::{IncludeLevel, MoveTarget, Relocation, StoryMap, StoryMapStore};

#[derive(Parser)]
#[command(name = "smap")]
#[command(about = "Story map backlog: epics, stories, scenarios and increments")]
struct Cli {
    /// Workspace root (defaults to $STORYMAP_WORKSPACE, then the current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty story map document if none exists
    Init,
    /// Print the map down to story level with stage symbols
    Tree,
    /// Print one node as JSON
    Show {
        /// Quoted dotted path, e.g. '"Checkout"."Pay by card"'
        path: String,
        /// How much detail to include
        #[arg(short, long, default_value = "full", value_parser = parse_level)]
        level: IncludeLevel,
        /// Render the subtree as a tree instead of JSON
        #[arg(long)]
        tree: bool,
    },
    /// List the paths of every node with the given name
    Search { name: String },
    /// Print the stage a node still needs
    Behavior { path: String },
    /// Create a node; without a parent path an epic is created
    Create {
        parent: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<NodeKind>,
        #[arg(short, long)]
        position: Option<usize>,
    },
    /// Rename a node
    Rename { path: String, new_name: String },
    /// Move a node under another one, or reorder it among its siblings
    Move {
        path: String,
        #[arg(long)]
        to: Option<String>,
        #[arg(short, long)]
        position: Option<usize>,
    },
    /// Delete a node and everything below it
    Delete { path: String },
    /// Manage increments
    #[command(subcommand)]
    Increment(IncrementCommands),
}

#[derive(Subcommand)]
enum IncrementCommands {
    /// List increments in priority order
    List,
    /// Add an increment
    Add {
        name: String,
        #[arg(long)]
        priority: Option<i64>,
        #[arg(long, conflicts_with = "priority")]
        after: Option<String>,
    },
    /// Remove an increment
    Remove { name: String },
    /// Rename an increment
    Rename { name: String, new_name: String },
    /// Move an increment before or after another one
    Reorder {
        name: String,
        #[arg(long, conflicts_with = "after", required_unless_present = "after")]
        before: Option<String>,
        #[arg(long)]
        after: Option<String>,
    },
    /// Add a story reference to an increment
    AddStory {
        increment: String,
        story: String,
        #[arg(short, long)]
        position: Option<usize>,
    },
    /// Remove a story reference from an increment
    RemoveStory { increment: String, story: String },
}

fn parse_kind(s: &str) -> Result<NodeKind, String> {
    NodeKind::from_str(s).ok_or_else(|| format!("unknown node kind `{s}`"))
}

fn parse_level(s: &str) -> Result<IncludeLevel, String> {
    IncludeLevel::from_str(s).ok_or_else(|| format!("unknown include level `{s}`"))
}

/// Initialize tracing with output to stderr so stdout carries command output only
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "storymap=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let workspace = Workspace::resolve(cli.workspace)?;

    if let Commands::Init = cli.command {
        StoryMapStore::init(&workspace.story_graph)
            .with_context(|| format!("Failed to create {}", workspace.story_graph.display()))?;
        println!("{}", workspace.story_graph.display());
        return Ok(());
    }

    let mut store = StoryMapStore::open(&workspace.story_graph);
    let map = store
        .map()
        .with_context(|| format!("Failed to load {}", workspace.story_graph.display()))?;

    match cli.command {
        Commands::Init => {}
        Commands::Tree => {
            print!("{}", render_tree(map, &workspace.test_dir));
        }
        Commands::Show { path, level, tree } => {
            let id = map.resolve(&path)?;
            if tree {
                print!("{}", render_subtree(map, id, &workspace.test_dir));
            } else {
                println!("{}", serde_json::to_string_pretty(&map.to_dict(id, level)?)?);
            }
        }
        Commands::Search { name } => {
            for id in map.find_all_by_name(&name) {
                println!("{}\t{}", map.kind(id)?, map.path_of(id)?);
            }
        }
        Commands::Behavior { path } => {
            let id = map.resolve(&path)?;
            println!("{}", map.behavior_needed(id, &workspace.test_dir)?.as_str());
        }
        Commands::Create {
            parent,
            name,
            kind,
            position,
        } => {
            let id = match parent {
                Some(parent) => {
                    let parent = map.resolve(&parent)?;
                    map.create_child(parent, name.as_deref(), kind, position)?
                }
                None => map.create_epic(name.as_deref(), position)?,
            };
            println!("{}", map.path_of(id)?);
        }
        Commands::Rename { path, new_name } => {
            let id = map.resolve(&path)?;
            map.rename(id, &new_name)?;
            println!("{}", map.path_of(id)?);
        }
        Commands::Move { path, to, position } => {
            let id = map.resolve(&path)?;
            let outcome = map.move_to(id, to.map(MoveTarget::Path), position)?;
            println!("{}", map.path_of(outcome.node)?);
            report_relocation(&outcome.relocation);
        }
        Commands::Delete { path } => {
            let id = map.resolve(&path)?;
            map.delete(id)?;
        }
        Commands::Increment(command) => run_increment(map, command)?,
    }

    Ok(())
}

fn report_relocation(relocation: &Relocation) {
    match relocation {
        Relocation::NotRequired => {}
        Relocation::Relocated { symbol, from, to } => {
            println!("moved {} from {} to {}", symbol, from.display(), to.display());
        }
        Relocation::Skipped { reason } => eprintln!("test code not moved: {reason}"),
        Relocation::Failed { error } => eprintln!("test code move failed: {error}"),
    }
}

fn run_increment(map: &mut StoryMap, command: IncrementCommands) -> anyhow::Result<()> {
    match command {
        IncrementCommands::List => {
            for inc in map.increments().iter() {
                println!("{}\t{}\t{}", inc.priority, inc.name, inc.stories.join(", "));
            }
        }
        IncrementCommands::Add {
            name,
            priority,
            after,
        } => {
            map.update_increments(|index| index.add(&name, priority, after.as_deref()).map(|_| ()))?;
        }
        IncrementCommands::Remove { name } => {
            map.update_increments(|index| index.remove(&name).map(|_| ()))?;
        }
        IncrementCommands::Rename { name, new_name } => {
            map.update_increments(|index| index.rename(&name, &new_name))?;
        }
        IncrementCommands::Reorder {
            name,
            before,
            after,
        } => {
            let placement = match (before, after) {
                (Some(before), _) => Placement::Before(before),
                (None, Some(after)) => Placement::After(after),
                (None, None) => anyhow::bail!("either --before or --after is required"),
            };
            map.update_increments(|index| index.reorder(&name, placement))?;
        }
        IncrementCommands::AddStory {
            increment,
            story,
            position,
        } => {
            if map.find_story(&story).is_none() {
                tracing::warn!(story = %story, "no story with this name in the map");
            }
            map.update_increments(|index| index.add_story(&increment, &story, position))?;
        }
        IncrementCommands::RemoveStory { increment, story } => {
            map.update_increments(|index| index.remove_story(&increment, &story))?;
        }
    }
    Ok(())
}
