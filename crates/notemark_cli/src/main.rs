//! Administrative command-line front end for notemark node trees.

use anyhow::Context;
use clap::{Parser, Subcommand};
use notemark_core::db::lock::acquire_owner_lock_for_lifetime;
use notemark_core::models::{FrontMatter, NodeSlug, NodeTree, NodeType, Username};
use notemark_core::storage::validation::{is_valid_full_slug, is_valid_node_slug};
use notemark_core::{Config, Database, DiskStorage, TreeController};
use serde_json::json;
use std::fs::File;
use std::io::{self, Read, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Controller = TreeController<DiskStorage, Database>;

#[derive(Parser)]
#[command(name = "notemark", about = "notemark tree administration", version)]
struct Cli {
    /// Storage root (overrides DATA_PATH)
    #[arg(long)]
    data_path: Option<String>,

    /// Database directory (overrides DB_PATH)
    #[arg(long)]
    db_path: Option<String>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Load every tree and print per-user node counts
    Load,
    /// Drop cached snapshots and rebuild every tree from storage
    Reset,
    /// Print one user's tree
    Tree { user: String },
    /// Print a node's content
    Cat { user: String, slug: String },
    /// Write a node from a file, or stdin when no file is given
    Write {
        user: String,
        slug: String,
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Set a note's title
    SetTitle {
        user: String,
        slug: String,
        title: String,
    },
    Rename {
        user: String,
        slug: String,
        new_slug: String,
    },
    Delete { user: String, slug: String },
    /// Dump every tree as JSON
    Dump,
}

fn parse_user(raw: &str) -> anyhow::Result<Username> {
    if raw.contains('/') || !is_valid_full_slug(raw) {
        anyhow::bail!("Invalid username '{}'", raw);
    }
    Ok(Username::new(raw))
}

/// Validate `raw` as a node slug below `user`.
fn parse_slug(user: &Username, raw: &str) -> anyhow::Result<NodeSlug> {
    let slug = NodeSlug::new(raw);
    let user_slug = format!("{}/{}", user, slug);
    if !is_valid_full_slug(&user_slug) || !is_valid_node_slug(&user_slug, slug.node_type()) {
        anyhow::bail!("Invalid {} slug '{}'", slug.node_type(), raw);
    }
    Ok(slug)
}

fn parse_target(user: &str, slug: &str) -> anyhow::Result<(Username, NodeSlug)> {
    let user = parse_user(user)?;
    let slug = parse_slug(&user, slug)?;
    Ok((user, slug))
}

fn render_tree(tree: &NodeTree, depth: usize, out: &mut String) {
    for (segment, node) in tree.iter() {
        out.push_str(&"  ".repeat(depth));
        out.push_str(segment);
        if node.node_type == NodeType::Asset {
            out.push_str(" [asset]");
        }
        if !node.front_matter.title.is_empty() {
            out.push_str(&format!(" \"{}\"", node.front_matter.title));
        }
        out.push('\n');
        render_tree(&node.children, depth + 1, out);
    }
}

fn format_counts(controller: &Controller, json: bool) -> anyhow::Result<String> {
    let mut rows = Vec::new();
    for user in controller.usernames()? {
        let nodes = controller
            .try_get_node_tree_for_user(&user)?
            .map(|tree| tree.node_count())
            .unwrap_or(0);
        rows.push((user, nodes));
    }

    if json {
        let users: Vec<_> = rows
            .iter()
            .map(|(user, nodes)| json!({ "username": user, "nodes": nodes }))
            .collect();
        return Ok(serde_json::to_string_pretty(&json!({ "users": users }))?);
    }
    Ok(rows
        .iter()
        .map(|(user, nodes)| format!("{:<24} {} node(s)", user, nodes))
        .collect::<Vec<_>>()
        .join("\n"))
}

fn format_done(action: &str, target: String, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(
            &json!({ "action": action, "target": target }),
        )?);
    }
    Ok(format!("{}: {}", action, target))
}

fn run(
    controller: &Controller,
    command: Commands,
    json: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let output = match command {
        Commands::Load | Commands::Reset => format_counts(controller, json)?,
        Commands::Tree { user } => {
            let user = parse_user(&user)?;
            let (tree, mod_time) = controller
                .get_tree_for_user(&user)
                .with_context(|| format!("No tree loaded for user '{}'", user))?;
            if json {
                serde_json::to_string_pretty(&json!({
                    "username": user,
                    "modTime": mod_time.to_rfc3339(),
                    "tree": tree,
                }))?
            } else {
                let mut rendered = String::new();
                render_tree(&tree, 0, &mut rendered);
                rendered.trim_end().to_string()
            }
        }
        Commands::Cat { user, slug } => {
            let (user, slug) = parse_target(&user, &slug)?;
            let mut reader = controller
                .get_node_content(&user, &slug)
                .with_context(|| format!("Failed to read {}/{}", user, slug))?;
            io::copy(&mut reader, out)?;
            return Ok(());
        }
        Commands::Write { user, slug, file } => {
            let (user, slug) = parse_target(&user, &slug)?;
            let mut content: Box<dyn Read> = match file {
                Some(path) => Box::new(
                    File::open(&path).with_context(|| format!("Failed to open '{}'", path))?,
                ),
                None => Box::new(io::stdin()),
            };
            controller.update_node_content(&user, &slug, &mut *content)?;
            format_done("written", format!("{}/{}", user, slug), json)?
        }
        Commands::SetTitle { user, slug, title } => {
            let (user, slug) = parse_target(&user, &slug)?;
            controller.update_note_node_front_matter(&user, &slug, &FrontMatter { title })?;
            format_done("retitled", format!("{}/{}", user, slug), json)?
        }
        Commands::Rename {
            user,
            slug,
            new_slug,
        } => {
            let (user, slug) = parse_target(&user, &slug)?;
            let new_slug = parse_slug(&user, &new_slug)?;
            controller.rename_node(&user, &slug, &new_slug)?;
            format_done("renamed", format!("{}/{} -> {}", user, slug, new_slug), json)?
        }
        Commands::Delete { user, slug } => {
            let (user, slug) = parse_target(&user, &slug)?;
            controller.delete_node(&user, &slug)?;
            format_done("deleted", format!("{}/{}", user, slug), json)?
        }
        Commands::Dump => controller.debug_json()?,
    };

    if !output.is_empty() {
        writeln!(out, "{}", output)?;
    }
    Ok(())
}

fn open_controller(config: &Config) -> anyhow::Result<Controller> {
    let database = Database::new(&config.db_path)
        .with_context(|| format!("Failed to open database at '{}'", config.db_path))?;
    let data_root = std::path::absolute(&config.data_path)
        .with_context(|| format!("Invalid data path '{}'", config.data_path))?;
    let storage = DiskStorage::new(data_root)?;
    Ok(TreeController::new(storage, database))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notemark=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let Cli {
        data_path,
        db_path,
        json,
        command,
    } = Cli::parse();

    let mut config = Config::from_env();
    if let Some(data_path) = data_path {
        config.data_path = data_path;
    }
    if let Some(db_path) = db_path {
        config.db_path = db_path;
    }

    let _owner_lock = acquire_owner_lock_for_lifetime(&config.db_path)?;
    let controller = open_controller(&config)?;

    if config.reset_tree_cache || command == Commands::Reset {
        tracing::info!("Resetting tree cache");
        controller.reset()?;
    }
    controller.load().context("Failed to load node trees")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&controller, command, json, &mut out)
}
