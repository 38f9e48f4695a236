//! Operator administration of the identity store.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Subcommand;
use lobby_enroll::short_id;
use lobby_faces::{DirStore, Embedding, IdentityStore};

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// List known people and their sample counts
    List,
    /// Enroll a person from an embedding file
    Add {
        /// Display name for the new person
        #[arg(long)]
        name: String,
        /// JSON array of floats produced by the embedding provider
        #[arg(long)]
        embedding: PathBuf,
        /// Optional sample image to keep alongside
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete a person and all their samples
    Remove {
        /// Person id as shown by `users list`
        id: String,
    },
}

pub fn run(command: &UsersCommand, data_dir: &Path) -> anyhow::Result<()> {
    let store = DirStore::open(data_dir)?;
    match command {
        UsersCommand::List => list(&store),
        UsersCommand::Add {
            name,
            embedding,
            image,
        } => add(&store, name, embedding, image.as_deref()),
        UsersCommand::Remove { id } => remove(&store, id),
    }
}

fn list(store: &DirStore) -> anyhow::Result<()> {
    let records = store.records();
    if records.is_empty() {
        println!("no known people");
        return Ok(());
    }
    let mut people: Vec<(String, String, usize)> = Vec::new();
    for record in records {
        match people.iter_mut().find(|(id, _, _)| *id == record.person_id) {
            Some((_, _, count)) => *count += 1,
            None => people.push((record.person_id, record.name, 1)),
        }
    }
    for (id, name, count) in people {
        println!("{id}  {name}  ({count} samples)");
    }
    Ok(())
}

fn add(
    store: &DirStore,
    name: &str,
    embedding_path: &Path,
    image: Option<&Path>,
) -> anyhow::Result<()> {
    let data = std::fs::read(embedding_path)
        .with_context(|| format!("reading {}", embedding_path.display()))?;
    let embedding: Embedding =
        serde_json::from_slice(&data).context("embedding file must be a JSON array of numbers")?;
    if embedding.is_empty() {
        bail!("embedding is empty");
    }
    let image = match image {
        Some(path) => std::fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        None => Vec::new(),
    };

    let person_id = short_id();
    store.stage_sample(&person_id, &image, &embedding)?;
    store.commit(&person_id, name)?;
    println!("added {name} as {person_id}");
    Ok(())
}

fn remove(store: &DirStore, id: &str) -> anyhow::Result<()> {
    if !store.contains(id) {
        bail!("unknown person: {id}");
    }
    store.remove(id)?;
    println!("removed {id}");
    Ok(())
}
