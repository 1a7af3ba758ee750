use std::fs;
use std::path::{ Path, PathBuf };

use anyhow::{ Context, Result };
use clap::{ Parser, Subcommand };
use log::info;

use compute_ray_tracer::buffer::BoundedBuffer;
use compute_ray_tracer::consts::{ DEFAULT_OCTREE_DEPTH, MAX_OCT_NODES, MAX_TRIANGLES };
use compute_ray_tracer::obj::load_mesh;
use compute_ray_tracer::octree::partition_mesh;
use compute_ray_tracer::scene::Scene;

/// Prepares meshes and scenes for the compute-shader ray tracer.
#[derive(Parser)]
#[clap(name = "compute-ray-tracer", version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load an OBJ mesh and partition it into an octree
    Partition {
        /// Path to the .obj mesh
        mesh: PathBuf,

        /// Octree depth (0 is a single root node)
        #[clap(long, short, default_value_t = DEFAULT_OCTREE_DEPTH)]
        depth: u32,

        /// Check the partition invariants after building
        #[clap(long)]
        verify: bool,
    },

    /// Assemble a JSON scene description into GPU buffers
    Scene {
        /// Path to the scene description
        scene: PathBuf,

        /// Write every GPU buffer as a raw .bin file into this directory
        #[clap(long)]
        dump: Option<PathBuf>,

        /// Check the partition invariants of every mesh
        #[clap(long)]
        verify: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    match Cli::parse().command {
        Command::Partition { mesh, depth, verify } => {
            partition(&mesh, depth, verify)
        },
        Command::Scene { scene, dump, verify } => {
            assemble(&scene, dump.as_deref(), verify)
        },
    }
}

fn partition(path: &Path, depth: u32, verify: bool) -> Result<()> {
    let mut triangles = BoundedBuffer::new(MAX_TRIANGLES);
    load_mesh(path, &mut triangles, MAX_TRIANGLES)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let octree = partition_mesh(triangles.as_mut_slice(), 0, depth,
        MAX_OCT_NODES).context("Failed to partition mesh")?;

    if verify {
        octree.validate(triangles.as_slice())
            .context("Partition invariants violated")?;
        info!("Partition verified.");
    }

    println!("{} triangles, {} nodes, depth {}", octree.triangle_count(),
        octree.node_count(), octree.depth);

    for (index, node) in octree.nodes.iter().enumerate() {
        if node.is_empty() {
            continue;
        }

        println!("node {:>5}  center ({:.3}, {:.3}, {:.3})  half ({:.3}, {:.3}, \
            {:.3})  triangles {}..{}", index, node.center.x, node.center.y,
            node.center.z, node.half_extents.x, node.half_extents.y,
            node.half_extents.z, node.lower, node.upper);
    }

    Ok(())
}

fn assemble(path: &Path, dump: Option<&Path>, verify: bool) -> Result<()> {
    let scene = Scene::load(path)
        .with_context(|| format!("Failed to load scene {}", path.display()))?;

    if verify {
        scene.validate().context("Partition invariants violated")?;
        info!("All mesh partitions verified.");
    }

    let buffers = scene.gpu_buffers();
    println!("{:#?}", buffers.constants);

    for (i, mesh) in buffers.meshes.iter().enumerate() {
        println!("mesh {}: triangles {}..{}, root node {}, {} nodes", i,
            mesh.lower, mesh.upper, mesh.root_partition, mesh.partition_count);
    }

    if let Some(dir) = dump {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        for (name, bytes) in buffers.named_bytes().iter() {
            let file = dir.join(format!("{}.bin", name));
            fs::write(&file, bytes)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            info!("Wrote {} bytes to {}.", bytes.len(), file.display());
        }
    }

    Ok(())
}
