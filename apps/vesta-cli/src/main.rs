use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vesta_assets::{AccessorData, Asset, CancelToken, FileSource, Loader, LoaderOptions, fetch_asset};
use vesta_gfx::{Context, DefineValue, Defines, LookupPolicy, RecordingDevice, add_headers};
use vesta_math::{Vector3, deg_to_rad};
use vesta_render::{Renderer, RendererConfig};
use vesta_scene::{Camera, NodeId, SceneGraph};

#[derive(Parser)]
#[command(name = "vesta-cli", about = "CLI tool for the vesta rendering core")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Fail on uniforms/attributes the linked shader does not expose
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Load an asset and print its accessors, meshes and node tree
    Inspect {
        /// Path to the JSON asset root
        path: PathBuf,
    },
    /// Render one frame of an asset against the recording backend
    Render {
        /// Path to the JSON asset root
        path: PathBuf,
        #[arg(long, default_value = "800")]
        width: u32,
        #[arg(long, default_value = "600")]
        height: u32,
        /// Print every recorded device call
        #[arg(long)]
        calls: bool,
    },
    /// Print shader sources with injected headers and their active symbols
    Shader {
        vertex: PathBuf,
        fragment: PathBuf,
        /// NAME or NAME=NUMBER
        #[arg(short = 'D', long = "define")]
        defines: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let policy = if cli.strict {
        LookupPolicy::Strict
    } else {
        LookupPolicy::Lenient
    };

    match cli.command {
        Commands::Info => {
            println!("vesta-cli v{}", env!("CARGO_PKG_VERSION"));
            let config = RendererConfig::default();
            println!(
                "render: default shader `{}`, cull_face={}, depth_test={}",
                config.default_shader_tag, config.cull_face, config.depth_test
            );
            let shader = Context::new(RecordingDevice::new()).create_shader(
                vesta_gfx::shaders::DEFAULT_VERTEX,
                vesta_gfx::shaders::DEFAULT_FRAGMENT,
                &Defines::new(),
            )?;
            println!(
                "default shader: attributes [{}], uniforms [{}]",
                shader.attribute_names().collect::<Vec<_>>().join(", "),
                shader.uniform_names().collect::<Vec<_>>().join(", ")
            );
        }
        Commands::Inspect { path } => {
            let asset = fetch(&path).await?;
            print_accessors(&asset)?;

            let mut renderer = Renderer::new(RecordingDevice::new(), config(policy));
            let mut graph = SceneGraph::new();
            let mut loader = Loader::from_asset(&asset, LoaderOptions::default())?;
            let roots = loader.load_scenes(&mut graph, &mut renderer)?;
            for (index, root) in roots.into_iter().enumerate() {
                let marker = if loader.default_scene() == Some(index) {
                    " (default)"
                } else {
                    ""
                };
                println!("scene {index}{marker}:");
                print_tree(&graph, root)?;
            }
            println!(
                "images: {}",
                asset
                    .images
                    .iter()
                    .map(|img| format!("{}x{}", img.width(), img.height()))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Commands::Render {
            path,
            width,
            height,
            calls,
        } => {
            let asset = fetch(&path).await?;
            let mut renderer = Renderer::new(RecordingDevice::new(), config(policy));
            let mut graph = SceneGraph::new();
            let mut loader = Loader::from_asset(&asset, LoaderOptions::default())?;
            let roots = loader.load_scenes(&mut graph, &mut renderer)?;
            let scene = loader.default_scene().unwrap_or(0);
            let root = *roots
                .get(scene)
                .with_context(|| format!("asset has no scene {scene}"))?;

            let aspect = width as f32 / height.max(1) as f32;
            let mut camera = Camera::perspective(deg_to_rad(60.0), aspect, 0.1, 1000.0);
            camera.look_at(
                &Vector3::new(0.0, 2.0, 5.0),
                &Vector3::ZERO,
                &Vector3::UP,
            );

            renderer.resize(width, height);
            renderer.clear(true, true);
            let stats = renderer.render(&mut graph, root, &camera)?;
            println!(
                "frame: {} visible nodes, {} draw calls",
                stats.visible_nodes, stats.draw_calls
            );

            let device = renderer.context().device();
            for call in device.draw_calls() {
                println!("  {call:?}");
            }
            if calls {
                println!("device calls ({}):", device.calls().len());
                for call in device.calls() {
                    println!("  {call:?}");
                }
            }
        }
        Commands::Shader {
            vertex,
            fragment,
            defines,
        } => {
            let vertex_src = std::fs::read_to_string(&vertex)
                .with_context(|| format!("reading {}", vertex.display()))?;
            let fragment_src = std::fs::read_to_string(&fragment)
                .with_context(|| format!("reading {}", fragment.display()))?;
            let defines = parse_defines(&defines)?;

            println!("// vertex\n{}", add_headers(&vertex_src, &defines, false));
            println!("// fragment\n{}", add_headers(&fragment_src, &defines, true));

            let mut context = Context::new(RecordingDevice::new());
            let shader = context.create_shader(&vertex_src, &fragment_src, &defines)?;
            println!(
                "active attributes: {}",
                shader.attribute_names().collect::<Vec<_>>().join(", ")
            );
            println!(
                "active uniforms: {}",
                shader.uniform_names().collect::<Vec<_>>().join(", ")
            );
        }
    }

    Ok(())
}

fn config(policy: LookupPolicy) -> RendererConfig {
    RendererConfig {
        lookup_policy: policy,
        ..RendererConfig::default()
    }
}

async fn fetch(path: &Path) -> anyhow::Result<Asset> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let file = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("not a file path: {}", path.display()))?;
    let source = Arc::new(FileSource::new(dir));
    let asset = fetch_asset(source, file, &CancelToken::new())
        .await
        .with_context(|| format!("fetching {}", path.display()))?;
    Ok(asset)
}

fn print_accessors(asset: &Asset) -> anyhow::Result<()> {
    let loader = Loader::from_asset(asset, LoaderOptions::default())?;
    println!("accessors ({}):", loader.accessors().len());
    for (index, data) in loader.accessors().iter().enumerate() {
        let layout = match data {
            AccessorData::Packed(packed) if packed.view.is_some() => "view",
            AccessorData::Packed(_) => "owned",
            AccessorData::Interleaved(_) => "interleaved",
        };
        println!(
            "  #{index}: {} x {} {:?} ({layout})",
            data.count(),
            data.item_size(),
            data.component_type()
        );
    }
    if let Some(meshes) = &asset.document.meshes {
        println!("meshes ({}):", meshes.len());
        for (index, mesh) in meshes.iter().enumerate() {
            println!(
                "  #{index} {}: {} primitive(s)",
                mesh.name.as_deref().unwrap_or("<unnamed>"),
                mesh.primitives.len()
            );
        }
    }
    Ok(())
}

fn print_tree(graph: &SceneGraph, root: NodeId) -> anyhow::Result<()> {
    for (id, depth) in graph.traverse(root)? {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let name = node.name.as_deref().unwrap_or("<node>");
        let mesh = node
            .mesh
            .as_ref()
            .map(|mesh| format!(" [mesh {}]", mesh.name))
            .unwrap_or_default();
        let p = node.position;
        println!(
            "{:indent$}{name} {id} @ ({:.2}, {:.2}, {:.2}){mesh}",
            "",
            p.x,
            p.y,
            p.z,
            indent = depth * 2 + 2
        );
    }
    Ok(())
}

fn parse_defines(raw: &[String]) -> anyhow::Result<Defines> {
    let mut defines = Defines::new();
    for entry in raw {
        match entry.split_once('=') {
            Some((name, value)) => {
                let number: f64 = value
                    .parse()
                    .with_context(|| format!("define `{name}` needs a number, got `{value}`"))?;
                defines.insert(name.to_owned(), DefineValue::Number(number));
            }
            None => {
                defines.insert(entry.clone(), DefineValue::Bool(true));
            }
        }
    }
    Ok(defines)
}
