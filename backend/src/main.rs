use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use iris::application::dto::UploadRequest;
use iris::config::EngineConfig;
use iris::infrastructure::embeddings::{
    FastEmbedProvider, IMAGE_DIMENSION, TEXT_DIMENSION,
};
use iris::infrastructure::persistence::SnapshotRepository;
use iris::infrastructure::store::DualVectorStore;
use iris::infrastructure::vision::{DashScopeVision, VisionClientConfig};
use iris::{
    CheckHealth, ClassifyImage, ClearStore, GetStats, HybridEmbeddingGenerator, RetrievalEngine,
    UploadImage, ZeroShotClassifier,
};

fn print_usage() {
    eprintln!("iris - hybrid image retrieval and classification engine");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  iris upload <image-path>            ingest and classify an image");
    eprintln!("  iris classify <image-path>          classify without storing");
    eprintln!("  iris search-text <query> [top-k]    search by natural language");
    eprintln!("  iris search-image <image-path> [top-k]");
    eprintln!("  iris hybrid <query|-> <image|-> [top-k]");
    eprintln!("  iris stats                          database and category statistics");
    eprintln!("  iris health                         probe the external providers");
    eprintln!("  iris clear                          remove all stored vectors");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  IRIS_SNAPSHOT    snapshot database path (default: iris.db)");
    eprintln!("  VISION_API_KEY   key for the vision-language service");
    eprintln!("  VISION_BASE_URL  OpenAI-compatible endpoint (default: DashScope)");
    eprintln!("  VISION_MODEL     model name (default: qwen-vl-plus)");
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_top_k(arg: Option<&String>) -> Result<Option<usize>> {
    match arg {
        Some(raw) => Ok(Some(
            raw.parse().context("top-k must be a positive integer")?,
        )),
        None => Ok(None),
    }
}

fn open_snapshot(store: &DualVectorStore) -> Result<SnapshotRepository> {
    let path = std::env::var("IRIS_SNAPSHOT").unwrap_or_else(|_| "iris.db".to_string());
    let repo = SnapshotRepository::new_with_path(&path)
        .with_context(|| format!("Could not open snapshot database at {}", path))?;
    repo.load(store).context("Failed to load snapshot")?;
    Ok(repo)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first() {
        Some(command) => command.as_str(),
        None => {
            print_usage();
            return Ok(());
        }
    };

    let config = EngineConfig::default();
    let store = Arc::new(DualVectorStore::new(IMAGE_DIMENSION, TEXT_DIMENSION));

    match command {
        "stats" => {
            open_snapshot(&store)?;
            print_json(&GetStats::new(store).execute())?;
        }
        "clear" => {
            let mut snapshot = open_snapshot(&store)?;
            let after = ClearStore::new(store.clone()).execute();
            snapshot.save(&store)?;
            print_json(&after)?;
        }
        "search-text" => {
            let query = args.get(1).context("search-text needs a query")?;
            let top_k = parse_top_k(args.get(2))?;
            open_snapshot(&store)?;
            let embeddings = Arc::new(FastEmbedProvider::new().await?);
            let engine = RetrievalEngine::new(embeddings, store, config.retrieval);
            print_json(&engine.search_by_text(query, top_k).await?)?;
        }
        "search-image" => {
            let path = args.get(1).context("search-image needs an image path")?;
            let top_k = parse_top_k(args.get(2))?;
            open_snapshot(&store)?;
            let embeddings = Arc::new(FastEmbedProvider::new().await?);
            let engine = RetrievalEngine::new(embeddings, store, config.retrieval);
            print_json(&engine.search_by_image(Path::new(path), top_k).await?)?;
        }
        "hybrid" => {
            let query = args.get(1).filter(|a| a.as_str() != "-");
            let image = args.get(2).filter(|a| a.as_str() != "-");
            let top_k = parse_top_k(args.get(3))?;
            open_snapshot(&store)?;
            let embeddings = Arc::new(FastEmbedProvider::new().await?);
            let engine = RetrievalEngine::new(embeddings, store, config.retrieval);
            let response = engine
                .hybrid_search(
                    query.map(String::as_str),
                    image.map(|p| Path::new(p.as_str())),
                    top_k,
                )
                .await?;
            print_json(&response)?;
        }
        "upload" => {
            let path = PathBuf::from(args.get(1).context("upload needs an image path")?);
            let mut snapshot = open_snapshot(&store)?;

            let metadata = std::fs::metadata(&path)
                .with_context(|| format!("Could not read {}", path.display()))?;
            let (width, height) = image::image_dimensions(&path)
                .with_context(|| format!("Not a readable image: {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("Image path has no file name")?
                .to_string();

            let embeddings = Arc::new(FastEmbedProvider::new().await?);
            let vision = Arc::new(DashScopeVision::new(VisionClientConfig::from_env()?)?);
            let generator = Arc::new(HybridEmbeddingGenerator::new(
                embeddings,
                vision.clone(),
                config.generation.clone(),
            ));
            let classifier = Arc::new(ZeroShotClassifier::new(
                vision,
                store.clone(),
                config.classifier,
                config.generation,
            ));
            let upload = UploadImage::new(generator, classifier, store.clone());

            let response = upload
                .execute(UploadRequest {
                    image_path: path,
                    file_name,
                    file_size: metadata.len(),
                    width,
                    height,
                })
                .await?;
            snapshot.save(&store)?;
            print_json(&response)?;
        }
        "classify" => {
            let path = PathBuf::from(args.get(1).context("classify needs an image path")?);
            open_snapshot(&store)?;

            let embeddings = Arc::new(FastEmbedProvider::new().await?);
            let vision = Arc::new(DashScopeVision::new(VisionClientConfig::from_env()?)?);
            let generator = Arc::new(HybridEmbeddingGenerator::new(
                embeddings,
                vision.clone(),
                config.generation.clone(),
            ));
            let classifier = Arc::new(ZeroShotClassifier::new(
                vision,
                store.clone(),
                config.classifier,
                config.generation,
            ));
            let classify = ClassifyImage::new(generator, classifier);
            print_json(&classify.execute(&path).await?)?;
        }
        "health" => {
            open_snapshot(&store)?;
            let embeddings = Arc::new(FastEmbedProvider::new().await?);
            let vision = Arc::new(DashScopeVision::new(VisionClientConfig::from_env()?)?);
            let check = CheckHealth::new(embeddings, vision, store);
            print_json(&check.execute().await)?;
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            print_usage();
            bail!("Unknown command: {}", other);
        }
    }

    Ok(())
}
