use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use base64::Engine;
use clap::{Parser, Subcommand};
use image::codecs::jpeg::JpegEncoder;
use tracing_subscriber::EnvFilter;

use cook_coach::camera::JPEG_QUALITY;
use cook_coach::voice::{pcm16_to_samples, spawn_microphone};
use cook_coach::{
    ApiServerBuilder, Config, RecipeCatalog, StillCamera, VisionAssessor, VisionFeedbackClient,
};

/// Coach - camera and voice cooking coach
#[derive(Parser)]
#[command(name = "coach", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable the local microphone and speaker (for headless hosts)
    #[arg(long)]
    no_audio: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the cooking coach (default)
    Serve,
    /// List recipes in the catalog
    Recipes,
    /// Show one recipe with its step prompts
    Show {
        /// Recipe id
        id: String,
    },
    /// Assess a still image against a recipe step
    Assess {
        /// Image file (JPEG or PNG)
        #[arg(long)]
        image: PathBuf,
        /// Recipe id
        #[arg(long)]
        recipe: String,
        /// Step number, starting at 1
        #[arg(long, default_value = "1")]
        step: usize,
        /// Question to ask
        #[arg(default_value = cook_coach::cook::DEFAULT_QUESTION)]
        question: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,cook_coach=info")),
        1 => EnvFilter::new("info,cook_coach=debug"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load_with_options(cli.no_audio);
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let catalog = RecipeCatalog::load(config.recipes_path.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, catalog).await,
        Command::Recipes => {
            list_recipes(&catalog);
            Ok(())
        }
        Command::Show { id } => show_recipe(&catalog, &id),
        Command::Assess {
            image,
            recipe,
            step,
            question,
        } => assess(&config, &catalog, &image, &recipe, step, &question).await,
        Command::TestMic { duration } => test_mic(duration).await,
    }
}

/// Run the API server until interrupted
async fn serve(config: Config, catalog: RecipeCatalog) -> anyhow::Result<()> {
    tracing::info!(
        port = config.server.port,
        recipes = catalog.len(),
        voice = config.voice.is_configured(),
        audio = config.voice.audio,
        "starting cook coach"
    );
    tracing::debug!(?config, "loaded configuration");

    let server = ApiServerBuilder::from_config(&config, catalog).build();

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

fn list_recipes(catalog: &RecipeCatalog) {
    for recipe in catalog.iter() {
        println!(
            "{:<20} {} ({} steps)",
            recipe.id,
            recipe.title,
            recipe.steps.len()
        );
    }
}

fn show_recipe(catalog: &RecipeCatalog, id: &str) -> anyhow::Result<()> {
    let recipe = catalog
        .get(id)
        .ok_or_else(|| anyhow::anyhow!("unknown recipe: {id}"))?;

    println!("{}", recipe.title);
    println!("{}", cook_coach::api::recipes::meta_line(&recipe));
    println!();
    for (i, step) in recipe.steps.iter().enumerate() {
        println!("{:>2}. {}", i + 1, step.display_prompt());
        println!("    {}", step.text);
    }

    Ok(())
}

/// One vision assessment against a still image
async fn assess(
    config: &Config,
    catalog: &RecipeCatalog,
    image_path: &Path,
    recipe_id: &str,
    step: usize,
    question: &str,
) -> anyhow::Result<()> {
    let recipe = catalog
        .get(recipe_id)
        .ok_or_else(|| anyhow::anyhow!("unknown recipe: {recipe_id}"))?;
    let step = step
        .checked_sub(1)
        .and_then(|i| recipe.steps.get(i))
        .ok_or_else(|| anyhow::anyhow!("step must be between 1 and {}", recipe.steps.len()))?;

    let frame = StillCamera::new(image_path).load_frame().await?;
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&frame)?;
    let image_base64 = base64::engine::general_purpose::STANDARD.encode(&jpeg);

    let client = VisionFeedbackClient::from_config(&config.vision);
    println!("Asking {} about step {}: \"{question}\"", client.model(), step.id);

    let assessment = client.assess(&image_base64, question, &step.text).await?;

    println!("---");
    println!("{}", assessment.feedback);
    println!("passed: {}", assessment.passed);

    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut microphone = spawn_microphone().await?;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration);

    loop {
        let chunk = tokio::select! {
            chunk = microphone.chunks.recv() => chunk,
            () = tokio::time::sleep_until(deadline) => break,
        };
        let Some(chunk) = chunk else {
            break;
        };

        let bytes = base64::engine::general_purpose::STANDARD.decode(chunk)?;
        let samples = pcm16_to_samples(&bytes);
        let energy = calculate_rms(&samples);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);
        println!("RMS: {energy:.4} | [{meter}]");
    }

    drop(microphone);

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
