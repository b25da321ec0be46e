use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, str::FromStr, sync::Arc};
use tracing_subscriber::{fmt, EnvFilter};

use storyboard_client::{
    mask::{MaskSurface, Point, Tool},
    models::BatchOptions,
    prompt_chain::PromptChain,
    status::StatusMessage,
    uploads::UploadRole,
    Backend, ClientConfig, GenerationMode, HttpBackend, Orchestrator, RenderMode, Session, Style, UploadFile,
};

#[derive(Parser)]
#[command(name = "storyboard-client", version, about = "Drive the AI storyboard generator from the command line")]
struct Cli {
    /// Backend base URL, overrides STORYBOARD_API_BASE
    #[arg(long, global = true)]
    api_base: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit one generation request and save the result
    Generate(GenerateArgs),
    /// Paint a mask over an image and ask the backend how it reads it
    TestMask {
        #[arg(long)]
        image: PathBuf,
        #[command(flatten)]
        mask: MaskArgs,
    },
    /// Fetch a previously generated file
    Download {
        filename: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the styles the backend offers
    Styles,
    Health,
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(long, default_value = "storyboard")]
    mode: GenerationMode,
    #[arg(long, default_value = "")]
    prompt: String,
    #[arg(long, default_value = "cinematic")]
    style: Style,
    /// Use the backend's fast placeholder renderer
    #[arg(long)]
    demo: bool,
    /// Reference image for img2img, controlnet or inpainting
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    strength: Option<f32>,
    /// One prompt-chain step; repeat for each step
    #[arg(long = "chain")]
    chain: Vec<String>,
    #[arg(long)]
    batch_count: Option<u32>,
    #[command(flatten)]
    mask: MaskArgs,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct MaskArgs {
    /// Brush polyline in image pixels, e.g. "10,10;80,40"
    #[arg(long = "stroke")]
    strokes: Vec<Polyline>,
    /// Eraser polyline, applied after all brush strokes
    #[arg(long = "erase")]
    erasures: Vec<Polyline>,
    #[arg(long)]
    brush_size: Option<f32>,
    #[arg(long)]
    invert_mask: bool,
}

#[derive(Clone, Debug)]
struct Polyline(Vec<Point>);

impl FromStr for Polyline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let points = s
            .split(';')
            .filter(|p| !p.trim().is_empty())
            .map(|pair| {
                let (x, y) = pair.split_once(',').ok_or_else(|| format!("expected x,y but got {pair:?}"))?;
                let x: f32 = x.trim().parse().map_err(|_| format!("bad x in {pair:?}"))?;
                let y: f32 = y.trim().parse().map_err(|_| format!("bad y in {pair:?}"))?;
                Ok(Point::new(x, y))
            })
            .collect::<Result<Vec<_>, String>>()?;
        if points.is_empty() {
            return Err("a stroke needs at least one point".into());
        }
        Ok(Self(points))
    }
}

impl MaskArgs {
    fn apply(&self, mask: &mut MaskSurface) {
        if let Some(size) = self.brush_size {
            mask.set_brush_size(size);
        }
        for (tool, lines) in [(Tool::Brush, &self.strokes), (Tool::Eraser, &self.erasures)] {
            mask.set_tool(tool);
            for Polyline(points) in lines {
                let mut it = points.iter();
                if let Some(first) = it.next() {
                    mask.begin_stroke(*first);
                    it.for_each(|p| mask.continue_stroke(*p));
                    mask.end_stroke();
                }
            }
        }
        if self.invert_mask {
            mask.invert();
        }
        let stats = mask.stats();
        tracing::info!("🖌️ Mask covers {} of {} pixels", stats.masked_pixels, stats.total_pixels);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(base) = cli.api_base {
        config.api_base = base;
    }
    tracing::info!(api_base = %config.api_base, "Using storyboard backend");

    let backend = Arc::new(HttpBackend::new(&config.api_base)?);
    let orchestrator = Orchestrator::new(backend.clone()).with_timeout(config.request_timeout);

    match cli.command {
        Command::Generate(args) => generate(&config, &orchestrator, args).await,
        Command::TestMask { image, mask } => {
            let mut session = Session::new(&config);
            session.set_mode(GenerationMode::Inpainting);
            let file = UploadFile::from_path(&image).await?;
            session.commit_upload(UploadRole::InpaintingImage, file, backend.as_ref()).await?;
            if let Some(surface) = session.mask_mut() {
                mask.apply(surface);
            }
            let report = orchestrator.test_mask(&session).await?;
            println!(
                "mask {:?} mode={} masked={}/{} inpaint_available={} type={}",
                report.mask_size.unwrap_or_default(),
                report.mask_mode.unwrap_or_default(),
                report.masked_pixels.unwrap_or_default(),
                report.total_pixels.unwrap_or_default(),
                report.inpaint_available,
                report.inpaint_type.unwrap_or_default(),
            );
            Ok(())
        }
        Command::Download { filename, out } => {
            let mut session = Session::new(&config);
            session.record_result(Some(filename));
            let saved = match out {
                Some(path) => {
                    let (_, bytes) = orchestrator.download(&session).await?;
                    tokio::fs::write(&path, &bytes).await.with_context(|| format!("writing {}", path.display()))?;
                    path
                }
                None => orchestrator.download_to(&session, &config.output_dir).await?,
            };
            println!("{}", StatusMessage::success(format!("Download saved to {}", saved.display())).text);
            Ok(())
        }
        Command::Styles => {
            match backend.styles().await {
                Ok(styles) => {
                    let mut keys: Vec<_> = styles.keys().cloned().collect();
                    keys.sort();
                    for key in keys {
                        println!("{key:<16} {}", styles[&key].description);
                    }
                }
                Err(e) => {
                    tracing::warn!("Backend styles unavailable ({e}); showing built-in list");
                    for style in Style::ALL {
                        println!("{:<16} {}", style.as_str(), style.description());
                    }
                }
            }
            Ok(())
        }
        Command::Health => {
            let health = backend.health().await?;
            println!("{} {}", health.status, health.timestamp.unwrap_or_default());
            Ok(())
        }
    }
}

async fn generate(config: &ClientConfig, orchestrator: &Orchestrator<HttpBackend>, args: GenerateArgs) -> anyhow::Result<()> {
    let mut session = Session::new(config);
    if args.demo {
        session.set_render_mode(RenderMode::Demo);
    }
    let transition = session.set_mode(args.mode);
    tracing::info!("Mode {} shows {:?}", transition.to.label(), transition.visible);

    session.set_prompt(args.prompt);
    session.set_style(args.style);
    if let Some(strength) = args.strength {
        session.set_strength(strength)?;
    }
    if let Some(count) = args.batch_count {
        session.set_batch(BatchOptions { count, ..session.batch().clone() })?;
    }
    if !args.chain.is_empty() {
        *session.chain_mut() = PromptChain::from_texts(args.chain)?;
    }

    if let Some(role) = args.mode.upload_role() {
        let Some(path) = args.image else {
            bail!("--image is required for {} mode", args.mode);
        };
        let file = UploadFile::from_path(&path).await?;
        session.commit_upload(role, file, orchestrator.backend().as_ref()).await?;
    }
    if let Some(mask) = session.mask_mut() {
        args.mask.apply(mask);
    }

    println!("{}", StatusMessage::generating(session.render_mode()).text);
    let outcome = {
        let submit = orchestrator.submit(&mut session);
        tokio::pin!(submit);
        tokio::select! {
            result = &mut submit => result,
            _ = tokio::signal::ctrl_c() => {
                orchestrator.cancel();
                println!("Cancelling... waiting for the backend to finish the current call");
                submit.await
            }
        }
    };

    let status = StatusMessage::from_outcome(&outcome);
    println!("{}", status.text);
    let output = match outcome {
        Ok(output) => output,
        Err(e) if !e.is_retryable() => return Err(e.into()),
        Err(_) => return Ok(()),
    };

    for (i, caption) in output.captions.iter().enumerate() {
        println!("Panel {}: {}", i + 1, caption);
    }
    let target = match (&args.out, &output.filename) {
        (Some(path), _) => path.clone(),
        (None, Some(name)) => config.output_dir.join(name),
        (None, None) => config.output_dir.join(format!("{}.png", args.mode)),
    };
    tokio::fs::write(&target, &output.image).await.with_context(|| format!("writing {}", target.display()))?;
    println!("Saved {}", target.display());
    Ok(())
}
