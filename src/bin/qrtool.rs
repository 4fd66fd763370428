use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use qr_sentinel::config::ScannerConfig;
use qr_sentinel::encoder::{encode_text, render_rgba};
use qr_sentinel::normalize::normalize;
use qr_sentinel::scan::{ScanOrchestrator, ScanOutcome, ScanSource, is_supported_upload};
use qr_sentinel::tools::{collect_images, frame_stats, load_frame, save_png};
use qr_sentinel::{ECLevel, NormalizedTarget, RiskVerdict, detect_with_telemetry, logging};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "qrtool", version, about = "Scan QR codes and assess the links inside")]
struct Cli {
    /// Debug logging for this crate (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode an uploaded image and assess its payload
    Scan {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Normalize and assess a payload without decoding anything
    Assess {
        #[arg(long)]
        text: String,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Decoder diagnostics for an image or a directory of images
    Detect {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Encode a payload and write it as a PNG
    Render {
        #[arg(long)]
        text: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 8)]
        scale: usize,
        #[arg(long, default_value_t = 4)]
        quiet_zone: usize,
        #[arg(long, default_value = "M")]
        ec: ECLevel,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Scan {
            image,
            config,
            json,
        } => scan_cmd(&image, config.as_deref(), json).await,
        Command::Assess { text, config, json } => assess_cmd(&text, config.as_deref(), json).await,
        Command::Detect { image, json } => detect_cmd(&image, json),
        Command::Render {
            text,
            out,
            scale,
            quiet_zone,
            ec,
        } => render_cmd(&text, &out, scale, quiet_zone, ec),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ScannerConfig> {
    ScannerConfig::load(path).context("failed to load scanner configuration")
}

async fn scan_cmd(image: &Path, config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let name = image.to_string_lossy();
    if !is_supported_upload(&name) {
        bail!("unsupported upload '{name}' (expected png, jpg or jpeg)");
    }
    let config = load_config(config)?;
    let orchestrator = ScanOrchestrator::from_config(&config)?;
    let bytes =
        std::fs::read(image).with_context(|| format!("failed to read {}", image.display()))?;

    let outcome = orchestrator
        .scan(ScanSource::Upload(bytes))
        .await
        .with_context(|| format!("scan of {} failed", image.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

async fn assess_cmd(text: &str, config: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let assessor = config.build_assessor()?;
    let target = normalize(text);
    let verdict = assessor.assess(&target).await;

    if json {
        let report = serde_json::json!({ "target": target, "verdict": verdict });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_assessment(&target, &verdict);
    }
    Ok(())
}

fn detect_cmd(root: &Path, json: bool) -> anyhow::Result<()> {
    let images = collect_images(root);
    if images.is_empty() {
        bail!("no png or jpeg images under {}", root.display());
    }

    let mut decoded_images = 0usize;
    for path in &images {
        let frame =
            load_frame(path).with_context(|| format!("failed to load {}", path.display()))?;
        let started = Instant::now();
        let (symbols, telemetry) = detect_with_telemetry(&frame);
        let elapsed = started.elapsed();
        if !symbols.is_empty() {
            decoded_images += 1;
        }

        if json {
            let report = serde_json::json!({
                "image": path.display().to_string(),
                "width": frame.width(),
                "height": frame.height(),
                "elapsedMs": elapsed.as_secs_f64() * 1000.0,
                "stats": frame_stats(&frame),
                "telemetry": telemetry,
                "symbols": symbols,
            });
            println!("{}", serde_json::to_string(&report)?);
            continue;
        }

        println!(
            "{} ({}x{}) in {:.2?}: {} symbol(s), {} finder pattern(s), {} group(s)",
            path.display(),
            frame.width(),
            frame.height(),
            elapsed,
            symbols.len(),
            telemetry.finder_patterns,
            telemetry.groups_formed
        );
        for (i, symbol) in symbols.iter().enumerate() {
            println!(
                "  [{i}] version={} ec={:?} mask={} text={:?}",
                symbol.version,
                symbol.ec_level,
                symbol.mask.bits(),
                symbol.text
            );
        }
    }

    if !json && images.len() > 1 {
        let rate = decoded_images as f64 / images.len() as f64 * 100.0;
        println!(
            "decoded {decoded_images}/{} images ({rate:.1}%)",
            images.len()
        );
    }
    Ok(())
}

fn render_cmd(
    text: &str,
    out: &Path,
    scale: usize,
    quiet_zone: usize,
    ec: ECLevel,
) -> anyhow::Result<()> {
    let symbol = encode_text(text, ec)?;
    let frame = render_rgba(&symbol, scale, quiet_zone)?;
    save_png(&frame, out).with_context(|| format!("failed to write {}", out.display()))?;
    println!(
        "wrote {} (version {}, level {:?}, mask {}, {}x{} px)",
        out.display(),
        symbol.version,
        symbol.ec_level,
        symbol.mask.bits(),
        frame.width(),
        frame.height()
    );
    Ok(())
}

fn print_outcome(outcome: &ScanOutcome) {
    println!(
        "decoded: {:?} (version {}, level {:?})",
        outcome.payload.text, outcome.payload.version, outcome.payload.ec_level
    );
    print_assessment(&outcome.target, &outcome.verdict);
}

fn print_assessment(target: &NormalizedTarget, verdict: &RiskVerdict) {
    let kind = if target.is_url_like { "link" } else { "data" };
    println!("target:  {} ({kind})", target.url);
    println!(
        "risk:    {}{}",
        verdict.risk_level,
        if verdict.is_malicious { " (malicious)" } else { "" }
    );
    for reason in &verdict.reasons {
        println!("  - {reason}");
    }
}
