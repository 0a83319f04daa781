use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use docxide_layout::config::MetricsBackend;
use docxide_layout::{LayoutStructure, assemble, fonts, pdf};

/// Lay out a pre-parsed DOCX structure and write it as PDF.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Layout structure (JSON)
    input: PathBuf,

    /// Output PDF path. Defaults to the input path with a .pdf extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the computed layout as JSON to this path
    #[arg(long)]
    dump_layout: Option<PathBuf>,

    /// Measure text with the fixed-width approximation instead of installed fonts
    #[arg(long)]
    approximate_metrics: bool,

    #[arg(long)]
    widow_lines: Option<usize>,

    #[arg(long)]
    orphan_lines: Option<usize>,

    /// Break words at soft hyphens
    #[arg(long)]
    hyphenate: bool,
}

fn run(args: Args) -> Result<(), docxide_layout::Error> {
    let t0 = Instant::now();
    let bytes = std::fs::read(&args.input)?;
    let mut structure = LayoutStructure::from_json(&bytes)?;
    let options = &mut structure.options;
    if args.approximate_metrics {
        options.metrics = MetricsBackend::Approximate;
    }
    if let Some(n) = args.widow_lines {
        options.widow_lines = n;
    }
    if let Some(n) = args.orphan_lines {
        options.orphan_lines = n;
    }
    options.hyphenate |= args.hyphenate;

    if structure.options.metrics == MetricsBackend::System {
        let faces = fonts::init_fonts();
        log::info!("Indexed {faces} font faces in {:.1}ms", t0.elapsed().as_secs_f64() * 1000.0);
    }

    let layout = assemble(&structure)?;
    if let Some(path) = &args.dump_layout {
        std::fs::write(path, layout.to_json()?)?;
    }

    let output = args
        .output
        .unwrap_or_else(|| args.input.with_extension("pdf"));
    std::fs::write(&output, pdf::compile(&layout)?)?;
    log::info!(
        "Wrote {} ({} pages) in {:.1}ms",
        output.display(),
        layout.page_count(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
