pub mod breaker;
pub mod config;
pub mod engines;
mod error;
pub mod fonts;
pub mod layout;
pub mod metrics;
pub mod model;
pub mod pdf;
pub mod unified;

pub use error::{Error, LookupError};
pub use layout::{LayoutAssembler, assemble};
pub use model::LayoutStructure;
pub use unified::UnifiedLayout;

use std::path::Path;
use std::time::Instant;

/// Parse a layout structure from JSON and lay it out.
pub fn layout_json(input: &[u8]) -> Result<UnifiedLayout, Error> {
    let t0 = Instant::now();

    let structure = LayoutStructure::from_json(input)?;
    let t_parse = t0.elapsed();

    let layout = assemble(&structure)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, layout={:.1}ms, total={:.1}ms ({} pages)",
        t_parse.as_secs_f64() * 1000.0,
        (t_total - t_parse).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        layout.page_count(),
    );

    Ok(layout)
}

pub fn convert_json_to_pdf(input: &Path, output: &Path) -> Result<(), Error> {
    let bytes = std::fs::read(input)?;
    convert_json_bytes_to_pdf(&bytes, output)
}

pub fn convert_json_bytes_to_pdf(input: &[u8], output: &Path) -> Result<(), Error> {
    let t0 = Instant::now();

    let structure = LayoutStructure::from_json(input)?;
    let t_parse = t0.elapsed();

    let layout = assemble(&structure)?;
    let t_layout = t0.elapsed();

    let bytes = pdf::compile(&layout)?;
    let t_render = t0.elapsed();

    std::fs::write(output, &bytes)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, layout={:.1}ms, render={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes)",
        t_parse.as_secs_f64() * 1000.0,
        (t_layout - t_parse).as_secs_f64() * 1000.0,
        (t_render - t_layout).as_secs_f64() * 1000.0,
        (t_total - t_render).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
    );

    Ok(())
}
