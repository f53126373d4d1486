//! QA quicklooks: renders a tile_runner node-code raster as a driver-family
//! colour map and the cross-driver all-gas raster as a heat map.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tiff::decoder::{Decoder, DecodingResult};

use ember_core::tile::NODE_CODE_LAYER;
use ember_core::{DriverCategory, Grid, OutputLayer};

#[derive(Parser, Debug)]
#[command(name = "quicklook", about = "Render PNG quicklooks of tile_runner outputs")]
struct Args {
    /// Directory holding tile_runner outputs
    #[arg(long, default_value = "data/outputs")]
    input_dir: PathBuf,

    /// Tile to render
    #[arg(long)]
    tile_id: String,

    /// PNG output directory
    #[arg(short, long, default_value = "data/quicklook")]
    output: PathBuf,

    /// Heat-map saturation in t CO2e/ha (default: tile maximum)
    #[arg(long)]
    max_emission: Option<f32>,
}

// ── Colour helpers ────────────────────────────────────────────────────────────

/// Driver family colour, in [`DriverCategory::ALL`] order.
fn family_color(driver: DriverCategory) -> [u8; 3] {
    match driver {
        DriverCategory::PermanentAgriculture      => [230, 159,   0], // orange
        DriverCategory::HardCommodities           => [ 86, 180, 233], // sky blue
        DriverCategory::ShiftingCultivation       => [  0, 158, 115], // green
        DriverCategory::ForestManagement          => [240, 228,  66], // yellow
        DriverCategory::Wildfire                  => [213,  94,   0], // vermillion
        DriverCategory::SettlementsInfrastructure => [204, 121, 167], // pink
        DriverCategory::OtherDisturbances         => [  0, 114, 178], // blue
        DriverCategory::NoDriver                  => [150, 150, 150], // grey
    }
}

/// Node code → colour. The family sets the hue; peat leaves (groups 1–4) are
/// drawn darker. Code 0 is black.
fn node_color(code: u16) -> [u8; 3] {
    let family = usize::from(code / 100);
    let Some(&driver) = family.checked_sub(1).and_then(|i| DriverCategory::ALL.get(i)) else {
        return [0, 0, 0];
    };
    let [r, g, b] = family_color(driver);
    let group = (code / 10) % 10;
    if (1..=4).contains(&group) {
        [r / 2, g / 2, b / 2]
    } else {
        [r, g, b]
    }
}

/// Emission → yellow-to-red heat colour; 0 (no-data) is black.
fn heat(v: f32, max: f32) -> [u8; 3] {
    if v <= 0.0 || max <= 0.0 {
        return [0, 0, 0];
    }
    let t = (v / max).clamp(0.0, 1.0);
    [255, (255.0 * (1.0 - t)) as u8, 0]
}

// ── Raster IO ────────────────────────────────────────────────────────────────

fn read_grid(path: &Path) -> Result<Grid<f32>> {
    let bytes = fs::read(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut decoder = Decoder::new(Cursor::new(bytes))
        .with_context(|| format!("Not a valid TIFF: {}", path.display()))?;
    let (w, h) = decoder.dimensions()?;
    let data: Vec<f32> = match decoder.read_image()? {
        DecodingResult::F32(v) => v,
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        _ => bail!("Unexpected pixel type in {}", path.display()),
    };
    Grid::from_vec(w as usize, h as usize, data)
        .with_context(|| format!("Truncated raster: {}", path.display()))
}

fn render(grid: &Grid<f32>, color: impl Fn(f32) -> [u8; 3]) -> image::RgbImage {
    let mut img = image::RgbImage::new(grid.width as u32, grid.height as u32);
    for r in 0..grid.height {
        for c in 0..grid.width {
            img.put_pixel(c as u32, r as u32, image::Rgb(color(grid.get(r, c))));
        }
    }
    img
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    fs::create_dir_all(&args.output)
        .with_context(|| format!("Cannot create {}", args.output.display()))?;

    let nodes = read_grid(&args.input_dir.join(format!("{}_{NODE_CODE_LAYER}.tif", args.tile_id)))?;
    let img = render(&nodes, |v| node_color(v as u16));
    let path = args.output.join(format!("{}_nodes.png", args.tile_id));
    img.save(&path).with_context(|| format!("Failed to save {}", path.display()))?;
    println!("Wrote {}", path.display());

    let all_gas = read_grid(
        &args
            .input_dir
            .join(format!("{}_{}.tif", args.tile_id, OutputLayer::AllGas.name())),
    )?;
    let max = args.max_emission.unwrap_or_else(|| all_gas.max_value());
    let img = render(&all_gas, |v| heat(v, max));
    let path = args.output.join(format!("{}_all_gas.png", args.tile_id));
    img.save(&path).with_context(|| format!("Failed to save {}", path.display()))?;
    println!("Wrote {} (saturation {max:.1} t CO2e/ha)", path.display());

    println!("Legend:");
    for d in DriverCategory::ALL {
        let [r, g, b] = family_color(d);
        println!("  {}xx  rgb({r},{g},{b})  {}", d.index() + 1, d.slug());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_colors_follow_family_and_peat() {
        assert_eq!(node_color(0), [0, 0, 0]);
        assert_eq!(node_color(271), family_color(DriverCategory::HardCommodities));
        assert_eq!(node_color(511), [106, 47, 0]);
        assert_eq!(node_color(999), [0, 0, 0]);
    }

    #[test]
    fn heat_saturates_and_blacks_out_nodata() {
        assert_eq!(heat(0.0, 100.0), [0, 0, 0]);
        assert_eq!(heat(100.0, 100.0), [255, 0, 0]);
        assert_eq!(heat(500.0, 100.0), [255, 0, 0]);
        assert_eq!(heat(50.0, 0.0), [0, 0, 0]);
    }
}
