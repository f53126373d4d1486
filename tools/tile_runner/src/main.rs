/// Tile runner: reads the single-band GeoTIFF input layers of one or more
/// tiles, runs the gross-emissions model, and writes per-driver and
/// cross-driver emission rasters, a node-code raster, and a JSON summary.
///
/// Input files:   {input_dir}/{tile_id}_{layer}.tif
/// Output files:  {output_dir}/{tile_id}_{output}.tif, {tile_id}_summary.json
use std::fs::{self, File};
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ember_core::tile::NODE_CODE_LAYER;
use ember_core::{process_tile, InputLayers, ModelConfig, TileInputs, TileOutputs, ValidationPolicy};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Profile {
    Current,
    Legacy,
}

#[derive(Parser, Debug)]
#[command(name = "tile_runner", about = "Compute gross emissions rasters for tree-cover-loss tiles")]
struct Args {
    /// Directory holding {tile_id}_{layer}.tif inputs
    #[arg(long, default_value = "data/tiles")]
    input_dir: PathBuf,

    /// Tile to process (repeatable)
    #[arg(long = "tile-id", required = true)]
    tile_ids: Vec<String>,

    /// Output directory (created if absent)
    #[arg(short, long, default_value = "data/outputs")]
    output_dir: PathBuf,

    /// Model configuration JSON applied over the --profile preset
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base preset; fields missing from --config keep its values
    #[arg(long, value_enum, default_value = "current")]
    profile: Profile,

    /// Abort on the first input contract violation
    #[arg(long)]
    strict: bool,

    /// Repeat for more log output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ── Input layers ─────────────────────────────────────────────────────────────

/// File suffix of every input layer and whether the run can zero-fill it.
const LAYERS: [(&str, bool); 13] = [
    ("agc", true),
    ("bgc", true),
    ("deadwood", false),
    ("litter", false),
    ("soil", false),
    ("loss_year", true),
    ("driver", true),
    ("peat", false),
    ("burn", false),
    ("ecozone", true),
    ("climate_zone", true),
    ("ifl", false),
    ("plantation", false),
];

fn layer_path(dir: &Path, tile_id: &str, layer: &str) -> PathBuf {
    dir.join(format!("{tile_id}_{layer}.tif"))
}

/// A decoded single-band raster.
struct Band {
    width: usize,
    height: usize,
    samples: DecodingResult,
}

fn read_band(path: &Path) -> Result<Band> {
    let bytes = fs::read(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut decoder = Decoder::new(Cursor::new(bytes))
        .with_context(|| format!("Not a valid TIFF: {}", path.display()))?;
    let (width, height) = decoder
        .dimensions()
        .with_context(|| format!("Dimensions error: {}", path.display()))?;
    let samples = decoder
        .read_image()
        .with_context(|| format!("read_image failed: {}", path.display()))?;
    Ok(Band { width: width as usize, height: height as usize, samples })
}

fn to_f32(samples: DecodingResult) -> Result<Vec<f32>> {
    Ok(match samples {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => bail!("unsupported sample type"),
    })
}

fn to_i32(samples: DecodingResult) -> Result<Vec<i32>> {
    Ok(match samples {
        DecodingResult::U8(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I32(v) => v,
        DecodingResult::U32(v) => v.into_iter().map(|x| x.min(i32::MAX as u32) as i32).collect(),
        // Float-encoded categorical rasters.
        DecodingResult::F32(v) => v.into_iter().map(|x| x as i32).collect(),
        DecodingResult::F64(v) => v.into_iter().map(|x| x as i32).collect(),
        _ => bail!("unsupported sample type"),
    })
}

/// Read every layer of a tile. The tile's shape comes from the agc layer;
/// missing optional layers are zero-filled.
fn read_tile(dir: &Path, tile_id: &str) -> Result<TileInputs> {
    let agc = read_band(&layer_path(dir, tile_id, "agc"))?;
    let (width, height) = (agc.width, agc.height);
    let len = width * height;
    let mut layers = InputLayers::zeroed(len);
    layers.above_ground_carbon = to_f32(agc.samples).context("agc")?;

    for &(name, required) in &LAYERS[1..] {
        let path = layer_path(dir, tile_id, name);
        if !path.exists() {
            if required {
                bail!("tile {tile_id}: required layer missing: {}", path.display());
            }
            info!(tile = tile_id, layer = name, "layer absent, zero-filled");
            continue;
        }
        let band = read_band(&path)?;
        if (band.width, band.height) != (width, height) {
            bail!(
                "tile {tile_id}: layer {name} is {}×{}, expected {width}×{height}",
                band.width,
                band.height
            );
        }
        let ctx = || format!("{}", path.display());
        match name {
            "bgc" => layers.below_ground_carbon = to_f32(band.samples).with_context(ctx)?,
            "deadwood" => layers.deadwood_carbon = to_f32(band.samples).with_context(ctx)?,
            "litter" => layers.litter_carbon = to_f32(band.samples).with_context(ctx)?,
            "soil" => layers.soil_carbon = to_f32(band.samples).with_context(ctx)?,
            "loss_year" => layers.loss_year = to_i32(band.samples).with_context(ctx)?,
            "driver" => layers.driver_class = to_i32(band.samples).with_context(ctx)?,
            "peat" => layers.peat_flag = to_f32(band.samples).with_context(ctx)?,
            "burn" => layers.burn_flag = to_f32(band.samples).with_context(ctx)?,
            "ecozone" => layers.ecozone = to_i32(band.samples).with_context(ctx)?,
            "climate_zone" => layers.climate_zone = to_i32(band.samples).with_context(ctx)?,
            "ifl" => layers.intact_forest_flag = to_f32(band.samples).with_context(ctx)?,
            "plantation" => layers.plantation_type = to_i32(band.samples).with_context(ctx)?,
            other => bail!("unhandled layer {other}"),
        }
    }

    Ok(TileInputs { tile_id: tile_id.to_string(), width, height, layers })
}

// ── Outputs ──────────────────────────────────────────────────────────────────

fn write_f32(path: &Path, width: usize, height: usize, data: &[f32]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    encoder
        .write_image::<colortype::Gray32Float>(width as u32, height as u32, data)
        .with_context(|| format!("Write failed: {}", path.display()))?;
    Ok(())
}

fn write_u16(path: &Path, width: usize, height: usize, data: &[u16]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    encoder
        .write_image::<colortype::Gray16>(width as u32, height as u32, data)
        .with_context(|| format!("Write failed: {}", path.display()))?;
    Ok(())
}

fn write_outputs(dir: &Path, out: &TileOutputs) -> Result<()> {
    for (layer, grid) in out.layers() {
        let path = dir.join(format!("{}_{}.tif", out.tile_id, layer.name()));
        write_f32(&path, grid.width, grid.height, &grid.data)?;
    }
    let path = dir.join(format!("{}_{NODE_CODE_LAYER}.tif", out.tile_id));
    write_u16(&path, out.width, out.height, &out.node_code.data)?;

    let path = dir.join(format!("{}_summary.json", out.tile_id));
    let json = out.summary.to_json().context("Cannot serialise summary")?;
    fs::write(&path, json).with_context(|| format!("Write failed: {}", path.display()))?;
    Ok(())
}

// ── Driver ───────────────────────────────────────────────────────────────────

fn load_config(args: &Args) -> Result<ModelConfig> {
    let preset = match args.profile {
        Profile::Current => ModelConfig::current(),
        Profile::Legacy => ModelConfig::legacy(),
    };
    let mut cfg = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read config {}", path.display()))?;
            ModelConfig::from_json_over(&text, &preset)
                .with_context(|| format!("In {}", path.display()))?
        }
        None => preset,
    };
    if args.strict {
        cfg.validation = ValidationPolicy::Strict;
    }
    Ok(cfg)
}

fn run_tile(input_dir: &Path, output_dir: &Path, tile_id: &str, cfg: &ModelConfig) -> Result<TileOutputs> {
    let tile = read_tile(input_dir, tile_id)?;
    let out = process_tile(&tile, cfg)?;
    write_outputs(output_dir, &out)?;
    Ok(out)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let cfg = load_config(&args)?;
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Cannot create {}", args.output_dir.display()))?;

    for tile_id in &args.tile_ids {
        let out = run_tile(&args.input_dir, &args.output_dir, tile_id, &cfg)?;
        let s = &out.summary;
        eprintln!(
            "  {tile_id}: {} modeled, {} flagged, {} leaves reached",
            s.modeled_pixels,
            s.flagged_pixels,
            s.node_histogram.len()
        );
    }

    Ok(())
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tile_runner_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_i16(path: &Path, width: usize, height: usize, data: &[i16]) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
        encoder.write_image::<colortype::GrayI16>(width as u32, height as u32, data).unwrap();
    }

    #[test]
    fn cli_requires_tile_id() {
        assert!(Args::try_parse_from(["tile_runner"]).is_err());
        let args = Args::try_parse_from([
            "tile_runner", "--tile-id", "00N_110E", "--tile-id", "10N_020E", "--profile", "legacy", "--strict",
        ])
        .unwrap();
        assert_eq!(args.tile_ids, ["00N_110E", "10N_020E"]);
        assert_eq!(args.profile, Profile::Legacy);
        assert!(args.strict);
    }

    #[test]
    fn strict_flag_overrides_config() {
        let args = Args::try_parse_from(["tile_runner", "--tile-id", "t", "--strict"]).unwrap();
        assert_eq!(load_config(&args).unwrap().validation, ValidationPolicy::Strict);
        let args = Args::try_parse_from(["tile_runner", "--tile-id", "t", "--profile", "legacy"]).unwrap();
        let cfg = load_config(&args).unwrap();
        assert_eq!(cfg.model_years, 20);
        assert_eq!(cfg.validation, ValidationPolicy::Flag);
    }

    #[test]
    fn config_file_overrides_chosen_preset() {
        let dir = scratch_dir("config");
        let path = dir.join("override.json");
        fs::write(&path, r#"{ "gwp": { "ch4_equiv": 30.0 } }"#).unwrap();
        let args = Args::try_parse_from([
            "tile_runner",
            "--tile-id",
            "t",
            "--profile",
            "legacy",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let cfg = load_config(&args).unwrap();
        assert_eq!(cfg.gwp.ch4_equiv, 30.0);
        assert_eq!(cfg.model_years, ModelConfig::legacy().model_years);
        assert_eq!(cfg.profile, ModelConfig::legacy().profile);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn integer_samples_widen() {
        assert_eq!(to_i32(DecodingResult::U8(vec![0, 7])).unwrap(), [0, 7]);
        assert_eq!(to_i32(DecodingResult::F32(vec![3.0, 12.9])).unwrap(), [3, 12]);
        assert_eq!(to_f32(DecodingResult::I16(vec![-9999, 4])).unwrap(), [-9999.0, 4.0]);
    }

    #[test]
    fn missing_required_layer_is_fatal() {
        let dir = scratch_dir("missing");
        write_f32(&layer_path(&dir, "t", "agc"), 2, 1, &[100.0, 0.0]).unwrap();
        let err = read_tile(&dir, "t").err().unwrap();
        assert!(format!("{err:#}").contains("required layer missing"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn end_to_end_tile() {
        let input = scratch_dir("in");
        let output = scratch_dir("out");
        let id = "00N_110E";
        write_f32(&layer_path(&input, id, "agc"), 2, 1, &[100.0, 100.0]).unwrap();
        write_f32(&layer_path(&input, id, "bgc"), 2, 1, &[20.0, 20.0]).unwrap();
        write_f32(&layer_path(&input, id, "deadwood"), 2, 1, &[5.0, 5.0]).unwrap();
        write_f32(&layer_path(&input, id, "litter"), 2, 1, &[3.0, 3.0]).unwrap();
        write_f32(&layer_path(&input, id, "soil"), 2, 1, &[135.0, 135.0]).unwrap();
        write_i16(&layer_path(&input, id, "loss_year"), 2, 1, &[3, 0]);
        write_i16(&layer_path(&input, id, "driver"), 2, 1, &[2, 2]);
        write_i16(&layer_path(&input, id, "ecozone"), 2, 1, &[1, 1]);
        write_i16(&layer_path(&input, id, "climate_zone"), 2, 1, &[11, 11]);

        let out = run_tile(&input, &output, id, &ModelConfig::current()).unwrap();
        assert_eq!(out.node_code.data, [271, 0]);
        assert_eq!(out.summary.modeled_pixels, 1);

        let nodes = read_band(&output.join(format!("{id}_{NODE_CODE_LAYER}.tif"))).unwrap();
        assert_eq!(to_i32(nodes.samples).unwrap(), [271, 0]);
        let total = read_band(&output.join(format!("{id}_gross_emis_all_gases_all_drivers.tif"))).unwrap();
        let total = to_f32(total.samples).unwrap();
        assert!((total[0] - 497.6833).abs() < 1e-2);
        assert_eq!(total[1], 0.0);
        assert!(output.join(format!("{id}_summary.json")).exists());

        let _ = fs::remove_dir_all(&input);
        let _ = fs::remove_dir_all(&output);
    }
}
