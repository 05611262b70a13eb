// ============================================================================
// MapLegend CLI: headless batch classification
// ============================================================================
//
// Usage examples:
//   MapLegend -i world.png --legend koppen.legend -o world_classified.png
//   MapLegend -i maps/*.png --legend koppen.legend --output-dir out/ --merge 5
//   MapLegend -i hand_drawn.bmp --legend koppen.legend \
//             --assign "#3a7d2c=Temperate forest" --assign "#101010=#ff0000"
//   MapLegend -i world.png --legend koppen.legend --merge 5 --save-settings
//
// Every colour a legend does not know needs an --assign entry. The target is
// a class name or the primary colour of a legend class. A map with colours
// left unclassified is reported and not written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::components::colors::Colour;
use crate::components::legend::Legend;
use crate::components::selection::Modifiers;
use crate::config::Settings;
use crate::io::{load_legend, load_raster, save_raster, RasterFormat};
use crate::ops::preprocess::validate_dimensions;
use crate::session::ClassificationSession;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MapLegend headless map classifier.
#[derive(Parser, Debug)]
#[command(
    name = "MapLegend",
    about = "Classify hand-drawn map colours against a legend",
    long_about = "Load class maps, fold legend alias colours into their primary colour,\n\
                  assign every unknown colour to a legend class and write the fully\n\
                  classified map.\n\n\
                  Example:\n  \
                  MapLegend -i world.png --legend koppen.legend -o out.png\n  \
                  MapLegend -i maps/*.png --legend koppen.legend --output-dir out/ \\\n    \
                  --assign \"#3a7d2c=Temperate forest\""
)]
pub struct CliArgs {
    /// Input map(s). Glob patterns accepted (e.g. "*.png", "maps/*.bmp").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Legend file: `kind|name|#primary|#alias,#alias` per line.
    #[arg(short, long, value_name = "FILE")]
    pub legend: PathBuf,

    /// Classify an unknown colour: "#rrggbb=Class name", or "#rrggbb=#rrggbb"
    /// where the target is a legend class's primary colour. May be repeated.
    #[arg(short, long, value_name = "COLOUR=CLASS")]
    pub assign: Vec<String>,

    /// Merge rare near-duplicate colours before analysis (0–99).
    /// Defaults to the configured merge severity.
    #[arg(short, long, value_name = "SEVERITY")]
    pub merge: Option<u32>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png or bmp. Overrides the --output extension.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Required map width; maps of any other size are rejected.
    #[arg(long, requires = "height")]
    pub width: Option<u32>,

    /// Required map height.
    #[arg(long, requires = "width")]
    pub height: Option<u32>,

    /// Store --merge as the default merge severity in the settings file.
    #[arg(long, requires = "merge")]
    pub save_settings: bool,

    /// Print the colour groups of each map and mirror the log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = every map fully classified and written, `1` otherwise.
pub fn run(args: CliArgs) -> ExitCode {
    crate::logger::set_verbose(args.verbose);
    let mut settings = Settings::load();
    if let Some(severity) = args.merge {
        settings.merge_severity = severity;
    }
    if args.save_settings {
        match settings.save() {
            Ok(path) => println!("settings saved to {}", path.display()),
            Err(e) => {
                eprintln!("error: could not save settings: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let legend = match load_legend(&args.legend) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("error: could not read legend '{}': {}", args.legend.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let assignments = match parse_assignments(&args.assign, &legend) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let format = parse_format(args.format.as_deref(), args.output.as_deref());
    let expected_size = args.width.zip(args.height);

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        let job = Job {
            legend: &legend,
            assignments: &assignments,
            settings: &settings,
            format,
            expected_size,
            verbose: args.verbose,
        };
        match run_one(input_path, &output_path, &job) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

struct Job<'a> {
    legend: &'a Legend,
    assignments: &'a BTreeMap<Colour, Colour>,
    settings: &'a Settings,
    format: RasterFormat,
    expected_size: Option<(u32, u32)>,
    verbose: bool,
}

fn run_one(input: &Path, output: &Path, job: &Job<'_>) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let raster = load_raster(input).map_err(|e| format!("load failed: {}", e))?;
    if let Some((w, h)) = job.expected_size {
        validate_dimensions(&raster, w, h).map_err(|e| e.to_string())?;
    }

    let mut session = ClassificationSession::with_settings(raster, job.legend.clone(), job.settings);
    session.name = input
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    // -- Step 2: Clean up and analyze -------------------------------------
    let severity = job.settings.merge_severity;
    if severity > 0 {
        let report = session.merge_similar(severity);
        if job.verbose {
            println!(
                "  merged {} -> {} colours ({} px changed)",
                report.colours_before, report.colours_after, report.pixels_changed
            );
        }
    }
    let summary = session.analyze().map_err(|e| e.to_string())?;
    if job.verbose {
        println!(
            "  {} colour group(s), {} unknown",
            summary.groups, summary.classifications_needed
        );
    }

    // -- Step 3: Classify unknown colours ---------------------------------
    let unknown: Vec<Colour> = session.registry().unresolved().map(|g| g.input).collect();
    for colour in unknown {
        if let Some(&target) = job.assignments.get(&colour) {
            session.click_group(colour, Modifiers::NONE);
            session.commit_selection(target);
        }
    }
    session.apply_all();
    session.analyze().map_err(|e| e.to_string())?;

    if job.verbose {
        for group in session.registry().groups() {
            println!(
                "    {} {:>9} px  {}",
                group.input,
                group.pixels.len(),
                group.label
            );
        }
    }

    // -- Step 4: Hand off --------------------------------------------------
    let raster = match session.finalize() {
        Ok(r) => r,
        Err(e) => {
            let missing: Vec<String> = session
                .registry()
                .unresolved()
                .map(|g| format!("{} ({} px)", g.input, g.pixels.len()))
                .collect();
            return Err(format!("{}: {}", e, missing.join(", ")));
        }
    };
    save_raster(raster, output, job.format).map_err(|e| format!("save failed: {}", e))?;
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse `--assign` values against the legend into input → class colour.
fn parse_assignments(values: &[String], legend: &Legend) -> Result<BTreeMap<Colour, Colour>, String> {
    let mut map = BTreeMap::new();
    for value in values {
        let (colour, class) = parse_assignment(value, legend)?;
        map.insert(colour, class);
    }
    Ok(map)
}

fn parse_assignment(value: &str, legend: &Legend) -> Result<(Colour, Colour), String> {
    let (lhs, rhs) = value
        .split_once('=')
        .ok_or_else(|| format!("--assign '{}' is not COLOUR=CLASS", value))?;
    let input: Colour = lhs.parse().map_err(|e| format!("--assign: {}", e))?;
    let rhs = rhs.trim();

    if let Ok(colour) = rhs.parse::<Colour>()
        && legend.contains(&colour)
    {
        return Ok((input, colour));
    }
    legend
        .find_by_name(rhs)
        .map(|class| (input, class.primary))
        .ok_or_else(|| format!("--assign: legend has no class '{}'", rhs))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// `--format` wins, then the `--output` extension, then PNG.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> RasterFormat {
    if let Some(f) = format_arg {
        return match f.to_lowercase().as_str() {
            "bmp" => RasterFormat::Bmp,
            _ => RasterFormat::Png,
        };
    }
    output.map(RasterFormat::from_path).unwrap_or(RasterFormat::Png)
}

fn format_extension(format: RasterFormat) -> &'static str {
    match format {
        RasterFormat::Png => "png",
        RasterFormat::Bmp => "bmp",
    }
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: next to the input as `<stem>_classified.<ext>`
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: RasterFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format_extension(format);
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_classified.{}", stem, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::legend::{ClassDefinition, ClassKind};

    const FOREST: Colour = Colour::new(0x3a, 0x7d, 0x2c);

    fn legend() -> Legend {
        Legend::from_classes([ClassDefinition::new(ClassKind::Climate, "Temperate forest", FOREST)])
    }

    #[test]
    fn test_parse_assignment_by_name_and_colour() {
        let legend = legend();
        assert_eq!(
            parse_assignment("#010203=temperate FOREST", &legend),
            Ok((Colour::new(1, 2, 3), FOREST))
        );
        assert_eq!(
            parse_assignment("010203 = #3a7d2c", &legend),
            Ok((Colour::new(1, 2, 3), FOREST))
        );
        // colour targets must be a legend primary
        assert!(parse_assignment("#010203=#ffffff", &legend).is_err());
        assert!(parse_assignment("#010203", &legend).is_err());
        assert!(parse_assignment("nope=Temperate forest", &legend).is_err());
    }

    #[test]
    fn test_build_output_path() {
        let input = Path::new("maps/world.bmp");
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), RasterFormat::Png),
            Some(PathBuf::from("out/world.png"))
        );
        assert_eq!(
            build_output_path(input, None, None, RasterFormat::Bmp),
            Some(PathBuf::from("maps/world_classified.bmp"))
        );
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), None, RasterFormat::Png),
            Some(PathBuf::from("x.png"))
        );
    }

    #[test]
    fn test_save_settings_requires_merge() {
        assert!(CliArgs::try_parse_from(["MapLegend", "-i", "a.png", "-l", "k.legend", "--save-settings"]).is_err());
        let args = CliArgs::try_parse_from([
            "MapLegend", "-i", "a.png", "-l", "k.legend", "--merge", "4", "--save-settings",
        ])
        .unwrap();
        assert!(args.save_settings);
        assert_eq!(args.merge, Some(4));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format(Some("bmp"), Some(Path::new("out.png"))), RasterFormat::Bmp);
        assert_eq!(parse_format(Some("BMP"), None), RasterFormat::Bmp);
        assert_eq!(parse_format(None, Some(Path::new("a.bmp"))), RasterFormat::Bmp);
        assert_eq!(parse_format(None, None), RasterFormat::Png);
    }
}
