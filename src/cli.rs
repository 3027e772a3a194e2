//! Command-Line Interface Module
//!
//! Handles argument parsing and validation for the solar-tilt application.

use chrono::NaiveDate;
use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use solar_tilt::error::{ConfigError, OptimizeError};
use solar_tilt::optimize::SearchMethod;

// ===================== CLI =====================

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Site latitude in decimal degrees (-90 to 90, north positive)
    #[arg(long, allow_hyphen_values = true, value_parser = parse_latitude, env = "SOLAR_TILT_LATITUDE",
          required_unless_present_any = ["show_build_info", "sweep_latitudes"])]
    pub latitude: Option<f64>,

    /// Panel area in square meters
    #[arg(long, default_value_t = 1.0, value_parser = parse_positive_f64, env = "SOLAR_TILT_PANEL_AREA")]
    pub panel_area: f64,

    /// Panel efficiency (0.0-1.0, typical ~0.18-0.22 for silicon)
    #[arg(long, default_value_t = 0.2, value_parser = parse_efficiency, env = "SOLAR_TILT_EFFICIENCY")]
    pub efficiency: f64,

    /// Optimize annual energy (12 representative days) instead of one day
    #[arg(long, env = "SOLAR_TILT_ANNUAL")]
    pub annual: bool,

    /// Day of year for daily optimization (1-366, 172 = summer solstice)
    #[arg(long, default_value_t = 172, value_parser = parse_day, env = "SOLAR_TILT_DAY")]
    pub day: u32,

    /// Calendar date for daily optimization (YYYY-MM-DD), overrides --day
    #[arg(long, value_parser = parse_date, env = "SOLAR_TILT_DATE")]
    pub date: Option<NaiveDate>,

    /// Tilt search bracket: "MIN-MAX" (e.g., "20-60")
    /// If not specified, latitude ± 20° clamped to 0-90 is used
    #[arg(long, value_parser = parse_range, env = "SOLAR_TILT_TILT_RANGE")]
    pub tilt_range: Option<(f64, f64)>,

    /// Search method: compare, brute-force, ternary, golden-section or gradient
    #[arg(long, default_value = "compare", value_parser = parse_method, env = "SOLAR_TILT_METHOD")]
    pub method: MethodChoice,

    /// Grid step for brute force search and energy profiles (degrees)
    #[arg(long, default_value_t = 0.5, value_parser = parse_positive_f64, env = "SOLAR_TILT_STEP")]
    pub step: f64,

    /// Convergence tolerance (degrees)
    #[arg(long, default_value_t = 1e-3, value_parser = parse_positive_f64, env = "SOLAR_TILT_TOLERANCE")]
    pub tolerance: f64,

    /// Gradient ascent learning rate
    #[arg(long, default_value_t = 0.1, value_parser = parse_positive_f64, env = "SOLAR_TILT_LEARNING_RATE")]
    pub learning_rate: f64,

    /// Gradient ascent start angle in degrees (defaults to the bracket midpoint)
    #[arg(long, value_parser = parse_tilt)]
    pub initial_angle: Option<f64>,

    /// Sensitivity analysis around the best angle, ± PERCENT of that angle
    #[arg(long, value_name = "PERCENT", num_args = 0..=1, default_missing_value = "10",
          value_parser = parse_percent)]
    pub sensitivity: Option<f64>,

    /// Print energy for every tilt in the bracket at this step (degrees)
    #[arg(long, value_name = "STEP", value_parser = parse_positive_f64)]
    pub profile: Option<f64>,

    /// Golden-section optimum for each latitude in a comma-separated list
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, value_parser = parse_latitude)]
    pub sweep_latitudes: Option<Vec<f64>>,

    /// Print every evaluated point of each search
    #[arg(long)]
    pub show_trace: bool,

    /// Output results as JSON
    #[arg(long, env = "SOLAR_TILT_JSON")]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show build info from Cargo.lock at time of building
    #[arg(long)]
    pub show_build_info: bool,
}

/// Which searches to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodChoice {
    Compare,
    Single(SearchMethod),
}

// Define the structure to match what we serialized in build.rs
#[derive(Debug, Deserialize)]
pub struct DepInfo {
    pub name: String,
    pub version: String,
    pub checksum: Option<String>,
    pub source: Option<String>,
}

// ===================== ERRORS =====================

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ===================== CLI VALUE PARSERS =====================

fn parse_latitude(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s.trim().parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !(-90.0..=90.0).contains(&v) {
        return Err(format!("Latitude must be between -90 and 90, got {}", v));
    }
    Ok(v)
}

fn parse_positive_f64(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !v.is_finite() || v <= 0.0 {
        return Err(format!("Value must be positive, got {}", v));
    }
    Ok(v)
}

fn parse_tilt(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !(0.0..=90.0).contains(&v) {
        return Err(format!("Tilt must be between 0 and 90 degrees, got {}", v));
    }
    Ok(v)
}

fn parse_efficiency(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !(v > 0.0 && v <= 1.0) {
        return Err(format!("Efficiency must be greater than 0.0 and at most 1.0, got {}", v));
    }
    Ok(v)
}

fn parse_day(s: &str) -> std::result::Result<u32, String> {
    let v: u32 = s.parse().map_err(|_| format!("Invalid integer: {}", s))?;
    if !(1..=366).contains(&v) {
        return Err(format!("Day of year must be between 1 and 366, got {}", v));
    }
    Ok(v)
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("Date must be in format YYYY-MM-DD, got '{}': {}", s, e))
}

fn parse_percent(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !v.is_finite() || v < 0.0 {
        return Err(format!("Percentage must be zero or positive, got {}", v));
    }
    Ok(v)
}

fn parse_method(s: &str) -> std::result::Result<MethodChoice, String> {
    match s {
        "compare" => Ok(MethodChoice::Compare),
        "brute-force" => Ok(MethodChoice::Single(SearchMethod::BruteForce)),
        "ternary" => Ok(MethodChoice::Single(SearchMethod::TernarySearch)),
        "golden-section" => Ok(MethodChoice::Single(SearchMethod::GoldenSection)),
        "gradient" => Ok(MethodChoice::Single(SearchMethod::GradientAscent)),
        other => Err(format!(
            "Unknown method '{}', expected one of: compare, brute-force, ternary, golden-section, gradient",
            other
        )),
    }
}

fn parse_range(s: &str) -> std::result::Result<(f64, f64), String> {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 2 {
        return Err(format!("Range must be in format MIN-MAX (e.g., '20-60'), got '{}'", s));
    }
    let min: f64 = parts[0].parse().map_err(|_| format!("Invalid minimum value: {}", parts[0]))?;
    let max: f64 = parts[1].parse().map_err(|_| format!("Invalid maximum value: {}", parts[1]))?;
    if min >= max {
        return Err(format!("Minimum ({}) must be less than maximum ({})", min, max));
    }
    if max > 90.0 {
        return Err(format!("Tilt range must lie within 0-90 degrees, got '{}'", s));
    }
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("20-60"), Ok((20.0, 60.0)));
        assert_eq!(parse_range("0-90"), Ok((0.0, 90.0)));
        assert!(parse_range("60-20").is_err(), "Reversed range must be rejected");
        assert!(parse_range("30-30").is_err(), "Empty range must be rejected");
        assert!(parse_range("10-95").is_err());
        assert!(parse_range("20").is_err());
        assert!(parse_range("a-b").is_err());
    }

    #[test]
    fn test_parse_site_values() {
        assert_eq!(parse_latitude("-33.9"), Ok(-33.9));
        assert!(parse_latitude("91").is_err());
        assert!(parse_efficiency("0").is_err());
        assert_eq!(parse_efficiency("1.0"), Ok(1.0));
        assert!(parse_positive_f64("-2").is_err());
        assert!(parse_positive_f64("inf").is_err());
        assert!(parse_day("0").is_err());
        assert_eq!(parse_day("366"), Ok(366));
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2025-06-21").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 21).unwrap());
        assert!(parse_date("21/06/2025").is_err());
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("compare"), Ok(MethodChoice::Compare));
        assert_eq!(parse_method("golden-section"), Ok(MethodChoice::Single(SearchMethod::GoldenSection)));
        assert!(parse_method("newton").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["solar-tilt", "--latitude", "40.4"]).unwrap();
        assert_eq!(args.latitude, Some(40.4));
        assert_eq!(args.panel_area, 1.0);
        assert_eq!(args.efficiency, 0.2);
        assert_eq!(args.day, 172);
        assert_eq!(args.method, MethodChoice::Compare);
        assert_eq!(args.sensitivity, None);
        assert!(!args.annual);
    }

    #[test]
    fn test_args_sensitivity_default_percent() {
        let args = Args::try_parse_from(["solar-tilt", "--latitude", "40", "--sensitivity"]).unwrap();
        assert_eq!(args.sensitivity, Some(10.0));

        let args =
            Args::try_parse_from(["solar-tilt", "--latitude", "40", "--sensitivity", "15"]).unwrap();
        assert_eq!(args.sensitivity, Some(15.0));
    }

    #[test]
    fn test_args_sweep_and_negative_latitude() {
        let args = Args::try_parse_from(["solar-tilt", "--sweep-latitudes", "-30,0,20,40"]).unwrap();
        assert_eq!(args.latitude, None);
        assert_eq!(args.sweep_latitudes, Some(vec![-30.0, 0.0, 20.0, 40.0]));

        let args = Args::try_parse_from(["solar-tilt", "--latitude", "-33.9"]).unwrap();
        assert_eq!(args.latitude, Some(-33.9));
    }

    #[test]
    fn test_args_require_latitude() {
        assert!(Args::try_parse_from(["solar-tilt"]).is_err());
        assert!(Args::try_parse_from(["solar-tilt", "--show-build-info"]).is_ok());
        assert!(Args::try_parse_from(["solar-tilt", "--latitude", "40", "-v", "-q"]).is_err());
    }
}
