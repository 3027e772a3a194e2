//! Output Formatting Module
//!
//! Renders optimization results as terminal tables or as JSON.

use chrono::NaiveDate;
use serde::Serialize;

use solar_tilt::error::OptimizeResult;
use solar_tilt::optimize::{
    EvaluationPoint, LatitudeOptimum, OptimizationResult, SearchMethod, SearchStatus, SensitivityPoint,
};
use solar_tilt::solar_panel::{self, EnergyMode, EnergyUnit, PanelOutput, SolarPanelModel};

use crate::cli::{DepInfo, Result};

/// Outcome of one method, successful or not
pub type MethodEntry = (SearchMethod, OptimizeResult<OptimizationResult>);

// ===================== REPORT =====================

/// Everything computed for one site
pub struct SiteRun<'a> {
    pub model: &'a SolarPanelModel,
    pub mode: EnergyMode,
    pub date: Option<NaiveDate>,
    pub bracket: (f64, f64),
    pub methods: Vec<MethodEntry>,
    pub best: Option<SearchMethod>,
    pub sensitivity: Option<SensitivityRun>,
    pub profile: Option<OptimizeResult<Vec<EvaluationPoint>>>,
}

impl SiteRun<'_> {
    /// Result of the method marked as best
    pub fn best_result(&self) -> Option<&OptimizationResult> {
        let best = self.best?;
        self.methods.iter().find(|(method, _)| *method == best).and_then(|(_, outcome)| outcome.as_ref().ok())
    }
}

pub struct SensitivityRun {
    pub reference_angle: f64,
    pub range_percent: f64,
    pub outcome: OptimizeResult<Vec<SensitivityPoint>>,
}

pub struct SweepRun {
    pub mode: EnergyMode,
    pub bracket: (f64, f64),
    pub entries: Vec<LatitudeOptimum>,
}

pub struct Report<'a> {
    pub site: Option<SiteRun<'a>>,
    pub sweep: Option<SweepRun>,
    pub show_trace: bool,
}

/// Print a report as text or JSON
pub fn print_report(report: &Report<'_>, json: bool) -> Result<()> {
    if json {
        println!("{}", to_json(report)?);
        return Ok(());
    }

    if let Some(site) = &report.site {
        print_site_summary(site);
        print_method_table(site);
        if let Some(output) = noon_conditions(site) {
            print_noon_conditions(&output);
        }
        if report.show_trace {
            print_traces(&site.methods);
        }
        if let Some(sensitivity) = &site.sensitivity {
            print_sensitivity(sensitivity, site.mode.unit());
        }
        if let Some(profile) = &site.profile {
            print_profile(profile, site.mode.unit());
        }
    }

    if let Some(sweep) = &report.sweep {
        print_latitude_sweep(sweep);
    }
    Ok(())
}

// ===================== TEXT OUTPUT =====================

fn status_label(status: SearchStatus) -> &'static str {
    match status {
        SearchStatus::Converged => "converged",
        SearchStatus::MaxIterations => "max iterations",
        SearchStatus::Exhausted => "exhausted",
    }
}

fn describe_mode(mode: EnergyMode, date: Option<NaiveDate>) -> String {
    match (mode, date) {
        (EnergyMode::Annual, _) => "annual energy (12 representative days)".to_string(),
        (EnergyMode::Daily { day_of_year }, Some(date)) => {
            format!("daily energy, {} (day {})", date.format("%b %d, %Y"), day_of_year)
        }
        (EnergyMode::Daily { day_of_year }, None) => format!("daily energy, day {}", day_of_year),
    }
}

fn print_site_summary(site: &SiteRun<'_>) {
    let config = site.model.config();

    println!();
    println!("=== Solar Panel Tilt Optimization ===");
    println!(
        "Site      : {:.2}° latitude | {:.2} m² panel | {:.1}% efficiency",
        config.latitude_deg(),
        config.area_m2(),
        config.efficiency() * 100.0
    );
    println!("Objective : {}", describe_mode(site.mode, site.date));
    println!("Bracket   : {:.1}° - {:.1}°", site.bracket.0, site.bracket.1);
}

fn print_method_table(site: &SiteRun<'_>) {
    let unit = site.mode.unit();

    println!();
    println!("{:-<76}", "");
    println!(
        "{:<16} {:>10} {:>16} {:>7} {:>7}  {:<14}",
        "Method", "Angle (°)", "Energy", "Evals", "Iter", "Status"
    );
    println!("{:-<76}", "");

    for (method, outcome) in &site.methods {
        match outcome {
            Ok(result) => println!(
                "{:<16} {:>10.3} {:>12.3} {:<3} {:>7} {:>7}  {:<14}",
                method.name(),
                result.angle_deg,
                result.energy,
                unit.symbol(),
                result.evaluations(),
                result.iterations,
                status_label(result.status)
            ),
            Err(err) => println!("{:<16} error: {}", method.name(), err),
        }
    }
    println!("{:-<76}", "");

    if let Some(best) = site.best_result() {
        println!(
            "Best: {} at {:.2}° ({})",
            best.method,
            best.angle_deg,
            solar_panel::format_energy(best.energy, unit)
        );
    }
}

/// Panel state at solar noon for the best tilt; daily runs only
fn noon_conditions(site: &SiteRun<'_>) -> Option<PanelOutput> {
    let EnergyMode::Daily { day_of_year } = site.mode else { return None };
    let best = site.best_result()?;
    Some(site.model.calculate_output(best.angle_deg, day_of_year, 12.0))
}

fn print_noon_conditions(output: &PanelOutput) {
    println!();
    println!("Solar noon at best tilt:");
    println!("  Sun elevation : {:8.2}°", output.elevation_rad.to_degrees());
    println!("  Angle of inc. : {:8.2}°", output.incidence_rad.to_degrees());
    println!("  DNI           : {}", solar_panel::format_irradiance(output.dni));
    println!("  Direct        : {}", solar_panel::format_irradiance(output.irradiance.direct));
    println!("  Diffuse       : {}", solar_panel::format_irradiance(output.irradiance.diffuse));
    println!("  Ground        : {}", solar_panel::format_irradiance(output.irradiance.ground_reflected));
    println!("  Power output  : {}", solar_panel::format_power(output.power_w));
}

fn print_traces(methods: &[MethodEntry]) {
    for (method, outcome) in methods {
        let Ok(result) = outcome else { continue };

        println!();
        println!("Trace ({}, {} evaluations):", method, result.evaluations());
        for (i, point) in result.trace.iter().enumerate() {
            println!("  {:>4}  {:>10.4}°  {:>14.4}", i + 1, point.angle_deg, point.energy);
        }
    }
}

fn print_sensitivity(run: &SensitivityRun, unit: EnergyUnit) {
    println!();
    println!(
        "Sensitivity (±{}% around {:.2}°):",
        run.range_percent, run.reference_angle
    );

    match &run.outcome {
        Ok(points) => {
            println!("{:-<44}", "");
            println!("{:>10} {:>18} {:>12}", "Angle (°)", format!("Energy ({})", unit.symbol()), "Loss (%)");
            println!("{:-<44}", "");
            for point in points {
                println!("{:>10.3} {:>18.3} {:>12.4}", point.angle_deg, point.energy, point.loss_percent);
            }
            println!("{:-<44}", "");
        }
        Err(err) => println!("  error: {}", err),
    }
}

fn print_profile(profile: &OptimizeResult<Vec<EvaluationPoint>>, unit: EnergyUnit) {
    println!();
    println!("Energy profile:");

    match profile {
        Ok(points) => {
            let peak = points.iter().map(|p| p.energy).fold(f64::NEG_INFINITY, f64::max);
            println!("{:-<32}", "");
            println!("{:>10} {:>18}", "Angle (°)", format!("Energy ({})", unit.symbol()));
            println!("{:-<32}", "");
            for point in points {
                let marker = if point.energy == peak { " *" } else { "" };
                println!("{:>10.2} {:>18.3}{}", point.angle_deg, point.energy, marker);
            }
            println!("{:-<32}", "");
        }
        Err(err) => println!("  error: {}", err),
    }
}

fn print_latitude_sweep(sweep: &SweepRun) {
    let unit = sweep.mode.unit();

    println!();
    println!(
        "=== Latitude Sweep ({}, bracket {:.1}° - {:.1}°) ===",
        describe_mode(sweep.mode, None),
        sweep.bracket.0,
        sweep.bracket.1
    );
    println!("{:-<48}", "");
    println!("{:>10} {:>14} {:>20}", "Lat (°)", "Tilt (°)", format!("Energy ({})", unit.symbol()));
    println!("{:-<48}", "");

    for entry in &sweep.entries {
        match &entry.outcome {
            Ok(result) => println!(
                "{:>10.2} {:>14.2} {:>20.3}",
                entry.latitude_deg, result.angle_deg, result.energy
            ),
            Err(err) => println!("{:>10.2}  error: {}", entry.latitude_deg, err),
        }
    }
    println!("{:-<48}", "");
}

/// Print build info from Cargo.lock at time of building
pub fn print_build_info() -> Result<()> {
    println!("Built from Git commit: {}\n", env!("APP_GIT_HASH"));
    const DEP_INFO_RAW: &str = include_str!(env!("DEPS_INFO_PATH"));
    let deps: Vec<DepInfo> = serde_json::from_str(DEP_INFO_RAW)?;

    println!("Found {} dependencies.", deps.len());
    for dep in deps {
        println!("- {} v{}", dep.name, dep.version);
        if let Some(sum) = dep.checksum {
            println!("    Checksum: {}", sum);
        }
        if let Some(src) = dep.source {
            println!("    Source:   {}", src);
        }
    }
    Ok(())
}

// ===================== JSON OUTPUT =====================

#[derive(Serialize)]
struct ReportJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    site: Option<SiteJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latitude_sweep: Option<SweepJson<'a>>,
}

#[derive(Serialize)]
struct SiteJson<'a> {
    latitude_deg: f64,
    panel_area_m2: f64,
    efficiency: f64,
    objective: EnergyMode,
    unit: EnergyUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    bracket: [f64; 2],
    methods: Vec<MethodJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    best: Option<SearchMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sensitivity: Option<SensitivityJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<Outcome<'a, Vec<EvaluationPoint>>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MethodJson<'a> {
    Ok {
        method: SearchMethod,
        angle_deg: f64,
        energy: f64,
        evaluations: usize,
        iterations: usize,
        status: SearchStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        trace: Option<&'a [EvaluationPoint]>,
    },
    Failed {
        method: SearchMethod,
        error: String,
    },
}

#[derive(Serialize)]
struct SensitivityJson<'a> {
    reference_angle_deg: f64,
    range_percent: f64,
    #[serde(flatten)]
    outcome: Outcome<'a, Vec<SensitivityPoint>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Outcome<'a, T: Serialize> {
    Ok { result: &'a T },
    Failed { error: String },
}

impl<'a, T: Serialize> Outcome<'a, T> {
    fn from_result(result: &'a OptimizeResult<T>) -> Self {
        match result {
            Ok(result) => Outcome::Ok { result },
            Err(err) => Outcome::Failed { error: err.to_string() },
        }
    }
}

#[derive(Serialize)]
struct SweepJson<'a> {
    objective: EnergyMode,
    unit: EnergyUnit,
    bracket: [f64; 2],
    results: Vec<SweepEntryJson<'a>>,
}

#[derive(Serialize)]
struct SweepEntryJson<'a> {
    latitude_deg: f64,
    #[serde(flatten)]
    outcome: Outcome<'a, OptimizationResult>,
}

fn method_json<'a>(entry: &'a MethodEntry, show_trace: bool) -> MethodJson<'a> {
    let (method, outcome) = entry;
    match outcome {
        Ok(result) => MethodJson::Ok {
            method: *method,
            angle_deg: result.angle_deg,
            energy: result.energy,
            evaluations: result.evaluations(),
            iterations: result.iterations,
            status: result.status,
            trace: show_trace.then_some(result.trace.as_slice()),
        },
        Err(err) => MethodJson::Failed { method: *method, error: err.to_string() },
    }
}

fn to_json(report: &Report<'_>) -> Result<String> {
    let site = report.site.as_ref().map(|site| {
        let config = site.model.config();
        SiteJson {
            latitude_deg: config.latitude_deg(),
            panel_area_m2: config.area_m2(),
            efficiency: config.efficiency(),
            objective: site.mode,
            unit: site.mode.unit(),
            date: site.date.map(|d| d.to_string()),
            bracket: [site.bracket.0, site.bracket.1],
            methods: site.methods.iter().map(|entry| method_json(entry, report.show_trace)).collect(),
            best: site.best,
            sensitivity: site.sensitivity.as_ref().map(|run| SensitivityJson {
                reference_angle_deg: run.reference_angle,
                range_percent: run.range_percent,
                outcome: Outcome::from_result(&run.outcome),
            }),
            profile: site.profile.as_ref().map(Outcome::from_result),
        }
    });

    let latitude_sweep = report.sweep.as_ref().map(|sweep| SweepJson {
        objective: sweep.mode,
        unit: sweep.mode.unit(),
        bracket: [sweep.bracket.0, sweep.bracket.1],
        results: sweep
            .entries
            .iter()
            .map(|entry| SweepEntryJson {
                latitude_deg: entry.latitude_deg,
                outcome: Outcome::from_result(&entry.outcome),
            })
            .collect(),
    });

    Ok(serde_json::to_string_pretty(&ReportJson { site, latitude_sweep })?)
}
