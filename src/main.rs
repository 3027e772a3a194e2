use chrono::Datelike;
use clap::Parser;
use tracing::{info, warn};

use solar_tilt::optimize::{self, Optimizer, SearchMethod};
use solar_tilt::solar_panel::{EnergyMode, SolarPanelModel};

mod cli;
mod logging;
mod output;

use cli::{Args, MethodChoice, Result};
use output::{MethodEntry, Report, SensitivityRun, SiteRun, SweepRun};

// ===================== MAIN =====================

fn main() {
    let args = Args::parse();
    logging::setup_logging(args.verbose, args.quiet);

    if let Err(err) = run(&args) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    if args.show_build_info {
        return output::print_build_info();
    }

    let mode = if args.annual {
        EnergyMode::Annual
    } else {
        // --date wins over --day
        EnergyMode::Daily { day_of_year: args.date.map_or(args.day, |date| date.ordinal()) }
    };

    let model = args
        .latitude
        .map(|latitude| SolarPanelModel::from_site(latitude, args.panel_area, args.efficiency))
        .transpose()?;

    let site = match &model {
        Some(model) => Some(optimize_site(args, model, mode)?),
        None => None,
    };

    let sweep = args.sweep_latitudes.as_ref().map(|latitudes| {
        let bracket = args.tilt_range.unwrap_or((0.0, 90.0));
        info!(count = latitudes.len(), ?bracket, "running latitude sweep");
        SweepRun {
            mode,
            bracket,
            entries: optimize::latitude_sweep(
                latitudes,
                args.panel_area,
                args.efficiency,
                bracket,
                args.tolerance,
                mode,
            ),
        }
    });

    let report = Report { site, sweep, show_trace: args.show_trace };
    output::print_report(&report, args.json)
}

/// Runs the requested searches and follow-up analyses for one site
fn optimize_site<'a>(args: &Args, model: &'a SolarPanelModel, mode: EnergyMode) -> Result<SiteRun<'a>> {
    let bracket = args.tilt_range.unwrap_or_else(|| default_bracket(model));
    let (min, max) = bracket;
    let optimizer = Optimizer::new(model);

    let (methods, best): (Vec<MethodEntry>, Option<SearchMethod>) = match args.method {
        MethodChoice::Compare => {
            let comparison = optimizer.compare_methods(min, max, mode);
            let best = comparison.best().map(|result| result.method);
            (comparison.into_iter().collect(), best)
        }
        MethodChoice::Single(method) => {
            // A lone method has nothing to fall back on, so its error ends the run
            let result = match method {
                SearchMethod::BruteForce => optimizer.brute_force_search(min, max, args.step, mode),
                SearchMethod::TernarySearch => optimizer.ternary_search(min, max, args.tolerance, mode),
                SearchMethod::GoldenSection => {
                    optimizer.golden_section_search(min, max, args.tolerance, mode)
                }
                SearchMethod::GradientAscent => optimizer.gradient_ascent(
                    args.initial_angle.unwrap_or((min + max) / 2.0),
                    args.learning_rate,
                    args.tolerance,
                    mode,
                ),
            }?;
            (vec![(method, Ok(result))], Some(method))
        }
    };

    let mut site = SiteRun {
        model,
        mode,
        date: args.date,
        bracket,
        methods,
        best,
        sensitivity: None,
        profile: args.profile.map(|step| optimizer.energy_profile(min, max, step, mode)),
    };

    if let Some(range_percent) = args.sensitivity {
        match site.best_result().map(|best| best.angle_deg) {
            Some(reference_angle) => {
                site.sensitivity = Some(SensitivityRun {
                    reference_angle,
                    range_percent,
                    outcome: optimizer.sensitivity_analysis(reference_angle, range_percent, mode),
                });
            }
            None => warn!("no search succeeded, skipping sensitivity analysis"),
        }
    }

    Ok(site)
}

/// Latitude-based bracket, or the full tilt range when the hint is empty
fn default_bracket(model: &SolarPanelModel) -> (f64, f64) {
    let (min, max) = model.optimal_angle_hint();
    if min < max {
        info!(min, max, "using latitude-based search bracket");
        (min, max)
    } else {
        info!(min, max, "latitude hint gives an empty bracket, searching 0-90");
        (0.0, 90.0)
    }
}
