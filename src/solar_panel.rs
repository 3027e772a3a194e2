//! Solar Panel Energy Model
//!
//! Estimates the power and energy captured by a fixed-tilt, south-facing panel
//! from simple solar geometry: declination from the day of year, hour angle
//! from solar time, and a single-factor atmospheric attenuation of the direct
//! beam. Diffuse and ground-reflected light are fixed fractions of the direct
//! normal irradiance.
//!
//! All public angles are in degrees unless the name says `_rad`. Internal
//! trigonometry works in radians.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::Serialize;

use crate::error::ConfigError;

// ===================== CONSTANTS =====================

/// Solar constant in W/m²
pub const SOLAR_CONSTANT: f64 = 1367.0;

/// Fraction of the direct beam transmitted through one air mass
pub const ATMOSPHERE_FACTOR: f64 = 0.7;

/// Air mass cap; keeps attenuation near the horizon from collapsing to ~0
pub const MAX_AIR_MASS: f64 = 10.0;

/// Diffuse sky irradiance as a fraction of DNI
const DIFFUSE_FRACTION: f64 = 0.1;

/// Ground albedo
const ALBEDO: f64 = 0.2;

/// Panel azimuth facing south (radians, measured from north)
pub const SOUTH_AZIMUTH_RAD: f64 = PI;

/// Default integration step for daily energy (hours)
pub const DEFAULT_TIME_STEP_HOURS: f64 = 0.5;

/// Daily integration window in solar hours (inclusive)
pub const DAY_START_HOUR: f64 = 6.0;
pub const DAY_END_HOUR: f64 = 18.0;

/// One representative day per month used for the annual estimate
pub const REPRESENTATIVE_DAYS: [u32; 12] = [17, 47, 75, 105, 135, 162, 198, 230, 266, 296, 326, 356];

/// Weight of each representative day (days in its month, non-leap year)
pub const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Upper bound on the points of any uniform sampling grid
pub const MAX_GRID_POINTS: usize = 10_000_000;

// ===================== CONFIGURATION =====================

/// Site and panel parameters. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteConfig {
    latitude_rad: f64,
    area_m2: f64,
    efficiency: f64,
    solar_constant: f64,
    atmosphere_factor: f64,
}

impl SiteConfig {
    /// Creates a validated site configuration.
    ///
    /// # Arguments
    /// * `latitude_deg` - Site latitude in degrees (-90 to 90, north positive)
    /// * `area_m2` - Panel area in square meters (> 0)
    /// * `efficiency` - Panel efficiency as a fraction in (0, 1]
    ///
    /// # Errors
    /// Returns a [`ConfigError`] naming the first parameter out of range.
    pub fn new(latitude_deg: f64, area_m2: f64, efficiency: f64) -> Result<Self, ConfigError> {
        if !latitude_deg.is_finite() || !(-90.0..=90.0).contains(&latitude_deg) {
            return Err(ConfigError::Latitude(latitude_deg));
        }
        if !area_m2.is_finite() || area_m2 <= 0.0 {
            return Err(ConfigError::PanelArea(area_m2));
        }
        if !efficiency.is_finite() || efficiency <= 0.0 || efficiency > 1.0 {
            return Err(ConfigError::Efficiency(efficiency));
        }

        Ok(Self {
            latitude_rad: latitude_deg.to_radians(),
            area_m2,
            efficiency,
            solar_constant: SOLAR_CONSTANT,
            atmosphere_factor: ATMOSPHERE_FACTOR,
        })
    }

    pub fn latitude_rad(&self) -> f64 {
        self.latitude_rad
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude_rad.to_degrees()
    }

    pub fn area_m2(&self) -> f64 {
        self.area_m2
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn solar_constant(&self) -> f64 {
        self.solar_constant
    }

    pub fn atmosphere_factor(&self) -> f64 {
        self.atmosphere_factor
    }
}

// ===================== ENERGY MODES =====================

/// What a tilt is optimized for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EnergyMode {
    /// Energy over one day (Wh)
    Daily { day_of_year: u32 },
    /// Weighted energy over a year of representative days (kWh)
    Annual,
}

impl EnergyMode {
    pub fn unit(&self) -> EnergyUnit {
        match self {
            EnergyMode::Daily { .. } => EnergyUnit::WattHours,
            EnergyMode::Annual => EnergyUnit::KilowattHours,
        }
    }
}

/// Unit of an energy value produced by [`SolarPanelModel::energy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnergyUnit {
    #[serde(rename = "Wh")]
    WattHours,
    #[serde(rename = "kWh")]
    KilowattHours,
}

impl EnergyUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            EnergyUnit::WattHours => "Wh",
            EnergyUnit::KilowattHours => "kWh",
        }
    }
}

// ===================== OUTPUT BREAKDOWN =====================

/// Irradiance components on the tilted panel (W/m²)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IrradianceComponents {
    pub direct: f64,
    pub diffuse: f64,
    pub ground_reflected: f64,
}

impl IrradianceComponents {
    /// Total plane-of-array irradiance, never negative
    pub fn total(&self) -> f64 {
        (self.direct + self.diffuse + self.ground_reflected).max(0.0)
    }
}

/// Full breakdown of the panel state at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelOutput {
    pub declination_rad: f64,
    pub hour_angle_rad: f64,
    /// Sun elevation (radians, 0 when the sun is below the horizon)
    pub elevation_rad: f64,
    /// Sun azimuth from north (radians, 0 when the sun is below the horizon)
    pub azimuth_rad: f64,
    /// Angle between the sun vector and the panel normal (radians)
    pub incidence_rad: f64,
    /// Direct normal irradiance (W/m²)
    pub dni: f64,
    pub irradiance: IrradianceComponents,
    /// Electrical power (W)
    pub power_w: f64,
}

// ===================== MODEL =====================

/// Energy model bound to one site.
///
/// Holds only read-only configuration, so a single instance can be shared
/// across threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPanelModel {
    config: SiteConfig,
}

impl SolarPanelModel {
    pub fn new(config: SiteConfig) -> Self {
        Self { config }
    }

    /// Builds the model straight from site parameters.
    ///
    /// # Errors
    /// See [`SiteConfig::new`].
    pub fn from_site(latitude_deg: f64, area_m2: f64, efficiency: f64) -> Result<Self, ConfigError> {
        SiteConfig::new(latitude_deg, area_m2, efficiency).map(Self::new)
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    // ---------- Geometry ----------

    /// Solar declination for a 1-based day of year (radians).
    ///
    /// Cooper's formula: `23.45° · sin(360° · (284 + day) / 365)`. Days outside
    /// 1..=365 are accepted; the formula is periodic.
    pub fn solar_declination(&self, day_of_year: u32) -> f64 {
        let arg = (360.0 * (284.0 + day_of_year as f64) / 365.0).to_radians();
        (23.45 * arg.sin()).to_radians()
    }

    /// Hour angle for a solar hour of the day (radians, negative before noon)
    pub fn hour_angle(&self, hour: f64) -> f64 {
        (15.0 * (hour - 12.0)).to_radians()
    }

    /// Sun elevation above the horizon (radians).
    ///
    /// The sine is clamped at zero, so a sun below the horizon reports an
    /// elevation of exactly 0.
    pub fn solar_elevation_angle(&self, declination: f64, hour_angle: f64) -> f64 {
        let lat = self.config.latitude_rad;
        let sin_elevation =
            lat.sin() * declination.sin() + lat.cos() * declination.cos() * hour_angle.cos();
        sin_elevation.max(0.0).asin()
    }

    /// Sun azimuth measured clockwise from north (radians).
    ///
    /// Returns 0 when `elevation <= 0`, where azimuth is undefined. Afternoon
    /// positions (`hour_angle > 0`) are mirrored to the western half.
    pub fn solar_azimuth_angle(&self, declination: f64, hour_angle: f64, elevation: f64) -> f64 {
        if elevation <= 0.0 {
            return 0.0;
        }

        let lat = self.config.latitude_rad;
        let cos_azimuth = (declination.sin() * lat.cos()
            - declination.cos() * lat.sin() * hour_angle.cos())
            / elevation.cos();

        // Sun exactly at zenith gives 0/0
        let cos_azimuth = if cos_azimuth.is_nan() { 1.0 } else { cos_azimuth.clamp(-1.0, 1.0) };
        let azimuth = cos_azimuth.acos();

        if hour_angle > 0.0 { 2.0 * PI - azimuth } else { azimuth }
    }

    /// Angle of incidence between the sun vector and the panel normal (radians).
    ///
    /// The cosine is clamped to [0, 1], so light arriving from behind the
    /// panel reports exactly π/2.
    ///
    /// # Arguments
    /// * `elevation` - Sun elevation (radians)
    /// * `azimuth` - Sun azimuth from north (radians)
    /// * `tilt` - Panel tilt from horizontal (radians)
    /// * `panel_azimuth` - Panel facing direction from north (radians), usually [`SOUTH_AZIMUTH_RAD`]
    pub fn incidence_angle(&self, elevation: f64, azimuth: f64, tilt: f64, panel_azimuth: f64) -> f64 {
        let cos_incidence = elevation.sin() * tilt.cos()
            + elevation.cos() * tilt.sin() * (azimuth - panel_azimuth).cos();
        let cos_incidence = if cos_incidence.is_nan() { 1.0 } else { cos_incidence.clamp(0.0, 1.0) };
        cos_incidence.acos()
    }

    // ---------- Irradiance ----------

    /// Direct normal irradiance after atmospheric attenuation (W/m²)
    pub fn direct_normal_irradiance(&self, elevation: f64) -> f64 {
        if elevation <= 0.0 {
            return 0.0;
        }

        let air_mass = (1.0 / elevation.sin()).min(MAX_AIR_MASS);
        let dni = self.config.solar_constant * self.config.atmosphere_factor.powf(air_mass);
        dni.max(0.0)
    }

    /// Irradiance components on the panel; all zero when the sun is down or
    /// strikes the panel edge-on or from behind.
    pub fn irradiance_components(&self, dni: f64, incidence_angle: f64, elevation: f64) -> IrradianceComponents {
        if elevation <= 0.0 || incidence_angle >= FRAC_PI_2 {
            return IrradianceComponents::default();
        }

        IrradianceComponents {
            direct: dni * incidence_angle.cos(),
            diffuse: DIFFUSE_FRACTION * dni,
            ground_reflected: ALBEDO * dni * elevation.sin() * 0.5,
        }
    }

    /// Total irradiance on the tilted panel (W/m²), never negative
    pub fn total_irradiance_on_panel(&self, dni: f64, incidence_angle: f64, elevation: f64) -> f64 {
        self.irradiance_components(dni, incidence_angle, elevation).total()
    }

    // ---------- Power & Energy ----------

    /// Calculate the full panel state at one instant
    ///
    /// # Arguments
    /// * `tilt_deg` - Panel tilt from horizontal in degrees
    /// * `day_of_year` - Day of year (1-365)
    /// * `hour` - Solar hour of the day (0-24)
    pub fn calculate_output(&self, tilt_deg: f64, day_of_year: u32, hour: f64) -> PanelOutput {
        let declination = self.solar_declination(day_of_year);
        let hour_angle = self.hour_angle(hour);
        let elevation = self.solar_elevation_angle(declination, hour_angle);
        let azimuth = self.solar_azimuth_angle(declination, hour_angle, elevation);
        let incidence =
            self.incidence_angle(elevation, azimuth, tilt_deg.to_radians(), SOUTH_AZIMUTH_RAD);
        let dni = self.direct_normal_irradiance(elevation);
        let irradiance = self.irradiance_components(dni, incidence, elevation);

        let power_w = if elevation <= 0.0 {
            0.0
        } else {
            irradiance.total() * self.config.area_m2 * self.config.efficiency
        };

        PanelOutput {
            declination_rad: declination,
            hour_angle_rad: hour_angle,
            elevation_rad: elevation,
            azimuth_rad: azimuth,
            incidence_rad: incidence,
            dni,
            irradiance,
            power_w,
        }
    }

    /// Instantaneous electrical power (W)
    pub fn instantaneous_power(&self, tilt_deg: f64, day_of_year: u32, hour: f64) -> f64 {
        self.calculate_output(tilt_deg, day_of_year, hour).power_w
    }

    /// Daily energy (Wh) with the default half-hour step
    pub fn daily_energy(&self, tilt_deg: f64, day_of_year: u32) -> f64 {
        self.daily_energy_with_step(tilt_deg, day_of_year, DEFAULT_TIME_STEP_HOURS)
    }

    /// Daily energy (Wh) by fixed-step rectangle rule over 06:00-18:00 solar time.
    ///
    /// Samples `power(h) · step` at `h = 6, 6 + step, ...` up to and including
    /// 18 when it falls on the grid. This is a fixed sampling grid, not adaptive
    /// quadrature. A non-positive or non-finite step yields 0, and so does a step
    /// fine enough to need more than [`MAX_GRID_POINTS`] samples.
    pub fn daily_energy_with_step(&self, tilt_deg: f64, day_of_year: u32, time_step_hours: f64) -> f64 {
        sample_hours(time_step_hours)
            .map(|hour| self.instantaneous_power(tilt_deg, day_of_year, hour) * time_step_hours)
            .sum()
    }

    /// Annual energy (kWh) with the default half-hour step
    pub fn annual_energy(&self, tilt_deg: f64) -> f64 {
        self.annual_energy_with_step(tilt_deg, DEFAULT_TIME_STEP_HOURS)
    }

    /// Annual energy (kWh) from twelve representative days.
    ///
    /// Each day in [`REPRESENTATIVE_DAYS`] is weighted by its month length in
    /// [`DAYS_IN_MONTH`]. Coarse on purpose: results stay comparable across
    /// search methods.
    pub fn annual_energy_with_step(&self, tilt_deg: f64, time_step_hours: f64) -> f64 {
        let total_wh: f64 = REPRESENTATIVE_DAYS
            .iter()
            .zip(DAYS_IN_MONTH.iter())
            .map(|(&day, &weight)| {
                self.daily_energy_with_step(tilt_deg, day, time_step_hours) * weight as f64
            })
            .sum();
        total_wh / 1000.0
    }

    /// Energy for a tilt in the given mode (Wh for daily, kWh for annual)
    pub fn energy(&self, tilt_deg: f64, mode: EnergyMode) -> f64 {
        match mode {
            EnergyMode::Daily { day_of_year } => self.daily_energy(tilt_deg, day_of_year),
            EnergyMode::Annual => self.annual_energy(tilt_deg),
        }
    }

    /// Suggested search bracket for this site, see [`optimal_angle_hint`]
    pub fn optimal_angle_hint(&self) -> (f64, f64) {
        optimal_angle_hint(self.config.latitude_deg())
    }
}

/// Heuristic tilt bracket `[max(0, lat - 20), min(90, lat + 20)]` in degrees.
///
/// Not guaranteed to contain the optimum. For southern latitudes below -20°
/// the upper end falls below the lower one.
pub fn optimal_angle_hint(latitude_deg: f64) -> (f64, f64) {
    ((latitude_deg - 20.0).max(0.0), (latitude_deg + 20.0).min(90.0))
}

/// Number of points `start, start + step, ...` within `start + span`.
///
/// `None` for a non-positive or non-finite step, or when the grid would hold
/// more than [`MAX_GRID_POINTS`] points. The count is formed in `f64` so a
/// tiny step cannot overflow the integer conversion.
pub(crate) fn grid_len(span: f64, step: f64) -> Option<usize> {
    if !(step.is_finite() && step > 0.0 && span.is_finite() && span >= 0.0) {
        return None;
    }
    let count = (span / step + 1e-9).floor() + 1.0;
    (count.is_finite() && count <= MAX_GRID_POINTS as f64).then_some(count as usize)
}

/// Sampling hours for daily integration
fn sample_hours(time_step_hours: f64) -> impl Iterator<Item = f64> {
    let count = grid_len(DAY_END_HOUR - DAY_START_HOUR, time_step_hours).unwrap_or(0);
    (0..count).map(move |k| DAY_START_HOUR + k as f64 * time_step_hours)
}

// ===================== FORMATTING HELPERS =====================

/// Format power output for display
pub fn format_power(watts: f64) -> String {
    if watts >= 1000.0 { format!("{:.2} kW", watts / 1000.0) } else { format!("{:.1} W", watts) }
}

/// Format an energy value in the unit it was computed in
pub fn format_energy(value: f64, unit: EnergyUnit) -> String {
    match unit {
        EnergyUnit::WattHours if value >= 1000.0 => format!("{:.2} kWh", value / 1000.0),
        EnergyUnit::WattHours => format!("{:.1} Wh", value),
        EnergyUnit::KilowattHours => format!("{:.2} kWh", value),
    }
}

/// Format irradiance for display
pub fn format_irradiance(w_per_m2: f64) -> String {
    format!("{:.0} W/m²", w_per_m2)
}

// ===================== TESTS =====================
