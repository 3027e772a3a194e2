//! Fixed-tilt solar panel energy model and tilt-angle optimizer.
//!
//! [`solar_panel`] turns site parameters into power and energy estimates;
//! [`optimize`] searches the tilt that maximizes that energy.
//!
//! ```
//! use solar_tilt::optimize::{Optimizer, DEFAULT_TOLERANCE};
//! use solar_tilt::solar_panel::{EnergyMode, SolarPanelModel};
//!
//! let model = SolarPanelModel::from_site(40.4, 2.0, 0.22)?;
//! let optimizer = Optimizer::new(&model);
//! let result = optimizer.golden_section_search(0.0, 90.0, DEFAULT_TOLERANCE, EnergyMode::Annual)?;
//! assert!((30.0..40.0).contains(&result.angle_deg));
//! # Ok::<(), solar_tilt::error::OptimizeError>(())
//! ```

pub mod error;
pub mod optimize;
pub mod solar_panel;

pub use error::{ConfigError, OptimizeError};
pub use optimize::{MethodComparison, OptimizationResult, Optimizer, SearchMethod, SearchStatus};
pub use solar_panel::{EnergyMode, SiteConfig, SolarPanelModel};
