//! Seeded synthetic well generation.
//!
//! Each well follows a randomly drawn Arps model with multiplicative
//! log-normal noise on the rate. Output is a pure function of the config,
//! including the seed.

use chrono::{Months, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{DAYS_PER_YEAR, FittedParams, ModelKind, ProductionRecord, Well};
use crate::error::DeclineError;
use crate::models::rate;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub wells: usize,
    /// Monthly records per well.
    pub months: usize,
    pub seed: u64,
    /// Standard deviation of the log-rate noise.
    pub noise_sigma: f64,
    pub start_date: NaiveDate,
    /// Trailing wells given only three records, so they fail to fit.
    pub sparse_wells: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            wells: 5,
            months: 36,
            seed: 42,
            noise_sigma: 0.05,
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            sparse_wells: 0,
        }
    }
}

/// A generated well together with the parameters it was drawn from.
#[derive(Debug, Clone)]
pub struct SyntheticWell {
    pub well: Well,
    pub model: ModelKind,
    pub truth: FittedParams,
}

pub fn generate_wells(config: &SampleConfig) -> Result<Vec<SyntheticWell>, DeclineError> {
    if config.wells == 0 {
        return Err(DeclineError::invalid_config("sample well count must be > 0"));
    }
    if config.months < 2 {
        return Err(DeclineError::invalid_config("sample months must be >= 2"));
    }
    if config.sparse_wells > config.wells {
        return Err(DeclineError::invalid_config("sparse wells cannot exceed the well count"));
    }
    let normal = Normal::new(0.0, config.noise_sigma.max(0.0))
        .map_err(|e| DeclineError::invalid_config(format!("noise distribution error: {e}")))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut out = Vec::with_capacity(config.wells);

    for i in 0..config.wells {
        let model = ModelKind::SELECTION_ORDER[rng.gen_range(0..ModelKind::SELECTION_ORDER.len())];
        let b = match model {
            ModelKind::Exponential => 0.0,
            ModelKind::Harmonic => 1.0,
            ModelKind::Hyperbolic => rng.gen_range(0.2..0.9),
        };
        let truth = FittedParams::from_annual(rng.gen_range(300.0..1500.0), rng.gen_range(0.2..1.2), b);
        let gor = rng.gen_range(2.0..6.0);
        let water_cut = rng.gen_range(0.05..0.3);

        let months = if i >= config.wells - config.sparse_wells { 3 } else { config.months };
        let mut data = Vec::with_capacity(months);
        let mut cum = [0.0f64; 3];
        let mut prev: Option<(f64, [f64; 3])> = None;

        for m in 0..months {
            let Some(date) = config.start_date.checked_add_months(Months::new(m as u32)) else {
                break;
            };
            let t = (date - config.start_date).num_days() as f64;
            let oil = rate(model, t, &truth) * noise(&normal, config.noise_sigma, &mut rng);
            let gas = oil * gor * noise(&normal, config.noise_sigma, &mut rng);
            let water = oil * water_cut * (1.0 + t / DAYS_PER_YEAR);
            let rates = [oil, gas, water];

            if let Some((t0, r0)) = prev {
                for k in 0..3 {
                    cum[k] += 0.5 * (r0[k] + rates[k]) * (t - t0);
                }
            }
            prev = Some((t, rates));

            data.push(ProductionRecord {
                date,
                oil_rate: Some(oil),
                gas_rate: Some(gas),
                water_rate: Some(water),
                cumulative_oil: Some(cum[0]),
                cumulative_gas: Some(cum[1]),
                cumulative_water: Some(cum[2]),
            });
        }

        let id = format!("W-{:03}", i + 1);
        out.push(SyntheticWell {
            well: Well {
                name: format!("Synthetic {id}"),
                id,
                data,
            },
            model,
            truth,
        });
    }

    Ok(out)
}

/// Unit-mean log-normal multiplier.
fn noise(normal: &Normal<f64>, sigma: f64, rng: &mut StdRng) -> f64 {
    (normal.sample(rng) - 0.5 * sigma * sigma).exp()
}
