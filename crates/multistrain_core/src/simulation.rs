//! Simulation driver: runs the step operator across output intervals and
//! assembles the output series.

use crate::adaptive::{step_doubling, AdaptiveController, StepDecision};
use crate::climate::ClimateExtrema;
use crate::config::SimulationConfig;
use crate::error::{Result, SimulationError};
use crate::lorenz::LorenzState;
use crate::model::{EpidemicState, StrainDynamics};
use crate::noise::ProcessNoise;
use crate::observation::{ObservationModel, ObservationNoise};
use crate::weather::{WeatherForcing, WeatherModel, WeatherState};
use rand::rngs::OsRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Exclusive upper bound for seeds drawn from system entropy.
const MAX_ENTROPY_SEED: u64 = (1 << 31) - 1;

/// Time series of one realization. Every per-strain series has one row per
/// timestamp; keys follow the legacy result mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub t: Vec<f64>,
    #[serde(rename = "logS")]
    pub log_s: Vec<Vec<f64>>,
    /// Log-infected with observation error applied.
    #[serde(rename = "logI")]
    pub log_i: Vec<Vec<f64>>,
    /// Interval incidence with observation error applied, floored at zero.
    #[serde(rename = "C")]
    pub incidence: Vec<Vec<f64>>,
    /// Transmission multipliers in effect at each timestamp.
    pub weather: Vec<Vec<f64>>,
    pub random_seed: u64,
    #[serde(
        rename = "dt_euler_harmonic_mean",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub harmonic_mean_step: Option<f64>,
    /// True cumulative incidence.
    #[serde(rename = "CC")]
    pub cumulative_incidence: Vec<Vec<f64>>,
    /// Smallest step attempted in each output interval (adaptive mode).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub min_step: Vec<f64>,
    #[serde(default)]
    pub rejected_steps: usize,
    /// Largest error estimate among accepted adaptive steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_step_error: Option<f64>,
    /// Raw Lorenz position at each timestamp (chaotic mode).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lorenz_phase: Vec<LorenzState>,
}

impl SimulationOutput {
    fn with_capacity(capacity: usize, random_seed: u64) -> Self {
        Self {
            t: Vec::with_capacity(capacity),
            log_s: Vec::with_capacity(capacity),
            log_i: Vec::with_capacity(capacity),
            incidence: Vec::with_capacity(capacity),
            weather: Vec::with_capacity(capacity),
            random_seed,
            harmonic_mean_step: None,
            cumulative_incidence: Vec::with_capacity(capacity),
            min_step: Vec::new(),
            rejected_steps: 0,
            max_step_error: None,
            lorenz_phase: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// Snapshot returned after each batch of output intervals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationProgress {
    pub intervals_done: usize,
    pub intervals_total: usize,
    pub t: f64,
    pub rejected_steps: usize,
    pub done: bool,
}

/// One trajectory in progress. Owns its state, weather and random stream;
/// independent runners share nothing and can run on separate threads.
pub struct SimulationRunner {
    dynamics: StrainDynamics,
    weather_model: WeatherModel,
    process_noise: ProcessNoise,
    observation: ObservationModel,
    controller: Option<AdaptiveController>,
    rng: ChaCha8Rng,
    state: EpidemicState,
    weather: WeatherState,
    h: f64,
    min_step: f64,
    dt_output: f64,
    interval: usize,
    n_output: usize,
    output: SimulationOutput,
}

impl SimulationRunner {
    /// Validates `config` and prepares the t = 0 row. `extrema` is required
    /// only for chaotic forcing.
    pub fn new(config: &SimulationConfig, extrema: Option<&ClimateExtrema>) -> Result<Self> {
        config.validate(extrema)?;

        let random_seed = config
            .random_seed
            .unwrap_or_else(|| OsRng.gen_range(0..MAX_ENTROPY_SEED));
        let mut rng = ChaCha8Rng::seed_from_u64(random_seed);

        let mut weather_model = WeatherModel::from_config(config, extrema)?;
        let weather = weather_model.initial_state(&mut rng);
        let multipliers = weather_model.multipliers(&weather)?;
        let state = EpidemicState::from_fractions(&config.s_init, &config.i_init);
        let n_output = config.n_output();

        let mut output = SimulationOutput::with_capacity(n_output + 1, random_seed);
        output.t.push(0.0);
        output.log_s.push(state.log_s.clone());
        output.log_i.push(state.log_i.clone());
        output.incidence.push(state.cumulative.clone());
        output.cumulative_incidence.push(state.cumulative.clone());
        output.weather.push(multipliers);
        if let Some(phase) = weather.phase() {
            output.lorenz_phase.push(phase);
        }

        log::info!(
            "starting {} strain run: {} intervals of {} days, {} {} weather, seed {}",
            config.n_strains,
            n_output,
            config.dt_output,
            if config.adaptive {
                "adaptive"
            } else if config.is_stochastic() {
                "stochastic"
            } else {
                "deterministic"
            },
            if weather_model.is_chaotic() {
                "chaotic"
            } else {
                "periodic"
            },
            random_seed
        );

        Ok(Self {
            dynamics: StrainDynamics::from_config(config),
            weather_model,
            process_noise: ProcessNoise::new(config.corr_proc, config.sd_proc.clone()),
            observation: ObservationModel::new(
                ObservationNoise::new(config.shared_obs, config.sd_obs.clone()),
                ObservationNoise::new(config.shared_obs_c, config.sd_obs_c.clone()),
            ),
            controller: config.adaptive.then(|| AdaptiveController::new(config.tol)),
            rng,
            state,
            weather,
            h: config.dt_euler,
            min_step: config.min_step,
            dt_output: config.dt_output,
            interval: 0,
            n_output,
            output,
        })
    }

    pub fn is_done(&self) -> bool {
        self.interval >= self.n_output
    }

    pub fn random_seed(&self) -> u64 {
        self.output.random_seed
    }

    pub fn state(&self) -> &EpidemicState {
        &self.state
    }

    pub fn output(&self) -> &SimulationOutput {
        &self.output
    }

    pub fn take_output(self) -> SimulationOutput {
        self.output
    }

    pub fn progress(&self) -> SimulationProgress {
        SimulationProgress {
            intervals_done: self.interval,
            intervals_total: self.n_output,
            t: self.interval as f64 * self.dt_output,
            rejected_steps: self.output.rejected_steps,
            done: self.is_done(),
        }
    }

    /// Advances up to `batch_size` output intervals.
    pub fn run_intervals(&mut self, batch_size: usize) -> Result<SimulationProgress> {
        for _ in 0..batch_size {
            if self.is_done() {
                break;
            }
            self.run_interval()?;
        }
        Ok(self.progress())
    }

    pub fn run_to_end(&mut self) -> Result<SimulationProgress> {
        while !self.is_done() {
            self.run_interval()?;
        }
        Ok(self.progress())
    }

    fn run_interval(&mut self) -> Result<()> {
        let mut t = self.interval as f64 * self.dt_output;
        let t_next_output = (self.interval + 1) as f64 * self.dt_output;
        let mut min_h = self.h;

        while t < t_next_output {
            min_h = min_h.min(self.h);

            // Re-clipped on every attempt, including retries after a rejection.
            let t_next = (t + self.h).min(t_next_output);
            let h_used = t_next - t;
            if !(h_used > 0.0) {
                return Err(SimulationError::StepSizeUnderflow {
                    t,
                    h: self.h,
                    min_step: self.min_step,
                });
            }

            match self.controller.as_mut() {
                None => {
                    let multipliers = self.weather_model.multipliers(&self.weather)?;
                    let next_weather = self.weather_model.advance(t, h_used, &self.weather)?;
                    let noise = self
                        .process_noise
                        .is_stochastic()
                        .then(|| self.process_noise.draw(&mut self.rng));
                    self.state =
                        self.dynamics
                            .step(t, h_used, &self.state, &multipliers, noise.as_deref())?;
                    self.weather = next_weather;
                    t = t_next;
                }
                Some(controller) => {
                    let attempt = step_doubling(
                        &self.dynamics,
                        &mut self.weather_model,
                        t,
                        h_used,
                        &self.state,
                        &self.weather,
                    )?;
                    self.h = controller.propose(h_used, self.h, attempt.error);
                    match controller.decide(h_used, attempt.error) {
                        StepDecision::Accept => {
                            self.state = attempt.accepted_state();
                            self.weather = attempt.weather;
                            t = t_next;
                        }
                        StepDecision::Reject => {
                            log::trace!(
                                "rejected step of {} at t = {} (error {:e}, tol {:e}); retrying with {}",
                                h_used,
                                t,
                                attempt.error,
                                controller.tol(),
                                self.h
                            );
                            if self.h < self.min_step {
                                return Err(SimulationError::StepSizeUnderflow {
                                    t,
                                    h: self.h,
                                    min_step: self.min_step,
                                });
                            }
                        }
                    }
                }
            }
        }

        self.interval += 1;
        self.record(t, min_h)
    }

    fn record(&mut self, t: f64, min_h: f64) -> Result<()> {
        let multipliers = self.weather_model.multipliers(&self.weather)?;
        let log_i = self
            .observation
            .observe_log_infected(&self.state.log_i, &mut self.rng);
        let previous = self
            .output
            .cumulative_incidence
            .last()
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.state.strains()]);
        let incidence =
            self.observation
                .observe_incidence(&previous, &self.state.cumulative, &mut self.rng);

        self.output.t.push(t);
        self.output.log_s.push(self.state.log_s.clone());
        self.output.log_i.push(log_i);
        self.output.incidence.push(incidence);
        self.output
            .cumulative_incidence
            .push(self.state.cumulative.clone());
        self.output.weather.push(multipliers);
        if let Some(phase) = self.weather.phase() {
            self.output.lorenz_phase.push(phase);
        }

        if let Some(controller) = &self.controller {
            self.output.min_step.push(min_h);
            self.output.rejected_steps = controller.rejected();
            log::debug!(
                "interval {}/{} done at t = {}, min step {}",
                self.interval,
                self.n_output,
                t,
                min_h
            );
        }

        if self.is_done() {
            if let Some(controller) = &self.controller {
                self.output.harmonic_mean_step = controller.harmonic_mean_step(t);
                self.output.max_step_error = Some(controller.max_accepted_error());
            }
            log::info!(
                "run finished at t = {} with {} timestamps, harmonic-mean step {:?}",
                t,
                self.output.len(),
                self.output.harmonic_mean_step
            );
        }
        Ok(())
    }
}

/// Runs one realization to completion.
pub fn simulate(
    config: &SimulationConfig,
    extrema: Option<&ClimateExtrema>,
) -> Result<SimulationOutput> {
    let mut runner = SimulationRunner::new(config, extrema)?;
    runner.run_to_end()?;
    Ok(runner.take_output())
}
