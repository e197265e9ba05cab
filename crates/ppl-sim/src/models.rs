//! Built-in model/guide pairs exercised by the CLI.

use std::sync::Arc;

use clap::ValueEnum;
use ppl_core::{Bernoulli, Categorical, Normal, Value};
use ppl_infer::{program, Halt, Program, Runtime, SampleOpts};

/// Selectable built-in models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// Two independent coins.
    Coins,
    /// A weighted die followed by a coin whose bias depends on the face.
    Dice,
    /// Per-point component assignments of a two component Gaussian mixture.
    Mixture,
}

const MIXTURE_LOCS: [f64; 2] = [-1.0, 2.0];
const MIXTURE_DATA: [f64; 3] = [-0.8, 1.9, 2.3];

impl ModelKind {
    /// Stable label used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Coins => "coins",
            ModelKind::Dice => "dice",
            ModelKind::Mixture => "mixture",
        }
    }

    /// The generative model.
    pub fn model(self) -> Box<dyn Program> {
        match self {
            ModelKind::Coins => Box::new(program(coins_model)),
            ModelKind::Dice => Box::new(program(dice_model)),
            ModelKind::Mixture => Box::new(program(mixture_model)),
        }
    }

    /// A guide sampling every latent site of [`ModelKind::model`].
    pub fn guide(self) -> Box<dyn Program> {
        match self {
            ModelKind::Coins => Box::new(program(coins_guide)),
            ModelKind::Dice => Box::new(program(dice_guide)),
            ModelKind::Mixture => Box::new(program(mixture_guide)),
        }
    }
}

fn coins_model(rt: &mut Runtime<'_>, _args: &[Value]) -> Result<(), Halt> {
    rt.sample("a", Arc::new(Bernoulli::new(0.5)?), SampleOpts::default())?;
    rt.sample("b", Arc::new(Bernoulli::new(0.3)?), SampleOpts::default())?;
    Ok(())
}

fn coins_guide(rt: &mut Runtime<'_>, _args: &[Value]) -> Result<(), Halt> {
    rt.sample("a", Arc::new(Bernoulli::new(0.6)?), SampleOpts::default())?;
    rt.sample("b", Arc::new(Bernoulli::new(0.4)?), SampleOpts::default())?;
    Ok(())
}

fn dice_model(rt: &mut Runtime<'_>, _args: &[Value]) -> Result<(), Halt> {
    let die = rt.sample(
        "die",
        Arc::new(Categorical::new(vec![1.0, 2.0, 3.0])?),
        SampleOpts::default(),
    )?;
    let face = die.as_scalar().unwrap_or(0.0);
    let flip = rt.sample(
        "flip",
        Arc::new(Bernoulli::new(0.2 + 0.3 * face)?),
        SampleOpts::default(),
    )?;
    let signal = 2.0 * flip.as_scalar().unwrap_or(0.0) - 1.0;
    rt.observe("signal", Arc::new(Normal::new(signal, 0.5)?), Value::scalar(0.7))?;
    Ok(())
}

fn dice_guide(rt: &mut Runtime<'_>, _args: &[Value]) -> Result<(), Halt> {
    rt.sample(
        "die",
        Arc::new(Categorical::new(vec![1.0, 1.0, 1.0])?),
        SampleOpts::default(),
    )?;
    rt.sample("flip", Arc::new(Bernoulli::new(0.5)?), SampleOpts::default())?;
    Ok(())
}

fn mixture_model(rt: &mut Runtime<'_>, _args: &[Value]) -> Result<(), Halt> {
    for (idx, point) in MIXTURE_DATA.iter().enumerate() {
        let assignment = rt.sample(
            &format!("assign_{idx}"),
            Arc::new(Categorical::new(vec![0.3, 0.7])?),
            SampleOpts::default(),
        )?;
        let component = assignment.as_scalar().unwrap_or(0.0) as usize;
        let loc = MIXTURE_LOCS[component.min(MIXTURE_LOCS.len() - 1)];
        rt.observe(
            &format!("obs_{idx}"),
            Arc::new(Normal::new(loc, 1.0)?),
            Value::scalar(*point),
        )?;
    }
    Ok(())
}

fn mixture_guide(rt: &mut Runtime<'_>, _args: &[Value]) -> Result<(), Halt> {
    for idx in 0..MIXTURE_DATA.len() {
        rt.sample(
            &format!("assign_{idx}"),
            Arc::new(Categorical::new(vec![0.5, 0.5])?),
            SampleOpts::default(),
        )?;
    }
    Ok(())
}
