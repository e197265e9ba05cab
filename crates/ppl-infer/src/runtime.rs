//! Interpreter runtime that intercepts the sites a program emits.
//!
//! A [`Runtime`] lives for exactly one execution. Depending on how it was
//! built it records sites, forces values from a replay trace, escapes at
//! enumerable sites, and broadcasts distributions to the enclosing plates.
//! Per site the steps run innermost first: enumeration annotations, then
//! observation or replay, then the escape check, then sampling.

use std::sync::Arc;

use ppl_core::errors::ErrorInfo;
use ppl_core::{
    CondIndepFrame, Distribution, GraphType, InferConfig, PplError, RngHandle, Site, SiteKind,
    Trace, Value,
};

use crate::annotate::EnumerateConfig;
use crate::policy::EnumerationPolicy;
use crate::program::{Halt, Program};

/// Per-statement options for [`Runtime::sample`].
#[derive(Debug, Clone, Default)]
pub struct SampleOpts {
    /// Observed value; `None` for latent sites.
    pub obs: Option<Value>,
    /// Explicit inference directives.
    pub infer: InferConfig,
}

impl SampleOpts {
    /// Latent site carrying the given directives.
    pub fn infer(infer: InferConfig) -> Self {
        Self { obs: None, infer }
    }

    /// Observed site.
    pub fn observed(value: Value) -> Self {
        Self {
            obs: Some(value),
            infer: InferConfig::default(),
        }
    }
}

/// Declaration of a vectorised conditional-independence context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plate {
    name: String,
    size: usize,
    subsample_size: Option<usize>,
    dim: Option<isize>,
}

impl Plate {
    /// Plate of `size` independent elements.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            subsample_size: None,
            dim: None,
        }
    }

    /// Visits only `subsample_size` randomly chosen elements.
    pub fn subsample(mut self, subsample_size: usize) -> Self {
        self.subsample_size = Some(subsample_size);
        self
    }

    /// Pins the batch dimension (negative, counted from the right).
    pub fn dim(mut self, dim: isize) -> Self {
        self.dim = Some(dim);
        self
    }
}

/// Execution context handed to a [`Program`].
pub struct Runtime<'a> {
    trace: Trace,
    rng: &'a mut RngHandle,
    replay: Option<&'a Trace>,
    escape: Option<(&'a Trace, &'a dyn EnumerationPolicy)>,
    broadcast: bool,
    frames: Vec<CondIndepFrame>,
    annotations: Vec<EnumerateConfig>,
}

impl<'a> Runtime<'a> {
    /// Plain recording runtime.
    pub fn new(graph_type: GraphType, rng: &'a mut RngHandle) -> Self {
        Self {
            trace: Trace::new(graph_type),
            rng,
            replay: None,
            escape: None,
            broadcast: false,
            frames: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Runtime for one enumeration attempt against the partial trace
    /// `partial`: recorded sites are forced, `policy` decides escapes.
    pub fn enumerating(
        graph_type: GraphType,
        partial: &'a Trace,
        policy: &'a dyn EnumerationPolicy,
        rng: &'a mut RngHandle,
    ) -> Self {
        let mut rt = Self::new(graph_type, rng);
        rt.replay = Some(partial);
        rt.escape = Some((partial, policy));
        rt
    }

    /// Forces latent sample sites present in `trace` to its values.
    pub fn replaying(mut self, trace: &'a Trace) -> Self {
        self.replay = Some(trace);
        self
    }

    /// Expands every sampled distribution to the batch shape implied by
    /// the enclosing plates.
    pub fn broadcasting(mut self) -> Self {
        self.broadcast = true;
        self
    }

    /// Runs `program` to completion and returns the recorded trace.
    pub fn execute<P: Program + ?Sized>(
        mut self,
        program: &P,
        args: &[Value],
    ) -> Result<Trace, PplError> {
        program.run(&mut self, args).map_err(Halt::into_error)?;
        Ok(self.trace)
    }

    /// Trace accumulated so far.
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Consumes the runtime, returning the accumulated trace.
    pub fn into_trace(self) -> Trace {
        self.trace
    }

    /// Random number generator of this execution.
    pub fn rng(&mut self) -> &mut RngHandle {
        &mut *self.rng
    }

    /// Records a sample statement and returns its value.
    pub fn sample(
        &mut self,
        name: &str,
        dist: Arc<dyn Distribution>,
        opts: SampleOpts,
    ) -> Result<Value, Halt> {
        if self.trace.contains(name) {
            return Err(PplError::at_site(
                "duplicate-site",
                "site names must be unique within a trace",
                name,
            )
            .into());
        }
        let dist = if self.broadcast {
            self.broadcast_dist(name, dist)?
        } else {
            dist
        };
        let mut site = match opts.obs {
            Some(value) => Site::observed(name, dist, value),
            None => Site::sample(name, dist),
        };
        site.infer = opts.infer;
        site.cond_indep_stack = self.frames.clone();
        site.scale = self.scale();
        for config in self.annotations.iter().rev() {
            config.annotate(&mut site);
        }

        if !site.is_observed() {
            if let Some(replayed) = self.replay.and_then(|trace| trace.get(name)) {
                if !replayed.is_latent_sample() {
                    return Err(PplError::at_site(
                        "replay-site-kind",
                        "replayed site must be a latent sample site",
                        name,
                    )
                    .into());
                }
                site.value = Some(replayed.require_value()?.clone());
                site.infer = replayed.infer.clone();
            }
        }
        if site.value.is_none() {
            if let Some((partial, policy)) = self.escape {
                if policy.escape(partial, &site) {
                    tracing::trace!(site = name, "escaping replay");
                    return Err(Halt::Escape(Box::new(site)));
                }
            }
            let value = site.require_dist()?.sample(&mut *self.rng)?;
            site.value = Some(value);
        }

        let value = site.require_value()?.clone();
        self.trace.add_site(site)?;
        Ok(value)
    }

    /// Records an observation of `value` under `dist`.
    pub fn observe(
        &mut self,
        name: &str,
        dist: Arc<dyn Distribution>,
        value: Value,
    ) -> Result<Value, Halt> {
        self.sample(name, dist, SampleOpts::observed(value))
    }

    /// Records a parameter site holding `init` and returns it.
    pub fn param(&mut self, name: &str, init: Value) -> Result<Value, Halt> {
        let mut site = Site::new(name, SiteKind::Param, false, None).with_value(init.clone());
        site.cond_indep_stack = self.frames.clone();
        self.trace.add_site(site)?;
        Ok(init)
    }

    /// Runs `body` inside a plate, passing the visited indices.
    ///
    /// The indices are recorded as a subsample site named after the plate;
    /// a replay trace holding that site dictates the same indices.
    pub fn plate<T>(
        &mut self,
        plate: Plate,
        body: impl FnOnce(&mut Self, &[usize]) -> Result<T, Halt>,
    ) -> Result<T, Halt> {
        let subsample_size = plate.subsample_size.unwrap_or(plate.size).min(plate.size);
        let dim = match plate.dim {
            Some(dim) if dim < 0 => dim,
            Some(dim) => {
                return Err(PplError::Program(
                    ErrorInfo::new("invalid-plate-dim", "plate dims count from the right")
                        .with_context("plate", plate.name.as_str())
                        .with_context("dim", dim.to_string()),
                )
                .into())
            }
            None => {
                let mut dim = -1;
                while self.frames.iter().any(|frame| frame.dim == Some(dim)) {
                    dim -= 1;
                }
                dim
            }
        };
        let indices = self.subsample_indices(&plate.name, plate.size, subsample_size)?;
        let mut site = Site::new(plate.name.as_str(), SiteKind::Subsample, false, None)
            .with_value(Value::vector(indices.iter().map(|&idx| idx as f64).collect()));
        site.cond_indep_stack = self.frames.clone();
        self.trace.add_site(site)?;

        self.frames.push(CondIndepFrame {
            name: plate.name,
            dim: Some(dim),
            size: plate.size,
            subsample_size,
            counter: 0,
        });
        let result = body(self, &indices);
        self.frames.pop();
        result
    }

    pub(crate) fn push_annotation(&mut self, config: EnumerateConfig) {
        self.annotations.push(config);
    }

    pub(crate) fn pop_annotation(&mut self) {
        self.annotations.pop();
    }

    fn scale(&self) -> f64 {
        self.frames
            .iter()
            .filter(|frame| frame.subsample_size > 0)
            .map(|frame| frame.size as f64 / frame.subsample_size as f64)
            .product()
    }

    fn subsample_indices(
        &mut self,
        name: &str,
        size: usize,
        subsample_size: usize,
    ) -> Result<Vec<usize>, PplError> {
        if let Some(replayed) = self.replay.and_then(|trace| trace.get(name)) {
            if replayed.kind() == SiteKind::Subsample {
                return Ok(replayed
                    .require_value()?
                    .data()
                    .iter()
                    .map(|&idx| idx as usize)
                    .collect());
            }
        }
        if subsample_size == size {
            return Ok((0..size).collect());
        }
        Ok(rand::seq::index::sample(self.rng.inner_mut(), size, subsample_size).into_vec())
    }

    fn broadcast_dist(
        &self,
        name: &str,
        dist: Arc<dyn Distribution>,
    ) -> Result<Arc<dyn Distribution>, PplError> {
        let actual = dist.batch_shape().to_vec();
        let mut target: Vec<Option<usize>> = actual
            .iter()
            .map(|&size| if size == 1 { None } else { Some(size) })
            .collect();
        for frame in &self.frames {
            let Some(dim) = frame.dim else { continue };
            let from_right = dim.unsigned_abs();
            if target.len() < from_right {
                let missing = from_right - target.len();
                target.splice(0..0, std::iter::repeat(None).take(missing));
            }
            let pos = target.len() - from_right;
            match target[pos] {
                Some(size) if size != frame.subsample_size => {
                    return Err(PplError::Shape(
                        ErrorInfo::new("plate-shape-mismatch", "batch size disagrees with plate")
                            .with_context("site", name)
                            .with_context("plate", frame.name.as_str())
                            .with_context("dim", dim.to_string())
                            .with_context("sizes", format!("{size} vs {}", frame.subsample_size)),
                    ));
                }
                _ => target[pos] = Some(frame.subsample_size),
            }
        }
        let len = target.len();
        let shape: Vec<usize> = target
            .iter()
            .enumerate()
            .map(|(idx, size)| {
                size.unwrap_or_else(|| {
                    let from_right = len - idx;
                    if actual.len() >= from_right {
                        actual[actual.len() - from_right]
                    } else {
                        1
                    }
                })
            })
            .collect();
        if shape == actual {
            return Ok(dist);
        }
        dist.expand(&shape)
    }
}
