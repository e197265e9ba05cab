//! The program interface consumed by the runtime and the search driver.

use ppl_core::{PplError, Site, Value};

use crate::runtime::Runtime;

/// Reason a program execution stopped before completing.
#[derive(Debug)]
pub enum Halt {
    /// The escape predicate fired at this (unresolved) site.
    Escape(Box<Site>),
    /// The program or the runtime raised an error.
    Error(PplError),
}

impl From<PplError> for Halt {
    fn from(err: PplError) -> Self {
        Halt::Error(err)
    }
}

impl Halt {
    /// Converts the halt into an error; escapes outside enumeration are
    /// program errors.
    pub fn into_error(self) -> PplError {
        match self {
            Halt::Error(err) => err,
            Halt::Escape(site) => PplError::at_site(
                "unexpected-escape",
                "program escaped outside of an enumeration replay",
                site.name(),
            ),
        }
    }
}

/// A stochastic program: a body that emits sites through a [`Runtime`].
///
/// Programs must be re-runnable from the start: the search driver replays
/// them once per explored branch.
pub trait Program {
    /// Executes the program body once.
    fn run(&self, rt: &mut Runtime<'_>, args: &[Value]) -> Result<(), Halt>;
}

impl<P: Program + ?Sized> Program for &P {
    fn run(&self, rt: &mut Runtime<'_>, args: &[Value]) -> Result<(), Halt> {
        (**self).run(rt, args)
    }
}

impl<P: Program + ?Sized> Program for Box<P> {
    fn run(&self, rt: &mut Runtime<'_>, args: &[Value]) -> Result<(), Halt> {
        (**self).run(rt, args)
    }
}

/// [`Program`] backed by a plain function or closure.
#[derive(Debug, Clone, Copy)]
pub struct FnProgram<F> {
    body: F,
}

/// Wraps a function or closure as a [`Program`].
pub fn program<F>(body: F) -> FnProgram<F>
where
    F: Fn(&mut Runtime<'_>, &[Value]) -> Result<(), Halt>,
{
    FnProgram { body }
}

impl<F> Program for FnProgram<F>
where
    F: Fn(&mut Runtime<'_>, &[Value]) -> Result<(), Halt>,
{
    fn run(&self, rt: &mut Runtime<'_>, args: &[Value]) -> Result<(), Halt> {
        (self.body)(rt, args)
    }
}
