//! Override chains
//!
//! An [`OverrideChain`] holds one named operation of a chart. A base
//! implementation is installed first, then behavior layers wrap it: each
//! wrapper receives the implementation it replaces and returns the new one.
//! The most recently installed wrapper runs first and may call inward.
//!
//! Wrappers are kept as factories rather than as already-built closures, so
//! replacing the base through a setter rebuilds the whole chain with every
//! wrapper still in place.

use crate::error::{ChartError, Result};
use std::sync::Arc;

type Wrapper<F> = Arc<dyn Fn(Arc<F>) -> Arc<F> + Send + Sync>;

pub struct OverrideChain<F: ?Sized> {
    name: &'static str,
    base: Option<Arc<F>>,
    wrappers: Vec<Wrapper<F>>,
    current: Option<Arc<F>>,
}

impl<F: ?Sized> OverrideChain<F> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            base: None,
            wrappers: Vec::new(),
            current: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_installed(&self) -> bool {
        self.base.is_some()
    }

    /// Number of wrappers layered over the base.
    pub fn depth(&self) -> usize {
        self.wrappers.len()
    }

    pub fn ensure_installed(&self) -> Result<()> {
        if self.is_installed() {
            Ok(())
        } else {
            Err(ChartError::MissingOperation(self.name))
        }
    }

    /// Installs (or replaces) the innermost implementation. Wrappers stay.
    pub fn install(&mut self, base: Arc<F>) {
        self.base = Some(base);
        self.recompose();
    }

    /// Wraps the current implementation.
    pub fn override_with<W>(&mut self, wrapper: W) -> Result<()>
    where
        W: Fn(Arc<F>) -> Arc<F> + Send + Sync + 'static,
    {
        let current = self
            .current
            .clone()
            .ok_or(ChartError::MissingOperation(self.name))?;
        let wrapper: Wrapper<F> = Arc::new(wrapper);
        self.current = Some(wrapper(current));
        self.wrappers.push(wrapper);
        tracing::debug!(operation = self.name, depth = self.wrappers.len(), "override installed");
        Ok(())
    }

    /// The outermost implementation.
    pub fn get(&self) -> Result<Arc<F>> {
        self.current
            .clone()
            .ok_or(ChartError::MissingOperation(self.name))
    }

    fn recompose(&mut self) {
        self.current = self.base.clone().map(|base| {
            self.wrappers
                .iter()
                .fold(base, |inner, wrapper| wrapper(inner))
        });
    }
}

impl<F: ?Sized> std::fmt::Debug for OverrideChain<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideChain")
            .field("name", &self.name)
            .field("installed", &self.is_installed())
            .field("depth", &self.depth())
            .finish()
    }
}
