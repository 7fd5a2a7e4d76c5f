//! The bridge instance
//!
//! One `Bridge` exists per process. It is built once at load time by
//! [`Bridge::init`], which resolves every managed symbol up front; a bridge
//! that exists is therefore fully usable. All dispatchers and downward calls
//! read from it without locking.

use std::sync::Arc;

use crate::attach;
use crate::config::BridgeConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::handle::HandleRegistry;
use crate::logging::set_log_level;
use crate::runtime::ManagedRuntime;
use crate::symbols::Symbols;

pub struct Bridge<R: ManagedRuntime> {
    pub(crate) runtime: R,
    pub(crate) symbols: Symbols,
    pub(crate) handles: HandleRegistry,
    pub(crate) config: BridgeConfig,
}

impl<R: ManagedRuntime> Bridge<R> {
    /// Resolve all symbols and assemble the bridge.
    ///
    /// Any missing symbol fails the whole initialization; the caller must
    /// not use the library afterwards.
    pub fn init(runtime: R, engine: Arc<dyn Engine>, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        if let Some(level) = config.log_level() {
            set_log_level(level);
        }

        let symbols = {
            let _guard = attach::enter(&runtime, &config.thread_name("init"))?;
            Symbols::resolve(&runtime)?
        };
        crate::log_info!(
            "bridge initialized (handle poisoning {})",
            if config.poison_handles { "on" } else { "off" }
        );

        let handles = HandleRegistry::new(engine, config.poison_handles);
        Ok(Self {
            runtime,
            symbols,
            handles,
            config,
        })
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    pub fn engine(&self) -> &dyn Engine {
        self.handles.engine()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}
