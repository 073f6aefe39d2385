//! Handler registry keyed by packet ID.
//!
//! The registry is filled by the application before serving starts and is
//! only read while routing. Entries are stateless [`MessageHandler`]s; the
//! connection a handler responds on arrives with each call.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::packet::Packet;
use crate::error::constants::{ERR_REGISTRY_READ_LOCK, ERR_REGISTRY_WRITE_LOCK};
use crate::error::{DispatchError, Result};
use crate::handler::BaseHandler;

/// Processes one message type.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle a decoded packet. `ctx` is bound to the connection the packet
    /// arrived on; use [`BaseHandler::write`] to respond.
    async fn handle_msg(&self, ctx: &BaseHandler, packet: Packet) -> Result<()>;
}

/// Adapter for synchronous closures returning an optional reply.
pub struct FnHandler<F> {
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Packet) -> Result<Option<Packet>> + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&Packet) -> Result<Option<Packet>> + Send + Sync + 'static,
{
    async fn handle_msg(&self, ctx: &BaseHandler, packet: Packet) -> Result<()> {
        if let Some(reply) = (self.handler)(&packet)? {
            ctx.write(&reply).await?;
        }
        Ok(())
    }
}

/// Routing table from packet ID to handler.
#[derive(Default)]
pub struct Registry {
    handlers: RwLock<HashMap<u32, Arc<dyn MessageHandler>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, used by routers built without one.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Registry::new())).clone()
    }

    /// Register `handler` for packets with ID `id`, replacing any previous entry.
    pub fn register<H: MessageHandler>(&self, id: u32, handler: H) -> Result<()> {
        self.register_arc(id, Arc::new(handler))
    }

    pub fn register_arc(&self, id: u32, handler: Arc<dyn MessageHandler>) -> Result<()> {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| DispatchError::Custom(ERR_REGISTRY_WRITE_LOCK.to_string()))?;

        if handlers.insert(id, handler).is_some() {
            warn!(id, "Replaced existing handler");
        } else {
            debug!(id, "Registered handler");
        }
        Ok(())
    }

    /// Register a synchronous closure; a returned packet is written back.
    pub fn register_fn<F>(&self, id: u32, handler: F) -> Result<()>
    where
        F: Fn(&Packet) -> Result<Option<Packet>> + Send + Sync + 'static,
    {
        self.register(id, FnHandler::new(handler))
    }

    pub fn get(&self, id: u32) -> Result<Option<Arc<dyn MessageHandler>>> {
        Ok(self.read()?.get(&id).cloned())
    }

    pub fn contains(&self, id: u32) -> Result<bool> {
        Ok(self.read()?.contains_key(&id))
    }

    /// Registered IDs in ascending order.
    pub fn ids(&self) -> Result<Vec<u32>> {
        let mut ids: Vec<u32> = self.read()?.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<u32, Arc<dyn MessageHandler>>>> {
        self.handlers
            .read()
            .map_err(|_| DispatchError::Custom(ERR_REGISTRY_READ_LOCK.to_string()))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Registry");
        match self.ids() {
            Ok(ids) => out.field("ids", &ids),
            Err(_) => out.field("ids", &"<poisoned>"),
        };
        out.finish()
    }
}
