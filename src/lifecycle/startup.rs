//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the finalize orchestrator around the shared context
//! - Bind the setup listener and record the port it actually got
//! - Hand the caller everything it needs to drive the handoff
//!
//! # Design Decisions
//! - Fail fast: a bind error is returned untouched, the caller decides to exit
//! - Listener starts last (traffic only when the orchestrator is ready)

use std::sync::Arc;

use crate::context::SetupContext;
use crate::http::{setup_router, SetupState};
use crate::lifecycle::handoff::{self, HandoffReceiver, HandoffTiming};
use crate::lifecycle::server::SetupServer;
use crate::net::ListenerError;
use crate::setup::{Collaborators, FinalizeOrchestrator};

/// A running setup listener and its wiring.
pub struct SetupStack {
    pub ctx: Arc<SetupContext>,
    pub orchestrator: Arc<FinalizeOrchestrator>,
    pub server: SetupServer,
    pub handoff: HandoffReceiver,
    pub timing: HandoffTiming,
}

/// Enter setup mode: wire the orchestrator and start listening.
pub async fn start_setup(
    ctx: Arc<SetupContext>,
    collaborators: Collaborators,
) -> Result<SetupStack, ListenerError> {
    let timing = HandoffTiming::from(&ctx.config().setup);

    let (trigger, handoff) = handoff::channel();
    let orchestrator = Arc::new(FinalizeOrchestrator::new(ctx.clone(), collaborators, trigger));
    let router = setup_router(SetupState::new(orchestrator.clone()));

    let server = SetupServer::start(router, &ctx.config().listener).await?;
    ctx.record_listen_addr(server.local_addr());

    tracing::info!(port = ctx.listen_port(), "Setup listener ready");
    tracing::info!(
        "Browse to http://localhost:{}/ to complete setup!",
        ctx.listen_port()
    );

    Ok(SetupStack {
        ctx,
        orchestrator,
        server,
        handoff,
        timing,
    })
}
