mod composer;
mod draft;
mod error;
mod orchestrator;
mod route;
mod types;

pub use error::EngineError;
pub use orchestrator::{
    ExecutionMode, Operation, Orchestrator, OrchestratorSettings, RunOutcome,
};
pub use route::{CetusRouter, Route, RouteDiscovery, RouterSettings};
pub use types::{Slippage, SwapDirection, TreasuryContract, TreasuryReference};
