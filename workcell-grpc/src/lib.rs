//! Workcell gRPC - tonic transport for the workcell SDK
//!
//! Implements every service trait of `workcell::services` over tonic
//! channels and bundles them into a [`Solution`].

pub mod channel;
pub mod clients;
pub mod config;
pub mod output;
pub mod solution;

// Re-export core functionality
pub use workcell::{
    BehaviorTree, BlackboardClient, DataLoggerClient, ProcessProvider, Result, SkillProvider,
    WorkcellError,
};

// Transport-specific exports
pub use channel::{status_error, RpcChannel};
pub use clients::{
    GrpcBlackboard, GrpcDataLogger, GrpcInstalledAssets, GrpcOperations, GrpcResourceRegistry,
    GrpcSkillRegistry, GrpcSolutionService,
};
pub use config::ClientConfig;
pub use solution::Solution;
