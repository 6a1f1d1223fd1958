pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod mailbox;
pub mod models;
pub mod reachability;
pub mod service;
pub mod store;
pub mod workflow;

pub use config::LinkupConfig;
pub use error::{DomainError, LinkupError};
pub use mailbox::Mailbox;
pub use models::{ConnectionEdge, Decision, EdgeId, EdgeStatus, MemberId, Message, MessageId};
pub use reachability::{hops_within, ReachabilityChecker};
pub use service::Network;
pub use workflow::ConnectionWorkflow;
