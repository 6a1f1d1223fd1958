pub mod edge;
pub mod message;

pub use edge::{ConnectionEdge, Decision, EdgeId, EdgeStatus, MemberPair};
pub use message::{Message, MessageId};

/// Opaque member identifier issued by the directory.
pub type MemberId = String;
