//! ticket-buyer-core: Session model shared by split ticket buyers
//!
//! This crate contains the per-session data model, the commit-reveal voter
//! lottery and the ordered purchase stages. It has no knowledge of the
//! collaborators (wallet, matcher, node) that drive a session forward.

pub mod errors;
pub mod lottery;
pub mod session;
pub mod stage;

pub use errors::*;
pub use lottery::*;
pub use session::*;
pub use stage::*;
