//! Presentation Layer
//!
//! Procedure handlers, DTOs, router, and the request-context middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::{AuthAppState, ProcedureInput};
pub use middleware::{Authenticated, Ctx, resolve_identity};
pub use router::{auth_router, auth_router_generic};
