//! Engine services.
//!
//! A mutation flows through these in order: the token provider gates the
//! call, the lifecycle applies the transition and emits a delta, the
//! generator maps the delta to alert drafts, and the dispatcher stores and
//! pushes each draft. The coordinator chains them.

pub mod coordinator;
pub mod dispatch;
pub mod generator;
pub mod lifecycle;
pub mod token;

pub use coordinator::{ActivityCoordinator, MutationOutcome};
pub use dispatch::{
    DeliveryResult, MockPushService, NotificationDispatcher, PushOutcome, PushService,
};
pub use generator::alerts_for_delta;
pub use lifecycle::ActivityLifecycle;
pub use token::{IdentityBackend, MockIdentityBackend, TokenProvider};
