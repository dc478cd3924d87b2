//! Client-side authentication and session store for the AL-Kabir platform.
//! Keep the public surface thin and split implementation across sub-modules.

pub mod config;
pub mod context;
pub mod error;
pub mod facade;
pub mod model;
pub mod persist;
pub mod provider;
pub mod store;

pub use config::AuthConfig;
pub use context::{AuthContext, Gate};
pub use error::{AuthError, ProviderErrorKind};
pub use facade::{AuthFacade, LegacyError, LegacyProfile, LegacySession, LegacyUser};
pub use model::{
    AuthMethod, Identity, Profile, ProfilePatch, Session, SessionAttrs, Snapshot,
};
pub use persist::{PersistedState, SnapshotFile};
pub use provider::{
    FixtureProvider, IdentityProvider, Jwt, LiveProvider, OAuthProvider, SignUpRequest,
    TokenHandle,
};
pub use store::SessionStore;
