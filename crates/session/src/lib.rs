//! Authentication lifecycle of the bridge.
//!
//! The [`SessionManager`] logs in through an [`IdentityProvider`], opens a
//! remote signer for the authenticated identity and installs it into a
//! [`account::SignerSlot`]. Logout, explicit or after an idle timeout, removes
//! it again.

mod error;
mod identity;
mod manager;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::SessionError;
pub use identity::{IdentityProvider, LoginOptions, PemIdentityProvider};
pub use manager::{LogoutReason, SessionConfig, SessionEvent, SessionManager, SessionState};
