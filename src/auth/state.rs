//! Authentication state trait and macro.

use crate::session::SessionManager;

/// Trait for state types that give handlers access to the session manager.
pub trait HasSessionBackend {
    fn sessions(&self) -> &SessionManager;
}

/// Macro to implement `HasSessionBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `sessions: Arc<SessionManager>`
///
/// # Example
/// ```ignore
/// use crate::impl_has_session_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub sessions: Arc<SessionManager>,
///     // ... other fields
/// }
///
/// impl_has_session_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_session_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasSessionBackend for $state_type {
            fn sessions(&self) -> &$crate::session::SessionManager {
                &self.sessions
            }
        }
    };
}
