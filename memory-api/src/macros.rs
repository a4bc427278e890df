//! Utility macros for reducing boilerplate.

/// Implements `FromRef<AppState>` for a field extractor.
///
/// # Example
/// ```ignore
/// impl_from_ref!(DbClient, db);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for DbClient {
///     fn from_ref(state: &AppState) -> Self {
///         state.db.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
