/// Router Module Index
///
/// Routing split by access level. The guard is attached per module in
/// `create_router`, so a handler cannot end up outside its access level by
/// accident.

/// Routes open to every caller: navigation, access checks, identity actions.
pub mod public;

/// Routes for members and demo sessions. Guests are redirected to sign in.
pub mod authenticated;

/// Routes for admins only. Demo sessions and plain members go to the dashboard.
pub mod admin;
