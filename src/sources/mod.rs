/// Sources module
///
/// Upstream endpoints the service talks to: the identity endpoint issuing
/// access tokens and the marketplace search endpoint consuming them.
pub mod identity;
pub mod search;
