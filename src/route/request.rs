//! Transient `(target, route)` pairing: a Request never owns its pieces.

use std::sync::Arc;

use crate::route::{Route, Target};

/// A borrowed pairing of a target and one of its routes. Cheap to construct
/// and drop; never the owner of either field.
pub struct Request<'r> {
    pub target: Arc<Target>,
    pub route: &'r Route,
}

impl<'r> Request<'r> {
    pub fn new(target: Arc<Target>, route: &'r Route) -> Self {
        Request { target, route }
    }

    /// The absolute path dispatched on the wire: `target.base_path + route.path`.
    pub fn full_path(&self) -> String {
        format!("{}{}", self.target.base_path, self.route.path)
    }
}
