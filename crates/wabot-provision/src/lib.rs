//! Everything an operator needs to deploy a runner for one account: the
//! Node.js program, its package manifest, deployment notes and a bundle of
//! all three.

pub mod bundle;
pub mod guide;
pub mod package_json;
pub mod server_js;
