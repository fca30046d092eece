pub mod model;
pub mod openshift;
pub mod stubs;
