//! Managed objects and their lifecycle.

mod managed;
mod state;
mod value;

pub use managed::ManagedObject;
pub use state::{Delta, ObjectState};
pub use value::PropertyValue;
