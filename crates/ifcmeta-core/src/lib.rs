pub mod encoding;
pub mod error;
pub mod io;
pub mod model;
pub mod names;
pub mod paths;
pub mod step;

pub use error::{IfcError, Result};
pub use model::{IfcModel, Instance};
pub use names::{ModelNames, NameUpdate};
