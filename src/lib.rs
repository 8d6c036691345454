mod builders;
mod context;
mod environments;
mod error;
mod eval;
mod features;
mod hashing;
mod identities;
mod segments;
mod test_common;
mod value;

pub use builders::*;
pub use context::*;
pub use environments::*;
pub use error::*;
pub use eval::*;
pub use features::*;
pub use hashing::*;
pub use identities::*;
pub use segments::*;
pub use value::*;
