mod activation;
mod license_key;

pub use activation::*;
pub use license_key::*;
