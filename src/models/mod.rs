pub mod agenda;
pub mod rule;
pub mod settings;

pub use agenda::*;
pub use rule::*;
pub use settings::*;
