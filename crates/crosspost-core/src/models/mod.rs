pub mod content;
pub mod destination;
pub mod notification;
pub mod outcome;

pub use content::*;
pub use destination::*;
pub use notification::*;
pub use outcome::*;
