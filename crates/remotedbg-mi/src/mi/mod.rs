//! GDB/MI wire codec
//!
//! The single place raw MI text is produced or consumed. Incoming lines
//! become [`MiRecord`]s, outgoing commands are rendered from [`MiCommand`];
//! every other module works with the typed forms only.

mod command;
mod record;
mod value;

pub use command::MiCommand;
pub use record::{MiRecord, ResultClass};
pub use value::MiValue;
