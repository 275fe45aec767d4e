pub mod batch;
pub mod event;
pub mod registration;
pub mod roster;

pub use batch::{Batch, BatchPatch, NewBatch};
pub use event::{Event, EventPatch, NewEvent};
pub use registration::{
    normalize_email, Registration, RegistrationRequest, TicketId, TicketStatus, UnknownStatus,
};
pub use roster::{RosterQuery, RosterStats};
