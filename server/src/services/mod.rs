pub mod delivery;
pub mod feed;
pub mod gate;
pub mod issuer;
pub mod qr;

pub use delivery::{
    DeliveryError, LogTicketMailer, SmtpTicketMailer, TicketEnvelope, TicketMailer,
};
pub use feed::{ChangeKind, RegistrationChange, RegistrationFeed};
pub use gate::{RedemptionGate, RedemptionOutcome};
pub use issuer::{IssueError, RedeliverError, RegistrationIssuer};
