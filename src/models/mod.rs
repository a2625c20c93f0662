mod notification;
mod purchase_event;
mod push_subscription;

pub use notification::*;
pub use purchase_event::*;
pub use push_subscription::*;
