pub mod dispatch;
pub mod store;
pub mod subscriber;
pub mod transport;

pub use dispatch::{BatchReport, DispatchError, DispatchOutcome, Dispatcher, ErrorKind};
pub use store::{SqliteSubscriberStore, StoreError, StoreResult, SubscriberStore, UpsertOutcome};
pub use subscriber::{Channel, NewSubscriber, Subscriber};
pub use transport::{Ack, MessageTransport, SendError, SendErrorKind, TwilioTransport, MAX_BODY_CHARS};
