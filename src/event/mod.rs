mod bus;
mod events;

pub use bus::{EventBus, EventInbox, SubscriptionId};
pub use events::{EditorEvent, HistoryEvent, LayerEvent, ViewEvent};
