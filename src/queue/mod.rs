// Shared-memory transport queues
//
// ring:      SPSC descriptor rings and the free/active handle pair
// bootstrap: mapping raw regions into handles, seeding free rings
// region:    bounds-checked access to the data regions behind descriptors

pub mod bootstrap;
pub mod region;
pub mod ring;

pub use bootstrap::{SerialQueues, SerialRegions};
pub use region::DataRegion;
pub use ring::{BufferDesc, Descriptor, QueueError, QueueHandle, RingBuffer, SerialQueue};
