// Two-context cooperative runtime
// Single thread, no preemption. The event context owns dispatch; the
// interpreter context runs only between a dispatch resume and its next
// wait, so shared state needs no locks.

pub mod dispatch;
pub mod events;
pub mod runtime;
pub mod scheduler;

pub use dispatch::{Cycle, Dispatcher, Notify, Route, Transport};
pub use events::{EventSet, EventSource, EventState, Wait};
pub use runtime::{Interpreter, Phase, Runtime, RuntimeState};
pub use scheduler::{Scheduler, Switch, Task};
