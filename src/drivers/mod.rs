// Queue- and event-backed device clients used from the interpreter
// context. Each one parks the interpreter on its event source while
// the peer component does the work.

#[cfg(feature = "framebuffer")]
pub mod framebuffer;
pub mod fs;
#[cfg(feature = "i2c")]
pub mod i2c;
pub mod serial;
pub mod timer;
