// Build-time configuration: channel table, queue geometry, exit policy

/// Channel identifier as handed out by the system description.
pub type Channel = u32;

pub mod channels {
    use super::Channel;

    pub const TIMER: Channel = 1;
    pub const SERIAL_RX: Channel = 2;
    pub const SERIAL_TX: Channel = 3;
    pub const ETH_RX: Channel = 4;
    pub const ETH_TX: Channel = 5;
    pub const FS: Channel = 7;
    pub const FRAMEBUFFER_VMM: Channel = 8;
    pub const I2C: Channel = 9;
}

// sDDF-style serial geometry; data regions hold 2 * ENTRIES slots
pub const SERIAL_ENTRIES: usize = 512;
pub const SERIAL_BUFFER_SIZE: u32 = 2048;

/// Bytes buffered between the serial rx ring and the interpreter.
pub const CONSOLE_RX_BUF: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap {
    pub serial_rx: Channel,
    pub serial_tx: Channel,
    pub timer: Channel,
    pub fs: Channel,
    pub eth_rx: Channel,
    pub eth_tx: Channel,
    #[cfg(feature = "framebuffer")]
    pub framebuffer: Channel,
    #[cfg(feature = "i2c")]
    pub i2c: Channel,
}

impl ChannelMap {
    pub const DEFAULT: Self = Self {
        serial_rx: channels::SERIAL_RX,
        serial_tx: channels::SERIAL_TX,
        timer: channels::TIMER,
        fs: channels::FS,
        eth_rx: channels::ETH_RX,
        eth_tx: channels::ETH_TX,
        #[cfg(feature = "framebuffer")]
        framebuffer: channels::FRAMEBUFFER_VMM,
        #[cfg(feature = "i2c")]
        i2c: channels::I2C,
    };
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What happens once the interpreter's main unit returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Tear down and start a fresh interpreter (REPL builds)
    #[default]
    Restart,
    /// Tear down and never run the interpreter again (single-module builds)
    Halt,
}
