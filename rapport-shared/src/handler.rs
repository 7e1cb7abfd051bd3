use std::time::Instant;

use crate::error::Result;
use crate::transport::TransportMessage;

/// The sans-IO contract every protocol layer implements.
///
/// A layer consumes reads from the wire side and writes from the application
/// side, and the embedder drains the opposing queues plus pending events and
/// timeouts. No layer performs I/O or sleeps; the embedder owns the sockets
/// and the clock.
pub trait SansIoHandler {
    /// Associated event input message type
    type Ein: 'static;
    /// Associated event output message type
    type Eout: 'static;
    /// Associated read input message type
    type Rin: 'static;
    /// Associated read output message type
    type Rout: 'static;
    /// Associated write input message type
    type Win: 'static;
    /// Associated write output message type
    type Wout: 'static;

    /// Handles Rin from the wire side
    fn handle_read(&mut self, msg: TransportMessage<Self::Rin>) -> Result<()>;

    /// Polls Rout for the next inbound layer
    fn poll_read(&mut self) -> Option<TransportMessage<Self::Rout>>;

    /// Handles Win from the application side
    fn handle_write(&mut self, msg: TransportMessage<Self::Win>) -> Result<()>;

    /// Polls Wout for the next outbound layer
    fn poll_write(&mut self) -> Option<TransportMessage<Self::Wout>>;

    /// Handles a layer event
    fn handle_event(&mut self, _evt: Self::Ein) -> Result<()> {
        Ok(())
    }

    /// Polls a layer event
    fn poll_event(&mut self) -> Option<Self::Eout> {
        None
    }

    /// Advances internal timers up to `now`
    fn handle_timeout(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }

    /// Earliest instant at which `handle_timeout` must be called again
    fn poll_timeout(&mut self) -> Option<Instant> {
        None
    }
}
