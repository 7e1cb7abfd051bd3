use std::fmt;

/// Handshake flights (RFC 6347 Section 4.2.4). Even flights belong to the
/// server, odd flights to the client; flight 0 is the server waiting for the
/// first ClientHello.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Flight {
    /// Server: waiting for ClientHello.
    #[default]
    Flight0,
    /// Client: ClientHello (without cookie).
    Flight1,
    /// Server: HelloVerifyRequest sent, waiting for the cookied ClientHello.
    Flight2,
    /// Client: ClientHello with cookie, waiting for the server's flight 4.
    Flight3,
    /// Server: ServerHello..ServerHelloDone sent, waiting for the client's
    /// second flight.
    Flight4,
    /// Client: Certificate..Finished sent, waiting for the server Finished.
    Flight5,
    /// Server: ChangeCipherSpec + Finished sent; handshake done on arrival
    /// confirmation.
    Flight6,
}

impl fmt::Display for Flight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flight{}", *self as u8)
    }
}
