//! Gateway message types.
//!
//! The client only ever sends [`COMMAND`] frames; the gateway answers with
//! [`ACK`] frames (one per command, in order) and [`DATA`] frames carrying
//! replies to outstanding requests.

/// Command sent from client to gateway.
pub const COMMAND: u16 = 1;

/// Command acknowledgment.
pub const ACK: u16 = 2;

/// Reply data for an outstanding request.
pub const DATA: u16 = 3;

/// Returns a human-readable name for a message type.
pub fn type_name(msg_type: u16) -> &'static str {
    match msg_type {
        COMMAND => "COMMAND",
        ACK => "ACK",
        DATA => "DATA",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_known_types() {
        assert_eq!(type_name(COMMAND), "COMMAND");
        assert_eq!(type_name(ACK), "ACK");
        assert_eq!(type_name(DATA), "DATA");
        assert_eq!(type_name(42), "UNKNOWN");
    }
}
