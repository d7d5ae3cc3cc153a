use thiserror::Error;

/// Raised during packet construction; a failed construction never yields a
/// malformed packet.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("payload of {len} bytes does not fit in an IPv4 packet (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("invalid DNS label {0:?}: labels must be 1 to 63 bytes")]
    InvalidDnsLabel(String),

    #[error("packet buffer too small for {0} header")]
    BufferTooSmall(&'static str),
}

/// Flow-level failure: the partial packet list is discarded, no partial flow
/// is ever returned.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("packet encoding failed: {0}")]
    Encoding(#[from] EncodingError),
}

/// I/O failure during a buffer flush. The buffer is left intact for retry.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pcap write error: {0}")]
    Pcap(String),
}

impl From<pcap_file::PcapError> for PersistenceError {
    fn from(e: pcap_file::PcapError) -> Self {
        PersistenceError::Pcap(e.to_string())
    }
}

/// Best-effort delivery failure: always logged, never propagated into the
/// generation loop.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
