use std::fmt;
use std::str::FromStr;

/// The configured transport strategy. `Auto` expands to an ordered list of
/// concrete candidates tried in turn; the others are used as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Auto,
    Tcp,
    Udp,
    UdpMulticast,
    Http,
    Https,
}

impl Transport {
    /// The ordered list of concrete `-rtsp_transport` values to try for this
    /// configured strategy. `Auto` tries `tcp` then `udp`; everything else is
    /// a single-element list of itself.
    pub fn candidates(self) -> Vec<ConcreteTransport> {
        match self {
            Transport::Auto => vec![ConcreteTransport::Tcp, ConcreteTransport::Udp],
            Transport::Tcp => vec![ConcreteTransport::Tcp],
            Transport::Udp => vec![ConcreteTransport::Udp],
            Transport::UdpMulticast => vec![ConcreteTransport::UdpMulticast],
            Transport::Http => vec![ConcreteTransport::Http],
            Transport::Https => vec![ConcreteTransport::Https],
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Transport::Auto),
            "tcp" => Ok(Transport::Tcp),
            "udp" => Ok(Transport::Udp),
            "udp_multicast" => Ok(Transport::UdpMulticast),
            "http" => Ok(Transport::Http),
            "https" => Ok(Transport::Https),
            other => Err(format!("unknown rtsp_transport {other:?}")),
        }
    }
}

/// A single, concrete `-rtsp_transport` value passed to ffmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcreteTransport {
    Tcp,
    Udp,
    UdpMulticast,
    Http,
    Https,
}

impl ConcreteTransport {
    pub fn as_ffmpeg_value(self) -> &'static str {
        match self {
            ConcreteTransport::Tcp => "tcp",
            ConcreteTransport::Udp => "udp",
            ConcreteTransport::UdpMulticast => "udp_multicast",
            ConcreteTransport::Http => "http",
            ConcreteTransport::Https => "https",
        }
    }

    /// `http`/`https` do not take an explicit `-rtsp_transport` flag; they are
    /// plain URL schemes instead. Only tcp/udp/udp_multicast are RTSP-layer
    /// transport selections.
    pub fn is_rtsp_transport_flag(self) -> bool {
        !matches!(self, ConcreteTransport::Http | ConcreteTransport::Https)
    }
}

impl fmt::Display for ConcreteTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ffmpeg_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_tries_tcp_then_udp() {
        assert_eq!(
            Transport::Auto.candidates(),
            vec![ConcreteTransport::Tcp, ConcreteTransport::Udp]
        );
    }

    #[test]
    fn configured_transport_is_single_candidate() {
        assert_eq!(Transport::Http.candidates(), vec![ConcreteTransport::Http]);
    }

    #[test]
    fn parses_all_known_transports() {
        for s in ["auto", "tcp", "udp", "udp_multicast", "http", "https"] {
            assert!(s.parse::<Transport>().is_ok());
        }
        assert!("quic".parse::<Transport>().is_err());
    }
}
