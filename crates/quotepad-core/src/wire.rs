//! Plain HTTP/1.0 and SNTP framing used by the board network link.

use core::fmt::{self, Write};

pub const HTTP_DEFAULT_PORT: u16 = 80;
pub const SNTP_PORT: u16 = 123;
pub const SNTP_PACKET_BYTES: usize = 48;

/// Seconds between the NTP era 0 epoch (1900) and the Unix epoch.
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;
const NTP_ERA_SECS: u64 = 1 << 32;
const SNTP_VERSION: u8 = 4;
const SNTP_MODE_CLIENT: u8 = 3;
const SNTP_MODE_SERVER: u8 = 4;

/// An `http://host[:port]/path` request target.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HttpTarget<'a> {
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
}

impl<'a> HttpTarget<'a> {
    /// Only plain `http` is understood.
    pub fn parse(url: &'a str) -> Option<Self> {
        let rest = url.strip_prefix("http://")?;
        let (authority, path) = match rest.find('/') {
            Some(split) => rest.split_at(split),
            None => (rest, "/"),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().ok()?),
            None => (authority, HTTP_DEFAULT_PORT),
        };
        if host.is_empty() {
            return None;
        }

        Some(Self { host, port, path })
    }

    /// HTTP/1.0 keeps the server from answering with a chunked body.
    pub fn write_request<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(
            out,
            "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: quotepad\r\n\
             Accept: application/json\r\nConnection: close\r\n\r\n",
            self.path, self.host
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawResponse<'a> {
    pub status: u16,
    pub body: &'a [u8],
}

/// Splits a complete response into status code and body.
pub fn parse_response(raw: &[u8]) -> Option<RawResponse<'_>> {
    let header_end = raw.windows(4).position(|window| window == b"\r\n\r\n")?;
    let line_end = raw.iter().position(|byte| *byte == b'\r')?;
    let status_line = core::str::from_utf8(&raw[..line_end]).ok()?;

    let mut parts = status_line.split_ascii_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let status = parts.next()?.parse().ok()?;

    Some(RawResponse {
        status,
        body: &raw[header_end + 4..],
    })
}

pub fn sntp_request() -> [u8; SNTP_PACKET_BYTES] {
    let mut packet = [0u8; SNTP_PACKET_BYTES];
    packet[0] = (SNTP_VERSION << 3) | SNTP_MODE_CLIENT;
    packet
}

/// Unix seconds from a server reply's transmit timestamp.
pub fn parse_sntp(packet: &[u8]) -> Option<u64> {
    if packet.len() < SNTP_PACKET_BYTES {
        return None;
    }
    // Stratum 0 is a kiss-of-death reply.
    if packet[0] & 0x07 != SNTP_MODE_SERVER || packet[1] == 0 {
        return None;
    }

    let seconds = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]) as u64;
    if seconds == 0 {
        return None;
    }

    // Era 1 starts in 2036; small values belong to it.
    let unix = if seconds >= NTP_UNIX_OFFSET_SECS {
        seconds - NTP_UNIX_OFFSET_SECS
    } else {
        seconds + NTP_ERA_SECS - NTP_UNIX_OFFSET_SECS
    };
    Some(unix)
}
