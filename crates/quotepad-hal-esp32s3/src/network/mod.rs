//! Blocking Wi-Fi station link: DHCP, DNS, one HTTP GET, SNTP.
//!
//! Every operation busy-polls the smoltcp interface against a deadline, so
//! the caller's control loop is the only task touching the stack.

use embedded_hal::delay::DelayNs;
use esp_hal::{delay::Delay, time::Instant as HalInstant};
use esp_radio::wifi::{AuthMethod, ClientConfig, ModeConfig, WifiController, WifiDevice, WifiError};
use heapless::{String, Vec};
use log::{debug, info};
use quotepad_core::{
    connectivity::{HttpResponse, LinkStatus, NetworkLink},
    wire::{self, HttpTarget, SNTP_PACKET_BYTES, SNTP_PORT},
};
use smoltcp::{
    iface::{Config as IfaceConfig, Interface, SocketHandle, SocketSet, SocketStorage},
    socket::{
        dhcpv4,
        dns::{self, DnsQuery, GetQueryResultError},
        tcp, udp,
    },
    time::Instant as NetInstant,
    wire::{
        DnsQueryType, EthernetAddress, HardwareAddress, IpAddress, IpCidr, IpEndpoint,
        Ipv4Address, Ipv4Cidr,
    },
};

const TCP_RX_BYTES: usize = 2048;
const TCP_TX_BYTES: usize = 512;
const UDP_BUFFER_BYTES: usize = 128;
const UDP_PACKETS: usize = 2;
const MAX_DNS_SERVERS: usize = 3;
const REQUEST_BYTES: usize = 256;
const RESPONSE_BYTES: usize = TCP_RX_BYTES;

const DNS_TIMEOUT_MS: u64 = 5_000;
const HTTP_TIMEOUT_MS: u64 = 10_000;
const SNTP_TIMEOUT_MS: u64 = 3_000;
const POLL_INTERVAL_US: u32 = 500;
const EPHEMERAL_PORT_BASE: u16 = 49_152;

#[derive(Debug)]
pub enum WifiLinkError {
    Wifi(WifiError),
    UnsupportedUrl,
    NoIpv4,
    NoDnsServer,
    Dns,
    Connect,
    Send,
    Receive,
    Timeout,
    MalformedResponse,
    MalformedTime,
}

/// Socket storage owned for the lifetime of the firmware.
pub struct NetResources {
    sockets: [SocketStorage<'static>; 4],
    tcp_rx: [u8; TCP_RX_BYTES],
    tcp_tx: [u8; TCP_TX_BYTES],
    udp_rx_meta: [udp::PacketMetadata; UDP_PACKETS],
    udp_rx: [u8; UDP_BUFFER_BYTES],
    udp_tx_meta: [udp::PacketMetadata; UDP_PACKETS],
    udp_tx: [u8; UDP_BUFFER_BYTES],
    dns_queries: [Option<DnsQuery>; 1],
}

impl NetResources {
    pub const fn new() -> Self {
        Self {
            sockets: [SocketStorage::EMPTY; 4],
            tcp_rx: [0; TCP_RX_BYTES],
            tcp_tx: [0; TCP_TX_BYTES],
            udp_rx_meta: [udp::PacketMetadata::EMPTY; UDP_PACKETS],
            udp_rx: [0; UDP_BUFFER_BYTES],
            udp_tx_meta: [udp::PacketMetadata::EMPTY; UDP_PACKETS],
            udp_tx: [0; UDP_BUFFER_BYTES],
            dns_queries: [None],
        }
    }
}

impl Default for NetResources {
    fn default() -> Self {
        Self::new()
    }
}

struct Lease {
    address: Ipv4Cidr,
    router: Option<Ipv4Address>,
    dns_servers: Vec<IpAddress, MAX_DNS_SERVERS>,
}

pub struct WifiLink<'d> {
    controller: WifiController<'d>,
    device: WifiDevice<'d>,
    iface: Interface,
    sockets: SocketSet<'static>,
    dhcp: SocketHandle,
    dns: SocketHandle,
    tcp: SocketHandle,
    udp: SocketHandle,
    delay: Delay,
    sntp_host: &'static str,
    joining: bool,
    has_ipv4: bool,
    has_dns: bool,
    next_port: u16,
}

impl<'d> WifiLink<'d> {
    pub fn new(
        controller: WifiController<'d>,
        mut device: WifiDevice<'d>,
        resources: &'static mut NetResources,
        sntp_host: &'static str,
        seed: u64,
    ) -> Self {
        let NetResources {
            sockets,
            tcp_rx,
            tcp_tx,
            udp_rx_meta,
            udp_rx,
            udp_tx_meta,
            udp_tx,
            dns_queries,
        } = resources;

        let mac = EthernetAddress(device.mac_address());
        let mut config = IfaceConfig::new(HardwareAddress::Ethernet(mac));
        config.random_seed = seed;
        let iface = Interface::new(config, &mut device, now());

        let mut sockets = SocketSet::new(&mut sockets[..]);
        let dhcp = sockets.add(dhcpv4::Socket::new());
        let dns = sockets.add(dns::Socket::new(&[], &mut dns_queries[..]));
        let tcp = sockets.add(tcp::Socket::new(
            tcp::SocketBuffer::new(&mut tcp_rx[..]),
            tcp::SocketBuffer::new(&mut tcp_tx[..]),
        ));
        let udp = sockets.add(udp::Socket::new(
            udp::PacketBuffer::new(&mut udp_rx_meta[..], &mut udp_rx[..]),
            udp::PacketBuffer::new(&mut udp_tx_meta[..], &mut udp_tx[..]),
        ));

        info!("wifi: link ready mac={}", mac);

        Self {
            controller,
            device,
            iface,
            sockets,
            dhcp,
            dns,
            tcp,
            udp,
            delay: Delay::new(),
            sntp_host,
            joining: false,
            has_ipv4: false,
            has_dns: false,
            next_port: EPHEMERAL_PORT_BASE + (seed as u16 % 1024),
        }
    }

    /// Stops the radio ahead of deep sleep.
    pub fn shutdown(&mut self) {
        let _ = self.controller.disconnect();
        let _ = self.controller.stop();
        self.joining = false;
    }

    fn poll(&mut self) {
        self.iface.poll(now(), &mut self.device, &mut self.sockets);

        let event = match self.sockets.get_mut::<dhcpv4::Socket>(self.dhcp).poll() {
            Some(dhcpv4::Event::Configured(config)) => {
                let mut dns_servers = Vec::new();
                for server in config.dns_servers.iter() {
                    let _ = dns_servers.push(IpAddress::Ipv4(*server));
                }
                Some(Some(Lease {
                    address: config.address,
                    router: config.router,
                    dns_servers,
                }))
            }
            Some(dhcpv4::Event::Deconfigured) => Some(None),
            None => None,
        };

        match event {
            Some(Some(lease)) => self.apply_lease(lease),
            Some(None) => {
                info!("wifi: dhcp lease lost");
                self.clear_lease();
            }
            None => {}
        }
    }

    fn apply_lease(&mut self, lease: Lease) {
        info!(
            "wifi: dhcp configured addr={} router={:?} dns_servers={}",
            lease.address,
            lease.router,
            lease.dns_servers.len()
        );

        self.iface.update_ip_addrs(|addrs| {
            addrs.clear();
            let _ = addrs.push(IpCidr::Ipv4(lease.address));
        });
        match lease.router {
            Some(router) => {
                let _ = self.iface.routes_mut().add_default_ipv4_route(router);
            }
            None => {
                self.iface.routes_mut().remove_default_ipv4_route();
            }
        }
        self.sockets
            .get_mut::<dns::Socket>(self.dns)
            .update_servers(&lease.dns_servers);

        self.has_ipv4 = true;
        self.has_dns = !lease.dns_servers.is_empty();
    }

    fn clear_lease(&mut self) {
        self.iface.update_ip_addrs(|addrs| addrs.clear());
        self.iface.routes_mut().remove_default_ipv4_route();
        self.has_ipv4 = false;
        self.has_dns = false;
    }

    fn take_port(&mut self) -> u16 {
        let port = self.next_port;
        self.next_port = match self.next_port.checked_add(1) {
            Some(next) => next,
            None => EPHEMERAL_PORT_BASE,
        };
        port
    }

    fn wait_step(&mut self, deadline_ms: u64) -> Result<(), WifiLinkError> {
        if now_ms() >= deadline_ms {
            return Err(WifiLinkError::Timeout);
        }
        self.delay.delay_us(POLL_INTERVAL_US);
        self.poll();
        Ok(())
    }

    fn resolve(&mut self, host: &str) -> Result<IpAddress, WifiLinkError> {
        if let Ok(address) = host.parse::<Ipv4Address>() {
            return Ok(IpAddress::Ipv4(address));
        }
        if !self.has_ipv4 {
            return Err(WifiLinkError::NoIpv4);
        }
        if !self.has_dns {
            return Err(WifiLinkError::NoDnsServer);
        }

        let query = self
            .sockets
            .get_mut::<dns::Socket>(self.dns)
            .start_query(self.iface.context(), host, DnsQueryType::A)
            .map_err(|_| WifiLinkError::Dns)?;

        let deadline_ms = now_ms() + DNS_TIMEOUT_MS;
        loop {
            self.poll();
            let socket = self.sockets.get_mut::<dns::Socket>(self.dns);
            match socket.get_query_result(query) {
                Ok(addresses) => {
                    let address = addresses.first().copied().ok_or(WifiLinkError::Dns)?;
                    debug!("wifi: resolved host={} addr={}", host, address);
                    return Ok(address);
                }
                Err(GetQueryResultError::Pending) => {}
                Err(GetQueryResultError::Failed) => return Err(WifiLinkError::Dns),
            }

            if let Err(err) = self.wait_step(deadline_ms) {
                self.sockets
                    .get_mut::<dns::Socket>(self.dns)
                    .cancel_query(query);
                return Err(err);
            }
        }
    }

    /// Sends `request` and collects the reply until the peer closes or `out`
    /// is full.
    fn exchange(
        &mut self,
        endpoint: IpEndpoint,
        request: &[u8],
        out: &mut [u8],
    ) -> Result<usize, WifiLinkError> {
        let local_port = self.take_port();
        {
            let socket = self.sockets.get_mut::<tcp::Socket>(self.tcp);
            socket.abort();
            socket
                .connect(self.iface.context(), endpoint, local_port)
                .map_err(|_| WifiLinkError::Connect)?;
        }

        let deadline_ms = now_ms() + HTTP_TIMEOUT_MS;
        let mut sent = 0usize;
        let mut received = 0usize;
        loop {
            self.poll();
            let socket = self.sockets.get_mut::<tcp::Socket>(self.tcp);

            if socket.can_send() && sent < request.len() {
                sent += socket
                    .send_slice(&request[sent..])
                    .map_err(|_| WifiLinkError::Send)?;
            }
            if socket.can_recv() {
                received += socket
                    .recv_slice(&mut out[received..])
                    .map_err(|_| WifiLinkError::Receive)?;
            }

            if received == out.len() {
                socket.abort();
                break;
            }
            if sent == request.len() && !socket.may_recv() && received > 0 {
                socket.close();
                break;
            }
            if !socket.is_open() {
                return Err(WifiLinkError::Connect);
            }

            if let Err(err) = self.wait_step(deadline_ms) {
                self.sockets.get_mut::<tcp::Socket>(self.tcp).abort();
                return Err(err);
            }
        }

        // Flush the FIN or RST.
        self.poll();
        Ok(received)
    }
}

impl NetworkLink for WifiLink<'_> {
    type Error = WifiLinkError;

    fn join(&mut self, ssid: &str, secret: &str) -> Result<(), Self::Error> {
        if matches!(self.controller.is_connected(), Ok(true)) {
            let _ = self.controller.disconnect();
        }
        self.clear_lease();
        self.sockets.get_mut::<dhcpv4::Socket>(self.dhcp).reset();

        let auth_method = if secret.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::Wpa2Personal
        };
        let client_config = ClientConfig::default()
            .with_ssid(ssid.into())
            .with_password(secret.into())
            .with_auth_method(auth_method);
        self.controller
            .set_config(&ModeConfig::Client(client_config))
            .map_err(WifiLinkError::Wifi)?;

        if !self.controller.is_started().unwrap_or(false) {
            self.controller.start().map_err(WifiLinkError::Wifi)?;
        }
        self.controller.connect().map_err(WifiLinkError::Wifi)?;
        self.joining = true;
        info!("wifi: joining ssid={}", ssid);
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        self.poll();
        let associated = matches!(self.controller.is_connected(), Ok(true));

        if associated && self.has_ipv4 {
            self.joining = false;
            LinkStatus::Connected
        } else if associated || self.joining {
            LinkStatus::Pending
        } else {
            LinkStatus::Disconnected
        }
    }

    fn get(&mut self, url: &str, body: &mut [u8]) -> Result<HttpResponse, Self::Error> {
        let target = HttpTarget::parse(url).ok_or(WifiLinkError::UnsupportedUrl)?;
        let mut request = String::<REQUEST_BYTES>::new();
        target
            .write_request(&mut request)
            .map_err(|_| WifiLinkError::UnsupportedUrl)?;

        let address = self.resolve(target.host)?;
        let mut raw = [0u8; RESPONSE_BYTES];
        let received = self.exchange(
            IpEndpoint::new(address, target.port),
            request.as_bytes(),
            &mut raw,
        )?;

        let response =
            wire::parse_response(&raw[..received]).ok_or(WifiLinkError::MalformedResponse)?;
        let body_len = response.body.len().min(body.len());
        body[..body_len].copy_from_slice(&response.body[..body_len]);
        debug!(
            "wifi: http status={} body_bytes={} received={}",
            response.status, body_len, received
        );

        Ok(HttpResponse {
            status: response.status,
            body_len,
        })
    }

    fn network_time(&mut self) -> Result<u64, Self::Error> {
        let server = IpEndpoint::new(self.resolve(self.sntp_host)?, SNTP_PORT);
        let local_port = self.take_port();
        {
            let socket = self.sockets.get_mut::<udp::Socket>(self.udp);
            socket.close();
            socket
                .bind(local_port)
                .map_err(|_| WifiLinkError::Connect)?;
            socket
                .send_slice(&wire::sntp_request(), server)
                .map_err(|_| WifiLinkError::Send)?;
        }

        let deadline_ms = now_ms() + SNTP_TIMEOUT_MS;
        let mut reply = [0u8; SNTP_PACKET_BYTES];
        loop {
            self.poll();
            let socket = self.sockets.get_mut::<udp::Socket>(self.udp);
            if socket.can_recv() {
                let (len, _) = socket
                    .recv_slice(&mut reply)
                    .map_err(|_| WifiLinkError::Receive)?;
                socket.close();
                let unix = wire::parse_sntp(&reply[..len]).ok_or(WifiLinkError::MalformedTime)?;
                info!("wifi: sntp time unix={}", unix);
                return Ok(unix);
            }

            if let Err(err) = self.wait_step(deadline_ms) {
                self.sockets.get_mut::<udp::Socket>(self.udp).close();
                return Err(err);
            }
        }
    }
}

fn now_ms() -> u64 {
    HalInstant::now().duration_since_epoch().as_millis()
}

fn now() -> NetInstant {
    NetInstant::from_millis(now_ms() as i64)
}
