//! Blocking client for the emulator and a device-level helper on top.

use std::io::BufReader;
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use asic_model::{Page, Register, ADDRESS_MASK, RW_MASK};
use rand::Rng;
use tracing::debug;

use crate::codec::{self, Frame};
use crate::ClientError;

/// Connection to an emulator server.
///
/// Each client picks a random `xxxx-xxxx` identity at connect time and tags
/// every request with it.
///
/// A failed exchange leaves the stream at an unknown position relative to
/// the server's replies, so the client closes itself and every later call
/// returns [`ClientError::Disconnected`].
#[derive(Debug)]
pub struct EmulatorClient {
    stream: Option<BufReader<TcpStream>>,
    identity: String,
}

impl EmulatorClient {
    /// Connects to the emulator at `endpoint` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] if the connection cannot be opened.
    pub fn connect(endpoint: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(endpoint).map_err(|source| ClientError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;

        let identity = random_identity();
        debug!(%identity, endpoint, "connected to emulator");
        Ok(Self {
            stream: Some(BufReader::new(stream)),
            identity,
        })
    }

    /// Identity carried in every request from this client.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Whether the client has been closed by a failed exchange.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Bounds how long a transfer may wait on the connection. `None` waits
    /// forever. Timing out closes the client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the socket rejects the timeout
    /// and [`ClientError::Disconnected`] once the client is closed.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or(ClientError::Disconnected)?
            .get_ref();
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        Ok(())
    }

    /// Sends `transaction` as a read, setting the RW bit on its control
    /// byte.
    ///
    /// # Errors
    ///
    /// See [`EmulatorClient::transfer`].
    pub fn read(&mut self, mut transaction: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        debug!(length = transaction.len(), "read transaction");
        if let Some(control) = transaction.first_mut() {
            *control |= RW_MASK;
        }
        self.transfer(&transaction)
    }

    /// Sends `transaction` as a write, clearing the RW bit on its control
    /// byte.
    ///
    /// # Errors
    ///
    /// See [`EmulatorClient::transfer`].
    pub fn write(&mut self, mut transaction: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        debug!(length = transaction.len(), "write transaction");
        if let Some(control) = transaction.first_mut() {
            *control &= ADDRESS_MASK;
        }
        self.transfer(&transaction)
    }

    /// Sends `transaction` unchanged and blocks for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Codec`] on frame or payload failures,
    /// [`ClientError::Disconnected`] if the server hangs up first or the
    /// client is already closed, and [`ClientError::IdentityMismatch`] if the
    /// reply is tagged for another client. Any failure while exchanging
    /// frames closes the client.
    pub fn transfer(&mut self, transaction: &[u8]) -> Result<Vec<u8>, ClientError> {
        let request = Frame::for_transaction(self.identity.as_bytes(), transaction)?;
        let reply = match self.exchange(&request) {
            Ok(reply) => reply,
            Err(err) => {
                self.close();
                return Err(err);
            }
        };

        Ok(codec::decode_transaction(&reply.payload)?)
    }

    fn exchange(&mut self, request: &Frame) -> Result<Frame, ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::Disconnected)?;
        codec::write_frame(stream.get_mut(), request)?;

        let reply = codec::read_frame(stream)?.ok_or(ClientError::Disconnected)?;
        if reply.identity != request.identity {
            return Err(ClientError::IdentityMismatch {
                expected: self.identity.clone(),
                received: String::from_utf8_lossy(&reply.identity).into_owned(),
            });
        }
        Ok(reply)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(identity = %self.identity, "closing emulator connection");
            if let Err(err) = stream.get_ref().shutdown(Shutdown::Both) {
                debug!(%err, "connection already closed");
            }
        }
    }
}

fn random_identity() -> String {
    let mut rng = rand::thread_rng();
    format!("{:04x}-{:04x}", rng.gen::<u16>(), rng.gen::<u16>())
}

/// Register-level access to an emulated ASIC.
///
/// Full addresses span both pages (`0..=255`); the helper switches page
/// select as needed and caches the page it last selected.
#[derive(Debug)]
pub struct AsicDevice {
    client: EmulatorClient,
    page: Page,
}

impl AsicDevice {
    /// Wraps a connected client. The device is assumed to be on page 0.
    #[must_use]
    pub const fn new(client: EmulatorClient) -> Self {
        Self {
            client,
            page: Page::Page0,
        }
    }

    /// Underlying client.
    #[must_use]
    pub const fn client(&self) -> &EmulatorClient {
        &self.client
    }

    /// Page the helper believes is selected.
    #[must_use]
    pub const fn page(&self) -> Page {
        self.page
    }

    /// Forgets the cached page after the device was reset elsewhere.
    pub const fn reset_page(&mut self) {
        self.page = Page::Page0;
    }

    /// Reads `length` registers from page-relative `address` on the current
    /// page. Returns the full reply, control byte first.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError`] from the transfer.
    pub fn register_read(&mut self, address: u8, length: usize) -> Result<Vec<u8>, ClientError> {
        let mut transaction = vec![address];
        transaction.resize(length + 1, 0);
        self.client.read(transaction)
    }

    /// Writes `values` to consecutive registers from page-relative
    /// `address` on the current page. Returns the full reply.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError`] from the transfer.
    pub fn register_write(&mut self, address: u8, values: &[u8]) -> Result<Vec<u8>, ClientError> {
        let mut transaction = Vec::with_capacity(values.len() + 1);
        transaction.push(address);
        transaction.extend_from_slice(values);
        self.client.write(transaction)
    }

    /// Selects `page` with a read-modify-write of `CONFIG1`, skipping the
    /// exchange when the cached page already matches.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError`] from the transfer.
    pub fn set_page(&mut self, page: Page) -> Result<(), ClientError> {
        if self.page == page {
            return Ok(());
        }

        let reply = self.register_read(Register::Config1.address(), 1)?;
        let config = reply_value(&reply, 1)?;
        self.register_write(
            Register::Config1.address(),
            &[(config & !Page::Page1.bit()) | page.bit()],
        )?;

        debug!(%page, "selected register page");
        self.page = page;
        Ok(())
    }

    /// Reads the register at full `address`.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError`] from the transfers.
    pub fn read_register(&mut self, address: u8) -> Result<u8, ClientError> {
        let values = self.burst_read(address, 1)?;
        reply_value(&values, 0)
    }

    /// Writes `value` to the register at full `address`.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError`] from the transfers.
    pub fn write_register(&mut self, address: u8, value: u8) -> Result<(), ClientError> {
        self.burst_write(address, &[value])
    }

    /// Reads `length` consecutive registers from full `address`, returning
    /// only the register values.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError`] from the transfers.
    pub fn burst_read(&mut self, address: u8, length: usize) -> Result<Vec<u8>, ClientError> {
        self.set_page(Page::for_address(usize::from(address)))?;
        let mut reply = self.register_read(address & ADDRESS_MASK, length)?;
        if reply.len() != length + 1 {
            return Err(ClientError::ShortReply {
                expected: length + 1,
                received: reply.len(),
            });
        }
        reply.remove(0);
        Ok(reply)
    }

    /// Writes `values` to consecutive registers from full `address`.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError`] from the transfers.
    pub fn burst_write(&mut self, address: u8, values: &[u8]) -> Result<(), ClientError> {
        self.set_page(Page::for_address(usize::from(address)))?;
        self.register_write(address & ADDRESS_MASK, values)?;
        Ok(())
    }

    /// Sets the bits of `mask` in the register at full `address`.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError`] from the transfers.
    pub fn set_register_bit(&mut self, address: u8, mask: u8) -> Result<(), ClientError> {
        let original = self.read_register(address)?;
        self.write_register(address, original | mask)
    }

    /// Clears the bits of `mask` in the register at full `address`.
    ///
    /// # Errors
    ///
    /// Propagates [`ClientError`] from the transfers.
    pub fn clear_register_bit(&mut self, address: u8, mask: u8) -> Result<(), ClientError> {
        let original = self.read_register(address)?;
        self.write_register(address, original & !mask)
    }
}

fn reply_value(reply: &[u8], index: usize) -> Result<u8, ClientError> {
    reply
        .get(index)
        .copied()
        .ok_or(ClientError::ShortReply {
            expected: index + 1,
            received: reply.len(),
        })
}
