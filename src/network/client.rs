//! Blocking client
//!
//! Sends commands to a kvlog server and waits for each response.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{KvError, Result};
use crate::protocol::{read_response, write_command, Command, Response, Status};

/// A single connection to a kvlog server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Send a command and return the raw response
    pub fn send(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        read_response(&mut self.reader)
    }

    /// Get a value; `Ok(None)` if the key does not exist
    pub fn get(&mut self, key: &str) -> Result<Option<String>> {
        let response = self.send(&Command::Get { key: key.to_string() })?;
        match response.status {
            Status::Ok => Ok(Some(response.payload.unwrap_or_default())),
            Status::NotFound => Ok(None),
            _ => Err(into_error(response)),
        }
    }

    pub fn put(&mut self, key: &str, value: &str) -> Result<()> {
        let response = self.send(&Command::Put {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        expect_ok(response)
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        let response = self.send(&Command::Delete { key: key.to_string() })?;
        expect_ok(response)
    }

    pub fn ping(&mut self) -> Result<()> {
        expect_ok(self.send(&Command::Ping)?)
    }
}

fn expect_ok(response: Response) -> Result<()> {
    match response.status {
        Status::Ok => Ok(()),
        _ => Err(into_error(response)),
    }
}

fn into_error(response: Response) -> KvError {
    match response.status {
        Status::NotFound => KvError::KeyNotFound,
        Status::Unavailable => KvError::LoggerHalted,
        _ => KvError::Protocol(response.payload.unwrap_or_else(|| "server error".to_string())),
    }
}
