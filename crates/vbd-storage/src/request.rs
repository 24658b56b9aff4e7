use crate::{Clock, Direction, LatencyDevice, Result, TransferOutcome, VbdError};

/// Caller-owned data buffer of a transfer; the variant selects the direction.
#[derive(Debug)]
pub enum IoBuffer<'a> {
    /// Filled from the device.
    Read(&'a mut [u8]),
    /// Copied onto the device.
    Write(&'a [u8]),
}

impl IoBuffer<'_> {
    pub fn direction(&self) -> Direction {
        match self {
            IoBuffer::Read(_) => Direction::Read,
            IoBuffer::Write(_) => Direction::Write,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IoBuffer::Read(buf) => buf.len(),
            IoBuffer::Write(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One sector-addressed transfer. `buffer` must hold exactly `sector_count` sectors.
#[derive(Debug)]
pub struct TransferRequest<'a> {
    pub sector: u64,
    pub sector_count: u64,
    pub buffer: IoBuffer<'a>,
}

impl<'a> TransferRequest<'a> {
    pub fn read(sector: u64, sector_count: u64, buf: &'a mut [u8]) -> Self {
        Self {
            sector,
            sector_count,
            buffer: IoBuffer::Read(buf),
        }
    }

    pub fn write(sector: u64, sector_count: u64, buf: &'a [u8]) -> Self {
        Self {
            sector,
            sector_count,
            buffer: IoBuffer::Write(buf),
        }
    }

    pub fn direction(&self) -> Direction {
        self.buffer.direction()
    }
}

/// A request as delivered by the host.
///
/// Only plain storage transfers are modelled; every other request type is rejected with
/// [`VbdError::UnsupportedOperation`] without reaching the transfer engine.
#[derive(Debug)]
pub enum Request<'a> {
    Transfer(TransferRequest<'a>),
    Flush,
    /// Device-specific command (e.g. a SCSI CDB) passed through the host block layer.
    Passthrough { opcode: u8 },
}

impl Request<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Transfer(req) => req.direction().as_str(),
            Request::Flush => "flush",
            Request::Passthrough { .. } => "passthrough",
        }
    }
}

impl<'a> From<TransferRequest<'a>> for Request<'a> {
    fn from(req: TransferRequest<'a>) -> Self {
        Request::Transfer(req)
    }
}

/// Per-request completion status reported back to the host.
#[derive(Debug)]
pub enum Completion {
    Ok(TransferOutcome),
    IoError(VbdError),
}

impl Completion {
    pub fn is_ok(&self) -> bool {
        matches!(self, Completion::Ok(_))
    }

    pub fn outcome(&self) -> Option<&TransferOutcome> {
        match self {
            Completion::Ok(outcome) => Some(outcome),
            Completion::IoError(_) => None,
        }
    }

    pub fn error(&self) -> Option<&VbdError> {
        match self {
            Completion::Ok(_) => None,
            Completion::IoError(err) => Some(err),
        }
    }
}

impl From<Result<TransferOutcome>> for Completion {
    fn from(result: Result<TransferOutcome>) -> Self {
        match result {
            Ok(outcome) => Completion::Ok(outcome),
            Err(err) => Completion::IoError(err),
        }
    }
}

/// Feeds host requests to one device, strictly one at a time and in delivery order.
///
/// A failed request is completed with an I/O error and the stream continues.
pub struct RequestServer<'d, C: Clock> {
    device: &'d LatencyDevice<C>,
    completed: u64,
    failed: u64,
}

impl<'d, C: Clock> RequestServer<'d, C> {
    pub fn new(device: &'d LatencyDevice<C>) -> Self {
        Self {
            device,
            completed: 0,
            failed: 0,
        }
    }

    pub fn device(&self) -> &'d LatencyDevice<C> {
        self.device
    }

    pub fn serve_one(&mut self, request: Request<'_>) -> Result<TransferOutcome> {
        let kind = request.kind();
        match self.device.handle(request) {
            Ok(outcome) => {
                self.completed += 1;
                Ok(outcome)
            }
            Err(err) => {
                self.failed += 1;
                tracing::debug!(kind, "request completed with I/O error: {err}");
                Err(err)
            }
        }
    }

    /// Serves `requests` in order, returning one completion per request in the same order.
    pub fn serve_all<'a, I>(&mut self, requests: I) -> Vec<Completion>
    where
        I: IntoIterator<Item = Request<'a>>,
    {
        requests
            .into_iter()
            .map(|req| Completion::from(self.serve_one(req)))
            .collect()
    }

    /// Requests completed successfully so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Requests completed with an I/O error so far.
    pub fn failed(&self) -> u64 {
        self.failed
    }
}
