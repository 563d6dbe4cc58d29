//! A measurement service reached over HTTP.

use std::time::Duration;

use meshprobe_core::{
    Measurement, MeasurementRequest, MeasurementService, ProtocolVersion, ResponseDecoder,
    ServiceError,
};
use reqwest::{blocking::Client, StatusCode};

use crate::decode::Decoder;

/// Options for [`HttpService`].
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct HttpOpts {
    /// The URL every request is POSTed to.
    #[builder(setter(into))]
    pub endpoint: String,
    /// The per-request timeout, covering connect, send and the full response.
    #[builder(default = Duration::from_secs(10))]
    pub timeout: Duration,
    /// The response encoding.
    #[builder(default)]
    pub protocol: ProtocolVersion,
}

/// POSTs each [`MeasurementRequest`] as a JSON body and decodes the response with `D`.
///
/// Only status 200 counts as success. A connection-level failure is a transport error unless it
/// was caused by the timeout.
#[derive(Debug)]
pub struct HttpService<D = Decoder> {
    client: Client,
    endpoint: String,
    decoder: D,
}

impl HttpService {
    /// Creates a service from `opts`, selecting the decoder for `opts.protocol`.
    pub fn from_opts(opts: HttpOpts) -> Result<Self, reqwest::Error> {
        let decoder = Decoder::for_version(opts.protocol);
        Self::new(opts.endpoint, opts.timeout, decoder)
    }
}

impl<D: ResponseDecoder> HttpService<D> {
    /// Creates a service that decodes responses with `decoder`.
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        decoder: D,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            decoder,
        })
    }

    /// Get a reference to the service's endpoint.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_ref()
    }
}

impl<D: ResponseDecoder> MeasurementService for HttpService<D> {
    fn measure(&self, request: &MeasurementRequest) -> Result<Measurement, ServiceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .map_err(classify)?;
        let status = response.status();
        let body = response.bytes().map_err(classify)?;
        if status != StatusCode::OK {
            return Err(ServiceError::Status {
                code: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        log::trace!("{} answered {} byte(s)", self.endpoint, body.len());
        Ok(self.decoder.decode(&body)?)
    }
}

fn classify(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else {
        ServiceError::Transport(Box::new(e))
    }
}
