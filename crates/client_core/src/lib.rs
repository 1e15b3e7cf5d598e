use anyhow::{Context, Result};
use dom::Document;
use serde_json::Value;
use shared::protocol::{CommandBatch, RequestPayload};
use tracing::{info, warn};
use url::Url;

pub mod comet;
pub mod config;
pub mod dispatcher;
pub mod form_serializer;
pub mod frame_response;
pub mod transport;
pub mod upload;

pub use comet::CometRequest;
pub use config::{load_settings, load_settings_from, ClientConfig};
pub use dispatcher::{
    AlertSink, CallRegistry, CommandDispatcher, DispatchError, DispatchReport, FailurePolicy,
    LogAlertSink, ScriptHost,
};
pub use form_serializer::FormSerializer;
pub use frame_response::{FrameError, FrameResponseDecoder};
pub use transport::{HttpTransport, Transport, TransportError};

/// One page's connection to its server-side functions.
///
/// Requests go out through the transport; whatever commands come back are
/// applied to the document the caller passes in.
pub struct SijaxClient<T: Transport = HttpTransport> {
    config: ClientConfig,
    transport: T,
    dispatcher: CommandDispatcher,
    serializer: FormSerializer,
}

impl SijaxClient<HttpTransport> {
    /// Fails when `request_uri` is relative and no `base_url` is configured.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let mut transport = HttpTransport::new(config.request_timeout())
            .context("failed to build http client")?;
        if let Some(base) = config.base_url.as_deref() {
            let base = Url::parse(base).with_context(|| format!("invalid base_url `{base}`"))?;
            transport = transport.with_base_url(base);
        }
        transport.resolve(&config.request_uri).with_context(|| {
            format!(
                "request_uri `{}` does not resolve; relative URIs need base_url",
                config.request_uri
            )
        })?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> SijaxClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        let dispatcher = CommandDispatcher::new().with_policy(config.failure_policy);
        Self {
            config,
            transport,
            dispatcher,
            serializer: FormSerializer::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut CommandDispatcher {
        &mut self.dispatcher
    }

    pub fn register_call<F>(&mut self, name: impl Into<String>, target: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.calls_mut().register(name, target);
        self
    }

    pub fn with_alert_sink(mut self, sink: impl AlertSink + 'static) -> Self {
        self.dispatcher = self.dispatcher.with_alert_sink(sink);
        self
    }

    /// Installs a script host; ignored unless the config allows scripts.
    pub fn with_script_host(mut self, host: impl ScriptHost + 'static) -> Self {
        if self.config.allow_scripts {
            self.dispatcher = self.dispatcher.with_script_host(host);
        } else {
            warn!("client: script host ignored because allow_scripts is off");
        }
        self
    }

    /// Calls `function` on the server and applies the commands it returns.
    pub async fn request<D: Document + ?Sized>(
        &self,
        function: &str,
        args: Vec<Value>,
        document: &mut D,
    ) -> Result<DispatchReport> {
        let payload = RequestPayload::new(function, args);
        let batch = self
            .transport
            .post(&self.config.request_uri, &payload)
            .await
            .with_context(|| format!("request for `{function}` failed"))?;
        info!(function, commands = batch.len(), "client: response received");
        self.apply(document, &batch)
    }

    /// Serializes the form and sends it as the single argument of `function`.
    pub async fn submit_form<D: Document + ?Sized>(
        &self,
        function: &str,
        form_selector: &str,
        document: &mut D,
    ) -> Result<DispatchReport> {
        let values = self
            .serializer
            .serialize(&*document, form_selector)
            .with_context(|| format!("failed to serialize form `{form_selector}`"))?;
        self.request(function, vec![values.to_json()], document)
            .await
    }

    pub fn apply<D: Document + ?Sized>(
        &self,
        document: &mut D,
        batch: &CommandBatch,
    ) -> Result<DispatchReport> {
        self.dispatcher
            .dispatch(document, batch)
            .context("command batch aborted")
    }

    /// Applies every batch in a hidden-frame response body.
    pub fn process_frame_body<D: Document + ?Sized>(
        &self,
        document: &mut D,
        body: &str,
    ) -> Result<DispatchReport> {
        let batches =
            FrameResponseDecoder::decode_all(body).context("failed to decode frame body")?;
        self.dispatcher
            .dispatch_all(document, &batches)
            .context("command batch aborted")
    }

    /// Turns the form into an upload form bound to its `<form_id>_upload` handler.
    pub fn register_upload_form<D: Document + ?Sized>(
        &self,
        document: &mut D,
        form_id: &str,
    ) -> Result<()> {
        upload::register_form(
            document,
            form_id,
            &upload::callback_name(form_id),
            &self.config,
        )
        .with_context(|| format!("failed to register upload form `{form_id}`"))?;
        Ok(())
    }

    pub fn reset_upload_form<D: Document + ?Sized>(
        &self,
        document: &mut D,
        form_id: &str,
    ) -> Result<()> {
        upload::reset_form(document, form_id, &self.config)
            .with_context(|| format!("failed to reset upload form `{form_id}`"))
    }

    pub fn process_upload_response<D: Document + ?Sized>(
        &self,
        document: &mut D,
        form_id: &str,
        body: &str,
    ) -> Result<DispatchReport> {
        upload::process_response(&self.dispatcher, document, form_id, body)
            .with_context(|| format!("failed to process upload response for `{form_id}`"))
    }

    pub fn comet_request<D: Document + ?Sized>(
        &self,
        document: &mut D,
        function: &str,
        args: Vec<Value>,
    ) -> Result<CometRequest> {
        comet::comet_request(document, function, args, &self.config)
            .with_context(|| format!("failed to prepare comet request for `{function}`"))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
