// WebRTC Transport - peer-to-peer data channels
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::auth::AuthConfig;
use crate::providers::base::Provider;
use crate::tools::Tool;
use crate::transports::{stream::StreamResult, ClientTransport};

pub struct WebRtcTransport;

impl WebRtcTransport {
    pub fn new() -> Self {
        Self
    }

    fn apply_auth(&self, auth: &AuthConfig) -> Result<()> {
        match auth {
            AuthConfig::ApiKey(_) | AuthConfig::Basic(_) | AuthConfig::OAuth2(_) => Err(anyhow!(
                "Authentication is not yet supported by the WebRTC transport"
            )),
        }
    }
}

#[async_trait]
impl ClientTransport for WebRtcTransport {
    fn name(&self) -> &'static str {
        "webrtc"
    }

    async fn register_tool_provider(&self, _prov: &dyn Provider) -> Result<Vec<Tool>> {
        // WebRTC requires signaling server setup
        if let Some(auth) = _prov
            .as_any()
            .downcast_ref::<crate::providers::webrtc::WebRtcProvider>()
            .and_then(|p| p.base.auth.as_ref())
        {
            self.apply_auth(auth)?;
        }
        Ok(vec![])
    }

    async fn deregister_tool_provider(&self, _prov: &dyn Provider) -> Result<()> {
        Ok(())
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        _args: HashMap<String, Value>,
        _prov: &dyn Provider,
    ) -> Result<Value> {
        let _ = _prov
            .as_any()
            .downcast_ref::<crate::providers::webrtc::WebRtcProvider>()
            .ok_or_else(|| anyhow!("Provider is not a WebRtcProvider"))?;

        if let Some(auth) = _prov
            .as_any()
            .downcast_ref::<crate::providers::webrtc::WebRtcProvider>()
            .and_then(|p| p.base.auth.as_ref())
        {
            self.apply_auth(auth)?;
        }

        // WebRTC implementation requires:
        // 1. Signaling server for peer discovery
        // 2. STUN/TURN servers for NAT traversal
        // 3. Data channel establishment
        // 4. Message serialization over data channel

        Err(anyhow!(
            "WebRTC transport requires webrtc-rs crate and signaling setup. \
            Tool: {}. \
            Consider using webrtc crate for full implementation.",
            tool_name
        ))
    }

    async fn call_tool_stream(
        &self,
        _tool_name: &str,
        _args: HashMap<String, Value>,
        _prov: &dyn Provider,
    ) -> Result<Box<dyn StreamResult>> {
        // WebRTC data channels natively support streaming
        if let Some(auth) = _prov
            .as_any()
            .downcast_ref::<crate::providers::webrtc::WebRtcProvider>()
            .and_then(|p| p.base.auth.as_ref())
        {
            self.apply_auth(auth)?;
        }
        Err(anyhow!("WebRTC streaming requires webrtc-rs integration"))
    }
}
