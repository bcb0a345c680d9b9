// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP(S) surface of the admission webhooks.

use super::review::{handle_review, Endpoint, Review};
use super::Admission;
use crate::config::{Config, TlsPaths};
use crate::error::FleetError;
use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

pub const VALIDATE_PATH: &str = "/validate-clusterdeployment";
pub const MUTATE_PATH: &str = "/mutate-clusterdeployment";

pub struct WebhookServer {
    admission: Arc<Admission>,
    port: u16,
    tls: Option<TlsPaths>,
}

impl WebhookServer {
    pub fn new(admission: Admission, config: &Config) -> Self {
        Self {
            admission: Arc::new(admission),
            port: config.webhook_port,
            tls: config.tls.clone(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let acceptor = match &self.tls {
            Some(paths) => Some(tls_acceptor(paths).await?),
            None => {
                warn!("No TLS certificate configured, serving admission webhooks over plain HTTP");
                None
            }
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind webhook server to {}", addr))?;
        info!("Webhook server listening on {}", addr);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            let admission = self.admission.clone();
            let acceptor = acceptor.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let admission = admission.clone();
                    async move { Ok::<_, Infallible>(route(&admission, req).await) }
                });

                let served = match acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            http1::Builder::new()
                                .serve_connection(TokioIo::new(tls_stream), service)
                                .await
                        }
                        Err(e) => {
                            error!("TLS handshake with {} failed: {}", peer, e);
                            return;
                        }
                    },
                    None => {
                        http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                    }
                };

                if let Err(e) = served {
                    error!("Connection error from {}: {}", peer, e);
                }
            });
        }
    }
}

async fn tls_acceptor(paths: &TlsPaths) -> Result<TlsAcceptor> {
    let cert_pem = tokio::fs::read(&paths.cert)
        .await
        .with_context(|| format!("Failed to read TLS certificate {}", paths.cert.display()))?;
    let key_pem = tokio::fs::read(&paths.key)
        .await
        .with_context(|| format!("Failed to read TLS key {}", paths.key.display()))?;

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to parse TLS certificate")?;
    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
        .context("Failed to parse TLS key")?
        .context("No private key found in PEM file")?;

    let mut tls_config =
        rustls::ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .context("Failed to select TLS protocol versions")?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .context("Failed to build TLS configuration")?;
    tls_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    info!("TLS certificates loaded from {}", paths.cert.display());
    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}

/// Dispatch one HTTP request to the webhook or health endpoints
pub async fn route<B>(admission: &Admission, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    match (req.method(), req.uri().path()) {
        (&Method::POST, VALIDATE_PATH) => review(admission, Endpoint::Validate, req).await,
        (&Method::POST, MUTATE_PATH) => review(admission, Endpoint::Mutate, req).await,
        (&Method::GET, "/healthz") => build_response(StatusCode::OK, "OK"),
        (&Method::GET, "/readyz") => build_response(StatusCode::OK, "Ready"),
        _ => build_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn review<B>(admission: &Admission, endpoint: Endpoint, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return build_response(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    let review: Review = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(e) => {
            warn!("Failed to parse AdmissionReview: {}", e);
            return build_response(StatusCode::BAD_REQUEST, "Invalid AdmissionReview format");
        }
    };

    let answer = match handle_review(admission, endpoint, review).await {
        Ok(answer) => answer,
        Err(e @ FleetError::BadRequest(_)) => {
            warn!("Rejected malformed AdmissionReview: {}", e);
            return build_response(StatusCode::BAD_REQUEST, e.to_string());
        }
        Err(e) => {
            error!("Failed to answer AdmissionReview: {}", e);
            return build_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    match serde_json::to_vec(&answer) {
        Ok(json) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(json)))
            .unwrap_or_else(|e| {
                error!("Failed to build admission review response: {}", e);
                build_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response")
            }),
        Err(e) => {
            error!("Failed to serialize admission review response: {}", e);
            build_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to serialize response")
        }
    }
}

fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}
